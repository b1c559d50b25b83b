//! Prometheus metrics for spawner observability.
//!
//! Counts calls against the Task Execution Service and times endpoint resolution.

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

/// Tasks accepted by the service
pub static TASKS_SUBMITTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new("tes_tasks_submitted_total", "Total number of tasks submitted")
        .expect("metric can be created");
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Requests answered with an error, by operation
pub static REQUEST_FAILURES_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "tes_request_failures_total",
            "Number of failed requests to the task execution service",
        ),
        &["operation", "kind"],
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Detailed status requests issued while waiting for an endpoint
pub static ENDPOINT_POLLS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "tes_endpoint_polls_total",
        "Total number of detailed status polls while resolving endpoints",
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Endpoint resolutions by outcome (resolved/timeout/cancelled/error)
pub static ENDPOINT_RESOLUTIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new(
            "tes_endpoint_resolutions_total",
            "Number of endpoint resolutions by outcome",
        ),
        &["outcome"],
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Time from the first poll to a resolved endpoint
pub static ENDPOINT_RESOLVE_SECONDS: LazyLock<Histogram> = LazyLock::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "tes_endpoint_resolve_seconds",
            "Time taken for a task to expose its endpoint",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
    )
    .expect("metric can be created");
    REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

/// Tasks cancelled
pub static TASKS_CANCELLED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new("tes_tasks_cancelled_total", "Total number of tasks cancelled")
        .expect("metric can be created");
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

pub fn record_submission() {
    TASKS_SUBMITTED_TOTAL.inc();
}

pub fn record_failure(operation: &str, kind: &str) {
    REQUEST_FAILURES_TOTAL
        .with_label_values(&[operation, kind])
        .inc();
}

pub fn record_poll() {
    ENDPOINT_POLLS_TOTAL.inc();
}

pub fn record_resolution(outcome: &str, elapsed: std::time::Duration) {
    ENDPOINT_RESOLUTIONS_TOTAL
        .with_label_values(&[outcome])
        .inc();
    if outcome == "resolved" {
        ENDPOINT_RESOLVE_SECONDS.observe(elapsed.as_secs_f64());
    }
}

pub fn record_cancel() {
    TASKS_CANCELLED_TOTAL.inc();
}

/// Render all registered metrics in the Prometheus text format.
pub fn gather() -> String {
    // force registration so empty metrics still show up
    LazyLock::force(&TASKS_SUBMITTED_TOTAL);
    LazyLock::force(&REQUEST_FAILURES_TOTAL);
    LazyLock::force(&ENDPOINT_POLLS_TOTAL);
    LazyLock::force(&ENDPOINT_RESOLUTIONS_TOTAL);
    LazyLock::force(&ENDPOINT_RESOLVE_SECONDS);
    LazyLock::force(&TASKS_CANCELLED_TOTAL);

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        log::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
