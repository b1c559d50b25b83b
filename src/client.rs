//! HTTP client for a Task Execution Service.
//!
//! Submission, status lookups and cancellation are single request/response
//! calls with no retry. [`TaskClient::resolve_endpoint`] is the only call that
//! polls, and it stops at a hard deadline.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::dtos;
use crate::error::{Result, TesError};
use crate::metrics;
use crate::models::{EndpointInfo, TaskDescription, TaskHandle, TaskState};
use crate::protocol::{CancelMethod, ProtocolRevision, TerminalStates};
use crate::shape::ResponseShape;
use crate::validation;

/// Default delay between two endpoint polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Client for one Task Execution Service task collection.
#[derive(Debug)]
pub struct TaskClient {
    base_url: String,
    http: reqwest::Client,
    protocol: ProtocolRevision,
    shape: Box<dyn ResponseShape>,
    terminal: TerminalStates,
    poll_interval: Duration,
    /// Last state seen per handle, including optimistic cancellations.
    /// Terminal entries are evicted on the next successful submission.
    states: Mutex<HashMap<TaskHandle, TaskState>>,
}

impl TaskClient {
    /// Create a v1 client for the task collection at `base_url`
    /// (e.g. `http://localhost:8000/v1/tasks`).
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http_client(base_url, reqwest::Client::new())
    }

    /// Create a client with a custom `reqwest::Client` (e.g. for custom TLS, timeouts).
    pub fn with_http_client(base_url: impl Into<String>, http: reqwest::Client) -> Self {
        let mut base = base_url.into();
        // Strip trailing slash for consistent URL building
        while base.ends_with('/') {
            base.pop();
        }
        let protocol = ProtocolRevision::default();
        Self {
            base_url: base,
            http,
            protocol,
            shape: protocol.response_shape(),
            terminal: protocol.terminal_states(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Build a client from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http.request_timeout)
            .connect_timeout(config.http.connect_timeout)
            .build()?;

        Ok(Self::with_http_client(&config.endpoint, http)
            .protocol(config.protocol)
            .terminal_states(config.effective_terminal_states())
            .poll_interval(config.poll.interval))
    }

    /// Switch the service revision. Resets the response shape and the
    /// terminal states to the revision's own.
    pub fn protocol(mut self, protocol: ProtocolRevision) -> Self {
        self.protocol = protocol;
        self.shape = protocol.response_shape();
        self.terminal = protocol.terminal_states();
        self
    }

    pub fn response_shape(mut self, shape: Box<dyn ResponseShape>) -> Self {
        self.shape = shape;
        self
    }

    pub fn terminal_states(mut self, terminal: TerminalStates) -> Self {
        self.terminal = terminal;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn revision(&self) -> ProtocolRevision {
        self.protocol
    }

    /// Whether `state` is one the task never leaves.
    pub fn is_terminal(&self, state: &TaskState) -> bool {
        self.terminal.contains(state)
    }

    /// Last state recorded for `handle` by [`Self::get_status`],
    /// [`Self::resolve_endpoint`] or [`Self::cancel`]. Terminal states are
    /// dropped once another task is submitted.
    pub fn cached_state(&self, handle: &TaskHandle) -> Option<TaskState> {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(handle)
            .cloned()
    }

    /// Drop the cached state of `handle`.
    pub fn forget(&self, handle: &TaskHandle) {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(handle);
    }

    /// Drop cached states of tasks that can no longer change.
    fn evict_terminal(&self) {
        let terminal = &self.terminal;
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|_, state| !terminal.contains(state));
    }

    fn remember(&self, handle: &TaskHandle, state: TaskState) {
        self.states
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(handle.clone(), state);
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit a task (POST <base>) and return its handle.
    ///
    /// Never retried: a failure here means the task may or may not exist, and
    /// the caller decides whether to submit again.
    pub async fn submit(&self, task: &TaskDescription) -> Result<TaskHandle> {
        let result = self.submit_inner(task).await;
        observe("submit", result)
    }

    async fn submit_inner(&self, task: &TaskDescription) -> Result<TaskHandle> {
        validation::validate_task(task).map_err(TesError::Validation)?;
        let body = dtos::task_body(self.protocol, task)
            .map_err(|e| TesError::Serialize(e.to_string()))?;

        log::info!("Submitting task '{}' to {}", task.name, self.base_url);
        log::debug!("Task message: {}", body);

        let resp = self.http.post(&self.base_url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TesError::Submission {
                status: status.as_u16(),
                body: resp.text().await?,
            });
        }

        let payload = read_json(resp).await?;
        let key = self.protocol.handle_key();
        let handle = payload
            .get(key)
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                TesError::Protocol(format!(
                    "submission response has no '{}' field: {}",
                    key, payload
                ))
            })?;

        self.evict_terminal();
        metrics::record_submission();
        log::info!("Started task {}", handle);
        Ok(TaskHandle::new(handle))
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Current state of a task (GET <base>/<handle>).
    ///
    /// An empty handle answers [`TaskState::not_running`] without touching
    /// the network.
    pub async fn get_status(&self, handle: &TaskHandle) -> Result<TaskState> {
        if handle.is_empty() {
            return Ok(TaskState::not_running());
        }
        let result = self.get_status_inner(handle).await;
        observe("status", result)
    }

    async fn get_status_inner(&self, handle: &TaskHandle) -> Result<TaskState> {
        let payload = self.fetch_task(handle, false).await?;
        let state = payload
            .get("state")
            .and_then(Value::as_str)
            .map(TaskState::new)
            .ok_or_else(|| {
                TesError::Protocol(format!("task {} has no 'state' field: {}", handle, payload))
            })?;

        log::debug!("Task {} status: {}", handle, state);
        self.remember(handle, state.clone());
        Ok(state)
    }

    /// Raw task document, optionally in the revision's detailed view.
    pub async fn fetch_task(&self, handle: &TaskHandle, detailed: bool) -> Result<Value> {
        let url = self.protocol.task_url(&self.base_url, handle);
        log::debug!("GET {}", url);

        let mut request = self.http.get(&url);
        let query = self.protocol.detail_query();
        if detailed && !query.is_empty() {
            request = request.query(query);
        }

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TesError::Query {
                status: status.as_u16(),
                body: resp.text().await?,
            });
        }
        read_json(resp).await
    }

    // =========================================================================
    // Endpoint resolution
    // =========================================================================

    /// Poll the detailed task view until the executor exposes a host and a
    /// host-side port.
    ///
    /// Incomplete payloads are retried every poll interval. The call fails with
    /// [`TesError::Timeout`] once `timeout` has elapsed, with
    /// [`TesError::Cancelled`] as soon as `cancel` fires, and immediately on
    /// transport errors, non-success statuses or an ambiguous port mapping.
    pub async fn resolve_endpoint(
        &self,
        handle: &TaskHandle,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<EndpointInfo> {
        if handle.is_empty() {
            return Err(TesError::Protocol(
                "cannot resolve an endpoint without a task handle".to_string(),
            ));
        }

        let started = Instant::now();
        let deadline = started + timeout;

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TesError::Cancelled { handle: handle.clone() }),
            _ = tokio::time::sleep_until(deadline) => Err(TesError::Timeout {
                handle: handle.clone(),
                waited: started.elapsed(),
            }),
            res = self.poll_endpoint(handle) => res,
        };

        let outcome = match &result {
            Ok(_) => "resolved",
            Err(TesError::Timeout { .. }) => "timeout",
            Err(TesError::Cancelled { .. }) => "cancelled",
            Err(_) => "error",
        };
        metrics::record_resolution(outcome, started.elapsed());

        match &result {
            Ok(endpoint) => log::info!(
                "Task {} reachable at {} after {:?}",
                handle,
                endpoint,
                started.elapsed()
            ),
            Err(e) => log::warn!("Failed to resolve endpoint of task {}: {}", handle, e),
        }
        observe("resolve", result)
    }

    async fn poll_endpoint(&self, handle: &TaskHandle) -> Result<EndpointInfo> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            metrics::record_poll();

            let payload = self.fetch_task(handle, true).await?;
            if let Some(state) = payload.get("state").and_then(Value::as_str) {
                let state = TaskState::new(state);
                if self.is_terminal(&state) {
                    log::warn!(
                        "Task {} reached {} while waiting for its endpoint",
                        handle,
                        state
                    );
                }
                self.remember(handle, state);
            }

            if let Some(endpoint) = self.shape.extract(handle, &payload)? {
                return Ok(endpoint);
            }
            log::debug!(
                "Task {} has no endpoint yet (attempt {}), retrying in {:?}",
                handle,
                attempt,
                self.poll_interval
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    /// Cancel a task. A no-op for the empty handle.
    ///
    /// On success the cached state becomes the revision's canceled value
    /// right away, without waiting for the service to report it.
    pub async fn cancel(&self, handle: &TaskHandle) -> Result<()> {
        if handle.is_empty() {
            return Ok(());
        }
        let result = self.cancel_inner(handle).await;
        observe("cancel", result)
    }

    async fn cancel_inner(&self, handle: &TaskHandle) -> Result<()> {
        let url = self.protocol.cancel_url(&self.base_url, handle);
        let request = match self.protocol.cancel_method() {
            CancelMethod::Delete => {
                log::debug!("DELETE {}", url);
                self.http.delete(&url)
            }
            CancelMethod::PostCancel => {
                log::debug!("POST {}", url);
                self.http.post(&url)
            }
        };

        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(TesError::Cancellation {
                status: status.as_u16(),
                body: resp.text().await?,
            });
        }

        self.remember(handle, self.protocol.canceled_state());
        metrics::record_cancel();
        log::info!("Canceled task {}", handle);
        Ok(())
    }
}

async fn read_json(resp: reqwest::Response) -> Result<Value> {
    let text = resp.text().await?;
    serde_json::from_str(&text).map_err(|e| TesError::Deserialize(format!("{}: {}", e, text)))
}

fn observe<T>(operation: &str, result: Result<T>) -> Result<T> {
    if let Err(e) = &result {
        metrics::record_failure(operation, e.kind());
    }
    result
}
