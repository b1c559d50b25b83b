use std::time::Duration;

use serde_json::{Value, json};
use tes_spawner::{
    Executor, PortMapping, ProtocolRevision, Resources, TaskClient, TaskDescription, TaskHandle,
};

/// Poll step used by the tests, short enough to keep them fast.
pub const TEST_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// v1 client against the mock service.
pub fn v1_client(base_url: &str) -> TaskClient {
    TaskClient::new(base_url).poll_interval(TEST_POLL_INTERVAL)
}

/// Legacy client against the mock service.
pub fn legacy_client(base_url: &str) -> TaskClient {
    TaskClient::new(base_url)
        .protocol(ProtocolRevision::Legacy)
        .poll_interval(TEST_POLL_INTERVAL)
}

pub fn handle() -> TaskHandle {
    TaskHandle::new("task-123")
}

/// A single-executor notebook-like task.
pub fn notebook_task() -> TaskDescription {
    TaskDescription::builder("notebook", Resources::new(1, 8.0))
        .executor(
            Executor::new("jupyter/base-notebook", vec!["start-notebook.sh".into()])
                .port(PortMapping::container(8888)),
        )
        .build()
}

/// v1 task document without any executor log yet.
pub fn queued_task(state: &str) -> Value {
    json!({"id": "task-123", "state": state})
}

/// v1 detailed task document with one executor log entry.
pub fn executor_log_task(state: &str, host_ip: Value, ports: Value) -> Value {
    json!({
        "id": "task-123",
        "state": state,
        "logs": [{
            "logs": [{
                "start_time": "2024-01-01T00:00:00Z",
                "host_ip": host_ip,
                "ports": ports
            }]
        }]
    })
}

/// Legacy task document carrying a container inspection document.
pub fn legacy_metadata_task(state: &str, ip: &str, bindings: Value) -> Value {
    let inspect = json!({
        "NetworkSettings": {"IPAddress": ip},
        "HostConfig": {"PortBindings": bindings}
    });
    json!({
        "jobID": "task-123",
        "state": state,
        "metadata": {"task-1230": inspect.to_string()}
    })
}
