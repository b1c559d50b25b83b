//! Domain model for tasks submitted to a Task Execution Service.
//!
//! These types are protocol-neutral; the wire representation for each
//! service revision lives in [`crate::dtos`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Handles, states and endpoints
// =============================================================================

/// Opaque identifier assigned by the service on submission.
///
/// The empty handle stands for "no task" and short-circuits every client call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(String);

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskHandle {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for TaskHandle {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Status string reported by the service.
///
/// Kept open-ended: which values are terminal depends on the service
/// revision and is decided by [`crate::protocol::TerminalStates`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskState(String);

impl TaskState {
    pub fn new(state: impl Into<String>) -> Self {
        Self(state.into())
    }

    /// Sentinel for "no task running".
    pub fn not_running() -> Self {
        Self(String::new())
    }

    pub fn is_not_running(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<not running>")
        } else {
            self.0.fmt(f)
        }
    }
}

/// Address at which the task's primary service became reachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub host: String,
    pub port: u16,
}

impl EndpointInfo {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for EndpointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Task description
// =============================================================================

/// Whether a parameter points at a single file or a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterKind {
    #[default]
    File,
    Directory,
}

/// Input or output declaration of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskParameter {
    pub name: Option<String>,
    pub description: Option<String>,
    /// Storage location (URL) of the data outside the container.
    pub url: String,
    /// Path inside the container.
    pub path: String,
    pub kind: ParameterKind,
    pub create: Option<bool>,
}

impl TaskParameter {
    pub fn new(url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: None,
            description: None,
            url: url.into(),
            path: path.into(),
            kind: ParameterKind::File,
            create: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn directory(mut self) -> Self {
        self.kind = ParameterKind::Directory;
        self
    }

    pub fn create(mut self, create: bool) -> Self {
        self.create = Some(create);
        self
    }
}

/// Disk volume attached to the task.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub name: Option<String>,
    pub size_gb: f64,
    pub source: Option<String>,
    pub mount_point: String,
    pub read_only: Option<bool>,
}

impl Volume {
    pub fn new(mount_point: impl Into<String>, size_gb: f64) -> Self {
        Self {
            name: None,
            size_gb,
            source: None,
            mount_point: mount_point.into(),
            read_only: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = Some(read_only);
        self
    }
}

/// Compute resources requested for the task.
#[derive(Debug, Clone, PartialEq)]
pub struct Resources {
    pub cpu_cores: u32,
    pub ram_gb: f64,
    pub disk_gb: Option<f64>,
    pub preemptible: Option<bool>,
    pub zones: Option<Vec<String>>,
    pub volumes: Vec<Volume>,
}

impl Resources {
    pub fn new(cpu_cores: u32, ram_gb: f64) -> Self {
        Self {
            cpu_cores,
            ram_gb,
            disk_gb: None,
            preemptible: None,
            zones: None,
            volumes: Vec::new(),
        }
    }

    pub fn disk_gb(mut self, disk_gb: f64) -> Self {
        self.disk_gb = Some(disk_gb);
        self
    }

    pub fn preemptible(mut self, preemptible: bool) -> Self {
        self.preemptible = Some(preemptible);
        self
    }

    pub fn zones(mut self, zones: Vec<String>) -> Self {
        self.zones = Some(zones);
        self
    }

    pub fn volume(mut self, volume: Volume) -> Self {
        self.volumes.push(volume);
        self
    }
}

/// Port the container listens on, optionally pinned to a host-side port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub container: u16,
    pub host: Option<u16>,
}

impl PortMapping {
    pub fn container(port: u16) -> Self {
        Self {
            container: port,
            host: None,
        }
    }
}

/// One container invocation of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct Executor {
    pub image: String,
    pub command: Vec<String>,
    pub workdir: Option<String>,
    pub stdin: Option<String>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub ports: Vec<PortMapping>,
    pub env: BTreeMap<String, String>,
}

impl Executor {
    pub fn new(image: impl Into<String>, command: Vec<String>) -> Self {
        Self {
            image: image.into(),
            command,
            workdir: None,
            stdin: None,
            stdout: None,
            stderr: None,
            ports: Vec::new(),
            env: BTreeMap::new(),
        }
    }

    pub fn workdir(mut self, workdir: impl Into<String>) -> Self {
        self.workdir = Some(workdir.into());
        self
    }

    pub fn stdin(mut self, path: impl Into<String>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    pub fn stdout(mut self, path: impl Into<String>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    pub fn stderr(mut self, path: impl Into<String>) -> Self {
        self.stderr = Some(path.into());
        self
    }

    pub fn port(mut self, mapping: PortMapping) -> Self {
        self.ports.push(mapping);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}

/// Immutable description of a unit of work.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDescription {
    pub name: String,
    pub description: Option<String>,
    /// Only understood by the legacy service revision.
    pub project_id: Option<String>,
    pub inputs: Vec<TaskParameter>,
    pub outputs: Vec<TaskParameter>,
    pub resources: Resources,
    pub executors: Vec<Executor>,
}

impl TaskDescription {
    pub fn builder(name: impl Into<String>, resources: Resources) -> TaskBuilder {
        TaskBuilder {
            task: TaskDescription {
                name: name.into(),
                description: None,
                project_id: None,
                inputs: Vec::new(),
                outputs: Vec::new(),
                resources,
                executors: Vec::new(),
            },
        }
    }
}

/// Builder for [`TaskDescription`].
///
/// ```rust
/// use tes_spawner::{Executor, Resources, TaskDescription};
///
/// let task = TaskDescription::builder("hello", Resources::new(1, 2.0))
///     .executor(Executor::new("alpine", vec!["echo".into(), "hi".into()]))
///     .build();
/// assert_eq!(task.executors.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct TaskBuilder {
    task: TaskDescription,
}

impl TaskBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.task.description = Some(description.into());
        self
    }

    pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
        self.task.project_id = Some(project_id.into());
        self
    }

    pub fn input(mut self, input: TaskParameter) -> Self {
        self.task.inputs.push(input);
        self
    }

    pub fn output(mut self, output: TaskParameter) -> Self {
        self.task.outputs.push(output);
        self
    }

    pub fn executor(mut self, executor: Executor) -> Self {
        self.task.executors.push(executor);
        self
    }

    pub fn build(self) -> TaskDescription {
        self.task
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_handle_and_state() {
        assert!(TaskHandle::default().is_empty());
        assert!(TaskState::not_running().is_not_running());
        assert_eq!(TaskState::not_running().to_string(), "<not running>");
    }

    #[test]
    fn test_handle_serializes_as_plain_string() {
        let value = serde_json::to_value(TaskHandle::new("task-123")).unwrap();
        assert_eq!(value, serde_json::json!("task-123"));
    }

    #[test]
    fn test_builder_keeps_order() {
        let task = TaskDescription::builder("two-steps", Resources::new(2, 4.0))
            .executor(Executor::new("alpine", vec!["true".into()]))
            .executor(Executor::new("busybox", vec!["false".into()]))
            .build();
        assert_eq!(task.executors[0].image, "alpine");
        assert_eq!(task.executors[1].image, "busybox");
    }
}
