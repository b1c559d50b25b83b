//! Notebook spawner lifecycle on top of [`TaskClient`].
//!
//! The hosting orchestrator drives `start` / `poll` / `stop` and persists
//! [`SpawnerState`] between restarts; the spawner never decides when it runs.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::client::TaskClient;
use crate::config::{Config, NotebookConfig};
use crate::error::{Result, TesError};
use crate::models::{
    EndpointInfo, Executor, PortMapping, Resources, TaskDescription, TaskHandle, TaskState, Volume,
};

/// Workload options chosen for one notebook server.
#[derive(Debug, Clone, PartialEq)]
pub struct UserOptions {
    /// Container image; the configured default when unset
    pub image: Option<String>,
    pub cpu: u32,
    pub mem_gb: f64,
    pub disk_gb: f64,
}

impl Default for UserOptions {
    fn default() -> Self {
        Self {
            image: None,
            cpu: 1,
            mem_gb: 8.0,
            disk_gb: 10.0,
        }
    }
}

/// State the host persists across restarts to re-attach to a running task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpawnerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskState>,
}

/// Runs one notebook server as a task, one task at a time.
#[derive(Debug)]
pub struct Spawner {
    client: TaskClient,
    notebook: NotebookConfig,
    start_timeout: Duration,
    handle: TaskHandle,
    status: TaskState,
}

impl Spawner {
    pub fn new(client: TaskClient, notebook: NotebookConfig, start_timeout: Duration) -> Self {
        Self {
            client,
            notebook,
            start_timeout,
            handle: TaskHandle::default(),
            status: TaskState::not_running(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            TaskClient::from_config(config)?,
            config.notebook.clone(),
            config.poll.start_timeout,
        ))
    }

    pub fn client(&self) -> &TaskClient {
        &self.client
    }

    pub fn handle(&self) -> &TaskHandle {
        &self.handle
    }

    pub fn status(&self) -> &TaskState {
        &self.status
    }

    /// Shell line exporting the whitelisted variables before the notebook
    /// command. The service has no way to pass a container environment in
    /// every revision, so it travels inside the command.
    pub fn build_command(&self, env: &BTreeMap<String, String>) -> String {
        let exports: Vec<String> = env
            .iter()
            .filter(|(key, _)| self.notebook.env_whitelist.iter().any(|w| w == *key))
            .map(|(key, value)| format!("{}={}", key, shell_quote(value)))
            .collect();

        if exports.is_empty() {
            self.notebook.command.clone()
        } else {
            format!("export {} && {}", exports.join(" "), self.notebook.command)
        }
    }

    /// Task running the notebook server for `options`.
    pub fn task_description(
        &self,
        options: &UserOptions,
        env: &BTreeMap<String, String>,
    ) -> TaskDescription {
        let image = options
            .image
            .clone()
            .filter(|i| !i.trim().is_empty())
            .unwrap_or_else(|| self.notebook.default_image.clone());

        let resources = Resources::new(options.cpu, options.mem_gb)
            .preemptible(false)
            .volume(
                Volume::new(&self.notebook.home_mount, options.disk_gb)
                    .name("user_home")
                    .read_only(false),
            );

        let executor = Executor::new(
            &image,
            vec![
                "bash".to_string(),
                "-c".to_string(),
                self.build_command(env),
            ],
        )
        .stdout("stdout")
        .stderr("stderr")
        .port(PortMapping::container(self.notebook.port));

        TaskDescription::builder(image, resources)
            .executor(executor)
            .build()
    }

    /// Submit the notebook task and wait until it is reachable.
    ///
    /// The handle is kept even when resolution fails, so the host can still
    /// `stop` the submitted task.
    pub async fn start(
        &mut self,
        options: &UserOptions,
        env: &BTreeMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<EndpointInfo> {
        if !self.handle.is_empty() && !self.client.is_terminal(&self.status) {
            return Err(TesError::AlreadyRunning {
                handle: self.handle.clone(),
            });
        }

        let task = self.task_description(options, env);
        let handle = self.client.submit(&task).await?;
        self.handle = handle.clone();
        self.status = TaskState::not_running();

        let result = self
            .client
            .resolve_endpoint(&handle, self.start_timeout, cancel)
            .await;
        if let Some(state) = self.client.cached_state(&handle) {
            self.status = state;
        }
        result
    }

    /// `None` while the task runs, `Some(1)` once it reached a terminal state,
    /// `Some(0)` when no task was ever started.
    pub async fn poll(&mut self) -> Result<Option<i32>> {
        if self.handle.is_empty() {
            return Ok(Some(0));
        }

        self.status = self.client.get_status(&self.handle).await?;
        log::debug!("Task {} status: {}", self.handle, self.status);

        if self.client.is_terminal(&self.status) {
            Ok(Some(1))
        } else {
            Ok(None)
        }
    }

    /// Cancel the task; the local status flips to canceled immediately.
    pub async fn stop(&mut self) -> Result<()> {
        if self.handle.is_empty() {
            return Ok(());
        }
        self.client.cancel(&self.handle).await?;
        self.status = self
            .client
            .cached_state(&self.handle)
            .unwrap_or_else(|| self.client.revision().canceled_state());
        Ok(())
    }

    pub fn load_state(&mut self, state: SpawnerState) {
        self.handle = state.task_id.unwrap_or_default();
        self.status = state.status.unwrap_or_default();
    }

    pub fn get_state(&self) -> SpawnerState {
        SpawnerState {
            task_id: Some(self.handle.clone()).filter(|h| !h.is_empty()),
            status: Some(self.status.clone()).filter(|s| !s.is_not_running()),
        }
    }

    pub fn clear_state(&mut self) {
        self.client.forget(&self.handle);
        self.handle = TaskHandle::default();
        self.status = TaskState::not_running();
    }
}

/// Single-quote `value` for a POSIX shell.
fn shell_quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:@%+=,".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', r"'\''"))
}
