//! Spawner configuration management.
//!
//! Provides typed configuration loaded from environment variables with validation.

use std::time::Duration;

use crate::protocol::{ProtocolRevision, TerminalStates};

/// Variables exported into the notebook container by default.
pub const DEFAULT_ENV_WHITELIST: &[&str] = &[
    "JPY_API_TOKEN",
    "JPY_BASE_URL",
    "JPY_COOKIE_NAME",
    "JPY_HUB_API_URL",
    "JPY_HUB_PREFIX",
    "JPY_USER",
    "NOTEBOOK_DIR",
];

/// Spawner configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the task collection, e.g. `http://tes:8000/v1/tasks`
    pub endpoint: String,

    /// Service API revision
    pub protocol: ProtocolRevision,

    /// Overrides the revision's terminal state vocabulary
    pub terminal_states: Option<TerminalStates>,

    /// Endpoint polling settings
    pub poll: PollConfig,

    /// HTTP client settings
    pub http: HttpConfig,

    /// Notebook task settings
    pub notebook: NotebookConfig,
}

/// Endpoint resolution polling configuration.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between two detailed status requests
    pub interval: Duration,

    /// Upper bound for a task to expose its endpoint after submission
    pub start_timeout: Duration,
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Timeout of a single request
    pub request_timeout: Duration,

    /// Timeout for establishing a connection
    pub connect_timeout: Duration,
}

/// Settings of the notebook task built by the spawner.
#[derive(Debug, Clone)]
pub struct NotebookConfig {
    /// Shell command starting the single-user server inside the container
    pub command: String,

    /// Port the single-user server listens on inside the container
    pub port: u16,

    /// Image used when the user did not pick one
    pub default_image: String,

    /// Mount point of the user's home volume
    pub home_mount: String,

    /// Environment variables exported into the container
    pub env_whitelist: Vec<String>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            start_timeout: Duration::from_secs(300),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for NotebookConfig {
    fn default() -> Self {
        Self {
            command: "bash /usr/local/bin/start-singleuser.sh".to_string(),
            port: 8888,
            default_image: "jupyter/datascience-notebook:latest".to_string(),
            home_mount: "/home/jovyan/work".to_string(),
            env_whitelist: DEFAULT_ENV_WHITELIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8000/v1/tasks")
    }
}

/// Configuration loading error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Configuration error for '{}': {}",
            self.field, self.message
        )
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Default configuration pointing at `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            protocol: ProtocolRevision::default(),
            terminal_states: None,
            poll: PollConfig::default(),
            http: HttpConfig::default(),
            notebook: NotebookConfig::default(),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `TES_ENDPOINT`: task collection URL (default: http://127.0.0.1:8000/v1/tasks)
    /// - `TES_PROTOCOL`: `v1` or `legacy` (default: v1)
    /// - `TES_TERMINAL_STATES`: comma-separated terminal states (default: per protocol)
    /// - `TES_POLL_INTERVAL_MS`: endpoint polling step in ms (default: 500)
    /// - `TES_START_TIMEOUT_SECS`: endpoint resolution deadline (default: 300)
    /// - `TES_REQUEST_TIMEOUT_SECS`: single request timeout (default: 10)
    /// - `TES_CONNECT_TIMEOUT_SECS`: connection timeout (default: 5)
    /// - `TES_NOTEBOOK_COMMAND`: single-user server command
    /// - `TES_NOTEBOOK_PORT`: single-user server port (default: 8888)
    /// - `TES_NOTEBOOK_IMAGE`: default image
    /// - `TES_ENV_WHITELIST`: comma-separated variables exported to the container
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let endpoint = lookup("TES_ENDPOINT")
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or(defaults.endpoint);

        let protocol = match lookup("TES_PROTOCOL") {
            Some(raw) => raw.parse().map_err(|message| ConfigError {
                field: "TES_PROTOCOL".to_string(),
                message,
            })?,
            None => ProtocolRevision::default(),
        };

        let terminal_states = lookup("TES_TERMINAL_STATES").map(|s| TerminalStates::parse_list(&s));

        let poll = PollConfig {
            interval: Duration::from_millis(parse_or(&lookup, "TES_POLL_INTERVAL_MS", 500)?),
            start_timeout: Duration::from_secs(parse_or(&lookup, "TES_START_TIMEOUT_SECS", 300)?),
        };

        let http = HttpConfig {
            request_timeout: Duration::from_secs(parse_or(&lookup, "TES_REQUEST_TIMEOUT_SECS", 10)?),
            connect_timeout: Duration::from_secs(parse_or(&lookup, "TES_CONNECT_TIMEOUT_SECS", 5)?),
        };

        let notebook = NotebookConfig {
            command: lookup("TES_NOTEBOOK_COMMAND").unwrap_or(defaults.notebook.command),
            port: parse_or(&lookup, "TES_NOTEBOOK_PORT", defaults.notebook.port)?,
            default_image: lookup("TES_NOTEBOOK_IMAGE").unwrap_or(defaults.notebook.default_image),
            home_mount: defaults.notebook.home_mount,
            env_whitelist: lookup("TES_ENV_WHITELIST")
                .map(|s| {
                    s.split(',')
                        .map(|v| v.trim().to_string())
                        .filter(|v| !v.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.notebook.env_whitelist),
        };

        let config = Self {
            endpoint,
            protocol,
            terminal_states,
            poll,
            http,
            notebook,
        };

        config.validate()?;
        Ok(config)
    }

    /// Terminal states in effect: the override, or the protocol's own.
    pub fn effective_terminal_states(&self) -> TerminalStates {
        self.terminal_states
            .clone()
            .unwrap_or_else(|| self.protocol.terminal_states())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.endpoint.is_empty() {
            return Err(ConfigError {
                field: "TES_ENDPOINT".to_string(),
                message: "Cannot be empty".to_string(),
            });
        }

        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(ConfigError {
                field: "TES_ENDPOINT".to_string(),
                message: "Must start with http:// or https://".to_string(),
            });
        }

        if self.poll.interval.is_zero() {
            return Err(ConfigError {
                field: "TES_POLL_INTERVAL_MS".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.poll.interval > self.poll.start_timeout {
            return Err(ConfigError {
                field: "TES_POLL_INTERVAL_MS".to_string(),
                message: "Cannot be greater than TES_START_TIMEOUT_SECS".to_string(),
            });
        }

        if self.http.request_timeout.is_zero() {
            return Err(ConfigError {
                field: "TES_REQUEST_TIMEOUT_SECS".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.notebook.port == 0 {
            return Err(ConfigError {
                field: "TES_NOTEBOOK_PORT".to_string(),
                message: "Must be greater than 0".to_string(),
            });
        }

        if self.terminal_states.as_ref().is_some_and(|s| s.is_empty()) {
            return Err(ConfigError {
                field: "TES_TERMINAL_STATES".to_string(),
                message: "Must list at least one state".to_string(),
            });
        }

        Ok(())
    }
}

/// Parse a variable or return a default value.
fn parse_or<T, F>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(val) => val.trim().parse().map_err(|_| ConfigError {
            field: name.to_string(),
            message: format!("Invalid value '{}', expected a valid number", val),
        }),
        None => Ok(default),
    }
}
