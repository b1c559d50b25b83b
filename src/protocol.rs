//! Revision-dependent details of the Task Execution Service API.
//!
//! Everything that changed between service revisions is answered here, so the
//! client and the polling loop are written once.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::models::{TaskHandle, TaskState};
use crate::shape::{ExecutorLog, LegacyMetadata, ResponseShape};

/// Service API revision the client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolRevision {
    /// `/v1/jobs` era: handle under `value`, `DELETE` to cancel, container
    /// inspection document in `metadata`.
    Legacy,
    /// GA4GH TES v1: handle under `id`, `POST :cancel`, executor logs.
    #[default]
    V1,
}

/// How a cancellation request is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMethod {
    Delete,
    PostCancel,
}

impl ProtocolRevision {
    /// Key of the handle in the submission response body.
    pub fn handle_key(self) -> &'static str {
        match self {
            ProtocolRevision::Legacy => "value",
            ProtocolRevision::V1 => "id",
        }
    }

    pub fn cancel_method(self) -> CancelMethod {
        match self {
            ProtocolRevision::Legacy => CancelMethod::Delete,
            ProtocolRevision::V1 => CancelMethod::PostCancel,
        }
    }

    /// Query parameters selecting the detailed task view.
    pub fn detail_query(self) -> &'static [(&'static str, &'static str)] {
        match self {
            ProtocolRevision::Legacy => &[],
            ProtocolRevision::V1 => &[("view", "FULL")],
        }
    }

    /// Value recorded locally after a successful cancellation.
    pub fn canceled_state(self) -> TaskState {
        match self {
            ProtocolRevision::Legacy => TaskState::new("Canceled"),
            ProtocolRevision::V1 => TaskState::new("CANCELED"),
        }
    }

    pub fn terminal_states(self) -> TerminalStates {
        match self {
            ProtocolRevision::Legacy => {
                TerminalStates::new(["Complete", "Error", "SystemError", "Canceled"])
            }
            ProtocolRevision::V1 => TerminalStates::new([
                "COMPLETE",
                "ERROR",
                "EXECUTOR_ERROR",
                "SYSTEM_ERROR",
                "CANCELED",
            ]),
        }
    }

    /// Adapter that finds the endpoint in a detailed task payload.
    pub fn response_shape(self) -> Box<dyn ResponseShape> {
        match self {
            ProtocolRevision::Legacy => Box::new(LegacyMetadata),
            ProtocolRevision::V1 => Box::new(ExecutorLog),
        }
    }

    /// URL of a single task below `base`.
    pub fn task_url(self, base: &str, handle: &TaskHandle) -> String {
        format!("{}/{}", base, handle)
    }

    pub fn cancel_url(self, base: &str, handle: &TaskHandle) -> String {
        match self.cancel_method() {
            CancelMethod::Delete => self.task_url(base, handle),
            CancelMethod::PostCancel => format!("{}/{}:cancel", base, handle),
        }
    }
}

impl fmt::Display for ProtocolRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolRevision::Legacy => write!(f, "legacy"),
            ProtocolRevision::V1 => write!(f, "v1"),
        }
    }
}

impl FromStr for ProtocolRevision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" | "v0" => Ok(ProtocolRevision::Legacy),
            "v1" => Ok(ProtocolRevision::V1),
            other => Err(format!("unknown protocol revision '{}'", other)),
        }
    }
}

/// Set of state strings after which a task never changes again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalStates(HashSet<String>);

impl TerminalStates {
    pub fn new<I, S>(states: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(states.into_iter().map(Into::into).collect())
    }

    /// Parse a comma separated list, ignoring blank entries.
    pub fn parse_list(list: &str) -> Self {
        Self::new(
            list.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty()),
        )
    }

    pub fn contains(&self, state: &TaskState) -> bool {
        self.0.contains(state.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
