//! Error types for the TES client and spawner.
//!
//! Every failure is surfaced to the caller; the only internal retry is the
//! bounded endpoint-resolution loop, which itself ends in [`TesError::Timeout`].

use std::time::Duration;

use thiserror::Error;

use crate::models::TaskHandle;
use crate::validation::{ValidationError, format_errors};

/// Errors returned by [`crate::TaskClient`] and [`crate::Spawner`].
#[derive(Error, Debug)]
pub enum TesError {
    /// The service rejected a task submission.
    #[error("Task submission failed (HTTP {status}): {body}")]
    Submission { status: u16, body: String },

    /// A status lookup returned a non-success status.
    #[error("Task query failed (HTTP {status}): {body}")]
    Query { status: u16, body: String },

    /// A cancellation request returned a non-success status.
    #[error("Task cancellation failed (HTTP {status}): {body}")]
    Cancellation { status: u16, body: String },

    /// A success payload was malformed or ambiguous.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The task never exposed a reachable endpoint before the deadline.
    #[error("Task {handle} did not expose an endpoint within {waited:?}")]
    Timeout { handle: TaskHandle, waited: Duration },

    /// Endpoint resolution was cancelled by the caller.
    #[error("Endpoint resolution for task {handle} was cancelled")]
    Cancelled { handle: TaskHandle },

    /// A task is already in flight for this workload.
    #[error("Task {handle} is still running")]
    AlreadyRunning { handle: TaskHandle },

    /// HTTP transport or connection error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The task description was rejected before submission.
    #[error("Invalid task description: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),

    /// The task could not be encoded for the service.
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// A success body was not valid JSON.
    #[error("Deserialization error: {0}")]
    Deserialize(String),
}

impl TesError {
    /// Raw response body carried by status-code failures.
    pub fn body(&self) -> Option<&str> {
        match self {
            TesError::Submission { body, .. }
            | TesError::Query { body, .. }
            | TesError::Cancellation { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            TesError::Submission { .. } => "submission",
            TesError::Query { .. } => "query",
            TesError::Cancellation { .. } => "cancellation",
            TesError::Protocol(_) => "protocol",
            TesError::Timeout { .. } => "timeout",
            TesError::Cancelled { .. } => "cancelled",
            TesError::AlreadyRunning { .. } => "already_running",
            TesError::Http(_) => "http",
            TesError::Validation(_) => "validation",
            TesError::Serialize(_) => "serialize",
            TesError::Deserialize(_) => "deserialize",
        }
    }
}

/// Result type alias for TES operations.
pub type Result<T> = std::result::Result<T, TesError>;
