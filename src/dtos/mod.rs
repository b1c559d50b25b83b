//! Wire representations of [`TaskDescription`](crate::models::TaskDescription).
//!
//! Each service revision names its fields differently. Unset optional fields
//! are skipped on serialization so the service never sees `null`.

pub mod legacy;
pub mod v1;

use crate::models::TaskDescription;
use crate::protocol::ProtocolRevision;

/// Serialize a task into the JSON body expected by `revision`.
pub fn task_body(
    revision: ProtocolRevision,
    task: &TaskDescription,
) -> Result<serde_json::Value, serde_json::Error> {
    match revision {
        ProtocolRevision::Legacy => serde_json::to_value(legacy::TaskDto::from(task)),
        ProtocolRevision::V1 => serde_json::to_value(v1::TaskDto::from(task)),
    }
}
