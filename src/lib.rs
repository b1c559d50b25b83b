//! # tes-spawner
//!
//! Runs notebook servers as tasks on a GA4GH Task Execution Service and
//! reports where they became reachable.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use tes_spawner::{Executor, PortMapping, Resources, TaskClient, TaskDescription};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> tes_spawner::Result<()> {
//!     let client = TaskClient::new("http://localhost:8000/v1/tasks");
//!
//!     let task = TaskDescription::builder("notebook", Resources::new(1, 8.0))
//!         .executor(
//!             Executor::new("jupyter/base-notebook", vec!["start-notebook.sh".into()])
//!                 .port(PortMapping::container(8888)),
//!         )
//!         .build();
//!
//!     let handle = client.submit(&task).await?;
//!     let endpoint = client
//!         .resolve_endpoint(&handle, Duration::from_secs(300), &CancellationToken::new())
//!         .await?;
//!     println!("{} reachable at {}", handle, endpoint);
//!
//!     client.cancel(&handle).await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod dtos;
pub mod error;
pub mod metrics;
pub mod models;
pub mod protocol;
pub mod shape;
pub mod spawner;
pub mod validation;

pub use client::TaskClient;
pub use config::Config;
pub use error::{Result, TesError};
pub use models::{
    EndpointInfo, Executor, ParameterKind, PortMapping, Resources, TaskBuilder, TaskDescription,
    TaskHandle, TaskParameter, TaskState, Volume,
};
pub use protocol::{ProtocolRevision, TerminalStates};
pub use shape::ResponseShape;
pub use spawner::{Spawner, SpawnerState, UserOptions};
