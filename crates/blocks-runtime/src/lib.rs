//! Building blocks for contrasting blocking and non-blocking execution.
//!
//! - [`Service`] runs a handler on the caller's thread.
//! - [`Queue`] dispatches a message to its subscriber on the caller's thread.
//! - [`Worker`] accepts jobs immediately and runs them in the background.
//! - [`Time`] fires callbacks on independent recurring schedules.

pub mod jobs;
pub mod queue;
pub mod service;
pub mod stats;
pub mod telemetry;
pub mod time;

pub use blocks_core::config::{BlocksConfig, ShutdownPolicy};
pub use blocks_core::{
    BlocksError, Job, JobId, JobStatus, Message, QueueStats, Result, ServiceResponse,
    ServiceStats, TimeStats, WorkerStats,
};
pub use jobs::Worker;
pub use queue::Queue;
pub use service::Service;
pub use stats::{CounterSnapshot, StatsCounter};
pub use time::{Time, TriggerId};
