pub mod config;
pub mod error;
pub mod handler;
pub mod job;
pub mod message;
pub mod stats;

pub use config::BlocksConfig;
pub use error::{BlocksError, Result};
pub use handler::{JobHandler, RouteHandler, SubscriberHandler, TriggerCallback};
pub use job::{Job, JobId, JobStatus};
pub use message::{Message, ServiceResponse};
pub use stats::{QueueStats, ServiceStats, TimeStats, TriggerStats, WorkerStats};
