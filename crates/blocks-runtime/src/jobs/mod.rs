mod executor;
mod registry;
mod store;
mod worker;

pub use executor::{ExecutionResult, JobExecutor, QueuedJob};
pub use registry::JobRegistry;
pub use store::JobStore;
pub use worker::Worker;
