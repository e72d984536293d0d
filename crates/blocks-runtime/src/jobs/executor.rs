use std::sync::Arc;

use blocks_core::handler;
use blocks_core::{BlocksError, JobHandler, JobId};
use serde_json::Value;

use super::store::JobStore;

/// A job handed to the worker inbox, paired with the work function that was
/// registered when it was submitted.
pub struct QueuedJob {
    pub id: JobId,
    pub handler: JobHandler,
}

/// Runs queued jobs and records their outcome in the store.
pub struct JobExecutor {
    worker: String,
    store: Arc<JobStore>,
}

impl JobExecutor {
    /// Create a new job executor.
    pub fn new(worker: impl Into<String>, store: Arc<JobStore>) -> Self {
        Self {
            worker: worker.into(),
            store,
        }
    }

    /// Execute one job on the blocking pool and wait for it.
    pub async fn execute(&self, queued: QueuedJob) -> ExecutionResult {
        let QueuedJob { id, handler: work } = queued;

        let job = match self.store.start(id) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!(worker = %self.worker, job_id = %id, error = %e, "Failed to start job");
                return ExecutionResult::Skipped;
            }
        };

        tracing::debug!(
            worker = %self.worker,
            job_id = %id,
            job_type = %job.job_type,
            "Processing job"
        );

        let payload = job.payload;
        let outcome = tokio::task::spawn_blocking(move || handler::guard(|| work(&payload)))
            .await
            .unwrap_or_else(|e| Err(BlocksError::HandlerFailure(e.to_string())));

        match outcome {
            Ok(output) => {
                if let Err(e) = self.store.complete(id, output.clone()) {
                    tracing::error!(job_id = %id, error = %e, "Failed to mark job as complete");
                }
                tracing::debug!(
                    worker = %self.worker,
                    job_id = %id,
                    job_type = %job.job_type,
                    "Job completed"
                );
                ExecutionResult::Completed { output }
            }
            Err(e) => {
                let error = handler::failure_message(e);
                if let Err(e) = self.store.fail(id, error.clone()) {
                    tracing::error!(job_id = %id, error = %e, "Failed to mark job as failed");
                }
                tracing::error!(
                    worker = %self.worker,
                    job_id = %id,
                    job_type = %job.job_type,
                    error = %error,
                    "Job failed"
                );
                ExecutionResult::Failed { error }
            }
        }
    }

    /// Drop a queued job without running it.
    pub fn discard(&self, queued: QueuedJob) -> bool {
        match self.store.discard(queued.id) {
            Some(job) => {
                tracing::warn!(
                    worker = %self.worker,
                    job_id = %job.id,
                    job_type = %job.job_type,
                    "Discarding queued job at shutdown"
                );
                true
            }
            None => false,
        }
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum ExecutionResult {
    /// Job completed successfully.
    Completed { output: Value },
    /// Job failed. Failures are final.
    Failed { error: String },
    /// Job was not in a runnable state.
    Skipped,
}

impl ExecutionResult {
    /// Check if execution was successful.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}
