use std::collections::BTreeMap;
use std::fmt::Display;
use std::sync::{Arc, Mutex};

use blocks_core::config::{ShutdownPolicy, WorkerConfig};
use blocks_core::handler::job_handler;
use blocks_core::{BlocksError, Job, JobId, Result, WorkerStats};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex as AsyncMutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::executor::{JobExecutor, QueuedJob};
use super::registry::JobRegistry;
use super::store::JobStore;

/// Shared with every execution loop. A loop holds the lock for its whole
/// lifetime, so at most one loop consumes the inbox at a time.
type Inbox = Arc<AsyncMutex<mpsc::UnboundedReceiver<QueuedJob>>>;

struct RunningLoop {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

/// Background job worker.
///
/// Jobs are accepted by [`submit_job`](Self::submit_job) without waiting and
/// executed one at a time, in submission order, by a single background task.
/// A failing job is recorded as Failed and never affects other jobs.
pub struct Worker {
    config: WorkerConfig,
    registry: JobRegistry,
    store: Arc<JobStore>,
    sender: mpsc::UnboundedSender<QueuedJob>,
    inbox: Inbox,
    running: Mutex<Option<RunningLoop>>,
    idle: Arc<Notify>,
}

impl Worker {
    /// Create a worker with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(WorkerConfig::named(name))
    }

    /// Create a worker from configuration.
    pub fn with_config(config: WorkerConfig) -> Self {
        let (sender, inbox) = mpsc::unbounded_channel();
        Self {
            config,
            registry: JobRegistry::new(),
            store: Arc::new(JobStore::new()),
            sender,
            inbox: Arc::new(AsyncMutex::new(inbox)),
            running: Mutex::new(None),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Get the worker name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Bind a work function to a job type. The last registration wins.
    pub fn register_job_type<F, E>(&self, job_type: impl Into<String>, work: F)
    where
        F: Fn(&Value) -> std::result::Result<Value, E> + Send + Sync + 'static,
        E: Display,
    {
        let job_type = job_type.into();
        if self.registry.register(job_type.clone(), job_handler(work)) {
            tracing::warn!(
                worker = %self.config.name,
                job_type = %job_type,
                "Job type re-registered, previous work function replaced"
            );
        } else {
            tracing::debug!(worker = %self.config.name, job_type = %job_type, "Job type registered");
        }
    }

    /// Accept a job and return its id without waiting for it to run.
    ///
    /// Fails with [`BlocksError::UnknownJobType`] before anything is queued if
    /// the type was never registered. Jobs submitted while the worker is
    /// stopped wait in the inbox until it starts.
    pub fn submit_job(&self, job_type: &str, payload: Value) -> Result<JobId> {
        let handler = self
            .registry
            .get(job_type)
            .ok_or_else(|| BlocksError::UnknownJobType(job_type.to_string()))?;

        let id = self.store.insert_with(Job::new(job_type, payload), |id| {
            self.sender
                .send(QueuedJob { id, handler })
                .map_err(|_| BlocksError::InvalidState("worker inbox is closed".into()))
        })?;

        tracing::debug!(worker = %self.config.name, job_id = %id, job_type = %job_type, "Job submitted");
        Ok(id)
    }

    /// Spawn the execution loop on the current tokio runtime.
    ///
    /// Starting a running worker is a no-op. If an earlier loop is still
    /// finishing its shutdown, the new loop takes over the inbox once it exits.
    pub fn start(&self) -> Result<()> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BlocksError::Runtime(format!("worker requires a tokio runtime: {}", e)))?;

        let mut running = self.running();
        if running.is_some() {
            tracing::debug!(worker = %self.config.name, "Worker already running");
            return Ok(());
        }

        let shutdown = CancellationToken::new();
        let executor = JobExecutor::new(self.config.name.clone(), self.store.clone());
        let handle = runtime.spawn(run_loop(
            self.inbox.clone(),
            executor,
            shutdown.clone(),
            self.config.shutdown,
            self.idle.clone(),
        ));

        *running = Some(RunningLoop { shutdown, handle });

        tracing::info!(
            worker = %self.config.name,
            job_types = ?self.registry.job_types(),
            "Worker started"
        );
        Ok(())
    }

    /// Signal the execution loop to finish and wait for it to exit.
    ///
    /// A job that is already running completes first. What happens to jobs
    /// still in the inbox depends on the configured [`ShutdownPolicy`].
    /// Stopping a stopped worker is a no-op. Dropping the returned future
    /// does not interrupt the shutdown; the loop still finishes on its own.
    pub async fn stop(&self) {
        let Some(running) = self.running().take() else {
            return;
        };

        tracing::info!(worker = %self.config.name, policy = ?self.config.shutdown, "Worker shutting down");
        running.shutdown.cancel();

        match running.handle.await {
            Ok(()) => {
                tracing::info!(worker = %self.config.name, "Worker stopped");
            }
            Err(e) => {
                tracing::error!(worker = %self.config.name, error = %e, "Worker loop terminated abnormally");
            }
        }
    }

    /// Check if the execution loop is running.
    pub fn is_running(&self) -> bool {
        self.running().is_some()
    }

    /// Wait until no submitted job is pending or running.
    ///
    /// Pending jobs only make progress while the worker runs, so this never
    /// resolves on a stopped worker that still has jobs in its inbox.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.store.in_flight() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Snapshot of job statistics.
    pub fn get_stats(&self) -> WorkerStats {
        self.store.stats()
    }

    /// Get a job by ID.
    pub fn job(&self, id: JobId) -> Option<Job> {
        self.store.get(id)
    }

    /// All jobs in submission order.
    pub fn jobs(&self) -> Vec<Job> {
        self.store.jobs()
    }

    /// Completed jobs in finish order.
    pub fn completed_jobs(&self) -> Vec<Job> {
        self.store.completed()
    }

    /// Failed jobs in finish order.
    pub fn failed_jobs(&self) -> Vec<Job> {
        self.store.failed()
    }

    /// Group completed jobs by a caller-chosen key, e.g. a payload field.
    pub fn group_completed_by<K, F>(&self, key: F) -> BTreeMap<K, Vec<Job>>
    where
        K: Ord,
        F: Fn(&Job) -> Option<K>,
    {
        self.store.group_completed_by(key)
    }

    /// Registered job types, sorted.
    pub fn job_types(&self) -> Vec<String> {
        self.registry.job_types()
    }

    fn running(&self) -> std::sync::MutexGuard<'_, Option<RunningLoop>> {
        self.running.lock().unwrap_or_else(|e| e.into_inner())
    }
}

async fn run_loop(
    inbox: Inbox,
    executor: JobExecutor,
    shutdown: CancellationToken,
    policy: ShutdownPolicy,
    idle: Arc<Notify>,
) {
    let mut inbox = tokio::select! {
        biased;
        _ = shutdown.cancelled() => return,
        guard = inbox.lock_owned() => guard,
    };

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = inbox.recv() => match next {
                Some(queued) => {
                    executor.execute(queued).await;
                    idle.notify_waiters();
                }
                None => break,
            },
        }
    }

    match policy {
        ShutdownPolicy::Drain => {
            while let Ok(queued) = inbox.try_recv() {
                executor.execute(queued).await;
                idle.notify_waiters();
            }
        }
        ShutdownPolicy::Discard => {
            while let Ok(queued) = inbox.try_recv() {
                executor.discard(queued);
            }
            idle.notify_waiters();
        }
    }
}
