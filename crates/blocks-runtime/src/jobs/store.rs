use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use blocks_core::stats::success_rate;
use blocks_core::{BlocksError, Job, JobId, JobStatus, Result, WorkerStats};
use serde_json::Value;

#[derive(Default)]
struct JobTable {
    jobs: HashMap<JobId, Job>,
    /// Submission order.
    submitted: Vec<JobId>,
    /// Finish order of completed jobs.
    completed: Vec<JobId>,
    /// Finish order of failed jobs.
    failed: Vec<JobId>,
    discarded: u64,
}

impl JobTable {
    fn collect(&self, ids: &[JobId]) -> Vec<Job> {
        ids.iter().filter_map(|id| self.jobs.get(id)).cloned().collect()
    }

    fn job_mut(&mut self, id: JobId) -> Result<&mut Job> {
        self.jobs
            .get_mut(&id)
            .ok_or_else(|| BlocksError::InvalidState(format!("job {} is not tracked", id)))
    }
}

/// Job history owned by a single worker.
///
/// Every status change and every read goes through one lock, so stats and
/// history are always mutually consistent.
#[derive(Default)]
pub struct JobStore {
    table: RwLock<JobTable>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a pending job and hand it off while the table is locked, so
    /// submission order and hand-off order agree. Nothing is recorded if the
    /// hand-off fails.
    pub fn insert_with(&self, job: Job, hand_off: impl FnOnce(JobId) -> Result<()>) -> Result<JobId> {
        let id = job.id;
        let mut table = self.write();
        hand_off(id)?;
        table.jobs.insert(id, job);
        table.submitted.push(id);
        Ok(id)
    }

    /// Mark a job Running and return a copy of it.
    pub fn start(&self, id: JobId) -> Result<Job> {
        let mut table = self.write();
        let job = table.job_mut(id)?;
        job.start()?;
        Ok(job.clone())
    }

    /// Mark a running job Completed.
    pub fn complete(&self, id: JobId, result: Value) -> Result<()> {
        let mut table = self.write();
        table.job_mut(id)?.complete(result)?;
        table.completed.push(id);
        Ok(())
    }

    /// Mark a running job Failed.
    pub fn fail(&self, id: JobId, error: impl Into<String>) -> Result<()> {
        let mut table = self.write();
        table.job_mut(id)?.fail(error)?;
        table.failed.push(id);
        Ok(())
    }

    /// Forget a pending job that will never run.
    pub fn discard(&self, id: JobId) -> Option<Job> {
        let mut table = self.write();
        match table.jobs.get(&id) {
            Some(job) if job.status == JobStatus::Pending => {}
            _ => return None,
        }
        table.submitted.retain(|j| *j != id);
        table.discarded += 1;
        table.jobs.remove(&id)
    }

    /// Get a job by ID.
    pub fn get(&self, id: JobId) -> Option<Job> {
        self.read().jobs.get(&id).cloned()
    }

    /// All tracked jobs in submission order.
    pub fn jobs(&self) -> Vec<Job> {
        let table = self.read();
        table.collect(&table.submitted)
    }

    /// Completed jobs in the order they finished.
    pub fn completed(&self) -> Vec<Job> {
        let table = self.read();
        table.collect(&table.completed)
    }

    /// Failed jobs in the order they finished.
    pub fn failed(&self) -> Vec<Job> {
        let table = self.read();
        table.collect(&table.failed)
    }

    /// Group completed jobs by a key derived from each job. Jobs without a
    /// key are left out.
    pub fn group_completed_by<K, F>(&self, key: F) -> BTreeMap<K, Vec<Job>>
    where
        K: Ord,
        F: Fn(&Job) -> Option<K>,
    {
        let table = self.read();
        let mut groups: BTreeMap<K, Vec<Job>> = BTreeMap::new();
        for job in table.completed.iter().filter_map(|id| table.jobs.get(id)) {
            if let Some(k) = key(job) {
                groups.entry(k).or_default().push(job.clone());
            }
        }
        groups
    }

    /// Jobs that are pending or running.
    pub fn in_flight(&self) -> usize {
        let table = self.read();
        table.submitted.len() - table.completed.len() - table.failed.len()
    }

    /// Consistent statistics snapshot.
    pub fn stats(&self) -> WorkerStats {
        let table = self.read();
        let completed = table.completed.len() as u64;
        let failed = table.failed.len() as u64;
        let total = completed + failed;
        WorkerStats {
            completed_jobs: completed,
            failed_jobs: failed,
            total_jobs: total,
            pending_jobs: table.submitted.len() as u64 - total,
            discarded_jobs: table.discarded,
            success_rate: success_rate(completed, total),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, JobTable> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, JobTable> {
        self.table.write().unwrap_or_else(|e| e.into_inner())
    }
}
