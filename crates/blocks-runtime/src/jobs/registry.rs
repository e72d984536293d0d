use std::collections::HashMap;
use std::sync::RwLock;

use blocks_core::JobHandler;

/// Registry of work functions by job type.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, JobHandler>>,
}

impl JobRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a work function. Returns true if an earlier one was replaced.
    pub fn register(&self, job_type: impl Into<String>, handler: JobHandler) -> bool {
        let mut jobs = self.jobs.write().unwrap_or_else(|e| e.into_inner());
        jobs.insert(job_type.into(), handler).is_some()
    }

    /// Get the work function for a job type.
    pub fn get(&self, job_type: &str) -> Option<JobHandler> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.get(job_type).cloned()
    }

    /// Check if a job type exists.
    pub fn exists(&self, job_type: &str) -> bool {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        jobs.contains_key(job_type)
    }

    /// Get all job type names, sorted.
    pub fn job_types(&self) -> Vec<String> {
        let jobs = self.jobs.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<_> = jobs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of registered job types.
    pub fn len(&self) -> usize {
        self.jobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
