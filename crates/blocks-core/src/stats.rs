//! Immutable statistics snapshots returned by the building blocks.

use std::time::Duration;

use serde::Serialize;

/// Ratio of `succeeded` to `total`, `0.0` when nothing was counted.
pub fn success_rate(succeeded: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        succeeded as f64 / total as f64
    }
}

/// Service request statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ServiceStats {
    /// Requests that reached a handler.
    pub requests: u64,
    /// Requests whose handler failed.
    pub errors: u64,
    /// Cumulative handler time.
    pub total_time: Duration,
    /// Mean handler time.
    pub avg_response_time: Duration,
    /// Slowest handler time.
    pub max_response_time: Duration,
}

/// Queue dispatch statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct QueueStats {
    /// Messages handed to a subscriber.
    pub total_processed: u64,
    /// Subscriber failures plus undeliverable messages.
    pub total_failed: u64,
    /// Messages rejected because no subscriber was registered.
    pub undeliverable: u64,
    /// Successful dispatches over all enqueue attempts.
    pub success_rate: f64,
    /// Currently registered subscribers.
    pub active_subscribers: usize,
}

/// Worker job statistics.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct WorkerStats {
    pub completed_jobs: u64,
    pub failed_jobs: u64,
    /// Jobs that reached a terminal status.
    pub total_jobs: u64,
    /// Jobs still pending or running.
    pub pending_jobs: u64,
    /// Jobs dropped from the inbox by a discarding stop.
    pub discarded_jobs: u64,
    pub success_rate: f64,
}

/// Fire count of one recurring trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TriggerStats {
    pub id: usize,
    pub interval: Duration,
    pub start_delay: Duration,
    pub fires: u64,
}

/// Time entity statistics.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TimeStats {
    pub triggers: usize,
    pub total_fires: u64,
    pub fires: Vec<TriggerStats>,
}
