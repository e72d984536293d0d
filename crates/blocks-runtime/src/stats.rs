//! Thread-safe outcome and timing accumulator shared by the building blocks.

use std::sync::Mutex;
use std::time::Duration;

use blocks_core::stats::success_rate;

/// Raw counter values at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterSnapshot {
    pub succeeded: u64,
    pub failed: u64,
    pub rejected: u64,
    pub total_time: Duration,
    pub max_time: Duration,
}

impl CounterSnapshot {
    /// Units that were executed, whatever their outcome.
    pub fn processed(&self) -> u64 {
        self.succeeded + self.failed
    }

    /// Executed units plus rejected ones.
    pub fn attempts(&self) -> u64 {
        self.processed() + self.rejected
    }

    /// Mean execution time over processed units.
    pub fn avg_time(&self) -> Duration {
        match u32::try_from(self.processed()) {
            Ok(0) => Duration::ZERO,
            Ok(n) => self.total_time / n,
            Err(_) => Duration::from_secs_f64(self.total_time.as_secs_f64() / self.processed() as f64),
        }
    }

    /// Succeeded over all attempts.
    pub fn success_rate(&self) -> f64 {
        success_rate(self.succeeded, self.attempts())
    }
}

/// Accumulates counts and durations under a single lock so every update and
/// every snapshot is atomic with respect to concurrent callers.
#[derive(Debug, Default)]
pub struct StatsCounter {
    inner: Mutex<CounterSnapshot>,
}

impl StatsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a unit that ran to success.
    pub fn record_success(&self, elapsed: Duration) {
        self.update(|c| {
            c.succeeded += 1;
            add_time(c, elapsed);
        });
    }

    /// Record a unit whose handler failed.
    pub fn record_failure(&self, elapsed: Duration) {
        self.update(|c| {
            c.failed += 1;
            add_time(c, elapsed);
        });
    }

    /// Record a unit rejected before any work began.
    pub fn record_rejection(&self) {
        self.update(|c| c.rejected += 1);
    }

    /// Read all counters at once.
    pub fn snapshot(&self) -> CounterSnapshot {
        *self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update(&self, f: impl FnOnce(&mut CounterSnapshot)) {
        let mut counts = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut counts);
    }
}

fn add_time(counts: &mut CounterSnapshot, elapsed: Duration) {
    counts.total_time += elapsed;
    counts.max_time = counts.max_time.max(elapsed);
}
