use std::sync::{Arc, Mutex};
use std::time::Duration;

use blocks_core::config::{MissedFirePolicy, TimeConfig};
use blocks_core::{BlocksError, Result, TimeStats};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::registry::{Trigger, TriggerId, TriggerRegistry};

struct Monitoring {
    runtime: Handle,
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    /// Number of registered triggers that already have a task.
    spawned: usize,
}

/// Recurring-trigger scheduler.
///
/// Each trigger runs on its own task and dispatches its callback without
/// waiting for it, so a slow callback never delays another trigger or its
/// own cadence.
pub struct Time {
    config: TimeConfig,
    name: Arc<str>,
    triggers: TriggerRegistry,
    monitoring: Mutex<Option<Monitoring>>,
}

impl Time {
    /// Create a time entity with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(TimeConfig::named(name))
    }

    /// Create a time entity from configuration.
    pub fn with_config(config: TimeConfig) -> Self {
        Self {
            name: Arc::from(config.name.as_str()),
            config,
            triggers: TriggerRegistry::new(),
            monitoring: Mutex::new(None),
        }
    }

    /// Get the time entity name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Register a callback that fires `start_delay` after monitoring starts
    /// and every `interval` after that.
    ///
    /// A trigger registered while monitoring is running starts immediately.
    pub fn recurring_trigger<F>(
        &self,
        interval: Duration,
        start_delay: Duration,
        callback: F,
    ) -> Result<TriggerId>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if interval.is_zero() {
            return Err(BlocksError::Config(
                "trigger interval must be greater than zero".into(),
            ));
        }

        let trigger = self
            .triggers
            .register(interval, start_delay, Arc::new(callback));

        tracing::debug!(
            time = %self.name,
            trigger = %trigger.id,
            interval = ?interval,
            start_delay = ?start_delay,
            "Trigger registered"
        );

        if let Some(monitoring) = self.monitoring().as_mut() {
            self.spawn_pending(monitoring);
        }

        Ok(trigger.id)
    }

    /// Start every registered trigger on the current tokio runtime.
    ///
    /// Calling this while monitoring is already running is a no-op.
    pub fn start_time_monitoring(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|e| {
            BlocksError::Runtime(format!("time monitoring requires a tokio runtime: {}", e))
        })?;

        let mut guard = self.monitoring();
        if guard.is_some() {
            tracing::debug!(time = %self.name, "Time monitoring already running");
            return Ok(());
        }

        let monitoring = guard.insert(Monitoring {
            runtime,
            shutdown: CancellationToken::new(),
            handles: Vec::new(),
            spawned: 0,
        });
        self.spawn_pending(monitoring);

        tracing::info!(time = %self.name, triggers = monitoring.spawned, "Time monitoring started");
        Ok(())
    }

    /// Stop every trigger and wait for their tasks to exit.
    ///
    /// No fire starts after this returns. A callback that is already running
    /// may still finish.
    pub async fn stop_time_monitoring(&self) {
        let Some(monitoring) = self.monitoring().take() else {
            return;
        };

        monitoring.shutdown.cancel();
        for handle in monitoring.handles {
            if let Err(e) = handle.await {
                tracing::error!(time = %self.name, error = %e, "Trigger task terminated abnormally");
            }
        }

        tracing::info!(time = %self.name, "Time monitoring stopped");
    }

    /// Check if monitoring is running.
    pub fn is_running(&self) -> bool {
        self.monitoring().is_some()
    }

    /// Number of times a trigger has fired.
    pub fn fire_count(&self, id: TriggerId) -> Option<u64> {
        self.triggers.get(id).map(|t| t.fires())
    }

    /// Number of registered triggers.
    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// Snapshot of fire counts.
    pub fn get_stats(&self) -> TimeStats {
        let fires: Vec<_> = self.triggers.list().iter().map(|t| t.stats()).collect();
        TimeStats {
            triggers: fires.len(),
            total_fires: fires.iter().map(|t| t.fires).sum(),
            fires,
        }
    }

    fn spawn_pending(&self, monitoring: &mut Monitoring) {
        for trigger in self.triggers.list_from(monitoring.spawned) {
            let handle = monitoring.runtime.spawn(run_trigger(
                trigger,
                self.name.clone(),
                monitoring.shutdown.clone(),
                missed_tick_behavior(self.config.missed_fire),
            ));
            monitoring.handles.push(handle);
            monitoring.spawned += 1;
        }
    }

    fn monitoring(&self) -> std::sync::MutexGuard<'_, Option<Monitoring>> {
        self.monitoring.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn missed_tick_behavior(policy: MissedFirePolicy) -> MissedTickBehavior {
    match policy {
        MissedFirePolicy::Delay => MissedTickBehavior::Delay,
        MissedFirePolicy::Skip => MissedTickBehavior::Skip,
        MissedFirePolicy::Burst => MissedTickBehavior::Burst,
    }
}

async fn run_trigger(
    trigger: Arc<Trigger>,
    time: Arc<str>,
    shutdown: CancellationToken,
    missed: MissedTickBehavior,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + trigger.start_delay, trigger.interval);
    ticker.set_missed_tick_behavior(missed);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => trigger.dispatch(time.clone(), shutdown.clone()),
        }
    }

    tracing::debug!(time = %time, trigger = %trigger.id, "Trigger stopped");
}
