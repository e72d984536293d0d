use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use blocks_core::handler;
use blocks_core::{TriggerCallback, TriggerStats};
use tokio_util::sync::CancellationToken;

/// Identifier of a trigger within its time entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TriggerId(usize);

impl TriggerId {
    /// Position of the trigger in registration order.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TriggerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "trigger-{}", self.0)
    }
}

/// A registered recurring trigger.
pub struct Trigger {
    pub id: TriggerId,
    /// Time between fires.
    pub interval: Duration,
    /// Time before the first fire.
    pub start_delay: Duration,
    callback: TriggerCallback,
    fires: AtomicU64,
}

impl Trigger {
    /// Number of times the callback has been invoked.
    pub fn fires(&self) -> u64 {
        self.fires.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> TriggerStats {
        TriggerStats {
            id: self.id.index(),
            interval: self.interval,
            start_delay: self.start_delay,
            fires: self.fires(),
        }
    }

    /// Hand the callback to the blocking pool without waiting for it.
    ///
    /// A fire whose callback has not begun by the time `shutdown` is
    /// cancelled is dropped.
    pub(crate) fn dispatch(self: &Arc<Self>, time: Arc<str>, shutdown: CancellationToken) {
        let trigger = self.clone();
        tokio::task::spawn_blocking(move || {
            if shutdown.is_cancelled() {
                return;
            }
            trigger.fires.fetch_add(1, Ordering::SeqCst);
            tracing::debug!(time = %time, trigger = %trigger.id, "Trigger fired");

            let result = handler::guard(|| {
                (trigger.callback)();
                Ok(())
            });
            if let Err(e) = result {
                tracing::error!(time = %time, trigger = %trigger.id, error = %e, "Trigger callback failed");
            }
        });
    }
}

/// Triggers of one time entity, in registration order.
#[derive(Default)]
pub struct TriggerRegistry {
    triggers: RwLock<Vec<Arc<Trigger>>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a trigger and return it.
    pub fn register(
        &self,
        interval: Duration,
        start_delay: Duration,
        callback: TriggerCallback,
    ) -> Arc<Trigger> {
        let mut triggers = self.triggers.write().unwrap_or_else(|e| e.into_inner());
        let trigger = Arc::new(Trigger {
            id: TriggerId(triggers.len()),
            interval,
            start_delay,
            callback,
            fires: AtomicU64::new(0),
        });
        triggers.push(trigger.clone());
        trigger
    }

    /// Get a trigger by ID.
    pub fn get(&self, id: TriggerId) -> Option<Arc<Trigger>> {
        let triggers = self.triggers.read().unwrap_or_else(|e| e.into_inner());
        triggers.get(id.0).cloned()
    }

    /// Triggers registered at or after position `from`.
    pub fn list_from(&self, from: usize) -> Vec<Arc<Trigger>> {
        let triggers = self.triggers.read().unwrap_or_else(|e| e.into_inner());
        triggers.iter().skip(from).cloned().collect()
    }

    /// List all registered triggers.
    pub fn list(&self) -> Vec<Arc<Trigger>> {
        self.list_from(0)
    }

    pub fn len(&self) -> usize {
        self.triggers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_registry() {
        let registry = TriggerRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.get(TriggerId(0)).is_none());
    }

    #[test]
    fn test_ids_follow_registration_order() {
        let registry = TriggerRegistry::new();
        let a = registry.register(Duration::from_secs(8), Duration::from_secs(2), Arc::new(|| {}));
        let b = registry.register(Duration::from_secs(12), Duration::from_secs(5), Arc::new(|| {}));

        assert_eq!(a.id.index(), 0);
        assert_eq!(b.id.index(), 1);
        assert_eq!(b.id.to_string(), "trigger-1");
        assert_eq!(registry.list_from(1).len(), 1);
        assert_eq!(registry.get(b.id).unwrap().interval, Duration::from_secs(12));
        assert_eq!(a.stats().fires, 0);
    }
}
