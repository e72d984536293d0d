//! Typed publish/dispatch bus.
//!
//! `enqueue` delivers to the subscriber immediately on the caller's thread.
//! Asynchrony comes from subscribers that hand work to a
//! [`Worker`](crate::jobs::Worker), not from the queue itself.

mod registry;

pub use registry::SubscriberRegistry;

use std::fmt::Display;
use std::time::Instant;

use blocks_core::config::QueueConfig;
use blocks_core::handler::{self, subscriber_handler};
use blocks_core::{BlocksError, Message, QueueStats};
use serde_json::Value;

use crate::stats::StatsCounter;

/// Dispatches messages to one subscriber per message type.
pub struct Queue {
    config: QueueConfig,
    subscribers: SubscriberRegistry,
    stats: StatsCounter,
}

impl Queue {
    /// Create a queue with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(QueueConfig::named(name))
    }

    /// Create a queue from configuration.
    pub fn with_config(config: QueueConfig) -> Self {
        Self {
            config,
            subscribers: SubscriberRegistry::new(),
            stats: StatsCounter::new(),
        }
    }

    /// Get the queue name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Register the subscriber for a message type, replacing any earlier one.
    pub fn subscribe<F, E>(&self, message_type: impl Into<String>, handler: F)
    where
        F: Fn(&Message) -> std::result::Result<Value, E> + Send + Sync + 'static,
        E: Display,
    {
        let message_type = message_type.into();
        if self
            .subscribers
            .insert(message_type.clone(), subscriber_handler(handler))
        {
            tracing::warn!(
                queue = %self.config.name,
                message_type = %message_type,
                "Subscriber re-registered, previous handler replaced"
            );
        } else {
            tracing::debug!(queue = %self.config.name, message_type = %message_type, "Subscriber registered");
        }
    }

    /// Remove the subscriber for a message type.
    pub fn unsubscribe(&self, message_type: &str) -> bool {
        self.subscribers.remove(message_type)
    }

    /// Dispatch a message to its subscriber on the caller's thread.
    ///
    /// Returns `true` iff the subscriber ran without failing. A missing
    /// subscriber or a failing one yields `false`; neither is propagated.
    pub fn enqueue(&self, message_type: &str, payload: Value) -> bool {
        let Some(handler) = self.subscribers.get(message_type) else {
            self.stats.record_rejection();
            let err = BlocksError::NoSubscriber(message_type.to_string());
            tracing::warn!(queue = %self.config.name, error = %err, "Message undeliverable");
            return false;
        };

        let message = Message::new(message_type, payload);
        tracing::debug!(queue = %self.config.name, message_type = %message_type, "Dispatching message");

        let start = Instant::now();
        match handler::guard(|| handler(&message)) {
            Ok(_) => {
                self.stats.record_success(start.elapsed());
                true
            }
            Err(e) => {
                self.stats.record_failure(start.elapsed());
                tracing::error!(
                    queue = %self.config.name,
                    message_type = %message_type,
                    error = %e,
                    "Subscriber failed"
                );
                false
            }
        }
    }

    /// Snapshot of dispatch statistics.
    pub fn get_stats(&self) -> QueueStats {
        let counts = self.stats.snapshot();
        QueueStats {
            total_processed: counts.processed(),
            total_failed: counts.failed + counts.rejected,
            undeliverable: counts.rejected,
            success_rate: counts.success_rate(),
            active_subscribers: self.subscribers.len(),
        }
    }

    /// Check if a message type has a subscriber.
    pub fn is_subscribed(&self, message_type: &str) -> bool {
        self.subscribers.contains(message_type)
    }

    /// All subscribed message types, sorted.
    pub fn message_types(&self) -> Vec<String> {
        self.subscribers.message_types()
    }

    /// Drop all subscribers. Dispatches already in progress run to completion.
    pub fn stop(&self) {
        let count = self.subscribers.len();
        self.subscribers.clear();
        tracing::info!(queue = %self.config.name, subscribers = count, "Queue stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{mpsc, Arc};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_enqueue_dispatches_synchronously() {
        let queue = Queue::new("task_queue");
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        queue.subscribe("process_image", move |message: &Message| {
            assert_eq!(message.message_type, "process_image");
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>(json!({"status": "dispatched"}))
        });

        assert!(queue.enqueue("process_image", json!({"task": "Process Image"})));
        // the handler already ran when enqueue returned
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        let stats = queue.get_stats();
        assert_eq!(stats.total_processed, 1);
        assert_eq!(stats.total_failed, 0);
        assert_eq!(stats.success_rate, 1.0);
        assert_eq!(stats.active_subscribers, 1);
    }

    #[test]
    fn test_enqueue_without_subscriber() {
        let queue = Queue::new("task_queue");
        queue.subscribe("send_email", |_: &Message| Ok::<_, String>(json!({})));

        assert!(!queue.enqueue("nonexistent", json!({})));

        let stats = queue.get_stats();
        assert_eq!(stats.total_processed, 0);
        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.undeliverable, 1);
        assert_eq!(stats.active_subscribers, 1);
        assert_eq!(stats.success_rate, 0.0);
    }

    #[test]
    fn test_failing_subscriber_is_isolated() {
        let queue = Queue::new("resilient_queue");
        queue.subscribe("flaky", |_: &Message| Err::<Value, _>("worker unreachable"));
        queue.subscribe("steady", |_: &Message| Ok::<_, String>(json!({})));

        assert!(!queue.enqueue("flaky", json!({})));
        assert!(queue.enqueue("steady", json!({})));

        let stats = queue.get_stats();
        assert_eq!(stats.total_processed, 2);
        assert_eq!(stats.total_failed, 1);
        assert_eq!(stats.success_rate, 0.5);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let queue = Queue::new("q");
        queue.subscribe("boom", |_: &Message| -> std::result::Result<Value, String> {
            panic!("subscriber bug")
        });

        assert!(!queue.enqueue("boom", json!({})));
        assert_eq!(queue.get_stats().total_failed, 1);
    }

    #[test]
    fn test_return_value_does_not_affect_success() {
        let queue = Queue::new("q");
        queue.subscribe("t", |_: &Message| Ok::<_, String>(json!({"status": "error"})));
        assert!(queue.enqueue("t", json!({})));
    }

    #[test]
    fn test_resubscribe_replaces_handler() {
        let queue = Queue::new("q");
        queue.subscribe("t", |_: &Message| Err::<Value, _>("old"));
        queue.subscribe("t", |_: &Message| Ok::<_, String>(json!({})));

        assert!(queue.enqueue("t", json!({})));
        assert_eq!(queue.get_stats().active_subscribers, 1);
    }

    #[test]
    fn test_stop_clears_subscribers() {
        let queue = Queue::new("q");
        queue.subscribe("a", |_: &Message| Ok::<_, String>(json!({})));
        queue.subscribe("b", |_: &Message| Ok::<_, String>(json!({})));
        assert_eq!(queue.message_types(), vec!["a".to_string(), "b".to_string()]);

        queue.stop();

        assert_eq!(queue.get_stats().active_subscribers, 0);
        assert!(!queue.is_subscribed("a"));
        assert!(!queue.enqueue("a", json!({})));
    }

    #[test]
    fn test_in_flight_dispatch_survives_stop() {
        let queue = Arc::new(Queue::new("q"));
        let (entered_tx, entered_rx) = mpsc::channel();
        queue.subscribe("slow", move |_: &Message| {
            entered_tx.send(()).ok();
            thread::sleep(Duration::from_millis(50));
            Ok::<_, String>(json!({}))
        });

        let dispatcher = {
            let queue = queue.clone();
            thread::spawn(move || queue.enqueue("slow", json!({})))
        };

        entered_rx.recv().unwrap();
        queue.stop();

        assert!(dispatcher.join().unwrap());
        assert_eq!(queue.get_stats().total_processed, 1);
    }

    #[test]
    fn test_unsubscribe() {
        let queue = Queue::new("q");
        queue.subscribe("a", |_: &Message| Ok::<_, String>(json!({})));
        assert!(queue.unsubscribe("a"));
        assert!(!queue.unsubscribe("a"));
        assert!(!queue.enqueue("a", json!({})));
    }
}
