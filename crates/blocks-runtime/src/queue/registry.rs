use std::collections::HashMap;
use std::sync::RwLock;

use blocks_core::SubscriberHandler;

/// One subscriber per message type.
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<String, SubscriberHandler>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a subscriber. Returns true if an earlier one was replaced.
    pub fn insert(&self, message_type: impl Into<String>, handler: SubscriberHandler) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subscribers.insert(message_type.into(), handler).is_some()
    }

    /// Unbind a subscriber. Returns true if one was bound.
    pub fn remove(&self, message_type: &str) -> bool {
        let mut subscribers = self.subscribers.write().unwrap_or_else(|e| e.into_inner());
        subscribers.remove(message_type).is_some()
    }

    /// Get the subscriber for a message type.
    pub fn get(&self, message_type: &str) -> Option<SubscriberHandler> {
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        subscribers.get(message_type).cloned()
    }

    pub fn contains(&self, message_type: &str) -> bool {
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        subscribers.contains_key(message_type)
    }

    /// All subscribed message types, sorted.
    pub fn message_types(&self) -> Vec<String> {
        let subscribers = self.subscribers.read().unwrap_or_else(|e| e.into_inner());
        let mut types: Vec<_> = subscribers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Drop every subscriber.
    pub fn clear(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
