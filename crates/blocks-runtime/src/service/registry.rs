use std::collections::HashMap;
use std::sync::RwLock;

use blocks_core::RouteHandler;

/// Registry of service routes.
#[derive(Default)]
pub struct RouteRegistry {
    routes: RwLock<HashMap<String, RouteHandler>>,
}

impl RouteRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a handler to a path. Returns true if an earlier binding was replaced.
    pub fn insert(&self, path: impl Into<String>, handler: RouteHandler) -> bool {
        let mut routes = self.routes.write().unwrap_or_else(|e| e.into_inner());
        routes.insert(path.into(), handler).is_some()
    }

    /// Get the handler for a path.
    pub fn get(&self, path: &str) -> Option<RouteHandler> {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        routes.get(path).cloned()
    }

    /// Check if a path is bound.
    pub fn contains(&self, path: &str) -> bool {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        routes.contains_key(path)
    }

    /// All bound paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let routes = self.routes.read().unwrap_or_else(|e| e.into_inner());
        let mut paths: Vec<_> = routes.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Get the number of routes.
    pub fn len(&self) -> usize {
        self.routes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
