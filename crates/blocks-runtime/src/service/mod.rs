//! Synchronous request router.
//!
//! A [`Service`] runs its handler on the caller's thread and returns only
//! when the handler does. It is the blocking baseline the queue and worker are
//! contrasted with.

mod registry;

pub use registry::RouteRegistry;

use std::fmt::Display;
use std::time::Instant;

use blocks_core::config::ServiceConfig;
use blocks_core::handler::{self, route_handler};
use blocks_core::{BlocksError, Result, ServiceResponse, ServiceStats};
use serde_json::Value;

use crate::stats::StatsCounter;

/// Routes requests to handlers bound by path.
pub struct Service {
    config: ServiceConfig,
    routes: RouteRegistry,
    stats: StatsCounter,
}

impl Service {
    /// Create a service with default configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(ServiceConfig::named(name))
    }

    /// Create a service from configuration.
    pub fn with_config(config: ServiceConfig) -> Self {
        Self {
            config,
            routes: RouteRegistry::new(),
            stats: StatsCounter::new(),
        }
    }

    /// Get the service name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Bind a handler to a path, replacing any earlier binding.
    pub fn register<F, E>(&self, path: impl Into<String>, handler: F)
    where
        F: Fn(Option<&Value>) -> std::result::Result<Value, E> + Send + Sync + 'static,
        E: Display,
    {
        let path = path.into();
        if self.routes.insert(path.clone(), route_handler(handler)) {
            tracing::warn!(service = %self.config.name, path = %path, "Route re-registered, previous handler replaced");
        } else {
            tracing::debug!(service = %self.config.name, path = %path, "Route registered");
        }
    }

    /// Handle a request on the caller's thread.
    ///
    /// Fails with [`BlocksError::NotFound`] when no handler is bound. A failing
    /// handler produces a 500 response rather than an error.
    pub fn handle_request(&self, path: &str, payload: Option<Value>) -> Result<ServiceResponse> {
        let handler = self
            .routes
            .get(path)
            .ok_or_else(|| BlocksError::NotFound(path.to_string()))?;

        tracing::debug!(service = %self.config.name, path = %path, "Handling request");

        let start = Instant::now();
        let result = handler::guard(|| handler(payload.as_ref()));
        let elapsed = start.elapsed();

        if let Some(threshold) = self.config.slow_request_threshold() {
            if elapsed > threshold {
                tracing::warn!(
                    service = %self.config.name,
                    path = %path,
                    elapsed = ?elapsed,
                    "Slow request"
                );
            }
        }

        match result {
            Ok(data) => {
                self.stats.record_success(elapsed);
                Ok(ServiceResponse::ok(data))
            }
            Err(e) => {
                self.stats.record_failure(elapsed);
                let message = handler::failure_message(e);
                tracing::error!(service = %self.config.name, path = %path, error = %message, "Request handler failed");
                Ok(ServiceResponse::error(message))
            }
        }
    }

    /// Snapshot of request statistics.
    pub fn get_stats(&self) -> ServiceStats {
        let counts = self.stats.snapshot();
        ServiceStats {
            requests: counts.processed(),
            errors: counts.failed,
            total_time: counts.total_time,
            avg_response_time: counts.avg_time(),
            max_response_time: counts.max_time,
        }
    }

    /// Check if a path is bound.
    pub fn has_route(&self, path: &str) -> bool {
        self.routes.contains(path)
    }

    /// All bound paths, sorted.
    pub fn routes(&self) -> Vec<String> {
        self.routes.paths()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn echo_service() -> Service {
        let service = Service::new("blocking_api");
        service.register("/echo", |payload| {
            Ok::<_, String>(payload.cloned().unwrap_or(Value::Null))
        });
        service
    }

    #[test]
    fn test_handle_request_success() {
        let service = echo_service();
        let response = service
            .handle_request("/echo", Some(json!({"task": "image"})))
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.status, 200);
        assert_eq!(response.data, Some(json!({"task": "image"})));
        assert_eq!(service.get_stats().requests, 1);
    }

    #[test]
    fn test_handle_request_without_payload() {
        let service = echo_service();
        let response = service.handle_request("/echo", None).unwrap();
        assert_eq!(response.data, Some(Value::Null));
    }

    #[test]
    fn test_unknown_path_is_not_found() {
        let service = echo_service();
        let err = service.handle_request("/missing", None).unwrap_err();

        assert_eq!(err, BlocksError::NotFound("/missing".into()));
        assert_eq!(service.get_stats().requests, 0);
    }

    #[test]
    fn test_failing_handler_returns_500() {
        let service = echo_service();
        service.register("/broken", |_| Err::<Value, _>("database unavailable"));

        let response = service.handle_request("/broken", None).unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.error.as_deref(), Some("database unavailable"));
        assert!(response.data.is_none());

        // still usable afterwards
        assert!(service.handle_request("/echo", None).unwrap().is_success());

        let stats = service.get_stats();
        assert_eq!(stats.requests, 2);
        assert_eq!(stats.errors, 1);
    }

    #[test]
    fn test_panicking_handler_returns_500() {
        let service = echo_service();
        service.register("/panic", |_| -> std::result::Result<Value, String> {
            panic!("handler bug")
        });

        let response = service.handle_request("/panic", None).unwrap();
        assert_eq!(response.status, 500);
        assert!(response.error.unwrap().contains("handler bug"));
    }

    #[test]
    fn test_register_replaces_binding() {
        let service = echo_service();
        service.register("/echo", |_| Ok::<_, String>(json!("replaced")));

        let response = service.handle_request("/echo", Some(json!(1))).unwrap();
        assert_eq!(response.data, Some(json!("replaced")));
        assert_eq!(service.routes(), vec!["/echo".to_string()]);
    }

    #[test]
    fn test_timing_stats() {
        let service = Service::new("timed");
        service.register("/slow", |_| {
            thread::sleep(Duration::from_millis(20));
            Ok::<_, String>(json!({}))
        });
        service.register("/fast", |_| Ok::<_, String>(json!({})));

        service.handle_request("/slow", None).unwrap();
        service.handle_request("/fast", None).unwrap();

        let stats = service.get_stats();
        assert_eq!(stats.requests, 2);
        assert!(stats.max_response_time >= Duration::from_millis(20));
        assert!(stats.avg_response_time <= stats.max_response_time);
        assert!(stats.total_time >= stats.max_response_time);
    }

    #[test]
    fn test_concurrent_requests_are_all_counted() {
        let service = Arc::new(echo_service());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let service = service.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        service.handle_request("/echo", Some(json!(i))).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(service.get_stats().requests, 200);
    }
}
