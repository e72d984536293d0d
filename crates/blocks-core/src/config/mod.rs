mod observability;

pub use observability::{LoggingConfig, ObservabilityConfig};

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{BlocksError, Result};

/// Root configuration for a set of building blocks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlocksConfig {
    /// Service configuration.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Queue configuration.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Worker configuration.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Time configuration.
    #[serde(default)]
    pub time: TimeConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl BlocksConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| BlocksError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content)?;

        toml::from_str(&content)
            .map_err(|e| BlocksError::Config(format!("Failed to parse config: {}", e)))
    }
}

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Service name used in logs.
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Requests slower than this are logged as warnings.
    #[serde(default)]
    pub slow_request_threshold_ms: Option<u64>,
}

impl ServiceConfig {
    /// Create a config with the given name and defaults elsewhere.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Slow request threshold as a duration.
    pub fn slow_request_threshold(&self) -> Option<Duration> {
        self.slow_request_threshold_ms.map(Duration::from_millis)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            slow_request_threshold_ms: None,
        }
    }
}

fn default_service_name() -> String {
    "service".to_string()
}

/// Queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queue name used in logs.
    #[serde(default = "default_queue_name")]
    pub name: String,
}

impl QueueConfig {
    /// Create a config with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            name: default_queue_name(),
        }
    }
}

fn default_queue_name() -> String {
    "queue".to_string()
}

/// Worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Worker name used in logs.
    #[serde(default = "default_worker_name")]
    pub name: String,

    /// What happens to queued jobs when the worker stops.
    #[serde(default)]
    pub shutdown: ShutdownPolicy,
}

impl WorkerConfig {
    /// Create a config with the given name and defaults elsewhere.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set the shutdown policy.
    pub fn with_shutdown(mut self, shutdown: ShutdownPolicy) -> Self {
        self.shutdown = shutdown;
        self
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: default_worker_name(),
            shutdown: ShutdownPolicy::default(),
        }
    }
}

fn default_worker_name() -> String {
    "worker".to_string()
}

/// Handling of jobs still waiting in the inbox when a worker stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Run every queued job before exiting.
    #[default]
    Drain,
    /// Drop queued jobs without running them.
    Discard,
}

/// Time configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeConfig {
    /// Time entity name used in logs.
    #[serde(default = "default_time_name")]
    pub name: String,

    /// What a trigger does after falling behind its cadence.
    #[serde(default)]
    pub missed_fire: MissedFirePolicy,
}

impl TimeConfig {
    /// Create a config with the given name and defaults elsewhere.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            name: default_time_name(),
            missed_fire: MissedFirePolicy::default(),
        }
    }
}

fn default_time_name() -> String {
    "time".to_string()
}

/// Catch-up behaviour for a trigger that missed one or more deadlines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissedFirePolicy {
    /// Fire once, then restart the cadence from that moment.
    #[default]
    Delay,
    /// Drop missed fires and wait for the next deadline on the original cadence.
    Skip,
    /// Fire all missed deadlines back to back.
    Burst,
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> Result<String> {
    let re = regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| BlocksError::Config(e.to_string()))?;
    let mut result = content.to_string();

    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    Ok(result)
}
