//! Pool configuration.

use std::time::Duration;

use db::DbConfig;
use pool_core::ALL_QUEUES;
use serde::{Deserialize, Serialize};

use crate::error::PoolError;
use crate::scaling::ScalingPolicy;

/// Configuration for a [`crate::PoolManager`].
///
/// Durations are stored in milliseconds so the config reads naturally from JSON or
/// the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Store the pool's processors share.
    pub connection: DbConfig,
    /// Queues each processor polls, in priority order. `"*"` means all queues.
    pub queues: Vec<String>,
    pub min_task_processors: usize,
    pub max_task_processors: usize,
    /// Interval between scaling checks.
    pub check_timeout_ms: u64,
    /// How long a processor waits after an empty poll.
    pub timeout_ms: u64,
    pub scaling: ScalingPolicy,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            connection: DbConfig::default(),
            queues: vec![ALL_QUEUES.to_string()],
            min_task_processors: 1,
            max_task_processors: 10,
            check_timeout_ms: 500,
            timeout_ms: 5000,
            scaling: ScalingPolicy::default(),
        }
    }
}

impl PoolConfig {
    /// Default config polling the given queues.
    pub fn new<I, S>(queues: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            queues: queues.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_connection(mut self, connection: DbConfig) -> Self {
        self.connection = connection;
        self
    }

    pub fn with_min_task_processors(mut self, min: usize) -> Self {
        self.min_task_processors = min;
        self
    }

    pub fn with_max_task_processors(mut self, max: usize) -> Self {
        self.max_task_processors = max;
        self
    }

    pub fn with_check_timeout(mut self, interval: Duration) -> Self {
        self.check_timeout_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_timeout(mut self, interval: Duration) -> Self {
        self.timeout_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_scaling(mut self, scaling: ScalingPolicy) -> Self {
        self.scaling = scaling;
        self
    }

    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject configurations the pool cannot run with.
    pub fn validate(&self) -> Result<(), PoolError> {
        let invalid = |msg: String| Err(PoolError::Configuration(msg));

        if self.min_task_processors < 1 {
            return invalid("min_task_processors must be at least 1".into());
        }
        if self.max_task_processors < 1 {
            return invalid("max_task_processors must be at least 1".into());
        }
        if self.min_task_processors > self.max_task_processors {
            return invalid(format!(
                "min_task_processors ({}) exceeds max_task_processors ({})",
                self.min_task_processors, self.max_task_processors
            ));
        }
        if self.queues.is_empty() {
            return invalid("at least one queue is required".into());
        }
        if self.queues.iter().any(|q| q.is_empty()) {
            return invalid("queue names must not be empty".into());
        }
        if self.check_timeout_ms == 0 || self.timeout_ms == 0 {
            return invalid("check_timeout and timeout must be non-zero".into());
        }
        self.scaling.validate().map_err(PoolError::Configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PoolConfig::default();
        assert_eq!(config.queues, vec!["*"]);
        assert_eq!(config.min_task_processors, 1);
        assert_eq!(config.max_task_processors, 10);
        assert_eq!(config.check_timeout(), Duration::from_millis(500));
        assert_eq!(config.timeout(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn min_above_max_is_rejected() {
        let config = PoolConfig::new(["default"])
            .with_min_task_processors(3)
            .with_max_task_processors(2);
        assert!(matches!(config.validate(), Err(PoolError::Configuration(_))));
    }

    #[test]
    fn zero_bounds_and_empty_queues_are_rejected() {
        assert!(PoolConfig::new(["q"]).with_min_task_processors(0).validate().is_err());
        assert!(PoolConfig::new(["q"])
            .with_min_task_processors(0)
            .with_max_task_processors(0)
            .validate()
            .is_err());
        assert!(PoolConfig::new(Vec::<String>::new()).validate().is_err());
        assert!(PoolConfig::new(["q"]).with_timeout(Duration::ZERO).validate().is_err());
    }

    #[test]
    fn deserializes_partial_json() {
        let config: PoolConfig = serde_json::from_str(
            r#"{"queues": ["high", "low"], "max_task_processors": 4, "timeout_ms": 200}"#,
        )
        .unwrap();
        assert_eq!(config.queues, vec!["high", "low"]);
        assert_eq!(config.min_task_processors, 1);
        assert_eq!(config.max_task_processors, 4);
        assert_eq!(config.timeout(), Duration::from_millis(200));
        assert_eq!(config.connection.endpoint, "mem://");
    }
}
