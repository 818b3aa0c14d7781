use crate::PoolError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration for a worker pool run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of dispatcher threads
    pub workers: usize,
    /// Bound on every blocking channel read, in milliseconds
    pub poll_interval_ms: u64,
    /// How long `join` waits for silent workers before declaring them stalled
    pub join_grace_ms: u64,
    /// Give up collecting after this long; `None` waits for every worker
    pub drain_deadline_ms: Option<u64>,
    /// Capacity of the tree event bus
    pub event_buffer_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            poll_interval_ms: 5,
            join_grace_ms: 5_000,
            drain_deadline_ms: None,
            event_buffer_size: 1000,
        }
    }
}

impl PoolConfig {
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_drain_deadline(mut self, deadline: Duration) -> Self {
        self.drain_deadline_ms = Some(deadline.as_millis() as u64);
        self
    }

    pub fn with_join_grace(mut self, grace: Duration) -> Self {
        self.join_grace_ms = grace.as_millis() as u64;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn join_grace(&self) -> Duration {
        Duration::from_millis(self.join_grace_ms)
    }

    pub fn drain_deadline(&self) -> Option<Duration> {
        self.drain_deadline_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.workers == 0 {
            return Err(PoolError::InvalidConfig(
                "at least one worker is required".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(PoolError::InvalidConfig(
                "poll_interval_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, PoolError> {
        let raw = std::fs::read_to_string(path)?;
        let config: PoolConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_file(&self, path: impl AsRef<Path>) -> Result<(), PoolError> {
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: PoolConfig = serde_json::from_str(r#"{"workers": 2}"#).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.poll_interval_ms, 5);
        assert_eq!(config.drain_deadline(), None);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = PoolConfig::default().with_workers(0);
        assert!(matches!(config.validate(), Err(PoolError::InvalidConfig(_))));
    }
}
