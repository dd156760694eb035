//! Pipeline configuration

use depth_book::DEFAULT_MATCH_HORIZON_MS;
use depth_types::{DepthError, DepthResult};
use serde::{Deserialize, Serialize};

/// What the handoff does when the consumer falls behind and the queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Producer waits for room (backpressure)
    #[default]
    Block,
    /// Evict the oldest queued record to make room
    DropOldest,
    /// Discard the incoming record
    DropNewest,
}

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum records waiting in the handoff
    pub queue_capacity: usize,
    /// Overflow behaviour of the handoff
    pub overflow_policy: OverflowPolicy,
    /// Half-width (ms) of the trade window shown around a scrubbed state
    pub trade_window_ms: u64,
    /// How far (ms) deltas may run ahead of a trade before it is dropped
    pub match_horizon_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 4096,
            overflow_policy: OverflowPolicy::Block,
            trade_window_ms: 100,
            match_horizon_ms: DEFAULT_MATCH_HORIZON_MS,
        }
    }
}

impl PipelineConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a config from JSON; missing fields take defaults
    pub fn from_json(json: &str) -> DepthResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| DepthError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Set queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set overflow policy
    pub fn with_overflow_policy(mut self, policy: OverflowPolicy) -> Self {
        self.overflow_policy = policy;
        self
    }

    /// Set trade window half-width
    pub fn with_trade_window_ms(mut self, window: u64) -> Self {
        self.trade_window_ms = window;
        self
    }

    /// Set trade match horizon
    pub fn with_match_horizon_ms(mut self, horizon: u64) -> Self {
        self.match_horizon_ms = horizon;
        self
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> DepthResult<()> {
        if self.queue_capacity == 0 {
            return Err(DepthError::Configuration(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::new();
        assert_eq!(config.queue_capacity, 4096);
        assert_eq!(config.overflow_policy, OverflowPolicy::Block);
        assert_eq!(config.trade_window_ms, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = PipelineConfig::new()
            .with_queue_capacity(8)
            .with_overflow_policy(OverflowPolicy::DropOldest)
            .with_match_horizon_ms(250);
        assert_eq!(config.queue_capacity, 8);
        assert_eq!(config.overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(config.match_horizon_ms, 250);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = PipelineConfig::new().with_queue_capacity(0).validate().unwrap_err();
        assert!(matches!(err, DepthError::Configuration(_)));
    }

    #[test]
    fn test_from_json_partial() {
        let config =
            PipelineConfig::from_json(r#"{"overflow_policy":"drop_newest","queue_capacity":16}"#)
                .unwrap();
        assert_eq!(config.overflow_policy, OverflowPolicy::DropNewest);
        assert_eq!(config.queue_capacity, 16);
        assert_eq!(config.trade_window_ms, 100);

        assert!(PipelineConfig::from_json(r#"{"queue_capacity":0}"#).is_err());
    }
}
