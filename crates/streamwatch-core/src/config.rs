//! Engine configuration
//!
//! Loaded from TOML; every field has a default so an empty file is valid.
//!
//! ```toml
//! max_concurrent_fetches = 16
//! max_concurrent_actions = 8
//! event_queue_capacity = 1024
//! max_in_flight_events = 64
//! filter_cache_capacity = 4096
//! policy_cache_capacity = 10000
//! policy_cache_ttl_secs = 60
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Slow-path member fetches in flight per guild scan
    pub max_concurrent_fetches: usize,
    /// Member reconciliations in flight per guild scan
    pub max_concurrent_actions: usize,
    /// Bounded capacity of the inbound event queue
    pub event_queue_capacity: usize,
    /// Events handled concurrently by the event pump
    pub max_in_flight_events: usize,
    /// Compiled filter patterns kept across reconciliations
    pub filter_cache_capacity: u64,
    /// Guild policies kept in the policy cache
    pub policy_cache_capacity: u64,
    /// Policy cache time-to-live in seconds
    pub policy_cache_ttl_secs: u64,
}

impl EngineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With fetch concurrency
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    /// With action concurrency
    #[inline]
    #[must_use]
    pub fn with_max_concurrent_actions(mut self, max: usize) -> Self {
        self.max_concurrent_actions = max;
        self
    }

    /// With event queue capacity
    #[inline]
    #[must_use]
    pub fn with_event_queue_capacity(mut self, capacity: usize) -> Self {
        self.event_queue_capacity = capacity;
        self
    }

    /// With event pump concurrency
    #[inline]
    #[must_use]
    pub fn with_max_in_flight_events(mut self, max: usize) -> Self {
        self.max_in_flight_events = max;
        self
    }

    /// Policy cache TTL
    #[inline]
    #[must_use]
    pub fn policy_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.policy_cache_ttl_secs)
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// - `ConfigError::Parse` on malformed TOML
    /// - `ConfigError::Invalid` on out-of-range values
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    ///
    /// # Errors
    /// - `ConfigError::Io` if the file cannot be read
    /// - see [`EngineConfig::from_toml_str`]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Reject zero limits
    ///
    /// # Errors
    /// - `ConfigError::Invalid` naming the first zero field
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("max_concurrent_fetches", self.max_concurrent_fetches as u64),
            ("max_concurrent_actions", self.max_concurrent_actions as u64),
            ("event_queue_capacity", self.event_queue_capacity as u64),
            ("max_in_flight_events", self.max_in_flight_events as u64),
            ("filter_cache_capacity", self.filter_cache_capacity),
            ("policy_cache_capacity", self.policy_cache_capacity),
        ];
        for (field, value) in checks {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 16,
            max_concurrent_actions: 8,
            event_queue_capacity: 1024,
            max_in_flight_events: 64,
            filter_cache_capacity: 4096,
            policy_cache_capacity: 10_000,
            policy_cache_ttl_secs: 60,
        }
    }
}
