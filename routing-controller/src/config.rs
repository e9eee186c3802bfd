//! Enumerated configuration options (spec.md §6): target forwarder name,
//! retry/timeout intervals, optional group name for the group self-filter.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

fn default_retry_delay_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_max_xml_len() -> usize {
    64 * 1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target_routing_service: String,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Enables the group self-filter when set.
    #[serde(default)]
    pub group_name: Option<String>,

    /// Transport-defined maximum XML URL content length. The admin
    /// transport wire format is out of scope for this crate, so this is a
    /// configured ceiling rather than something queried from the
    /// transport itself.
    #[serde(default = "default_max_xml_len")]
    pub max_xml_len: usize,
}

impl Config {
    /// Loads configuration from environment variables prefixed with
    /// `ROUTING_CONTROLLER_`, e.g. `ROUTING_CONTROLLER_TARGET_ROUTING_SERVICE`.
    pub fn from_env() -> Result<Self, ConfigError> {
        envy::prefixed("ROUTING_CONTROLLER_")
            .from_env::<Config>()
            .map_err(|e| ConfigError::Env(e.to_string()))
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_routing_service.is_empty() {
            return Err(ConfigError::EmptyTarget);
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::NonPositiveTimeout);
        }
        Ok(())
    }
}
