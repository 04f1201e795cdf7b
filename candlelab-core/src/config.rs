//! Pipeline configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file (or no file) yields a working
//! configuration for Binance minute candles:
//!
//! ```toml
//! [exchange]
//! base_url = "https://api.binance.com"
//! timeout_secs = 30
//!
//! [fetch]
//! page_size = 1000
//! min_request_interval_ms = 500
//!
//! [retry]
//! max_consecutive_failures = 3
//! base_backoff_ms = 1000
//! max_backoff_ms = 30000
//! rate_limit_cooldown_ms = 60000
//! max_rate_limit_retries = 5
//!
//! [collection]
//! max_gap_fraction = 0.01
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub exchange: ExchangeConfig,
    pub fetch: FetchConfig,
    pub retry: RetryConfig,
    pub collection: CollectionConfig,
}

impl PipelineConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fetch.page_size == 0 {
            return Err(ConfigError::Invalid("fetch.page_size must be >= 1".into()));
        }
        if self.retry.max_consecutive_failures == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_consecutive_failures must be >= 1".into(),
            ));
        }
        if self.retry.base_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "retry.base_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }
        let f = self.collection.max_gap_fraction;
        if !(0.0..=1.0).contains(&f) {
            return Err(ConfigError::Invalid(format!(
                "collection.max_gap_fraction must be within [0, 1], got {f}"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.binance.com".into(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Rows requested per page (capped by the exchange maximum).
    pub page_size: usize,
    /// Minimum spacing between consecutive requests.
    pub min_request_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: 1000,
            min_request_interval_ms: 500,
        }
    }
}

impl FetchConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Consecutive transient failures at one cursor before aborting.
    pub max_consecutive_failures: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Floor for the wait after a rate-limit response.
    pub rate_limit_cooldown_ms: u64,
    /// Rate-limit responses tolerated at one cursor before aborting.
    pub max_rate_limit_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 3,
            base_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            rate_limit_cooldown_ms: 60_000,
            max_rate_limit_retries: 5,
        }
    }
}

impl RetryConfig {
    /// Backoff before retry number `attempt` (1-based): base * 2^(attempt-1),
    /// capped at `max_backoff_ms`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        let ms = self.base_backoff_ms.saturating_mul(factor);
        Duration::from_millis(ms.min(self.max_backoff_ms))
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_millis(self.rate_limit_cooldown_ms)
    }

    /// No waiting at all; used by tests and the synthetic exchange.
    pub fn immediate() -> Self {
        Self {
            base_backoff_ms: 0,
            max_backoff_ms: 0,
            rate_limit_cooldown_ms: 0,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Abort when missing candles exceed this fraction of the expected count.
    pub max_gap_fraction: f64,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            max_gap_fraction: 0.01,
        }
    }
}
