//! Runtime configuration
//!
//! Loaded from environment variables with defaults. The OS-version override
//! (`WINSANDMCP_IGNORE_OS_VERSION_CHECKS`) is not part of this
//! struct: the precondition check reads it on every invocation.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::sandbox::readiness::DEFAULT_POLL_INTERVAL;

pub const LOG_LEVEL_ENV: &str = "WINSANDMCP_LOG_LEVEL";
pub const READY_TIMEOUT_ENV: &str = "WINSANDMCP_READY_TIMEOUT_SECS";
pub const SETTLE_ENV: &str = "WINSANDMCP_SETTLE_MS";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Main application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub readiness: ReadinessConfig,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Default tracing directive when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// How long the service waits for a sandbox to accept commands.
#[derive(Debug, Clone)]
pub struct ReadinessConfig {
    /// Deadline applied through cancellation around each readiness wait
    pub timeout: Duration,
    /// Extra delay after the first successful probe
    pub settle: Duration,
    /// Delay between failed probes
    pub poll_interval: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            settle: Duration::from_secs(1),
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Config {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(level) = env::var(LOG_LEVEL_ENV) {
            config.logging.level = level.trim().to_ascii_lowercase();
        }

        if let Ok(secs) = env::var(READY_TIMEOUT_ENV) {
            config.readiness.timeout = Duration::from_secs(parse_number(READY_TIMEOUT_ENV, &secs)?);
        }

        if let Ok(ms) = env::var(SETTLE_ENV) {
            config.readiness.settle = Duration::from_millis(parse_number(SETTLE_ENV, &ms)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::InvalidValue {
                key: "logging.level".to_string(),
                reason: format!("Must be one of: {}", valid_levels.join(", ")),
            });
        }

        if self.readiness.timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "readiness.timeout".to_string(),
                reason: "Timeout must be > 0".to_string(),
            });
        }

        if self.readiness.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "readiness.poll_interval".to_string(),
                reason: "Poll interval must be > 0".to_string(),
            });
        }

        Ok(())
    }
}

fn parse_number(key: &str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        reason: format!("'{}' is not a non-negative integer", raw),
    })
}
