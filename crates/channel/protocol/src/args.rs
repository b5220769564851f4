//! CLI and file arguments for protocol configuration.

use std::{path::Path, time::Duration};

use clap::Args;
use serde::{Deserialize, Serialize};

use crate::{ProtocolConfig, constants::*};

/// Errors loading or validating [`ProtocolArgs`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("invalid protocol config: {0}")]
    Invalid(String),
}

/// Channel protocol arguments. Durations are in milliseconds.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "Channel Protocol")]
#[serde(default)]
pub struct ProtocolArgs {
    /// Timeout for a single arbiter or peer request
    #[arg(long = "channel.request-timeout-ms", default_value_t = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,

    /// Retries after a transient arbiter failure
    #[arg(long = "channel.arbiter-retries", default_value_t = DEFAULT_ARBITER_RETRY_ATTEMPTS)]
    pub arbiter_retry_attempts: u32,

    /// Initial delay between arbiter retries
    #[arg(
        long = "channel.arbiter-backoff-ms",
        default_value_t = DEFAULT_ARBITER_RETRY_INITIAL_BACKOFF_MS
    )]
    pub arbiter_retry_initial_backoff_ms: u64,

    /// Maximum delay between arbiter retries
    #[arg(
        long = "channel.arbiter-max-backoff-ms",
        default_value_t = DEFAULT_ARBITER_RETRY_MAX_BACKOFF_MS
    )]
    pub arbiter_retry_max_backoff_ms: u64,

    /// Minimum challenge period in blocks
    #[arg(long = "channel.min-challenge-period", default_value_t = DEFAULT_MIN_CHALLENGE_PERIOD)]
    pub min_challenge_period: u64,
}

impl Default for ProtocolArgs {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            arbiter_retry_attempts: DEFAULT_ARBITER_RETRY_ATTEMPTS,
            arbiter_retry_initial_backoff_ms: DEFAULT_ARBITER_RETRY_INITIAL_BACKOFF_MS,
            arbiter_retry_max_backoff_ms: DEFAULT_ARBITER_RETRY_MAX_BACKOFF_MS,
            min_challenge_period: DEFAULT_MIN_CHALLENGE_PERIOD,
        }
    }
}

impl ProtocolArgs {
    /// Parse from TOML. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let args: Self = toml::from_str(s)?;
        args.validate()?;
        Ok(args)
    }

    /// Load and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Validate argument combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request timeout must be non-zero".to_string()));
        }
        if self.min_challenge_period == 0 {
            return Err(ConfigError::Invalid(
                "minimum challenge period must be at least one block".to_string(),
            ));
        }
        if self.arbiter_retry_initial_backoff_ms > self.arbiter_retry_max_backoff_ms {
            return Err(ConfigError::Invalid(format!(
                "initial arbiter backoff {}ms exceeds maximum {}ms",
                self.arbiter_retry_initial_backoff_ms, self.arbiter_retry_max_backoff_ms
            )));
        }
        Ok(())
    }
}

impl ProtocolConfig for ProtocolArgs {
    fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn arbiter_retry_attempts(&self) -> u32 {
        self.arbiter_retry_attempts
    }

    fn arbiter_retry_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.arbiter_retry_initial_backoff_ms)
    }

    fn arbiter_retry_max_backoff(&self) -> Duration {
        Duration::from_millis(self.arbiter_retry_max_backoff_ms)
    }

    fn min_challenge_period(&self) -> u64 {
        self.min_challenge_period
    }
}
