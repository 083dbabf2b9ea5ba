use std::env;
use std::time::Duration;

use crate::domain::backoff::BackoffPolicy;
use crate::errors::ConfigError;

pub const ENV_INTERVAL_MS: &str = "OUTBOX_DISPATCH_INTERVAL_MS";
pub const ENV_MAX_ATTEMPTS: &str = "OUTBOX_DISPATCH_MAX_ATTEMPTS";
pub const ENV_INITIAL_BACKOFF_MS: &str = "OUTBOX_DISPATCH_INITIAL_BACKOFF_MS";
pub const ENV_BACKOFF_MULTIPLIER: &str = "OUTBOX_DISPATCH_BACKOFF_MULTIPLIER";
pub const ENV_BATCH_SIZE: &str = "OUTBOX_DISPATCH_BATCH_SIZE";

/// Dispatcher tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Delay between the end of one tick and the start of the next.
    /// Default: 5s.
    pub interval: Duration,

    /// Attempts (including the first) before an event is dead-lettered.
    /// Default: 5.
    pub max_attempts: u32,

    /// Delay before the first retry. Default: 500ms.
    pub initial_backoff: Duration,

    /// Growth factor of the retry delay. Default: 2.0.
    pub backoff_multiplier: f64,

    /// Maximum events claimed per tick. Default: 50.
    pub batch_size: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(5000),
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            backoff_multiplier: 2.0,
            batch_size: 50,
        }
    }
}

impl DispatchConfig {
    /// Read `OUTBOX_DISPATCH_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, then validate.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let config = Self {
            interval: match lookup(ENV_INTERVAL_MS) {
                Some(v) => Duration::from_millis(parse(ENV_INTERVAL_MS, &v, "milliseconds")?),
                None => defaults.interval,
            },
            max_attempts: match lookup(ENV_MAX_ATTEMPTS) {
                Some(v) => parse(ENV_MAX_ATTEMPTS, &v, "a positive integer")?,
                None => defaults.max_attempts,
            },
            initial_backoff: match lookup(ENV_INITIAL_BACKOFF_MS) {
                Some(v) => {
                    Duration::from_millis(parse(ENV_INITIAL_BACKOFF_MS, &v, "milliseconds")?)
                }
                None => defaults.initial_backoff,
            },
            backoff_multiplier: match lookup(ENV_BACKOFF_MULTIPLIER) {
                Some(v) => parse(ENV_BACKOFF_MULTIPLIER, &v, "a number")?,
                None => defaults.backoff_multiplier,
            },
            batch_size: match lookup(ENV_BATCH_SIZE) {
                Some(v) => parse(ENV_BATCH_SIZE, &v, "a positive integer")?,
                None => defaults.batch_size,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval.is_zero() {
            return Err(ConfigError::Invalid("interval must be greater than zero".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        // A multiplier below 1.0 would shrink the delay on every retry.
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "backoff_multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        Ok(())
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(self.initial_backoff, self.backoff_multiplier)
    }
}

fn parse<T: std::str::FromStr>(
    key: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Parse {
        key,
        value: value.to_string(),
        expected,
    })
}
