//! Save queue configuration.
//!
//! Values are fixed once the queue is started.

use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_CYCLE_PAUSE: Duration = Duration::from_millis(100);

const ENV_MAX_RETRIES: &str = "INKWELL_SAVE_MAX_RETRIES";
const ENV_RETRY_DELAY_MS: &str = "INKWELL_SAVE_RETRY_DELAY_MS";
const ENV_BATCH_SIZE: &str = "INKWELL_SAVE_BATCH_SIZE";
const ENV_ENABLE_BATCHING: &str = "INKWELL_SAVE_ENABLE_BATCHING";
const ENV_CYCLE_PAUSE_MS: &str = "INKWELL_SAVE_CYCLE_PAUSE_MS";
const ENV_DISPATCH_TIMEOUT_MS: &str = "INKWELL_SAVE_DISPATCH_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveQueueConfig {
    /// Failed attempts after which an operation is marked `error`.
    pub max_retries: u32,
    /// Linear backoff unit: the n-th retry waits `retry_delay * n`.
    pub retry_delay: Duration,
    /// Max ids removed from the pending queue per cycle.
    pub batch_size: usize,
    /// When false, every cycle handles exactly one operation.
    pub enable_batching: bool,
    /// Pause between two cycles while work remains queued.
    pub cycle_pause: Duration,
    /// Upper bound for a single persist call. `None` waits forever.
    pub dispatch_timeout: Option<Duration>,
}

impl Default for SaveQueueConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            batch_size: DEFAULT_BATCH_SIZE,
            enable_batching: true,
            cycle_pause: DEFAULT_CYCLE_PAUSE,
            dispatch_timeout: None,
        }
    }
}

impl SaveQueueConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_batching(mut self, enabled: bool) -> Self {
        self.enable_batching = enabled;
        self
    }

    pub fn with_cycle_pause(mut self, pause: Duration) -> Self {
        self.cycle_pause = pause;
        self
    }

    pub fn with_dispatch_timeout(mut self, timeout: Duration) -> Self {
        self.dispatch_timeout = Some(timeout);
        self
    }

    /// Build a config from `INKWELL_SAVE_*` environment variables.
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse(&lookup, ENV_MAX_RETRIES)? {
            config.max_retries = v;
        }
        if let Some(ms) = parse::<u64, _>(&lookup, ENV_RETRY_DELAY_MS)? {
            config.retry_delay = Duration::from_millis(ms);
        }
        if let Some(v) = parse(&lookup, ENV_BATCH_SIZE)? {
            config.batch_size = v;
        }
        if let Some(raw) = lookup(ENV_ENABLE_BATCHING) {
            config.enable_batching = parse_bool(&raw).ok_or(ConfigError::Malformed {
                key: ENV_ENABLE_BATCHING,
                value: raw,
            })?;
        }
        if let Some(ms) = parse::<u64, _>(&lookup, ENV_CYCLE_PAUSE_MS)? {
            config.cycle_pause = Duration::from_millis(ms);
        }
        if let Some(ms) = parse::<u64, _>(&lookup, ENV_DISPATCH_TIMEOUT_MS)? {
            // 0 means "no timeout".
            config.dispatch_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be at least 1".into()));
        }
        if self.dispatch_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::Invalid(
                "dispatch_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Number of ids one cycle may take from the pending queue.
    pub(crate) fn batch_limit(&self) -> usize {
        if self.enable_batching {
            self.batch_size
        } else {
            1
        }
    }
}

fn parse<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::Malformed { key, value: raw }),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
