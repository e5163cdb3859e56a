//! Configuration loading and management.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Client configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// WebSocket endpoint URL (e.g., "wss://chat.example.net/ws").
    pub url: String,
    /// How long a dial may take before the attempt is abandoned.
    #[serde(default = "defaults::connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// How long to wait for the server's auth verdict before tearing down.
    #[serde(default = "defaults::auth_timeout_ms")]
    pub auth_timeout_ms: u64,
    /// Maximum outbound message length in characters.
    #[serde(default = "defaults::max_message_len")]
    pub max_message_len: usize,
    /// Reconnection backoff tuning.
    #[serde(default)]
    pub backoff: BackoffConfig,
    /// Duplicate-suppression tuning.
    #[serde(default)]
    pub dedup: DedupConfig,
}

/// Reconnection backoff configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BackoffConfig {
    /// First retry delay in milliseconds.
    #[serde(default = "defaults::backoff_base_ms")]
    pub base_ms: u64,
    /// Multiplier applied per failed attempt.
    #[serde(default = "defaults::backoff_factor")]
    pub factor: f64,
    /// Upper bound on any single delay, in milliseconds.
    #[serde(default = "defaults::backoff_cap_ms")]
    pub cap_ms: u64,
}

/// Duplicate-suppression configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DedupConfig {
    /// How long a seen message stays in the window, in seconds.
    #[serde(default = "defaults::dedup_window_secs")]
    pub window_secs: u64,
    /// Hard cap on remembered entries per room.
    #[serde(default = "defaults::dedup_max_entries")]
    pub max_entries: usize,
}

mod defaults {
    pub fn connect_timeout_ms() -> u64 {
        10_000
    }
    pub fn auth_timeout_ms() -> u64 {
        10_000
    }
    pub fn max_message_len() -> usize {
        500
    }
    pub fn backoff_base_ms() -> u64 {
        1_000
    }
    pub fn backoff_factor() -> f64 {
        2.0
    }
    pub fn backoff_cap_ms() -> u64 {
        30_000
    }
    pub fn dedup_window_secs() -> u64 {
        300
    }
    pub fn dedup_max_entries() -> usize {
        1_000
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: defaults::backoff_base_ms(),
            factor: defaults::backoff_factor(),
            cap_ms: defaults::backoff_cap_ms(),
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_secs: defaults::dedup_window_secs(),
            max_entries: defaults::dedup_max_entries(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with defaults for the given endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout_ms: defaults::connect_timeout_ms(),
            auth_timeout_ms: defaults::auth_timeout_ms(),
            max_message_len: defaults::max_message_len(),
            backoff: BackoffConfig::default(),
            dedup: DedupConfig::default(),
        }
    }

    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: ClientConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject tunables that would make the client misbehave.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::Invalid("url must not be empty".into()));
        }
        if self.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "connect_timeout_ms must be > 0".into(),
            ));
        }
        if self.auth_timeout_ms == 0 {
            return Err(ConfigError::Invalid("auth_timeout_ms must be > 0".into()));
        }
        if self.max_message_len == 0 {
            return Err(ConfigError::Invalid("max_message_len must be > 0".into()));
        }
        if self.backoff.base_ms == 0 {
            return Err(ConfigError::Invalid("backoff.base_ms must be > 0".into()));
        }
        if self.backoff.factor < 1.0 {
            return Err(ConfigError::Invalid("backoff.factor must be >= 1".into()));
        }
        if self.backoff.cap_ms < self.backoff.base_ms {
            return Err(ConfigError::Invalid(
                "backoff.cap_ms must be >= backoff.base_ms".into(),
            ));
        }
        if self.dedup.max_entries == 0 {
            return Err(ConfigError::Invalid("dedup.max_entries must be > 0".into()));
        }
        Ok(())
    }

    /// Dial deadline as a [`Duration`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Auth handshake deadline as a [`Duration`].
    pub fn auth_timeout(&self) -> Duration {
        Duration::from_millis(self.auth_timeout_ms)
    }
}
