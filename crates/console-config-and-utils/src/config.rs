//! Configuration management for the console.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default bridge service HTTP base URL.
pub const DEFAULT_BRIDGE_URL: &str = match option_env!("CONSOLE_BRIDGE_URL") {
    Some(url) => url,
    None => "https://bridge.messaging-console.dev",
};

/// Default bridge service persistent channel endpoint.
pub const DEFAULT_BRIDGE_WS_URL: &str = match option_env!("CONSOLE_BRIDGE_WS_URL") {
    Some(url) => url,
    None => "wss://bridge.messaging-console.dev/ws",
};

/// Default contact store REST URL.
pub const DEFAULT_STORE_URL: &str = match option_env!("CONSOLE_STORE_URL") {
    Some(url) => url,
    None => "https://store.messaging-console.dev",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Automatic reconnect budget for the bridge channel.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Fixed delay between reconnect attempts.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2_000;

/// Debounce before the readiness gate navigates.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;

/// Maximum age of a cached contact bundle that still counts as fresh.
pub const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 300;

/// Main console configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Bridge service HTTP base URL (status probe, pairing requests).
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,
    /// Bridge service persistent channel endpoint.
    #[serde(default = "default_bridge_ws_url")]
    pub bridge_ws_url: String,
    /// Contact store REST URL.
    #[serde(default = "default_store_url")]
    pub store_url: String,
    /// Contact store API key.
    #[serde(default)]
    pub store_api_key: String,
    /// Automatic reconnect budget.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Fixed delay between reconnect attempts, in milliseconds.
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Readiness gate settle delay, in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Cache freshness window, in seconds.
    #[serde(default = "default_cache_max_age_secs")]
    pub cache_max_age_secs: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_bridge_url() -> String {
    DEFAULT_BRIDGE_URL.to_string()
}

fn default_bridge_ws_url() -> String {
    DEFAULT_BRIDGE_WS_URL.to_string()
}

fn default_store_url() -> String {
    DEFAULT_STORE_URL.to_string()
}

fn default_max_reconnect_attempts() -> u32 {
    DEFAULT_MAX_RECONNECT_ATTEMPTS
}

fn default_reconnect_delay_ms() -> u64 {
    DEFAULT_RECONNECT_DELAY_MS
}

fn default_settle_delay_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

fn default_cache_max_age_secs() -> u64 {
    DEFAULT_CACHE_MAX_AGE_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            bridge_url: default_bridge_url(),
            bridge_ws_url: default_bridge_ws_url(),
            store_url: default_store_url(),
            store_api_key: String::new(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            cache_max_age_secs: DEFAULT_CACHE_MAX_AGE_SECS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        if let Some(level) = env_override("CONSOLE_LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(url) = env_override("CONSOLE_BRIDGE_URL") {
            self.bridge_url = url;
        }
        if let Some(url) = env_override("CONSOLE_BRIDGE_WS_URL") {
            self.bridge_ws_url = url;
        }
        if let Some(url) = env_override("CONSOLE_STORE_URL") {
            self.store_url = url;
        }
        if let Some(key) = env_override("CONSOLE_STORE_API_KEY") {
            self.store_api_key = key;
        }
    }

    /// Check that every endpoint parses as a URL.
    pub fn validate(&self) -> CoreResult<()> {
        Url::parse(&self.bridge_url)?;
        let ws = Url::parse(&self.bridge_ws_url)?;
        if !matches!(ws.scheme(), "ws" | "wss") {
            return Err(CoreError::Config(format!(
                "bridge_ws_url must use ws:// or wss://, got {}",
                ws.scheme()
            )));
        }
        Url::parse(&self.store_url)?;
        Ok(())
    }

    /// Delay between automatic reconnect attempts.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    /// Readiness gate settle delay.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Cache freshness window.
    pub fn cache_max_age(&self) -> Duration {
        Duration::from_secs(self.cache_max_age_secs)
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}
