//! Core configuration, paths and logging for the messaging console.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_BRIDGE_URL, DEFAULT_BRIDGE_WS_URL, DEFAULT_CACHE_MAX_AGE_SECS,
    DEFAULT_LOG_LEVEL, DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY_MS,
    DEFAULT_SETTLE_DELAY_MS, DEFAULT_STORE_URL,
};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level, CentralLogWriter};
pub use paths::Paths;
