//! Enumerated, environment-driven configuration. No config file, no
//! layered overrides — every setting is one env var, validated once at
//! startup; anything invalid or missing aborts the process with a message
//! naming the offending variable.

mod config;
mod error;

pub use config::{CacheConfig, Config, StoreConfig};
pub use error::{ConfigError, Result};
