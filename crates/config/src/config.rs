use std::env;

use secrecy::SecretString;

use crate::error::{ConfigError, Result};

const DEFAULT_PORT: &str = "4210";
const DEFAULT_REDIS_DB: i64 = 0;
const DEFAULT_MESSAGE_TTL_HOURS: u64 = 48;
const DEFAULT_RUST_LOG: &str = "info";

/// Durable store connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub host: String,
    pub user: String,
    pub password: Option<SecretString>,
    pub database: String,
}

/// Ephemeral reply-thread cache connection settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub addr: String,
    pub password: Option<SecretString>,
    pub db: i64,
    pub ttl_hours: u64,
}

/// Everything the process needs to boot, assembled once at startup from
/// the environment (after a local `.env` file, if present, is loaded).
/// Invalid or missing required values abort startup with a message naming
/// the offending variable — see [`Config::from_env`].
#[derive(Debug, Clone)]
pub struct Config {
    pub factory_bot_token: SecretString,
    pub webhook_url: String,
    pub port: u16,
    pub admin_id: Option<i64>,
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub encryption_key: [u8; 32],
    pub rust_log: String,
}

impl Config {
    /// Loads and validates configuration from the process environment.
    /// Callers are expected to have already loaded `.env` via
    /// `dotenvy::dotenv()` before calling this.
    pub fn from_env() -> Result<Self> {
        let factory_bot_token = required_secret("FACTORY_BOT_TOKEN")?;
        let webhook_url = required("WEBHOOK_URL")?;
        let port = optional("PORT", DEFAULT_PORT)
            .parse::<u16>()
            .map_err(|e| invalid("PORT", e))?;
        let admin_id = optional_parsed::<i64>("ADMIN_ID")?;

        let store = StoreConfig {
            host: required("DB_HOST")?,
            user: required("DB_USER")?,
            password: env::var("DB_PASS").ok().map(SecretString::from),
            database: required("DB_NAME")?,
        };

        let cache = CacheConfig {
            addr: required("REDIS_ADDR")?,
            password: env::var("REDIS_PASSWORD").ok().map(SecretString::from),
            db: optional("REDIS_DB", &DEFAULT_REDIS_DB.to_string())
                .parse::<i64>()
                .map_err(|e| invalid("REDIS_DB", e))?,
            ttl_hours: {
                let hours = optional("MESSAGE_TTL", &DEFAULT_MESSAGE_TTL_HOURS.to_string())
                    .parse::<u64>()
                    .map_err(|e| invalid("MESSAGE_TTL", e))?;
                if hours == 0 {
                    return Err(ConfigError::Invalid {
                        name: "MESSAGE_TTL",
                        reason: "must be a positive number of hours".to_string(),
                    });
                }
                hours
            },
        };

        if cache.db < 0 {
            return Err(ConfigError::Invalid {
                name: "REDIS_DB",
                reason: "must be non-negative".to_string(),
            });
        }

        let encryption_key = {
            let raw = required("BOT_ENCRYPTION_KEY")?;
            let bytes = raw.into_bytes();
            let len = bytes.len();
            <[u8; 32]>::try_from(bytes).map_err(|_| ConfigError::Invalid {
                name: "BOT_ENCRYPTION_KEY",
                reason: format!("must be exactly 32 bytes, got {len}"),
            })?
        };

        let rust_log = optional("RUST_LOG", DEFAULT_RUST_LOG);

        Ok(Self {
            factory_bot_token,
            webhook_url,
            port,
            admin_id,
            store,
            cache,
            encryption_key,
            rust_log,
        })
    }
}

fn required(name: &'static str) -> Result<String> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn required_secret(name: &'static str) -> Result<SecretString> {
    required(name).map(SecretString::from)
}

fn optional(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn optional_parsed<T>(name: &'static str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| invalid(name, e)),
        Err(_) => Ok(None),
    }
}

fn invalid(name: &'static str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        reason: err.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, unsafe_code)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variables are process-global; serialize tests that touch them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_all() {
        for key in [
            "FACTORY_BOT_TOKEN",
            "WEBHOOK_URL",
            "PORT",
            "ADMIN_ID",
            "DB_HOST",
            "DB_USER",
            "DB_PASS",
            "DB_NAME",
            "REDIS_ADDR",
            "REDIS_PASSWORD",
            "REDIS_DB",
            "MESSAGE_TTL",
            "BOT_ENCRYPTION_KEY",
            "RUST_LOG",
        ] {
            unsafe { env::remove_var(key) };
        }
    }

    fn set_required() {
        unsafe {
            env::set_var("FACTORY_BOT_TOKEN", "111:AAAAAAAAAAAAAAAAAAAAAAAAAAAAAA");
            env::set_var("WEBHOOK_URL", "https://host.example");
            env::set_var("DB_HOST", "localhost");
            env::set_var("DB_USER", "root");
            env::set_var("DB_NAME", "forge");
            env::set_var("REDIS_ADDR", "127.0.0.1:6379");
            env::set_var("BOT_ENCRYPTION_KEY", "a".repeat(32));
        }
    }

    #[test]
    fn loads_defaults_when_optional_vars_are_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required();

        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 4210);
        assert_eq!(config.admin_id, None);
        assert_eq!(config.cache.db, 0);
        assert_eq!(config.cache.ttl_hours, 48);
        assert_eq!(config.rust_log, "info");
        assert_eq!(config.encryption_key, [b'a'; 32]);
    }

    #[test]
    fn missing_required_var_names_it() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required();
        unsafe { env::remove_var("WEBHOOK_URL") };

        match Config::from_env() {
            Err(ConfigError::Missing("WEBHOOK_URL")) => {},
            other => panic!("expected Missing(WEBHOOK_URL), got {other:?}"),
        }
    }

    #[test]
    fn encryption_key_must_be_exactly_32_bytes() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required();
        unsafe { env::set_var("BOT_ENCRYPTION_KEY", "too-short") };

        match Config::from_env() {
            Err(ConfigError::Invalid { name: "BOT_ENCRYPTION_KEY", .. }) => {},
            other => panic!("expected Invalid(BOT_ENCRYPTION_KEY), got {other:?}"),
        }
    }

    #[test]
    fn message_ttl_zero_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required();
        unsafe { env::set_var("MESSAGE_TTL", "0") };

        match Config::from_env() {
            Err(ConfigError::Invalid { name: "MESSAGE_TTL", .. }) => {},
            other => panic!("expected Invalid(MESSAGE_TTL), got {other:?}"),
        }
    }

    #[test]
    fn negative_redis_db_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required();
        unsafe { env::set_var("REDIS_DB", "-1") };

        match Config::from_env() {
            Err(ConfigError::Invalid { name: "REDIS_DB", .. }) => {},
            other => panic!("expected Invalid(REDIS_DB), got {other:?}"),
        }
    }

    #[test]
    fn admin_id_parses_when_present() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_all();
        set_required();
        unsafe { env::set_var("ADMIN_ID", "42") };

        let config = Config::from_env().unwrap();
        assert_eq!(config.admin_id, Some(42));
    }
}
