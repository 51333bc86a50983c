use std::env;
use std::time::Duration;

/// Error produced while loading [`AppConfig`] from the environment.
#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid { key: &'static str, value: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing required environment variable {key}"),
            ConfigError::Invalid { key, value } => {
                write!(f, "invalid value for {key}: {value:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Postgres pool tuning, mirroring the reference implementation's
/// SQLAlchemy pool knobs so operators migrating an existing deployment
/// keep the same environment variables.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub pool_size: u32,
    pub max_overflow: u32,
    pub recycle: Duration,
    pub timeout: Duration,
    pub pre_ping: bool,
}

impl PoolConfig {
    /// Total number of connections the pool may hand out at once.
    pub fn max_connections(&self) -> u32 {
        self.pool_size + self.max_overflow
    }
}

/// Process-wide configuration, loaded once at boot from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret_key: String,
    pub jwt_algorithm: String,
    pub pool: PoolConfig,
    pub enable_scheduler: bool,
    pub testing: bool,
    pub bind_addr: String,
    pub log_format: LogFormat,
    pub audit_queue_name: String,
    pub audit_drain_interval: Duration,
    pub idp_sync_poll_secs: u64,
}

impl AppConfig {
    /// Load configuration from the process environment, first merging in a
    /// `.env` file if present. Fails fast on a missing required key or a
    /// value that doesn't parse to the expected type.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let database_url = required("DATABASE_URL")?;
        let redis_url = env::var("REDIS_URL").ok().filter(|s| !s.is_empty());
        let jwt_secret_key = required("JWT_SECRET_KEY")?;
        let jwt_algorithm = env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string());

        let pool = PoolConfig {
            pool_size: parse_or_default("POSTGRES_POOL_SIZE", 50)?,
            max_overflow: parse_or_default("POSTGRES_MAX_OVERFLOW", 50)?,
            recycle: Duration::from_secs(parse_or_default("POSTGRES_POOL_RECYCLE", 1800)?),
            timeout: Duration::from_secs(parse_or_default("POSTGRES_POOL_TIMEOUT", 30)?),
            pre_ping: parse_bool_or_default("POSTGRES_POOL_PRE_PING", true)?,
        };

        let enable_scheduler = parse_bool_or_default("ENABLE_SCHEDULER", true)?;
        let testing = parse_bool_or_default("TESTING", false)?;

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let log_format = match env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".into()).as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        let audit_queue_name =
            env::var("AUDIT_QUEUE_NAME").unwrap_or_else(|_| "audit_queue".to_string());
        let audit_drain_interval =
            Duration::from_millis(parse_or_default("AUDIT_DRAIN_INTERVAL_MS", 500)?);
        let idp_sync_poll_secs = parse_or_default("IDP_SYNC_POLL_SECS", 60)?;

        Ok(AppConfig {
            database_url,
            redis_url,
            jwt_secret_key,
            jwt_algorithm,
            pool,
            enable_scheduler: enable_scheduler && !testing,
            testing,
            bind_addr,
            log_format,
            audit_queue_name,
            audit_drain_interval,
            idp_sync_poll_secs,
        })
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::Missing(key))
}

fn parse_or_default<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid { key, value: raw }),
        Err(_) => Ok(default),
    }
}

fn parse_bool_or_default(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Environment variable mutation is process-global; serialize these tests.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "DATABASE_URL",
            "REDIS_URL",
            "JWT_SECRET_KEY",
            "JWT_ALGORITHM",
            "POSTGRES_POOL_SIZE",
            "POSTGRES_MAX_OVERFLOW",
            "POSTGRES_POOL_RECYCLE",
            "POSTGRES_POOL_TIMEOUT",
            "POSTGRES_POOL_PRE_PING",
            "ENABLE_SCHEDULER",
            "TESTING",
            "BIND_ADDR",
            "LOG_FORMAT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn missing_required_key_fails() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn defaults_apply_when_optional_keys_absent() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("DATABASE_URL", "postgres://localhost/authz");
        env::set_var("JWT_SECRET_KEY", "dev-secret");
        let cfg = AppConfig::from_env().unwrap();
        assert_eq!(cfg.jwt_algorithm, "HS256");
        assert_eq!(cfg.pool.pool_size, 50);
        assert_eq!(cfg.pool.max_connections(), 100);
        assert_eq!(cfg.bind_addr, "0.0.0.0:8080");
        assert!(cfg.redis_url.is_none());
    }

    #[test]
    fn non_numeric_pool_size_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("DATABASE_URL", "postgres://localhost/authz");
        env::set_var("JWT_SECRET_KEY", "dev-secret");
        env::set_var("POSTGRES_POOL_SIZE", "not-a-number");
        let err = AppConfig::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "POSTGRES_POOL_SIZE", .. }));
        env::remove_var("POSTGRES_POOL_SIZE");
    }

    #[test]
    fn testing_flag_forces_scheduler_off() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("DATABASE_URL", "postgres://localhost/authz");
        env::set_var("JWT_SECRET_KEY", "dev-secret");
        env::set_var("TESTING", "true");
        env::set_var("ENABLE_SCHEDULER", "true");
        let cfg = AppConfig::from_env().unwrap();
        assert!(cfg.testing);
        assert!(!cfg.enable_scheduler);
    }
}
