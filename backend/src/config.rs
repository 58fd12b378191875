//! Process configuration.
//!
//! Read once at startup from environment variables and passed by reference
//! to whatever needs it. Values that fail to parse fall back to their
//! documented defaults; only settings with no sensible fallback are errors.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid STORAGE_BACKEND: {0} (expected postgres, redis or memory)")]
    InvalidStorageBackend(String),

    #[error("invalid listen address: {0}")]
    InvalidAddress(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub address: SocketAddr,
    pub environment: String,
    pub request_timeout: Duration,
    pub shutdown_timeout: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackend {
    #[default]
    Postgres,
    Redis,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::Postgres),
            "redis" => Ok(Self::Redis),
            "memory" | "in_memory" | "inmemory" => Ok(Self::Memory),
            _ => Err(ConfigError::InvalidStorageBackend(value.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub redis_url: String,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub ssl_mode: String,
    pub max_open_conns: u32,
    pub max_idle_conns: u32,
    pub conn_max_lifetime: Duration,
    pub conn_max_idle_time: Duration,
    pub query_timeout: Duration,
    pub run_migrations: bool,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("name", &self.name)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_open_conns", &self.max_open_conns)
            .field("max_idle_conns", &self.max_idle_conns)
            .field("conn_max_lifetime", &self.conn_max_lifetime)
            .field("conn_max_idle_time", &self.conn_max_idle_time)
            .field("query_timeout", &self.query_timeout)
            .field("run_migrations", &self.run_migrations)
            .finish()
    }
}

/// Cross-origin policy. Every list is kept in configured order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    Console,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogTimeFormat {
    Unix,
    UnixMs,
    UnixMicro,
    #[default]
    Rfc3339,
    Rfc3339Nano,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub time_format: LogTimeFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                address: SocketAddr::from(([0, 0, 0, 0], 8080)),
                environment: "development".to_string(),
                request_timeout: Duration::from_secs(60),
                shutdown_timeout: Duration::from_secs(30),
            },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                redis_url: "redis://127.0.0.1:6379".to_string(),
            },
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "postgres".to_string(),
                name: "multi_tier_db".to_string(),
                ssl_mode: "disable".to_string(),
                max_open_conns: 25,
                max_idle_conns: 5,
                conn_max_lifetime: Duration::from_secs(5 * 60),
                conn_max_idle_time: Duration::from_secs(10 * 60),
                query_timeout: Duration::from_secs(5),
                run_migrations: true,
            },
            cors: CorsConfig {
                allowed_origins: strings(&["*"]),
                allowed_methods: strings(&["GET", "POST", "PUT", "DELETE", "OPTIONS"]),
                allowed_headers: strings(&["Accept", "Authorization", "Content-Type", "X-Request-ID"]),
                exposed_headers: strings(&["X-Request-ID"]),
                allow_credentials: false,
                max_age: 300,
            },
            log: LogConfig {
                level: "info".to_string(),
                format: LogFormat::Json,
                time_format: LogTimeFormat::Rfc3339,
            },
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    ///
    /// Outside production a `.env` file is read first.
    pub fn from_env() -> Result<Self, ConfigError> {
        if env::var("ENVIRONMENT").as_deref() != Ok("production") {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let source = Source(lookup);
        let defaults = Self::default();

        let server = ServerConfig {
            address: match source.non_empty("PORT") {
                Some(port) => parse_address(&port)?,
                None => defaults.server.address,
            },
            environment: source.string("ENVIRONMENT", defaults.server.environment),
            request_timeout: source.timeout("REQUEST_TIMEOUT", defaults.server.request_timeout),
            shutdown_timeout: source.duration("SHUTDOWN_TIMEOUT", defaults.server.shutdown_timeout),
        };

        let storage = StorageConfig {
            backend: match source.non_empty("STORAGE_BACKEND") {
                Some(value) => value.parse()?,
                None => defaults.storage.backend,
            },
            redis_url: source.string("REDIS_URL", defaults.storage.redis_url),
        };

        let database = DatabaseConfig {
            host: source.string("DB_HOST", defaults.database.host),
            port: source.parsed("DB_PORT", defaults.database.port),
            user: source.string("DB_USER", defaults.database.user),
            password: source.string("DB_PASSWORD", defaults.database.password),
            name: source.string("DB_NAME", defaults.database.name),
            ssl_mode: source.string("DB_SSLMODE", defaults.database.ssl_mode),
            max_open_conns: source.parsed("DB_MAX_OPEN_CONNS", defaults.database.max_open_conns),
            max_idle_conns: source.parsed("DB_MAX_IDLE_CONNS", defaults.database.max_idle_conns),
            conn_max_lifetime: source
                .duration("DB_CONN_MAX_LIFETIME", defaults.database.conn_max_lifetime),
            conn_max_idle_time: source
                .duration("DB_CONN_MAX_IDLE_TIME", defaults.database.conn_max_idle_time),
            query_timeout: source.timeout("DB_QUERY_TIMEOUT", defaults.database.query_timeout),
            run_migrations: source.boolean("DB_RUN_MIGRATIONS", defaults.database.run_migrations),
        };

        let cors = CorsConfig {
            allowed_origins: source.list("CORS_ALLOWED_ORIGINS", defaults.cors.allowed_origins),
            allowed_methods: source.list("CORS_ALLOWED_METHODS", defaults.cors.allowed_methods),
            allowed_headers: source.list("CORS_ALLOWED_HEADERS", defaults.cors.allowed_headers),
            exposed_headers: source.list("CORS_EXPOSED_HEADERS", defaults.cors.exposed_headers),
            allow_credentials: source
                .boolean("CORS_ALLOW_CREDENTIALS", defaults.cors.allow_credentials),
            max_age: source.parsed("CORS_MAX_AGE", defaults.cors.max_age),
        };

        let log = LogConfig {
            level: source.string("LOG_LEVEL", defaults.log.level),
            format: match source.non_empty("LOG_FORMAT").as_deref() {
                Some("console") => LogFormat::Console,
                _ => LogFormat::Json,
            },
            time_format: match source.non_empty("LOG_TIME_FORMAT").as_deref() {
                Some("unix") => LogTimeFormat::Unix,
                Some("unixms") => LogTimeFormat::UnixMs,
                Some("unixmicro") => LogTimeFormat::UnixMicro,
                Some("rfc3339nano") => LogTimeFormat::Rfc3339Nano,
                _ => LogTimeFormat::Rfc3339,
            },
        };

        Ok(Self {
            server,
            storage,
            database,
            cors,
            log,
        })
    }

    pub fn is_production(&self) -> bool {
        self.server.environment == "production"
    }
}

struct Source<F>(F);

impl<F> Source<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn non_empty(&self, key: &str) -> Option<String> {
        self.get(key).filter(|value| !value.trim().is_empty())
    }

    /// Present values win even when empty, like a plain environment lookup.
    fn string(&self, key: &str, default: String) -> String {
        self.get(key).unwrap_or(default)
    }

    fn parsed<T: FromStr>(&self, key: &str, default: T) -> T {
        self.non_empty(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    fn boolean(&self, key: &str, default: bool) -> bool {
        self.non_empty(key)
            .and_then(|value| parse_bool(&value))
            .unwrap_or(default)
    }

    fn duration(&self, key: &str, default: Duration) -> Duration {
        self.non_empty(key)
            .and_then(|value| parse_duration(&value))
            .unwrap_or(default)
    }

    /// Like [`Source::duration`], but zero falls back to the default.
    fn timeout(&self, key: &str, default: Duration) -> Duration {
        Some(self.duration(key, default))
            .filter(|value| !value.is_zero())
            .unwrap_or(default)
    }

    fn list(&self, key: &str, default: Vec<String>) -> Vec<String> {
        let items: Vec<String> = self
            .non_empty(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if items.is_empty() {
            default
        } else {
            items
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

/// Accepts `:8080`, `8080` or a full `host:port`.
fn parse_address(value: &str) -> Result<SocketAddr, ConfigError> {
    let value = value.trim();
    let candidate = if let Some(port) = value.strip_prefix(':') {
        format!("0.0.0.0:{port}")
    } else if value.chars().all(|c| c.is_ascii_digit()) {
        format!("0.0.0.0:{value}")
    } else {
        value.to_string()
    };

    candidate
        .parse()
        .map_err(|_| ConfigError::InvalidAddress(value.to_string()))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Parses Go-style durations such as `300ms`, `1.5s`, `5m` or `1h30m`.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if value == "0" {
        return Some(Duration::ZERO);
    }

    let mut rest = value;
    let mut nanos = 0f64;
    while !rest.is_empty() {
        let number_end = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_end == 0 {
            return None;
        }
        let amount: f64 = rest[..number_end].parse().ok()?;
        rest = &rest[number_end..];

        let unit_end = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let nanos_per_unit = match &rest[..unit_end] {
            "ns" => 1.0,
            "us" | "µs" => 1e3,
            "ms" => 1e6,
            "s" => 1e9,
            "m" => 60e9,
            "h" => 3600e9,
            _ => return None,
        };
        rest = &rest[unit_end..];
        nanos += amount * nanos_per_unit;
    }

    if !nanos.is_finite() || nanos >= u64::MAX as f64 {
        return None;
    }
    Some(Duration::from_nanos(nanos.round() as u64))
}
