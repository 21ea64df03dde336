//! Connection and pool-tuning settings parsed from environment variables.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

pub const DEFAULT_PGDB_HOST: &str = "localhost";
pub const DEFAULT_PGDB_PORT: u16 = 5432;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 20;
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_CLOSE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_SCHEMA_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/db/schema");

#[derive(Clone, PartialEq, Eq)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
    pub max_connections: u32,
    /// Idle connections older than this are evicted.
    pub idle_timeout: Duration,
    /// Bounds connection acquisition and the startup health check.
    pub connect_timeout: Duration,
    /// Bounds pool draining on shutdown.
    pub close_timeout: Duration,
    /// Exit once startup completes instead of waiting for a shutdown signal.
    pub exit_on_idle: bool,
    pub schema_dir: PathBuf,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PGDB_HOST.to_string(),
            port: DEFAULT_PGDB_PORT,
            user: None,
            password: None,
            database: None,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            close_timeout: Duration::from_millis(DEFAULT_CLOSE_TIMEOUT_MS),
            exit_on_idle: false,
            schema_dir: PathBuf::from(DEFAULT_SCHEMA_DIR),
        }
    }
}

impl DbConfig {
    /// Build config from environment variables. Every value is optional;
    /// missing or unparseable values fall back to the defaults.
    ///
    /// - `PGDB_HOST`, `PGDB_PORT`, `PGDB_USER`, `PGDB_PASSWORD`, `PGDB_DATABASE`
    /// - `PGDB_MAX_CONNECTIONS`: default 20
    /// - `PGDB_IDLE_TIMEOUT_MS`: default 30000
    /// - `PGDB_CONNECT_TIMEOUT_MS`: default 2000
    /// - `PGDB_CLOSE_TIMEOUT_MS`: default 5000
    /// - `PGDB_EXIT_ON_IDLE`: `true`/`false`, default false
    /// - `PGDB_SCHEMA_DIR`: directory holding the bootstrap schema files
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: env_non_empty("PGDB_HOST").unwrap_or(defaults.host),
            port: env_parse("PGDB_PORT", DEFAULT_PGDB_PORT),
            user: env_non_empty("PGDB_USER"),
            password: env_non_empty("PGDB_PASSWORD"),
            database: env_non_empty("PGDB_DATABASE"),
            max_connections: env_parse("PGDB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS),
            idle_timeout: Duration::from_millis(env_parse("PGDB_IDLE_TIMEOUT_MS", DEFAULT_IDLE_TIMEOUT_MS)),
            connect_timeout: Duration::from_millis(env_parse("PGDB_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)),
            close_timeout: Duration::from_millis(env_parse("PGDB_CLOSE_TIMEOUT_MS", DEFAULT_CLOSE_TIMEOUT_MS)),
            exit_on_idle: env_parse("PGDB_EXIT_ON_IDLE", false),
            schema_dir: env_non_empty("PGDB_SCHEMA_DIR").map_or(defaults.schema_dir, PathBuf::from),
        }
    }

    /// Connection target. Unset user/password/database fall through to the
    /// driver's libpq-style defaults (`PGUSER`, `PGDATABASE`, ...).
    #[must_use]
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut opts = PgConnectOptions::new().host(&self.host).port(self.port);
        if let Some(user) = &self.user {
            opts = opts.username(user);
        }
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        if let Some(database) = &self.database {
            opts = opts.database(database);
        }
        opts
    }

    #[must_use]
    pub fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .min_connections(0)
            .idle_timeout(self.idle_timeout)
            .acquire_timeout(self.connect_timeout)
    }
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("database", &self.database)
            .field("max_connections", &self.max_connections)
            .field("idle_timeout", &self.idle_timeout)
            .field("connect_timeout", &self.connect_timeout)
            .field("close_timeout", &self.close_timeout)
            .field("exit_on_idle", &self.exit_on_idle)
            .field("schema_dir", &self.schema_dir)
            .finish()
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
