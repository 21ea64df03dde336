//! Database lifecycle errors.
//!
//! Three classes share one enum. Startup failures (health check, schema
//! read, schema bootstrap) are fatal and are escalated to `main`, which
//! decides to exit. Calling `get` before a successful `initialize` is a
//! programmer error. Shutdown problems never surface here; `close` logs and
//! swallows them.

use std::path::PathBuf;
use std::time::Duration;

use super::LifecycleState;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `get` was called while no verified pool is available.
    #[error("database not initialized (state: {state}); call initialize() first")]
    NotInitialized { state: LifecycleState },

    /// The `SELECT 1` probe failed, usually because the backend is unreachable.
    #[error("database health check failed: {0}")]
    HealthCheck(#[source] sqlx::Error),

    /// The `SELECT 1` probe did not finish in time.
    #[error("database health check timed out after {}ms", .0.as_millis())]
    HealthCheckTimeout(Duration),

    /// A schema file could not be read.
    #[error("failed to read schema source {name} from {}: {source}", path.display())]
    SchemaRead {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A schema source failed to apply; the bootstrap transaction was rolled back.
    #[error("schema bootstrap failed at {source_name}: {source}")]
    Bootstrap {
        source_name: String,
        #[source]
        source: sqlx::Error,
    },
}

impl DbError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotInitialized { .. } => "E_DB_NOT_INITIALIZED",
            Self::HealthCheck(_) => "E_DB_HEALTH_CHECK",
            Self::HealthCheckTimeout(_) => "E_DB_HEALTH_CHECK_TIMEOUT",
            Self::SchemaRead { .. } => "E_SCHEMA_READ",
            Self::Bootstrap { .. } => "E_SCHEMA_BOOTSTRAP",
        }
    }

    /// Whether the process should stop rather than keep serving.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::NotInitialized { .. })
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
