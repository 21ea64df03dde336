//! Schema bootstrap: ordered SQL sources applied in one transaction.
//!
//! DESIGN
//! ======
//! The bootstrapper owns an explicit, ordered list of named sources. `apply`
//! checks out a single connection, opens one transaction, runs each source as
//! a multi-statement batch, and commits. Any failure rolls the transaction
//! back before the error is returned, so a partially applied schema is never
//! visible. The connection goes back to the pool when the `PoolConnection`
//! drops, on every exit path.
//!
//! Order is the contract: the index schema references tables created by the
//! notification schema, so it must run second.

use std::path::{Path, PathBuf};

use sqlx::{Connection, Executor, PgPool};
use tracing::{debug, info, warn};

use super::DbError;

pub const NOTIFICATION_SCHEMA: &str = "notification_schema.sql";
pub const INDEX_SCHEMA: &str = "index_schema.sql";

/// Default bootstrap files, in application order, relative to `dir`.
#[must_use]
pub fn default_schema_files(dir: &Path) -> Vec<(&'static str, PathBuf)> {
    vec![
        ("notification", dir.join(NOTIFICATION_SCHEMA)),
        ("index", dir.join(INDEX_SCHEMA)),
    ]
}

/// One named block of SQL. May contain several statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSource {
    pub name: String,
    pub sql: String,
}

impl SchemaSource {
    #[must_use]
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self { name: name.into(), sql: sql.into() }
    }

    /// Read a source file in full.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::SchemaRead`] if the file cannot be read.
    pub async fn read(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, DbError> {
        let name = name.into();
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(sql) => Ok(Self { name, sql }),
            Err(source) => Err(DbError::SchemaRead { name, path: path.to_path_buf(), source }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaBootstrapper {
    sources: Vec<SchemaSource>,
}

impl SchemaBootstrapper {
    #[must_use]
    pub fn new(sources: Vec<SchemaSource>) -> Self {
        Self { sources }
    }

    /// Read the default notification + index pair from `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::SchemaRead`] for the first file that cannot be read.
    pub async fn load(dir: &Path) -> Result<Self, DbError> {
        let mut sources = Vec::new();
        for (name, path) in default_schema_files(dir) {
            sources.push(SchemaSource::read(name, path).await?);
        }
        Ok(Self::new(sources))
    }

    #[must_use]
    pub fn sources(&self) -> &[SchemaSource] {
        &self.sources
    }

    /// Apply every source, in order, inside a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Bootstrap`] naming the source that failed (or
    /// `begin`/`commit` for transaction-control failures). The transaction
    /// has been rolled back by the time the error is returned.
    pub async fn apply(&self, pool: &PgPool) -> Result<(), DbError> {
        let mut conn = pool.acquire().await.map_err(|e| bootstrap_error("acquire", e))?;
        let mut tx = conn.begin().await.map_err(|e| bootstrap_error("begin", e))?;

        for source in &self.sources {
            debug!(source = %source.name, bytes = source.sql.len(), "applying schema source");
            if let Err(e) = Executor::execute(&mut *tx, sqlx::raw_sql(&source.sql)).await {
                warn!(source = %source.name, error = %e, "schema source failed; rolling back");
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "schema bootstrap rollback failed");
                }
                return Err(bootstrap_error(&source.name, e));
            }
        }

        tx.commit().await.map_err(|e| bootstrap_error("commit", e))?;

        info!(sources = self.sources.len(), "schema bootstrap applied");
        Ok(())
    }
}

fn bootstrap_error(source_name: &str, source: sqlx::Error) -> DbError {
    DbError::Bootstrap { source_name: source_name.to_string(), source }
}

#[cfg(test)]
#[path = "schema_test.rs"]
mod tests;
