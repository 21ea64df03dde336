//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is the handle other components receive. It carries the pool
//! manager rather than a pool, so consumers always re-fetch through
//! [`AppState::pool`] and never hold a handle across a close/re-initialize.
//! Clone is cheap; the manager is Arc-wrapped.

use std::sync::Arc;

use sqlx::PgPool;

use crate::db::{DbError, PoolManager};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<PoolManager>,
}

impl AppState {
    #[must_use]
    pub fn new(db: PoolManager) -> Self {
        Self { db: Arc::new(db) }
    }

    /// Current pool for issuing queries.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotInitialized`] before startup has completed or
    /// after shutdown.
    pub fn pool(&self) -> Result<PgPool, DbError> {
        self.db.get()
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
