//! Shared `PostgreSQL` pool lifecycle.
//!
//! SYSTEM CONTEXT
//! ==============
//! Startup calls [`PoolManager::initialize`] once to build the pool, verify
//! the backend with `SELECT 1`, and apply the bootstrap schema before anything
//! else touches the database. Request-side code calls [`PoolManager::get`];
//! shutdown calls [`PoolManager::close`].
//!
//! DESIGN
//! ======
//! The manager is an ordinary owned value, shared through `AppState` as an
//! `Arc`. Each instance holds at most one live pool, so tests can run many
//! independent managers side by side.
//!
//! `initialize` and `close` serialize on an async gate. The state/handle slot
//! sits behind a separate std `RwLock` that is only held for short reads and
//! writes, never across an `.await`, so `get` never waits on an in-flight
//! initialization; it just reports that the pool is not ready yet. Being
//! synchronous also lets the initialization guard reset the slot from `Drop`
//! when a caller abandons `initialize` midway.
//!
//! Startup failures are returned, not acted on. The binary's `main` decides
//! to exit.

pub mod config;
pub mod error;
pub mod schema;

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::Mutex;
use tracing::{error, info};

pub use config::DbConfig;
pub use error::DbError;
pub use schema::{SchemaBootstrapper, SchemaSource};

// =============================================================================
// LIFECYCLE STATE
// =============================================================================

/// `Uninitialized -> Initializing -> Ready -> Closed -> Uninitialized`.
/// A failed initialization drops straight back to `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    Ready,
    /// Draining; the handle is no longer handed out.
    Closed,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Ready => "ready",
            Self::Closed => "closed",
        })
    }
}

struct Slot {
    state: LifecycleState,
    /// `Some` only while `Ready`. A stored pool has passed its health check.
    pool: Option<PgPool>,
    /// Number of pools this manager has brought to `Ready`.
    generation: u64,
}

// =============================================================================
// POOL MANAGER
// =============================================================================

pub struct PoolManager {
    config: DbConfig,
    bootstrapper: SchemaBootstrapper,
    gate: Mutex<()>,
    /// Never held across an `.await`.
    slot: RwLock<Slot>,
}

impl PoolManager {
    #[must_use]
    pub fn new(config: DbConfig, bootstrapper: SchemaBootstrapper) -> Self {
        Self {
            config,
            bootstrapper,
            gate: Mutex::new(()),
            slot: RwLock::new(Slot { state: LifecycleState::Uninitialized, pool: None, generation: 0 }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.read_slot().state
    }

    /// Build, verify, and bootstrap the pool. Returns the existing handle
    /// without side effects when already `Ready`, including for callers that
    /// raced an initialization in progress.
    ///
    /// Dropping the returned future mid-build leaves the manager
    /// `Uninitialized`.
    ///
    /// # Errors
    ///
    /// Returns a fatal [`DbError`] when the health check or the schema
    /// bootstrap fails. The manager is left `Uninitialized` with no pool.
    pub async fn initialize(&self) -> Result<PgPool, DbError> {
        if let Some(pool) = self.ready_pool() {
            return Ok(pool);
        }

        let _gate = self.gate.lock().await;
        if let Some(pool) = self.ready_pool() {
            return Ok(pool);
        }

        let guard = InitGuard::begin(&self.slot);

        match self.build_verified_pool().await {
            Ok(pool) => {
                let generation = guard.finish(pool.clone());
                info!(
                    host = %self.config.host,
                    port = self.config.port,
                    database = self.config.database.as_deref().unwrap_or("<default>"),
                    max_connections = self.config.max_connections,
                    generation,
                    "PostgreSQL pool initialized"
                );
                Ok(pool)
            }
            Err(e) => {
                error!(
                    code = e.error_code(),
                    error = %e,
                    detail = ?e,
                    "failed to initialize PostgreSQL pool"
                );
                drop(guard);
                Err(e)
            }
        }
    }

    /// Current pool handle. Re-fetch after a `close`; do not cache.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::NotInitialized`] unless the manager is `Ready`.
    pub fn get(&self) -> Result<PgPool, DbError> {
        let slot = self.read_slot();
        match (&slot.pool, slot.state) {
            (Some(pool), LifecycleState::Ready) => Ok(pool.clone()),
            (_, state) => Err(DbError::NotInitialized { state }),
        }
    }

    /// Drain and close the pool, then return to `Uninitialized`. No-op when
    /// not `Ready`. Never fails; a drain that overruns `close_timeout` is
    /// logged and abandoned.
    pub async fn close(&self) {
        let _gate = self.gate.lock().await;

        let pool = {
            let mut slot = self.write_slot();
            if slot.state != LifecycleState::Ready {
                return;
            }
            slot.state = LifecycleState::Closed;
            slot.pool.take()
        };

        if let Some(pool) = pool {
            if drain(&pool, self.config.close_timeout).await {
                info!("PostgreSQL pool closed");
            }
        }

        self.write_slot().state = LifecycleState::Uninitialized;
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Slot> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Slot> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ready_pool(&self) -> Option<PgPool> {
        let slot = self.read_slot();
        match slot.state {
            LifecycleState::Ready => slot.pool.clone(),
            _ => None,
        }
    }

    async fn build_verified_pool(&self) -> Result<PgPool, DbError> {
        let pool = self.config.pool_options().connect_lazy_with(self.config.connect_options());

        let verified = match health_check(&pool, self.config.connect_timeout).await {
            Ok(()) => self.bootstrapper.apply(&pool).await,
            Err(e) => Err(e),
        };

        if let Err(e) = verified {
            drain(&pool, self.config.close_timeout).await;
            return Err(e);
        }
        Ok(pool)
    }

    #[cfg(test)]
    fn generation(&self) -> u64 {
        self.read_slot().generation
    }
}

/// Holds the slot in `Initializing` for the duration of one build. Unless
/// `finish` is called, dropping it (error return or a cancelled future)
/// puts the slot back to `Uninitialized`.
struct InitGuard<'a> {
    slot: &'a RwLock<Slot>,
    armed: bool,
}

impl<'a> InitGuard<'a> {
    fn begin(slot: &'a RwLock<Slot>) -> Self {
        slot.write().unwrap_or_else(PoisonError::into_inner).state = LifecycleState::Initializing;
        Self { slot, armed: true }
    }

    /// Publish the verified pool and move to `Ready`. Returns the new generation.
    fn finish(mut self, pool: PgPool) -> u64 {
        self.armed = false;
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.pool = Some(pool);
        slot.state = LifecycleState::Ready;
        slot.generation += 1;
        slot.generation
    }
}

impl Drop for InitGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        if slot.state == LifecycleState::Initializing {
            slot.state = LifecycleState::Uninitialized;
            slot.pool = None;
        }
    }
}

async fn health_check(pool: &PgPool, limit: Duration) -> Result<(), DbError> {
    match tokio::time::timeout(limit, sqlx::query("SELECT 1").execute(pool)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(DbError::HealthCheck(e)),
        Err(_) => Err(DbError::HealthCheckTimeout(limit)),
    }
}

/// Returns false if draining did not finish within `limit`.
async fn drain(pool: &PgPool, limit: Duration) -> bool {
    if tokio::time::timeout(limit, pool.close()).await.is_ok() {
        return true;
    }
    error!(
        timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
        "timed out closing PostgreSQL pool; abandoning remaining connections"
    );
    false
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
