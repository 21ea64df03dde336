//! Lifecycle management for a process-wide `PostgreSQL` pool: one verified
//! initialization, transactional schema bootstrap, and graceful shutdown.

pub mod db;
pub mod shutdown;
pub mod state;
