use std::process::ExitCode;

use pgpool_lifecycle::db::{DbConfig, PoolManager, SchemaBootstrapper};
use pgpool_lifecycle::shutdown::ShutdownListener;
use pgpool_lifecycle::state::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = DbConfig::from_env();
    tracing::debug!(?config, "database config loaded");

    let bootstrapper = match SchemaBootstrapper::load(&config.schema_dir).await {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(code = e.error_code(), error = %e, "failed to load bootstrap schema");
            return ExitCode::FAILURE;
        }
    };

    let state = AppState::new(PoolManager::new(config, bootstrapper));

    // A server without its database is useless; fatal startup errors end the process.
    if let Err(e) = state.db.initialize().await {
        if e.is_fatal() {
            tracing::error!(code = e.error_code(), "database startup failed; exiting");
            return ExitCode::FAILURE;
        }
        tracing::warn!(code = e.error_code(), error = %e, "database startup reported a non-fatal error");
    }

    if state.db.config().exit_on_idle {
        tracing::info!("PGDB_EXIT_ON_IDLE set; shutting down after startup");
    } else {
        match ShutdownListener::install() {
            Ok(listener) => {
                listener.wait().await;
            }
            Err(e) => tracing::warn!(error = %e, "failed to install shutdown signal handlers"),
        }
    }

    state.db.close().await;
    ExitCode::SUCCESS
}
