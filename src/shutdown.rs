//! Process shutdown signals: Ctrl+C everywhere, SIGTERM on unix.

use std::io;

use tracing::{info, warn};

/// The signal that ended [`ShutdownListener::wait`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
}

pub struct ShutdownListener {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownListener {
    /// Register the SIGTERM handler now, so a signal sent before `wait` is
    /// polled is still observed.
    ///
    /// # Errors
    ///
    /// Returns an error if the signal handler cannot be registered.
    pub fn install() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?,
        })
    }

    /// Wait for Ctrl+C or SIGTERM, whichever comes first.
    #[cfg_attr(not(unix), allow(unused_mut))]
    pub async fn wait(mut self) -> ShutdownSignal {
        let interrupt = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            self.terminate.recv().await;
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            () = interrupt => {
                info!("received Ctrl+C, starting shutdown");
                ShutdownSignal::Interrupt
            }
            () = terminate => {
                info!("received SIGTERM, starting shutdown");
                ShutdownSignal::Terminate
            }
        }
    }
}

#[cfg(test)]
#[path = "shutdown_test.rs"]
mod tests;
