//! Shutdown signal handling for the listener binary

use std::io;

use tokio::signal::unix::{signal, SignalKind};
use tracing::debug;

/// Signal that ended the process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// SIGTERM
    Terminate,
    /// SIGINT
    Interrupt,
}

impl std::fmt::Display for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Shutdown::Terminate => write!(f, "SIGTERM"),
            Shutdown::Interrupt => write!(f, "SIGINT"),
        }
    }
}

/// Wait until SIGTERM or SIGINT arrives
pub async fn wait_for_shutdown() -> io::Result<Shutdown> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let received = tokio::select! {
        _ = sigterm.recv() => Shutdown::Terminate,
        _ = sigint.recv() => Shutdown::Interrupt,
    };
    debug!(signal = %received, "shutdown signal received");
    Ok(received)
}
