//! Shutdown signal handling.
//!
//! SIGINT and SIGTERM (Ctrl-C on Windows) both request shutdown. The daemon
//! drains on the first one and exits immediately on the second.

use std::fmt;
use std::io;

use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalType {
    Interrupt,
    Terminate,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::Interrupt => write!(f, "SIGINT"),
            SignalType::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Listener for shutdown signals, installed once per process.
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};
        debug!("Installing shutdown signal handlers");
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        debug!("Installing shutdown signal handlers");
        Ok(Self {})
    }

    /// Wait for the next shutdown signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> SignalType {
        let signal = tokio::select! {
            _ = self.interrupt.recv() => SignalType::Interrupt,
            _ = self.terminate.recv() => SignalType::Terminate,
        };
        debug!(signal = %signal, "Received signal");
        signal
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> SignalType {
        let _ = tokio::signal::ctrl_c().await;
        SignalType::Interrupt
    }
}

impl fmt::Debug for ShutdownSignals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownSignals").finish_non_exhaustive()
    }
}
