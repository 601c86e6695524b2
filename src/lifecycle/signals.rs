//! OS signal handling.
//!
//! SIGINT and SIGTERM both mean "shut down gracefully". No other signal is
//! handled.

use tokio::signal::unix::{signal, Signal, SignalKind};

/// Installed SIGINT/SIGTERM handlers.
///
/// Once installed, a signal is no longer fatal to the process; it is queued
/// until [`Termination::recv`] picks it up.
pub struct Termination {
    interrupt: Signal,
    terminate: Signal,
}

impl Termination {
    pub fn install() -> std::io::Result<Self> {
        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    /// Block until SIGINT or SIGTERM arrives. Returns the signal name.
    pub async fn recv(&mut self) -> &'static str {
        let name = tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        };

        tracing::info!(signal = name, "Shutdown signal received");
        name
    }
}

/// Install handlers and block until SIGINT or SIGTERM arrives.
pub async fn wait_for_termination() -> std::io::Result<&'static str> {
    let mut termination = Termination::install()?;
    Ok(termination.recv().await)
}
