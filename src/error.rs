//! Boot-time error type.
//!
//! Everything that can go wrong while constructing or tearing down the
//! process surfaces as a [`BootError`]. Only `main` turns one into an exit
//! code; library code propagates with `?`.

use crate::config::{ConfigError, ValidationError};
use crate::discovery::DiscoveryError;
use crate::net::ListenerError;

#[derive(Debug, thiserror::Error)]
pub enum BootError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to initialise logging: {0}")]
    Logging(#[source] std::io::Error),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("before-start hook failed: {0}")]
    Hook(#[source] anyhow::Error),

    #[error("failed to install signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    #[error("application already {0}")]
    InvalidState(&'static str),
}

impl BootError {
    /// True when the error came from a missing `project_name`.
    pub fn is_missing_project_name(&self) -> bool {
        matches!(self, BootError::Validation(ValidationError::MissingProjectName))
    }
}
