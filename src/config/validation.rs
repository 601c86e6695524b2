//! Boot-time configuration checks.
//!
//! The loader only guarantees the file parsed. The orchestrator calls
//! [`validate_server`] before building anything.

use crate::config::schema::ServerConfig;

/// A semantic problem with the server config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("config.project_name is empty")]
    MissingProjectName,
}

/// Check the fields the orchestrator cannot run without.
pub fn validate_server(config: &ServerConfig) -> Result<(), ValidationError> {
    if config.project_name.trim().is_empty() {
        return Err(ValidationError::MissingProjectName);
    }
    Ok(())
}
