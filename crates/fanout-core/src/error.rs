//! Core error types for fanout-core

use fanout_exec::ExecError;
use fanout_fleet::FleetError;
use thiserror::Error;

use crate::credential::CredentialError;

/// Errors raised by the engine
///
/// Configuration, fleet and credential errors abort the whole invocation.
/// The remaining variants only occur inside a per-host unit and end up as
/// that host's error description.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    /// Bad or missing host selection, or other invalid settings
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Fleet group could not be resolved
    #[error("fleet resolution failed: {0}")]
    FleetError(#[from] FleetError),

    /// Shared credential could not be obtained
    #[error("credential error: {0}")]
    CredentialError(#[from] CredentialError),

    /// Session-level failure on one host
    #[error("{0}")]
    SshError(#[from] ExecError),

    /// Local packaging step failed
    #[error("staging failed: {0}")]
    StagingError(String),
}

impl CoreError {
    /// Whether the error aborts the invocation instead of failing one host
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CoreError::ConfigError(_) | CoreError::FleetError(_) | CoreError::CredentialError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(CoreError::ConfigError("no hosts".into()).is_fatal());
        assert!(CoreError::from(CredentialError::Empty).is_fatal());
        assert!(CoreError::from(FleetError::GroupNotFound("web".into())).is_fatal());
        assert!(!CoreError::StagingError("tar missing".into()).is_fatal());
        assert!(!CoreError::from(ExecError::NotConnected("web-1".into())).is_fatal());
    }
}
