//! Error types for fanout-fleet

use thiserror::Error;

/// Errors that can occur while resolving a fleet group
#[derive(Error, Debug, Clone)]
pub enum FleetError {
    /// The lookup tool is not installed on the controlling machine
    #[error("fleet lookup tool not found: {0}")]
    ToolNotFound(String),

    /// The named group does not exist
    #[error("fleet group '{0}' not found")]
    GroupNotFound(String),

    /// The lookup command exited non-zero
    #[error("fleet API call failed: {status} - {message}")]
    CommandFailed {
        /// Exit status
        status: i32,
        /// Error message
        message: String,
    },

    /// Failed to parse the API reply
    #[error("JSON parse error: {0}")]
    ParseError(String),

    /// Lookup timeout
    #[error("fleet lookup timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Local execution error
    #[error("execution error: {0}")]
    ExecutionError(String),
}

impl FleetError {
    /// Check if the failure is caused by the local environment rather than the fleet
    #[must_use]
    pub fn needs_installation(&self) -> bool {
        matches!(self, FleetError::ToolNotFound(_))
    }
}
