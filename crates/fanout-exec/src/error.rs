//! Error types for fanout-exec

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to a single host
#[derive(Error, Debug, Clone)]
pub enum ExecError {
    /// Transport-level failure reaching the host
    #[error("connection to {host} failed: {message}")]
    ConnectionFailed {
        /// Host that could not be reached
        host: String,
        /// Underlying transport error
        message: String,
    },

    /// The host rejected the supplied credential
    #[error("authentication failed for {user}@{host}: {message}")]
    AuthenticationFailed {
        /// Host that rejected the login
        host: String,
        /// Login name that was tried
        user: String,
        /// Reason reported by the SSH layer
        message: String,
    },

    /// Connecting and authenticating took longer than allowed
    #[error("connection to {host} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Host that did not answer in time
        host: String,
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Command timed out
    #[error("command timed out after {timeout:?}")]
    Timeout {
        /// Timeout duration that was exceeded
        timeout: Duration,
    },

    /// Process spawn error
    #[error("failed to spawn process: {0}")]
    SpawnError(String),

    /// I/O error during execution
    #[error("I/O error: {0}")]
    IoError(String),

    /// SFTP subsystem error
    #[error("SFTP error: {0}")]
    SftpError(String),

    /// Session used before `connect` or after `disconnect`
    #[error("not connected to {0}")]
    NotConnected(String),
}

impl ExecError {
    /// Whether the error happened while establishing the session
    #[must_use]
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            ExecError::ConnectionFailed { .. }
                | ExecError::AuthenticationFailed { .. }
                | ExecError::ConnectTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_failure_is_connection_failure() {
        let err = ExecError::AuthenticationFailed {
            host: "10.0.0.7".to_string(),
            user: "deploy".to_string(),
            message: "password rejected".to_string(),
        };

        assert!(err.is_connection_failure());
        assert_eq!(
            err.to_string(),
            "authentication failed for deploy@10.0.0.7: password rejected"
        );
    }

    #[test]
    fn test_command_timeout_is_not_connection_failure() {
        let err = ExecError::Timeout {
            timeout: Duration::from_secs(5),
        };

        assert!(!err.is_connection_failure());
    }
}
