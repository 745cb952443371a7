//! Result types for command execution

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Exit status used when the command never produced one
pub const NO_EXIT_STATUS: i32 = -1;

/// Result of a command execution
///
/// Success is derived from the exit status, so an outcome can never claim
/// success with a non-zero status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Exit status code (0 for success)
    pub status: i32,
    /// stdout output
    pub stdout: String,
    /// stderr output
    pub stderr: String,
    /// Time taken to execute
    #[serde(default)]
    pub duration: Duration,
}

impl CommandOutcome {
    /// Create an outcome from captured streams
    pub fn new(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
            duration: Duration::ZERO,
        }
    }

    /// Outcome for a protocol-level failure (no remote exit status)
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(NO_EXIT_STATUS, String::new(), message)
    }

    /// Set the measured duration
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Check if command succeeded (exit code 0)
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Connection information for SSH
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionInfo {
    /// Host address
    pub host: String,
    /// Port (default 22)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username
    pub user: String,
}

fn default_port() -> u16 {
    22
}

impl ConnectionInfo {
    /// Create new connection info
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            user: user.into(),
        }
    }

    /// Set custom port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// `user@host:port` form used in log messages and prompts
    #[must_use]
    pub fn display_target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_follows_status() {
        assert!(CommandOutcome::new(0, "ok", "").success());
        assert!(!CommandOutcome::new(3, "", "boom").success());
    }

    #[test]
    fn test_failure_outcome() {
        let outcome = CommandOutcome::failure("SSH execution error: channel closed");

        assert_eq!(outcome.status, NO_EXIT_STATUS);
        assert!(!outcome.success());
        assert!(outcome.stdout.is_empty());
        assert_eq!(outcome.stderr, "SSH execution error: channel closed");
    }

    #[test]
    fn test_connection_info_defaults() {
        let info = ConnectionInfo::new("web-1", "deploy");
        assert_eq!(info.port, 22);
        assert_eq!(info.display_target(), "deploy@web-1:22");
        assert_eq!(info.with_port(2222).port, 2222);
    }
}
