//! Local command execution using `tokio::process`

use std::ffi::OsStr;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, error, instrument};

use crate::error::ExecError;
use crate::result::CommandOutcome;

/// Local command executor
///
/// Runs commands on the controlling machine. Used for staging artifacts
/// before transfer and for CLI-backed fleet lookups.
#[derive(Debug, Clone)]
pub struct LocalExecutor;

impl LocalExecutor {
    /// Create a new local executor
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Run a shell command line through `sh -c`
    ///
    /// # Errors
    /// Returns `ExecError::SpawnError` if the shell cannot be started
    #[instrument(skip(self), level = "debug")]
    pub async fn run(&self, cmd: &str) -> Result<CommandOutcome, ExecError> {
        // Use shell to support pipes, redirections, etc.
        let mut command = Command::new("sh");
        command.arg("-c").arg(cmd);
        self.execute(command, cmd).await
    }

    /// Run a program with an explicit argument vector (no shell parsing)
    ///
    /// # Errors
    /// Returns `ExecError::SpawnError` if the program cannot be started
    pub async fn run_program<I, S>(&self, program: &str, args: I) -> Result<CommandOutcome, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(program);
        command.args(args);
        self.execute(command, program).await
    }

    /// Run a program, failing if it outlives `timeout_duration`
    ///
    /// The child is killed when the limit is hit.
    ///
    /// # Errors
    /// Returns `ExecError::Timeout` when the limit is hit, or
    /// `ExecError::SpawnError` if the program cannot be started
    pub async fn run_program_with_timeout<I, S>(
        &self,
        program: &str,
        args: I,
        timeout_duration: Duration,
    ) -> Result<CommandOutcome, ExecError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let start = Instant::now();

        debug!(program = %program, timeout = ?timeout_duration, "executing with timeout");

        match timeout(timeout_duration, self.run_program(program, args)).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    program = %program,
                    timeout = ?timeout_duration,
                    elapsed = ?start.elapsed(),
                    "command timed out"
                );
                Err(ExecError::Timeout {
                    timeout: timeout_duration,
                })
            }
        }
    }

    async fn execute(&self, mut command: Command, label: &str) -> Result<CommandOutcome, ExecError> {
        let start = Instant::now();

        debug!(command = %label, "executing local command");

        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ExecError::SpawnError(format!("{label}: {e}")))?;

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| ExecError::IoError(e.to_string()))?;

        let duration = start.elapsed();
        let status = output.status.code().unwrap_or(crate::result::NO_EXIT_STATUS);
        let outcome = CommandOutcome::new(
            status,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        )
        .with_duration(duration);

        debug!(
            command = %label,
            status = status,
            duration = ?duration,
            "command completed"
        );

        if !outcome.success() {
            error!(
                command = %label,
                status = status,
                stderr = %outcome.stderr,
                "command failed"
            );
        }

        Ok(outcome)
    }
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_success() {
        let executor = LocalExecutor::new();
        let result = executor.run("echo hello").await.unwrap();

        assert!(result.success());
        assert_eq!(result.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_failure() {
        let executor = LocalExecutor::new();
        let result = executor.run("exit 42").await.unwrap();

        assert!(!result.success());
        assert_eq!(result.status, 42);
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let executor = LocalExecutor::new();
        let result = executor
            .run_program_with_timeout("sleep", ["5"], Duration::from_millis(100))
            .await;

        assert!(matches!(result, Err(ExecError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_run_with_stderr() {
        let executor = LocalExecutor::new();
        let result = executor.run("echo error >&2").await.unwrap();

        assert!(result.success());
        assert_eq!(result.stderr.trim(), "error");
    }

    #[tokio::test]
    async fn test_run_program_keeps_arguments_intact() {
        let executor = LocalExecutor::new();
        let result = executor
            .run_program("printf", ["%s", "two words; not a command"])
            .await
            .unwrap();

        assert!(result.success());
        assert_eq!(result.stdout, "two words; not a command");
    }

    #[tokio::test]
    async fn test_run_program_missing_binary() {
        let executor = LocalExecutor::new();
        let result = executor
            .run_program("fanout-definitely-not-installed", ["--version"])
            .await;

        assert!(matches!(result, Err(ExecError::SpawnError(_))));
    }
}
