//! Remote session trait

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ExecError;
use crate::result::CommandOutcome;
use crate::secret::Secret;

/// One authenticated channel to one host
///
/// `run_command` and `upload_file` only return `Err` for misuse
/// (`ExecError::NotConnected`); remote and transfer failures are reported
/// through the returned value.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Host this session talks to
    fn host(&self) -> &str;

    /// Establish the channel; a no-op when already connected
    async fn connect(&self, secret: &Secret) -> Result<(), ExecError>;

    /// Run a command and capture its exit status and output streams
    async fn run_command(
        &self,
        cmd: &str,
        timeout: Option<Duration>,
    ) -> Result<CommandOutcome, ExecError>;

    /// Copy a local file to `remote_path`, returning whether it succeeded
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<bool, ExecError>;

    /// Release the channel; safe to call repeatedly
    async fn disconnect(&self) -> Result<(), ExecError>;

    fn is_connected(&self) -> bool;
}
