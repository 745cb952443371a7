//! SSH sessions using the russh crate

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use russh::keys::ssh_key;
use russh::{ChannelMsg, Disconnect, client};
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::OpenFlags;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ExecError;
use crate::result::{CommandOutcome, ConnectionInfo};
use crate::secret::Secret;
use crate::traits::RemoteSession;

/// SSH client handler for russh
#[derive(Debug)]
struct SshClientHandler;

impl client::Handler for SshClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &ssh_key::PublicKey,
    ) -> Result<bool, Self::Error> {
        // Unknown host keys are accepted and not persisted
        Ok(true)
    }
}

type Handle = client::Handle<SshClientHandler>;

/// Password-authenticated SSH session to a single host
///
/// The same timeout bounds connecting, each command and each transfer.
pub struct SshSession {
    /// Connection configuration
    conn_info: ConnectionInfo,
    /// Per-operation time limit
    timeout: Option<Duration>,
    /// SSH session (set by `connect`)
    session: Mutex<Option<Handle>>,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession")
            .field("conn_info", &self.conn_info)
            .field("timeout", &self.timeout)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl SshSession {
    /// Create a disconnected session
    #[must_use]
    pub fn new(conn_info: ConnectionInfo) -> Self {
        Self {
            conn_info,
            timeout: None,
            session: Mutex::new(None),
        }
    }

    /// Bound connect, command and transfer time
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Get connection info
    pub fn connection_info(&self) -> &ConnectionInfo {
        &self.conn_info
    }

    fn connection_failed(&self, e: impl std::fmt::Display) -> ExecError {
        ExecError::ConnectionFailed {
            host: self.conn_info.host.clone(),
            message: e.to_string(),
        }
    }

    /// Open the transport and authenticate with the password
    async fn establish(&self, secret: &Secret) -> Result<Handle, ExecError> {
        let config = Arc::new(client::Config::default());

        let mut session = client::connect(
            config,
            (&self.conn_info.host[..], self.conn_info.port),
            SshClientHandler,
        )
        .await
        .map_err(|e| self.connection_failed(e))?;

        let auth_res = session
            .authenticate_password(&self.conn_info.user, secret.expose())
            .await
            .map_err(|e| ExecError::AuthenticationFailed {
                host: self.conn_info.host.clone(),
                user: self.conn_info.user.clone(),
                message: e.to_string(),
            })?;

        if !auth_res.success() {
            return Err(ExecError::AuthenticationFailed {
                host: self.conn_info.host.clone(),
                user: self.conn_info.user.clone(),
                message: "password authentication rejected".to_string(),
            });
        }

        Ok(session)
    }
}

/// Run one command on an open session and collect its output
async fn exec_on_channel(session: &Handle, cmd: &str) -> Result<CommandOutcome, russh::Error> {
    let start = Instant::now();

    let mut channel = session.channel_open_session().await?;
    channel.exec(true, cmd).await?;
    // Nothing is ever written to stdin
    channel.eof().await?;

    let mut status = crate::result::NO_EXIT_STATUS;
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();

    // Exit status may arrive after EOF, so drain until the channel closes
    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { data } => {
                stdout.extend_from_slice(&data);
            }
            ChannelMsg::ExtendedData { data, ext } => {
                if ext == 1 {
                    stderr.extend_from_slice(&data);
                }
            }
            ChannelMsg::ExitStatus { exit_status } => {
                status = exit_status.cast_signed();
            }
            _ => {}
        }
    }

    Ok(CommandOutcome::new(
        status,
        String::from_utf8_lossy(&stdout),
        String::from_utf8_lossy(&stderr),
    )
    .with_duration(start.elapsed()))
}

/// Stream a local file to the remote path over SFTP
async fn sftp_put(session: &Handle, local_path: &Path, remote_path: &str) -> Result<(), ExecError> {
    let channel = session
        .channel_open_session()
        .await
        .map_err(|e| ExecError::IoError(e.to_string()))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| ExecError::SftpError(e.to_string()))?;
    let sftp = SftpSession::new(channel.into_stream())
        .await
        .map_err(|e| ExecError::SftpError(e.to_string()))?;

    let contents = tokio::fs::read(local_path)
        .await
        .map_err(|e| ExecError::IoError(format!("{}: {e}", local_path.display())))?;

    let mut file = sftp
        .open_with_flags(
            remote_path.to_string(),
            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
        )
        .await
        .map_err(|e| ExecError::SftpError(format!("{remote_path}: {e}")))?;

    file.write_all(&contents)
        .await
        .map_err(|e| ExecError::IoError(e.to_string()))?;
    file.flush()
        .await
        .map_err(|e| ExecError::IoError(e.to_string()))?;
    file.shutdown()
        .await
        .map_err(|e| ExecError::IoError(e.to_string()))?;

    Ok(())
}

#[async_trait]
impl RemoteSession for SshSession {
    fn host(&self) -> &str {
        &self.conn_info.host
    }

    #[instrument(skip(self, secret), fields(host = %self.conn_info.host))]
    async fn connect(&self, secret: &Secret) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if session_lock.is_some() {
            return Ok(());
        }

        info!(target_addr = %self.conn_info.display_target(), "connecting to SSH");

        let session = match self.timeout {
            Some(limit) => timeout(limit, self.establish(secret))
                .await
                .map_err(|_| ExecError::ConnectTimeout {
                    host: self.conn_info.host.clone(),
                    timeout: limit,
                })??,
            None => self.establish(secret).await?,
        };

        info!(host = %self.conn_info.host, "SSH connected and authenticated");

        *session_lock = Some(session);
        Ok(())
    }

    #[instrument(skip(self, cmd), fields(host = %self.conn_info.host))]
    async fn run_command(
        &self,
        cmd: &str,
        timeout_duration: Option<Duration>,
    ) -> Result<CommandOutcome, ExecError> {
        let session_lock = self.session.lock().await;
        let session = session_lock
            .as_ref()
            .ok_or_else(|| ExecError::NotConnected(self.conn_info.host.clone()))?;

        debug!(command = %cmd, timeout = ?timeout_duration, "executing remote command");

        let result = match timeout_duration.or(self.timeout) {
            Some(limit) => match timeout(limit, exec_on_channel(session, cmd)).await {
                Ok(result) => result,
                Err(_) => {
                    error!(command = %cmd, timeout = ?limit, "command timed out");
                    return Ok(CommandOutcome::failure(
                        ExecError::Timeout { timeout: limit }.to_string(),
                    ));
                }
            },
            None => exec_on_channel(session, cmd).await,
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(command = %cmd, error = %e, "SSH execution error");
                return Ok(CommandOutcome::failure(format!("SSH execution error: {e}")));
            }
        };

        if outcome.success() {
            debug!(
                status = outcome.status,
                duration = ?outcome.duration,
                "remote command completed"
            );
        } else {
            warn!(status = outcome.status, "remote command failed");
        }

        Ok(outcome)
    }

    #[instrument(skip(self), fields(host = %self.conn_info.host))]
    async fn upload_file(&self, local_path: &Path, remote_path: &str) -> Result<bool, ExecError> {
        let session_lock = self.session.lock().await;
        let session = session_lock
            .as_ref()
            .ok_or_else(|| ExecError::NotConnected(self.conn_info.host.clone()))?;

        info!(local = %local_path.display(), remote = %remote_path, "uploading file");

        let transfer = sftp_put(session, local_path, remote_path);
        let result = match self.timeout {
            Some(limit) => timeout(limit, transfer)
                .await
                .unwrap_or(Err(ExecError::Timeout { timeout: limit })),
            None => transfer.await,
        };

        match result {
            Ok(()) => {
                info!(remote = %remote_path, "upload complete");
                Ok(true)
            }
            Err(e) => {
                error!(remote = %remote_path, error = %e, "file upload failed");
                Ok(false)
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ExecError> {
        let mut session_lock = self.session.lock().await;

        if let Some(session) = session_lock.take() {
            session
                .disconnect(Disconnect::ByApplication, "", "English")
                .await
                .map_err(|e| ExecError::IoError(e.to_string()))?;
            info!(host = %self.conn_info.host, "SSH disconnected");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        // Synchronous best-effort check; a busy session counts as connected
        match self.session.try_lock() {
            Ok(session) => session.is_some(),
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> SshSession {
        SshSession::new(ConnectionInfo::new("192.0.2.10", "deploy"))
            .with_timeout(Some(Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn test_run_command_requires_connection() {
        let session = session();
        let result = session.run_command("uptime", None).await;

        assert!(matches!(result, Err(ExecError::NotConnected(host)) if host == "192.0.2.10"));
    }

    #[tokio::test]
    async fn test_upload_requires_connection() {
        let session = session();
        let result = session
            .upload_file(Path::new("/etc/hostname"), "/tmp/hostname")
            .await;

        assert!(matches!(result, Err(ExecError::NotConnected(_))));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let session = session();

        assert!(!session.is_connected());
        session.disconnect().await.unwrap();
        session.disconnect().await.unwrap();
        assert!(!session.is_connected());
    }

    #[tokio::test]
    #[ignore = "requires SSH server"]
    async fn test_ssh_connection() {
        let session = SshSession::new(ConnectionInfo::new("127.0.0.1", "root"));
        session.connect(&Secret::new("password")).await.unwrap();
        let outcome = session.run_command("true", None).await.unwrap();
        assert!(outcome.success());
        session.disconnect().await.unwrap();
    }
}
