//! One operation on one host
//!
//! A unit never returns an error: every failure, including a panic inside
//! the session code, becomes a failing `HostResult` for that host.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use fanout_exec::{CommandOutcome, LocalExecutor, RemoteSession};
use futures::FutureExt;
use tracing::{debug, error, info, instrument, warn};

use crate::config::RunConfig;
use crate::credential::CredentialCache;
use crate::error::CoreError;
use crate::operation::{CopySpec, Operation, ScriptSpec};
use crate::session::SessionFactory;
use crate::shell;
use crate::staging::StagedArchive;
use crate::summary::HostResult;

/// Everything a unit needs, shared by all hosts of a run
pub(crate) struct UnitContext {
    pub config: Arc<RunConfig>,
    pub operation: Operation,
    pub sessions: Arc<dyn SessionFactory>,
    pub credentials: Arc<CredentialCache>,
    pub local: LocalExecutor,
    pub staging_dir: PathBuf,
}

/// Run the operation on `host`, always yielding a result
pub(crate) async fn run_unit(ctx: Arc<UnitContext>, host: String) -> HostResult {
    let guarded = AssertUnwindSafe(execute_on_host(&ctx, &host))
        .catch_unwind()
        .await;

    match guarded {
        Ok(Ok(result)) => result,
        Ok(Err(CoreError::SshError(e))) if e.is_connection_failure() => {
            warn!(host = %host, error = %e, "host unreachable");
            HostResult::failed(host, format!("{}: {e}", ctx.operation.failure_label()))
        }
        Ok(Err(e)) => {
            error!(host = %host, error = %e, "operation failed");
            HostResult::failed(host, format!("{}: {e}", ctx.operation.failure_label()))
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(host = %host, panic = %message, "unit crashed");
            HostResult::failed(host, format!("Executor error: {message}"))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[instrument(skip(ctx), fields(operation = ctx.operation.kind()))]
async fn execute_on_host(ctx: &UnitContext, host: &str) -> Result<HostResult, CoreError> {
    if ctx.config.dry_run {
        info!("[DRY RUN] would {} on {host}", ctx.operation.describe());
        return Ok(HostResult::from_outcome(
            host,
            CommandOutcome::new(0, ctx.operation.dry_run_placeholder(), ""),
        ));
    }

    let secret = ctx.credentials.ensure().await?;
    let session = ctx.sessions.create(host, &ctx.config);

    let attempt = AssertUnwindSafe(async {
        session.connect(&secret).await.map_err(CoreError::from)?;
        perform(ctx, session.as_ref()).await
    })
    .catch_unwind()
    .await;

    // A panic in the session code still releases the connection before it
    // reaches the caller's guard
    if let Err(e) = session.disconnect().await {
        warn!(error = %e, "disconnect failed");
    }

    attempt.unwrap_or_else(|panic| std::panic::resume_unwind(panic))
}

async fn perform(ctx: &UnitContext, session: &dyn RemoteSession) -> Result<HostResult, CoreError> {
    let host = session.host();

    match &ctx.operation {
        Operation::RunCommand { command } => {
            info!(command = %command, "executing command");
            let outcome = session.run_command(command, ctx.config.timeout()).await?;
            Ok(HostResult::from_outcome(host, outcome))
        }
        Operation::Upload {
            local_path,
            remote_path,
        } => {
            info!(local = %local_path.display(), remote = %remote_path, "uploading file");
            let uploaded = session.upload_file(local_path, remote_path).await?;
            Ok(transfer_result(
                host,
                uploaded,
                "File upload successful",
                "File upload failed",
                "Upload error",
            ))
        }
        Operation::Copy(spec) if spec.recursive => copy_tree(ctx, session, spec).await,
        Operation::Copy(spec) => {
            info!(source = %spec.source.display(), dest = %spec.destination, "copying file");
            let copied = session.upload_file(&spec.source, &spec.destination).await?;
            Ok(transfer_result(
                host,
                copied,
                "Copy successful",
                "Copy failed",
                "Copy error",
            ))
        }
        Operation::RunScript(spec) => run_script(ctx, session, spec).await,
    }
}

fn transfer_result(
    host: &str,
    ok: bool,
    success_text: &str,
    failure_text: &str,
    error_text: &str,
) -> HostResult {
    if ok {
        HostResult::from_outcome(host, CommandOutcome::new(0, success_text, ""))
    } else {
        HostResult::from_outcome(host, CommandOutcome::new(1, failure_text, error_text))
    }
}

/// Package locally, upload, unpack remotely, then clean up both sides
async fn copy_tree(
    ctx: &UnitContext,
    session: &dyn RemoteSession,
    spec: &CopySpec,
) -> Result<HostResult, CoreError> {
    let host = session.host();
    info!(source = %spec.source.display(), dest = %spec.destination, "copying directory");

    let archive = StagedArchive::create(&spec.source, &ctx.staging_dir, &ctx.local).await?;
    let remote_archive = shell::join_remote(&spec.remote_staging_dir, archive.file_name());

    let result = async {
        if !session.upload_file(archive.path(), &remote_archive).await? {
            return Ok(transfer_result(
                host,
                false,
                "",
                "Copy failed",
                "Copy error",
            ));
        }

        let timeout = ctx.config.timeout();
        let extract = session
            .run_command(
                &shell::extract_archive(&remote_archive, &spec.destination),
                timeout,
            )
            .await?;

        // The remote archive goes away whether or not extraction worked
        let cleanup = session
            .run_command(&shell::remove_file(&remote_archive), timeout)
            .await?;
        if !cleanup.success() {
            warn!(archive = %remote_archive, stderr = %cleanup.stderr.trim(), "failed to remove remote archive");
        }

        if extract.success() {
            Ok(transfer_result(host, true, "Copy successful", "", ""))
        } else {
            Ok(HostResult::from_outcome(host, extract).with_error("Copy failed"))
        }
    }
    .await;

    archive.close();
    result
}

/// Upload, optionally chmod, run under the interpreter, optionally remove
async fn run_script(
    ctx: &UnitContext,
    session: &dyn RemoteSession,
    spec: &ScriptSpec,
) -> Result<HostResult, CoreError> {
    let host = session.host();
    let remote_path = spec.remote_path()?;
    let timeout = ctx.config.timeout();

    info!(script = %spec.script_path.display(), remote = %remote_path, "uploading script");
    if !session.upload_file(&spec.script_path, &remote_path).await? {
        return Ok(HostResult::failed(
            host,
            format!("Failed to upload script to {remote_path}"),
        ));
    }

    if spec.make_executable {
        let chmod = session
            .run_command(&shell::make_executable(&remote_path), timeout)
            .await?;
        if !chmod.success() {
            warn!(path = %remote_path, stderr = %chmod.stderr.trim(), "chmod failed, continuing");
        }
    }

    let command = shell::run_script(&spec.interpreter, &remote_path, spec.args.as_deref());
    info!(command = %command, "executing script");
    let outcome = session.run_command(&command, timeout).await;

    if spec.cleanup_after_execution {
        match session
            .run_command(&shell::remove_file(&remote_path), timeout)
            .await
        {
            Ok(cleanup) if cleanup.success() => debug!(path = %remote_path, "removed remote script"),
            Ok(cleanup) => {
                warn!(path = %remote_path, stderr = %cleanup.stderr.trim(), "failed to remove remote script");
            }
            Err(e) => warn!(path = %remote_path, error = %e, "failed to remove remote script"),
        }
    }

    Ok(HostResult::from_outcome(host, outcome?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");

        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[test]
    fn test_transfer_result() {
        let ok = transfer_result("web-1", true, "File upload successful", "x", "y");
        assert!(ok.success);
        assert_eq!(ok.outcome.unwrap().stdout, "File upload successful");

        let failed = transfer_result("web-1", false, "x", "File upload failed", "Upload error");
        assert!(!failed.success);
        assert_eq!(failed.exit_code(), Some(1));
        assert!(failed.error.is_none());
        let outcome = failed.outcome.unwrap();
        assert_eq!(outcome.stdout, "File upload failed");
        assert_eq!(outcome.stderr, "Upload error");
    }
}
