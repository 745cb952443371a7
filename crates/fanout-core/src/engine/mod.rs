//! Execution engine
//!
//! `Engine::run` resolves the target hosts, acquires the shared credential
//! once, schedules one unit per host and reduces the results into an
//! [`ExecutionSummary`].

mod strategy;
mod unit;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use fanout_exec::LocalExecutor;
use fanout_fleet::{HostSetResolver, running_addresses};
use tracing::{debug, info, instrument, warn};

use crate::config::{ExecutionMode, RunConfig};
use crate::credential::{CredentialCache, CredentialSource};
use crate::error::CoreError;
use crate::operation::{CopySpec, Operation, ScriptSpec};
use crate::session::SessionFactory;
use crate::summary::{ExecutionSummary, summarize};

use unit::UnitContext;

/// Multi-host execution engine
pub struct Engine {
    config: Arc<RunConfig>,
    sessions: Arc<dyn SessionFactory>,
    credentials: Arc<dyn CredentialSource>,
    resolver: Option<Arc<dyn HostSetResolver>>,
    staging_dir: PathBuf,
}

impl Engine {
    /// Create an engine with no fleet resolver and the system temp dir for
    /// local staging
    pub fn new(
        config: RunConfig,
        sessions: Arc<dyn SessionFactory>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            sessions,
            credentials,
            resolver: None,
            staging_dir: std::env::temp_dir(),
        }
    }

    /// Resolver used when the config names a fleet group
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn HostSetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Local directory for archives built by recursive copies
    #[must_use]
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = dir.into();
        self
    }

    #[must_use]
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Target hosts: the explicit list, or the running members of the group
    ///
    /// Duplicates are dropped so each host gets exactly one result.
    ///
    /// # Errors
    /// `CoreError::ConfigError` if neither source is set, or
    /// `CoreError::FleetError` if the group lookup fails.
    #[instrument(skip(self))]
    pub async fn resolve_hosts(&self) -> Result<Vec<String>, CoreError> {
        let explicit: Vec<String> = self
            .config
            .hosts
            .iter()
            .flatten()
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();

        let hosts = if !explicit.is_empty() {
            explicit
        } else if let Some(group) = &self.config.fleet_group {
            let resolver = self.resolver.as_ref().ok_or_else(|| {
                CoreError::ConfigError(format!(
                    "fleet group '{group}' given but no fleet resolver is configured"
                ))
            })?;
            let members = resolver
                .resolve(group, self.config.region.as_deref())
                .await?;
            let addresses = running_addresses(&members);
            info!(group = %group, running = addresses.len(), total = members.len(), "resolved fleet group");
            addresses
        } else {
            return Err(CoreError::ConfigError(
                "either hosts or a fleet group must be provided".to_string(),
            ));
        };

        let mut seen = HashSet::new();
        let unique: Vec<String> = hosts
            .into_iter()
            .filter(|h| {
                let first = seen.insert(h.clone());
                if !first {
                    warn!(host = %h, "duplicate host ignored");
                }
                first
            })
            .collect();

        Ok(unique)
    }

    /// Run `operation` on every resolved host
    ///
    /// # Errors
    /// Only fatal errors are returned (host resolution, credential
    /// acquisition). Per-host failures are part of the summary.
    pub async fn run(&self, operation: Operation) -> Result<ExecutionSummary, CoreError> {
        let hosts = self.resolve_hosts().await?;

        info!(
            hosts = hosts.len(),
            mode = %self.config.execution_mode,
            operation = operation.kind(),
            dry_run = self.config.dry_run,
            "starting execution"
        );

        let credentials = Arc::new(CredentialCache::new(
            Arc::clone(&self.credentials),
            &self.config.username,
        ));
        if !self.config.dry_run && !hosts.is_empty() {
            credentials.ensure().await?;
            debug!("credential ready for all sessions");
        }

        let ctx = Arc::new(UnitContext {
            config: Arc::clone(&self.config),
            operation,
            sessions: Arc::clone(&self.sessions),
            credentials,
            local: LocalExecutor::new(),
            staging_dir: self.staging_dir.clone(),
        });

        let results = match self.config.execution_mode {
            ExecutionMode::Serial => strategy::run_serial(ctx, hosts).await,
            ExecutionMode::Parallel => {
                strategy::run_parallel(ctx, hosts, self.config.max_parallel).await
            }
        };

        let summary = summarize(results);
        info!(
            total = summary.total_hosts,
            successful = summary.successful_hosts,
            failed = summary.failed_hosts,
            "execution finished"
        );

        Ok(summary)
    }

    /// Run a shell command on every host
    ///
    /// # Errors
    /// See [`Engine::run`].
    pub async fn execute_command(
        &self,
        command: impl Into<String>,
    ) -> Result<ExecutionSummary, CoreError> {
        self.run(Operation::RunCommand {
            command: command.into(),
        })
        .await
    }

    /// Upload one local file to the same path on every host
    ///
    /// # Errors
    /// See [`Engine::run`].
    pub async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: impl Into<String>,
    ) -> Result<ExecutionSummary, CoreError> {
        self.run(Operation::Upload {
            local_path: local_path.to_path_buf(),
            remote_path: remote_path.into(),
        })
        .await
    }

    /// Copy a file or directory tree to every host
    ///
    /// # Errors
    /// See [`Engine::run`].
    pub async fn copy_files(&self, spec: CopySpec) -> Result<ExecutionSummary, CoreError> {
        self.run(Operation::Copy(spec)).await
    }

    /// Upload and run a script on every host
    ///
    /// # Errors
    /// See [`Engine::run`].
    pub async fn execute_script(&self, spec: ScriptSpec) -> Result<ExecutionSummary, CoreError> {
        self.run(Operation::RunScript(spec)).await
    }
}
