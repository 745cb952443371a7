//! The actions the engine can run on every host

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::shell;

/// Default staging directory on the remote side
pub const DEFAULT_REMOTE_TEMP_DIR: &str = "/tmp";

/// Default interpreter for scripts
pub const DEFAULT_INTERPRETER: &str = "/bin/bash";

/// Copy of a local file or directory tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySpec {
    pub source: PathBuf,
    pub destination: String,
    /// Package `source` as a directory tree instead of a single file
    #[serde(default)]
    pub recursive: bool,
    /// Where the archive is unpacked from on the remote side
    #[serde(default = "default_remote_temp_dir")]
    pub remote_staging_dir: String,
}

impl CopySpec {
    pub fn new(source: impl Into<PathBuf>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            recursive: false,
            remote_staging_dir: DEFAULT_REMOTE_TEMP_DIR.to_string(),
        }
    }

    #[must_use]
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn with_remote_staging_dir(mut self, dir: impl Into<String>) -> Self {
        self.remote_staging_dir = dir.into();
        self
    }
}

/// Upload-and-run of a local script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptSpec {
    pub script_path: PathBuf,
    /// Raw argument string appended after the script path
    #[serde(default)]
    pub args: Option<String>,
    #[serde(default = "default_interpreter")]
    pub interpreter: String,
    #[serde(default = "default_remote_temp_dir")]
    pub remote_temp_dir: String,
    #[serde(default = "default_true")]
    pub cleanup_after_execution: bool,
    #[serde(default = "default_true")]
    pub make_executable: bool,
}

fn default_remote_temp_dir() -> String {
    DEFAULT_REMOTE_TEMP_DIR.to_string()
}

fn default_interpreter() -> String {
    DEFAULT_INTERPRETER.to_string()
}

fn default_true() -> bool {
    true
}

impl ScriptSpec {
    pub fn new(script_path: impl Into<PathBuf>) -> Self {
        Self {
            script_path: script_path.into(),
            args: None,
            interpreter: default_interpreter(),
            remote_temp_dir: default_remote_temp_dir(),
            cleanup_after_execution: true,
            make_executable: true,
        }
    }

    #[must_use]
    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }

    #[must_use]
    pub fn with_interpreter(mut self, interpreter: impl Into<String>) -> Self {
        self.interpreter = interpreter.into();
        self
    }

    #[must_use]
    pub fn with_remote_temp_dir(mut self, dir: impl Into<String>) -> Self {
        self.remote_temp_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup_after_execution = cleanup;
        self
    }

    #[must_use]
    pub fn with_make_executable(mut self, make_executable: bool) -> Self {
        self.make_executable = make_executable;
        self
    }

    /// `<remote_temp_dir>/<script basename>`
    ///
    /// # Errors
    /// Returns `CoreError::ConfigError` if the script path has no file name.
    pub fn remote_path(&self) -> Result<String, CoreError> {
        let name = file_name(&self.script_path).ok_or_else(|| {
            CoreError::ConfigError(format!(
                "script path has no file name: {}",
                self.script_path.display()
            ))
        })?;
        Ok(shell::join_remote(&self.remote_temp_dir, &name))
    }
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

/// One action applied to every resolved host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Operation {
    RunCommand { command: String },
    Upload { local_path: PathBuf, remote_path: String },
    Copy(CopySpec),
    RunScript(ScriptSpec),
}

impl Operation {
    /// Short label used in logs
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::RunCommand { .. } => "command",
            Operation::Upload { .. } => "upload",
            Operation::Copy(_) => "copy",
            Operation::RunScript(_) => "script",
        }
    }

    /// Stdout reported for a host in dry-run mode
    #[must_use]
    pub fn dry_run_placeholder(&self) -> &'static str {
        match self {
            Operation::RunCommand { .. } => "DRY RUN",
            Operation::Upload { .. } => "DRY RUN upload",
            Operation::Copy(_) => "DRY RUN copy",
            Operation::RunScript(_) => "DRY RUN script",
        }
    }

    /// Prefix for a per-host error raised while performing the action
    #[must_use]
    pub fn failure_label(&self) -> &'static str {
        match self {
            Operation::RunCommand { .. } => "Connection/execution error",
            Operation::Upload { .. } => "File upload error",
            Operation::Copy(_) => "Copy error",
            Operation::RunScript(_) => "Script execution error",
        }
    }

    /// Human-readable description of what would happen on one host
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Operation::RunCommand { command } => format!("execute: {command}"),
            Operation::Upload {
                local_path,
                remote_path,
            } => format!("upload {} to {remote_path}", local_path.display()),
            Operation::Copy(spec) => format!(
                "copy {} to {}{}",
                spec.source.display(),
                spec.destination,
                if spec.recursive { " (recursive)" } else { "" }
            ),
            Operation::RunScript(spec) => format!(
                "execute script {} with {}",
                spec.script_path.display(),
                spec.interpreter
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_defaults() {
        let spec = ScriptSpec::new("/opt/deploy/setup.sh");

        assert_eq!(spec.interpreter, "/bin/bash");
        assert_eq!(spec.remote_temp_dir, "/tmp");
        assert!(spec.cleanup_after_execution);
        assert!(spec.make_executable);
        assert_eq!(spec.remote_path().unwrap(), "/tmp/setup.sh");
    }

    #[test]
    fn test_script_remote_path_trims_separator() {
        let spec = ScriptSpec::new("setup.sh").with_remote_temp_dir("/var/tmp/");
        assert_eq!(spec.remote_path().unwrap(), "/var/tmp/setup.sh");
    }

    #[test]
    fn test_script_without_file_name() {
        let spec = ScriptSpec::new("/");
        assert!(matches!(spec.remote_path(), Err(CoreError::ConfigError(_))));
    }

    #[test]
    fn test_placeholders() {
        let command = Operation::RunCommand {
            command: "uptime".into(),
        };
        let copy = Operation::Copy(CopySpec::new("/etc/hosts", "/tmp/hosts"));

        assert_eq!(command.dry_run_placeholder(), "DRY RUN");
        assert_eq!(copy.dry_run_placeholder(), "DRY RUN copy");
        assert_eq!(command.describe(), "execute: uptime");
    }

    #[test]
    fn test_failure_labels() {
        let upload = Operation::Upload {
            local_path: "/etc/hosts".into(),
            remote_path: "/tmp/hosts".into(),
        };
        let script = Operation::RunScript(ScriptSpec::new("/opt/setup.sh"));

        assert_eq!(upload.failure_label(), "File upload error");
        assert_eq!(script.failure_label(), "Script execution error");
    }

    #[test]
    fn test_operation_deserializes_with_defaults() {
        let op: Operation = serde_json::from_str(
            r#"{"action": "run_script", "script_path": "/srv/migrate.sh", "args": "--fast"}"#,
        )
        .unwrap();

        let Operation::RunScript(spec) = op else {
            panic!("expected script operation");
        };
        assert_eq!(spec.args.as_deref(), Some("--fast"));
        assert_eq!(spec.interpreter, DEFAULT_INTERPRETER);
    }
}
