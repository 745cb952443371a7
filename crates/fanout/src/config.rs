//! Configuration loading and CLI merging
//!
//! Settings come from an optional config file, overridden field by field by
//! command-line flags.

use std::path::{Path, PathBuf};

use fanout_core::{CoreError, ExecutionMode, Operation, RunConfig, parse_host_list};
use serde::Deserialize;

use crate::cli::TargetArgs;

/// Environment variable naming a config file
pub const CONFIG_ENV: &str = "FANOUT_CONFIG";

/// Hosts given either as `"a,b"` or as `["a", "b"]`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum HostList {
    Joined(String),
    List(Vec<String>),
}

impl HostList {
    fn into_hosts(self) -> Vec<String> {
        match self {
            HostList::Joined(raw) => parse_host_list(&raw),
            HostList::List(hosts) => hosts
                .iter()
                .flat_map(|h| parse_host_list(h))
                .collect(),
        }
    }
}

/// Contents of a config file; every field is optional
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub hosts: Option<HostList>,
    #[serde(alias = "asg")]
    pub fleet_group: Option<String>,
    #[serde(alias = "region_name")]
    pub region: Option<String>,
    pub username: Option<String>,
    pub port: Option<u16>,
    #[serde(alias = "timeout")]
    pub timeout_secs: Option<u64>,
    pub execution_mode: Option<ExecutionMode>,
    pub dry_run: Option<bool>,
    pub max_parallel: Option<usize>,
    pub log_file: Option<PathBuf>,
}

impl FileConfig {
    /// Parse a config file, choosing the format from its extension
    ///
    /// # Errors
    /// Returns `CoreError::ConfigError` if the file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CoreError::ConfigError(format!("cannot read config file {}: {e}", path.display()))
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        let parsed: Result<Self, String> = if is_json {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            toml::from_str(&content).map_err(|e| e.to_string())
        };

        parsed.map_err(|e| {
            CoreError::ConfigError(format!("invalid config file {}: {e}", path.display()))
        })
    }

    /// Load the first config file found, or defaults if there is none
    ///
    /// An explicit path must exist; the fallbacks are `$FANOUT_CONFIG`,
    /// `./fanout.toml` and `<config dir>/fanout/fanout.toml`.
    ///
    /// # Errors
    /// Returns `CoreError::ConfigError` if a located file is invalid
    pub fn discover(explicit: Option<&Path>) -> Result<Self, CoreError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load(Path::new(&path));
        }

        let candidates = [
            Some(PathBuf::from("fanout.toml")),
            dirs::config_dir().map(|p| p.join("fanout/fanout.toml")),
        ];

        for path in candidates.into_iter().flatten() {
            if path.is_file() {
                tracing::debug!(path = %path.display(), "using config file");
                return Self::load(&path);
            }
        }

        Ok(Self::default())
    }
}

/// Merge file settings with CLI flags into a validated `RunConfig`
///
/// # Errors
/// Returns `CoreError::ConfigError` when no username is given or the host
/// selection is missing or ambiguous
pub fn merge(args: &TargetArgs, file: FileConfig) -> Result<RunConfig, CoreError> {
    let username = args
        .username
        .clone()
        .or(file.username)
        .ok_or_else(|| CoreError::ConfigError("a username is required (--username)".into()))?;

    let mut config = RunConfig::new(username);

    config.hosts = args
        .hosts
        .as_deref()
        .map(parse_host_list)
        .or_else(|| file.hosts.map(HostList::into_hosts))
        .filter(|hosts| !hosts.is_empty());

    // A fleet group on the command line replaces hosts from the file, and
    // hosts on the command line replace a group from the file
    config.fleet_group = args.fleet_group.clone().or(file.fleet_group);
    if args.fleet_group.is_some() && args.hosts.is_none() {
        config.hosts = None;
    }
    if args.hosts.is_some() && args.fleet_group.is_none() {
        config.fleet_group = None;
    }

    config.region = args.region.clone().or(file.region);
    if let Some(port) = args.port.or(file.port) {
        config.port = port;
    }
    if let Some(timeout) = args.timeout.or(file.timeout_secs) {
        config.timeout_secs = timeout;
    }
    if let Some(mode) = args.execution_mode.or(file.execution_mode) {
        config.execution_mode = mode;
    }
    if let Some(max) = args.max_parallel.or(file.max_parallel) {
        config.max_parallel = max;
    }
    config.dry_run = args.dry_run || file.dry_run.unwrap_or(false);

    config.validate_host_selection()?;
    Ok(config)
}

/// Check local inputs of an operation before any host is contacted
///
/// # Errors
/// Returns `CoreError::ConfigError` for a missing source, a script that is
/// not a regular file, or a relative interpreter path
pub fn validate_operation(operation: &Operation) -> Result<(), CoreError> {
    match operation {
        Operation::RunCommand { command } if command.trim().is_empty() => {
            Err(CoreError::ConfigError("command must not be empty".into()))
        }
        Operation::RunCommand { .. } => Ok(()),
        Operation::Upload { local_path, .. } if !local_path.is_file() => Err(
            CoreError::ConfigError(format!("local file not found: {}", local_path.display())),
        ),
        Operation::Upload { .. } => Ok(()),
        Operation::Copy(spec) => {
            if !spec.source.exists() {
                return Err(CoreError::ConfigError(format!(
                    "source path does not exist: {}",
                    spec.source.display()
                )));
            }
            if spec.recursive && !spec.source.is_dir() {
                return Err(CoreError::ConfigError(format!(
                    "recursive copy needs a directory: {}",
                    spec.source.display()
                )));
            }
            if !spec.recursive && spec.source.is_dir() {
                return Err(CoreError::ConfigError(format!(
                    "{} is a directory, use --recursive",
                    spec.source.display()
                )));
            }
            Ok(())
        }
        Operation::RunScript(spec) => {
            if !spec.script_path.is_file() {
                return Err(CoreError::ConfigError(format!(
                    "script file not found: {}",
                    spec.script_path.display()
                )));
            }
            if !spec.interpreter.starts_with('/') {
                return Err(CoreError::ConfigError(format!(
                    "interpreter must be an absolute path: {}",
                    spec.interpreter
                )));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use fanout_core::{CopySpec, ScriptSpec};

    use super::*;

    fn args() -> TargetArgs {
        TargetArgs {
            username: Some("deploy".into()),
            ..TargetArgs::default()
        }
    }

    #[test]
    fn test_load_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fanout.toml");
        std::fs::write(
            &path,
            r#"
hosts = "web-1, web-2"
username = "ops"
timeout = 60
execution_mode = "serial"
"#,
        )
        .unwrap();

        let file = FileConfig::load(&path).unwrap();
        let config = merge(&TargetArgs::default(), file).unwrap();

        assert_eq!(config.hosts, Some(vec!["web-1".into(), "web-2".into()]));
        assert_eq!(config.username, "ops");
        assert_eq!(config.timeout_secs, 60);
        assert_eq!(config.execution_mode, ExecutionMode::Serial);
    }

    #[test]
    fn test_load_json_with_legacy_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deploy.json");
        std::fs::write(
            &path,
            r#"{"asg": "web-asg", "region_name": "eu-west-1", "username": "ec2-user"}"#,
        )
        .unwrap();

        let config = merge(&TargetArgs::default(), FileConfig::load(&path).unwrap()).unwrap();

        assert_eq!(config.fleet_group.as_deref(), Some("web-asg"));
        assert_eq!(config.region.as_deref(), Some("eu-west-1"));
        assert!(config.hosts.is_none());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            FileConfig::load(&path),
            Err(CoreError::ConfigError(_))
        ));
        assert!(matches!(
            FileConfig::discover(Some(&dir.path().join("missing.toml"))),
            Err(CoreError::ConfigError(_))
        ));
    }

    #[test]
    fn test_cli_overrides_file() {
        let file = FileConfig {
            hosts: Some(HostList::List(vec!["old-1".into()])),
            username: Some("ops".into()),
            port: Some(2222),
            timeout_secs: Some(10),
            ..FileConfig::default()
        };
        let args = TargetArgs {
            hosts: Some("new-1,new-2".into()),
            username: Some("deploy".into()),
            timeout: Some(0),
            ..TargetArgs::default()
        };

        let config = merge(&args, file).unwrap();

        assert_eq!(config.hosts, Some(vec!["new-1".into(), "new-2".into()]));
        assert_eq!(config.username, "deploy");
        assert_eq!(config.port, 2222);
        assert_eq!(config.timeout(), None);
    }

    #[test]
    fn test_cli_group_replaces_file_hosts() {
        let file = FileConfig {
            hosts: Some(HostList::Joined("web-1".into())),
            ..FileConfig::default()
        };
        let args = TargetArgs {
            fleet_group: Some("web-asg".into()),
            ..args()
        };

        let config = merge(&args, file).unwrap();
        assert!(config.hosts.is_none());
        assert_eq!(config.fleet_group.as_deref(), Some("web-asg"));
    }

    #[test]
    fn test_missing_username_or_hosts() {
        assert!(merge(&TargetArgs::default(), FileConfig::default()).is_err());
        assert!(merge(&args(), FileConfig::default()).is_err());

        let blank_hosts = TargetArgs {
            hosts: Some(" , ".into()),
            ..args()
        };
        assert!(merge(&blank_hosts, FileConfig::default()).is_err());
    }

    #[test]
    fn test_validate_operation() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("run.sh");
        std::fs::write(&script, "true").unwrap();

        assert!(validate_operation(&Operation::RunScript(ScriptSpec::new(&script))).is_ok());
        assert!(validate_operation(&Operation::RunScript(
            ScriptSpec::new(&script).with_interpreter("bash")
        ))
        .is_err());
        assert!(validate_operation(&Operation::RunScript(ScriptSpec::new(dir.path()))).is_err());

        assert!(validate_operation(&Operation::Copy(
            CopySpec::new(dir.path(), "/srv").recursive(true)
        ))
        .is_ok());
        assert!(validate_operation(&Operation::Copy(CopySpec::new(dir.path(), "/srv"))).is_err());
        assert!(validate_operation(&Operation::Copy(CopySpec::new(
            dir.path().join("nope"),
            "/srv"
        )))
        .is_err());

        assert!(validate_operation(&Operation::RunCommand {
            command: "  ".into()
        })
        .is_err());
    }
}
