//! Run configuration shared by every host in one invocation

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Upper bound on concurrent sessions in parallel mode
pub const DEFAULT_MAX_PARALLEL: usize = 10;

/// How hosts are scheduled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Bounded worker pool, results in completion order
    #[default]
    Parallel,
    /// One host at a time, results in resolution order
    Serial,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Parallel => f.write_str("parallel"),
            ExecutionMode::Serial => f.write_str("serial"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parallel" => Ok(ExecutionMode::Parallel),
            "serial" => Ok(ExecutionMode::Serial),
            other => Err(CoreError::ConfigError(format!(
                "unknown execution mode '{other}' (expected 'parallel' or 'serial')"
            ))),
        }
    }
}

/// Read-only settings for one engine invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Explicit target hosts
    #[serde(default)]
    pub hosts: Option<Vec<String>>,
    /// Fleet group to resolve instead of an explicit list
    #[serde(default)]
    pub fleet_group: Option<String>,
    /// Region passed to the fleet resolver
    #[serde(default)]
    pub region: Option<String>,
    /// SSH login name
    pub username: String,
    /// SSH port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-operation timeout in seconds (`0` disables the limit)
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Scheduling policy
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    /// Report what would happen without contacting any host
    #[serde(default)]
    pub dry_run: bool,
    /// Worker pool cap for parallel mode
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

fn default_port() -> u16 {
    22
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_max_parallel() -> usize {
    DEFAULT_MAX_PARALLEL
}

impl RunConfig {
    /// Config with defaults and no host selection yet
    pub fn new(username: impl Into<String>) -> Self {
        Self {
            hosts: None,
            fleet_group: None,
            region: None,
            username: username.into(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            execution_mode: ExecutionMode::default(),
            dry_run: false,
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }

    #[must_use]
    pub fn with_hosts<I, S>(mut self, hosts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hosts = Some(hosts.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_fleet_group(mut self, group: impl Into<String>, region: Option<String>) -> Self {
        self.fleet_group = Some(group.into());
        self.region = region;
        self
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Per-operation limit, `None` when disabled
    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    fn has_explicit_hosts(&self) -> bool {
        self.hosts.as_ref().is_some_and(|h| !h.is_empty())
    }

    /// Check that exactly one of host list / fleet group is set
    ///
    /// # Errors
    /// Returns `CoreError::ConfigError` when neither or both are present, or
    /// when the username is empty.
    pub fn validate_host_selection(&self) -> Result<(), CoreError> {
        if self.username.trim().is_empty() {
            return Err(CoreError::ConfigError("username must not be empty".to_string()));
        }

        match (self.has_explicit_hosts(), self.fleet_group.is_some()) {
            (false, false) => Err(CoreError::ConfigError(
                "either hosts or a fleet group must be provided".to_string(),
            )),
            (true, true) => Err(CoreError::ConfigError(
                "cannot specify both hosts and a fleet group".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Split a comma-separated host list, dropping blanks
#[must_use]
pub fn parse_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_host_list() {
        assert_eq!(
            parse_host_list(" web-1, web-2 ,,10.0.0.3 "),
            vec!["web-1", "web-2", "10.0.0.3"]
        );
        assert!(parse_host_list(" , ").is_empty());
    }

    #[test]
    fn test_execution_mode_round_trip() {
        assert_eq!("Serial".parse::<ExecutionMode>().unwrap(), ExecutionMode::Serial);
        assert_eq!(ExecutionMode::Parallel.to_string(), "parallel");
        assert!("batch".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_defaults() {
        let config = RunConfig::new("deploy");

        assert_eq!(config.port, 22);
        assert_eq!(config.timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.execution_mode, ExecutionMode::Parallel);
        assert_eq!(config.max_parallel, DEFAULT_MAX_PARALLEL);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        assert_eq!(RunConfig::new("deploy").with_timeout_secs(0).timeout(), None);
    }

    #[test]
    fn test_host_selection_requires_exactly_one_source() {
        let neither = RunConfig::new("deploy");
        assert!(neither.validate_host_selection().is_err());

        let empty_list = RunConfig::new("deploy").with_hosts(Vec::<String>::new());
        assert!(empty_list.validate_host_selection().is_err());

        let both = RunConfig::new("deploy")
            .with_hosts(["web-1"])
            .with_fleet_group("web-asg", None);
        assert!(both.validate_host_selection().is_err());

        let hosts = RunConfig::new("deploy").with_hosts(["web-1"]);
        assert!(hosts.validate_host_selection().is_ok());

        let fleet = RunConfig::new("deploy").with_fleet_group("web-asg", Some("us-west-2".into()));
        assert!(fleet.validate_host_selection().is_ok());
    }

    #[test]
    fn test_empty_username_rejected() {
        let config = RunConfig::new("  ").with_hosts(["web-1"]);
        assert!(config.validate_host_selection().is_err());
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: RunConfig = serde_json::from_str(
            r#"{"username": "deploy", "fleet_group": "web-asg", "execution_mode": "serial"}"#,
        )
        .unwrap();

        assert_eq!(config.execution_mode, ExecutionMode::Serial);
        assert_eq!(config.timeout_secs, 300);
        assert_eq!(config.fleet_group.as_deref(), Some("web-asg"));
    }
}
