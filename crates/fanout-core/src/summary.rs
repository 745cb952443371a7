//! Per-host results and their aggregate

use fanout_exec::CommandOutcome;
use serde::Serialize;

/// Outcome of one operation on one host
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HostResult {
    pub hostname: String,
    pub success: bool,
    /// Exit status and captured output, when the action got that far
    pub outcome: Option<CommandOutcome>,
    /// Description of a session-level or engine-level failure
    pub error: Option<String>,
}

impl HostResult {
    /// Result carrying a command outcome; success follows the exit status
    pub fn from_outcome(hostname: impl Into<String>, outcome: CommandOutcome) -> Self {
        Self {
            hostname: hostname.into(),
            success: outcome.success(),
            outcome: Some(outcome),
            error: None,
        }
    }

    /// Failed result with no outcome
    pub fn failed(hostname: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            success: false,
            outcome: None,
            error: Some(error.into()),
        }
    }

    /// Failed result that still carries an outcome
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    pub fn exit_code(&self) -> Option<i32> {
        self.outcome.as_ref().map(|o| o.status)
    }
}

/// Aggregate over every host of one invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub total_hosts: usize,
    pub successful_hosts: usize,
    pub failed_hosts: usize,
    pub results: Vec<HostResult>,
    pub overall_success: bool,
}

impl ExecutionSummary {
    pub fn failures(&self) -> impl Iterator<Item = &HostResult> {
        self.results.iter().filter(|r| !r.success)
    }
}

/// Reduce per-host results into counts, keeping their order
#[must_use]
pub fn summarize(results: Vec<HostResult>) -> ExecutionSummary {
    let successful_hosts = results.iter().filter(|r| r.success).count();
    let total_hosts = results.len();
    let failed_hosts = total_hosts - successful_hosts;

    ExecutionSummary {
        total_hosts,
        successful_hosts,
        failed_hosts,
        results,
        overall_success: failed_hosts == 0,
    }
}
