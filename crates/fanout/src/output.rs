//! Summary rendering and exit codes

use std::fmt::Write as _;

use fanout_core::{CoreError, ExecutionSummary, HostResult};
use owo_colors::OwoColorize;
use serde::Serialize;

/// Every host succeeded (or there were none)
pub const EXIT_SUCCESS: i32 = 0;
/// Some hosts succeeded, some failed
pub const EXIT_PARTIAL: i32 = 1;
/// No host succeeded
pub const EXIT_FAILURE: i32 = 2;
/// Invalid configuration or failed fleet lookup
pub const EXIT_CONFIG: i32 = 2;
/// The credential could not be obtained
pub const EXIT_CREDENTIAL: i32 = 3;
/// Anything else that aborted the run
pub const EXIT_UNEXPECTED: i32 = 5;

/// Exit status for a completed run
#[must_use]
pub fn exit_code(summary: &ExecutionSummary) -> i32 {
    if summary.overall_success {
        EXIT_SUCCESS
    } else if summary.successful_hosts > 0 {
        EXIT_PARTIAL
    } else {
        EXIT_FAILURE
    }
}

/// Exit status and stderr label for a run that aborted before a summary
#[must_use]
pub fn fatal_exit(report: &eyre::Report) -> (i32, &'static str) {
    match report.downcast_ref::<CoreError>() {
        Some(CoreError::CredentialError(_)) => (EXIT_CREDENTIAL, "Credential error"),
        Some(e) if e.is_fatal() => (EXIT_CONFIG, "Configuration error"),
        _ => (EXIT_UNEXPECTED, "Unexpected error"),
    }
}

#[derive(Serialize)]
struct JsonHost<'a> {
    hostname: &'a str,
    success: bool,
    error: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stdout: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stderr: Option<&'a str>,
}

impl<'a> From<&'a HostResult> for JsonHost<'a> {
    fn from(result: &'a HostResult) -> Self {
        let outcome = result.outcome.as_ref();
        Self {
            hostname: &result.hostname,
            success: result.success,
            error: result.error.as_deref(),
            exit_code: outcome.map(|o| o.status),
            stdout: outcome.map(|o| o.stdout.as_str()),
            stderr: outcome.map(|o| o.stderr.as_str()),
        }
    }
}

#[derive(Serialize)]
struct JsonSummary<'a> {
    total_hosts: usize,
    successful_hosts: usize,
    failed_hosts: usize,
    overall_success: bool,
    results: Vec<JsonHost<'a>>,
}

/// Render the summary as pretty-printed JSON
///
/// # Errors
/// Returns an error if serialization fails
pub fn render_json(summary: &ExecutionSummary) -> serde_json::Result<String> {
    let view = JsonSummary {
        total_hosts: summary.total_hosts,
        successful_hosts: summary.successful_hosts,
        failed_hosts: summary.failed_hosts,
        overall_success: summary.overall_success,
        results: summary.results.iter().map(JsonHost::from).collect(),
    };
    serde_json::to_string_pretty(&view)
}

/// Render the summary block and one line per host
#[must_use]
pub fn render_text(summary: &ExecutionSummary, title: &str, color: bool) -> String {
    let mut out = String::new();

    let overall = if summary.overall_success { "✓" } else { "✗" };
    let _ = writeln!(out, "{title} summary");
    let _ = writeln!(out, "  Total hosts:     {}", summary.total_hosts);
    let _ = writeln!(out, "  Successful:      {}", summary.successful_hosts);
    let _ = writeln!(out, "  Failed:          {}", summary.failed_hosts);
    let _ = writeln!(out, "  Overall success: {}", paint(overall, summary.overall_success, color));

    if summary.results.is_empty() {
        return out;
    }

    let _ = writeln!(out, "\nDetailed results:");
    for result in &summary.results {
        let mark = paint(if result.success { "✓" } else { "✗" }, result.success, color);
        let _ = write!(out, "  {mark} {}", result.hostname);

        let stderr = result
            .outcome
            .as_ref()
            .map(|o| o.stderr.trim())
            .filter(|s| !s.is_empty());
        match (&result.error, stderr) {
            (Some(error), _) if !result.success => {
                let _ = write!(out, " - Error: {error}");
            }
            (_, Some(stderr)) => {
                let _ = write!(out, " - {stderr}");
            }
            _ => {}
        }
        let _ = writeln!(out);

        if let Some(outcome) = &result.outcome {
            for line in outcome.stdout.trim_end().lines() {
                let _ = writeln!(out, "      {line}");
            }
        }
    }

    out
}

fn paint(text: &str, ok: bool, color: bool) -> String {
    match (color, ok) {
        (false, _) => text.to_string(),
        (true, true) => text.green().to_string(),
        (true, false) => text.red().to_string(),
    }
}

/// Log the overall result and each failed host
pub fn log_failures(summary: &ExecutionSummary, title: &str) {
    if summary.overall_success {
        tracing::info!("{title} completed successfully on all hosts");
        return;
    }

    tracing::warn!(
        "{title} failed on {} out of {} hosts",
        summary.failed_hosts,
        summary.total_hosts
    );
    for result in summary.failures() {
        let reason = result
            .error
            .as_deref()
            .or_else(|| {
                result
                    .outcome
                    .as_ref()
                    .map(|o| o.stderr.trim())
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or("Unknown error");
        tracing::error!(host = %result.hostname, "{title} failed: {reason}");
    }
}
