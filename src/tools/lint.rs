//! Static-analysis tool collaborator.
//!
//! Runs a linter command line against a generated draft. The refinement loop
//! uses a reported issue list to ask for one targeted correction per cycle.
//! The tool is strictly best-effort: unavailability and timeouts degrade to
//! fixed textual outcomes that the caller treats as "no findings".

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::warn;

use super::strip_code_fences;

/// Fixed message when the linter binary cannot be spawned.
pub const LINT_UNAVAILABLE: &str = "static analysis unavailable: linter binary not found";
/// Fixed message when the linter exceeds its execution bound.
pub const LINT_TIMED_OUT: &str = "static analysis unavailable: linter timed out";

/// Result of one static-analysis pass.
#[derive(Debug, Clone, PartialEq)]
pub enum LintOutcome {
    /// The linter ran and reported nothing.
    Clean,
    /// The linter reported issues, verbatim.
    Issues(String),
    /// The tool could not run; carries one of the fixed messages above.
    Unavailable(&'static str),
}

/// Bounded wrapper around an external linter command line.
///
/// The command line is split on whitespace and the staged source path is
/// appended as the final argument, e.g. `ruff check --quiet <file>`.
pub struct StaticAnalyzer {
    cmd_line: Vec<String>,
    timeout: Duration,
}

impl StaticAnalyzer {
    pub fn new(cmd_line: &str, timeout: Duration) -> Self {
        Self {
            cmd_line: cmd_line.split_whitespace().map(str::to_string).collect(),
            timeout,
        }
    }

    /// Check a source draft and report issues, if any.
    ///
    /// Non-source input (empty after fence stripping) is declined with
    /// `Clean` rather than fed to the linter.
    pub async fn check(&self, source: &str) -> LintOutcome {
        let cleaned = strip_code_fences(source);
        if cleaned.is_empty() {
            return LintOutcome::Clean;
        }
        let Some((program, args)) = self.cmd_line.split_first() else {
            return LintOutcome::Unavailable(LINT_UNAVAILABLE);
        };

        let tmp = match write_temp_source(&cleaned) {
            Ok(tmp) => tmp,
            Err(e) => {
                warn!(error = %e, "failed to stage source for linting");
                return LintOutcome::Unavailable(LINT_UNAVAILABLE);
            }
        };

        let child = Command::new(program)
            .args(args)
            .arg(tmp.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) => {
                warn!(cmd = %program, error = %e, "linter could not be spawned");
                return LintOutcome::Unavailable(LINT_UNAVAILABLE);
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(error = %e, "linter process failed");
                return LintOutcome::Unavailable(LINT_UNAVAILABLE);
            }
            Err(_) => {
                warn!(cmd = %program, "linter exceeded its timeout");
                return LintOutcome::Unavailable(LINT_TIMED_OUT);
            }
        };

        let report = format!(
            "{}\n{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        let report = report.trim().to_string();

        if report.is_empty() {
            // Clean run, or a non-zero exit with no diagnostics to act on.
            LintOutcome::Clean
        } else if output.status.success() {
            LintOutcome::Clean
        } else {
            LintOutcome::Issues(report)
        }
    }
}

fn write_temp_source(source: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut tmp = tempfile::Builder::new()
        .prefix("crucible-lint-")
        .suffix(".py")
        .tempfile()?;
    tmp.write_all(source.as_bytes())?;
    tmp.flush()?;
    Ok(tmp)
}
