//! Test-execution tool collaborator.
//!
//! Stages generated unit-test source in a temp file and runs it under the
//! configured test command (`python3 -m unittest <file>` by default). Fails
//! closed: a missing runtime or an overdue run reports not-passed with a
//! descriptive message rather than raising.

use std::io::Write;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use super::strip_code_fences;

/// Runs generated unit tests with a bounded wait.
pub struct TestRunner {
    cmd_line: Vec<String>,
    timeout: Duration,
}

impl TestRunner {
    pub fn new(cmd_line: &str, timeout: Duration) -> Self {
        Self {
            cmd_line: cmd_line.split_whitespace().map(str::to_string).collect(),
            timeout,
        }
    }

    /// Execute a string of test source. Returns `(passed, combined_output)`.
    pub async fn run(&self, test_source: &str) -> (bool, String) {
        let cleaned = strip_code_fences(test_source);
        if cleaned.is_empty() {
            return (false, "no test source to execute".to_string());
        }
        let Some((program, args)) = self.cmd_line.split_first() else {
            return (false, "no test command configured".to_string());
        };

        let tmp = match write_temp_tests(&cleaned) {
            Ok(tmp) => tmp,
            Err(e) => return (false, format!("failed to stage test file: {e}")),
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
                warn!(cmd = %program, error = %e, "test runtime could not be spawned");
                return (
                    false,
                    format!("`{program}` not found - ensure it is on the PATH ({e})"),
                );
            }
        };

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return (false, format!("test process failed: {e}")),
            Err(_) => {
                warn!(secs = self.timeout.as_secs(), "test execution timed out");
                return (
                    false,
                    format!(
                        "test execution timed out after {} seconds",
                        self.timeout.as_secs()
                    ),
                );
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr);
        let combined = format!("{}\n{}", String::from_utf8_lossy(&output.stdout), stderr);
        let passed = verdict_from_stderr(&stderr);

        info!(passed, "unit test run finished");
        (passed, combined)
    }
}

/// unittest prints its verdict to stderr; "OK" marks a passing run.
fn verdict_from_stderr(stderr: &str) -> bool {
    stderr.contains("OK")
}

fn write_temp_tests(source: &str) -> std::io::Result<tempfile::NamedTempFile> {
    let mut tmp = tempfile::Builder::new()
        .prefix("crucible-tests-")
        .suffix(".py")
        .tempfile()?;
    tmp.write_all(source.as_bytes())?;
    tmp.flush()?;
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_runtime_fails_closed() {
        let runner = TestRunner::new("crucible-no-such-python -m unittest", Duration::from_secs(5));
        let (passed, output) = runner.run("import unittest").await;
        assert!(!passed);
        assert!(output.contains("not found"));
    }

    #[tokio::test]
    async fn empty_test_source_fails_closed() {
        let runner = TestRunner::new("crucible-no-such-python", Duration::from_secs(5));
        let (passed, output) = runner.run("``````").await;
        assert!(!passed);
        assert!(output.contains("no test source"));
    }

    #[tokio::test]
    async fn timeout_fails_closed_with_message() {
        let runner = TestRunner::new("tail -f", Duration::from_millis(100));
        let (passed, output) = runner.run("import unittest").await;
        assert!(!passed);
        assert!(output.contains("timed out"));
    }

    #[test]
    fn verdict_requires_ok_on_stderr() {
        assert!(verdict_from_stderr(
            "----------------------------\nRan 3 tests in 0.002s\n\nOK\n"
        ));
        assert!(!verdict_from_stderr(
            "Ran 3 tests in 0.002s\n\nFAILED (failures=1)\n"
        ));
        assert!(!verdict_from_stderr(""));
    }
}
