//! Black-box tool collaborators: static analysis and test execution.
//!
//! Both tools run external binaries under a bounded timeout and fail closed:
//! a missing binary or an overdue process is reported as a fixed textual
//! outcome, never as a crash or an engine error.

pub mod lint;
pub mod testrun;

pub use lint::{LintOutcome, StaticAnalyzer};
pub use testrun::TestRunner;

/// Strip a leading/trailing markdown code fence from generated source.
///
/// Models routinely wrap code in ` ```python … ``` ` even when asked not to.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```python")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim().to_string()
}
