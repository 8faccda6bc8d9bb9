//! Append-only interaction ledger.
//!
//! Every capability invocation — success or failure — is recorded to a
//! durable markdown document, one file per backend family (`claude.md`,
//! `gemini.md`, `codex.md`). The ledger exists purely for human audit and
//! observability: core logic never reads it back, and a failed ledger write
//! never fails the run.
//!
//! Appends may arrive from concurrent tasks during the review fan-out, so
//! each entry is formatted in full first and written as a single append
//! under a lock — one entry, one atomic append.

use chrono::Utc;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{debug, error};

/// Maximum number of characters of prompt/response stored per entry.
const SNIPPET_CHARS: usize = 500;

/// A single dispatch record before formatting.
#[derive(Debug, Clone)]
pub struct DispatchRecord<'a> {
    pub family: &'a str,
    pub success: bool,
    /// Error kind tag for failed invocations (e.g. `BackendInvocationFailed`).
    pub error_kind: Option<&'a str>,
    pub prompt: &'a str,
    pub response: &'a str,
}

/// Append-only, file-per-family audit log of capability invocations.
pub struct InteractionLedger {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl InteractionLedger {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            write_lock: Mutex::new(()),
        }
    }

    /// Record a successful invocation.
    pub fn record(&self, family: &str, success: bool, prompt: &str, response: &str) {
        self.append(DispatchRecord {
            family,
            success,
            error_kind: None,
            prompt,
            response,
        });
    }

    /// Record a failed invocation with its error kind tag.
    pub fn record_failure(&self, family: &str, kind: &str, prompt: &str, response: &str) {
        self.append(DispatchRecord {
            family,
            success: false,
            error_kind: Some(kind),
            prompt,
            response,
        });
    }

    /// Format and atomically append one entry to the family's document.
    ///
    /// Ledger I/O failures are logged and swallowed: observability must not
    /// take down the run.
    pub fn append(&self, record: DispatchRecord<'_>) {
        let path = self.dir.join(format!("{}.md", record.family));
        let status = if record.success {
            "SUCCESS"
        } else {
            "FAILED"
        };
        let kind_line = match record.error_kind {
            Some(kind) => format!("**Error kind:** {kind}\n\n"),
            None => String::new(),
        };
        let entry = format!(
            "## Interaction at {}\n\n\
             **Status:** {}\n\n\
             {}\
             ### Prompt Snippet\n\n```\n{}\n```\n\n\
             ### Response Snippet\n\n```\n{}\n```\n\n\
             ---\n\n",
            Utc::now().to_rfc3339(),
            status,
            kind_line,
            snippet(record.prompt),
            snippet(record.response),
        );

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let result = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut file| {
                if file.metadata()?.len() == 0 {
                    writeln!(file, "# Interaction Ledger: {}\n", record.family)?;
                }
                file.write_all(entry.as_bytes())
            });

        match result {
            Ok(()) => debug!(family = record.family, status, "recorded interaction"),
            Err(e) => error!(
                family = record.family,
                error = %e,
                "failed to write ledger entry"
            ),
        }
    }
}

/// Truncate text to a bounded snippet on a character boundary.
fn snippet(text: &str) -> String {
    if text.chars().count() <= SNIPPET_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(SNIPPET_CHARS).collect();
        format!("{truncated}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn record_creates_family_file_with_header() {
        let dir = tempdir().unwrap();
        let ledger = InteractionLedger::new(dir.path().to_path_buf());
        ledger.record("claude", true, "design a schema", "here is a schema");

        let content = std::fs::read_to_string(dir.path().join("claude.md")).unwrap();
        assert!(content.starts_with("# Interaction Ledger: claude"));
        assert!(content.contains("**Status:** SUCCESS"));
        assert!(content.contains("design a schema"));
    }

    #[test]
    fn failure_entries_carry_error_kind() {
        let dir = tempdir().unwrap();
        let ledger = InteractionLedger::new(dir.path().to_path_buf());
        ledger.record_failure("gemini", "BackendInvocationFailed", "prompt", "boom");

        let content = std::fs::read_to_string(dir.path().join("gemini.md")).unwrap();
        assert!(content.contains("**Status:** FAILED"));
        assert!(content.contains("**Error kind:** BackendInvocationFailed"));
    }

    #[test]
    fn entries_append_rather_than_overwrite() {
        let dir = tempdir().unwrap();
        let ledger = InteractionLedger::new(dir.path().to_path_buf());
        ledger.record("codex", true, "first", "one");
        ledger.record("codex", false, "second", "two");

        let content = std::fs::read_to_string(dir.path().join("codex.md")).unwrap();
        assert_eq!(content.matches("## Interaction at").count(), 2);
        // Header written exactly once.
        assert_eq!(content.matches("# Interaction Ledger: codex").count(), 1);
    }

    #[test]
    fn long_prompts_are_truncated() {
        let dir = tempdir().unwrap();
        let ledger = InteractionLedger::new(dir.path().to_path_buf());
        let long_prompt = "x".repeat(2000);
        ledger.record("claude", true, &long_prompt, "ok");

        let content = std::fs::read_to_string(dir.path().join("claude.md")).unwrap();
        assert!(!content.contains(&long_prompt));
        assert!(content.contains(&"x".repeat(SNIPPET_CHARS)));
    }

    #[tokio::test]
    async fn concurrent_appends_do_not_interleave() {
        let dir = tempdir().unwrap();
        let ledger = Arc::new(InteractionLedger::new(dir.path().to_path_buf()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::task::spawn_blocking(move || {
                ledger.record("claude", true, &format!("prompt-{i}"), &format!("resp-{i}"));
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = std::fs::read_to_string(dir.path().join("claude.md")).unwrap();
        assert_eq!(content.matches("## Interaction at").count(), 8);
        // Every entry is intact: each prompt snippet is followed by a fence.
        for i in 0..8 {
            assert!(content.contains(&format!("prompt-{i}")));
        }
    }
}
