//! The human-in-the-loop feedback gate.
//!
//! After the parallel review joins, the engine stops and asks the operator
//! what to do with the findings. `approve` (any casing, surrounding
//! whitespace ignored) lets the automated feedback stand alone; any other
//! answer is queued as additional repair guidance.

use anyhow::Result;
use console::style;
use dialoguer::{Input, theme::ColorfulTheme};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Sentinel answer meaning "proceed with the automated feedback only".
pub const APPROVE: &str = "approve";

/// Source of operator decisions at the feedback gate.
pub trait OperatorGate: Send + Sync {
    /// Present both review reports and return the operator's raw answer.
    fn review_feedback(&self, qa_report: &str, security_report: &str) -> Result<String>;
}

/// Returns `true` when the answer is the approval sentinel.
pub fn is_approval(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case(APPROVE)
}

/// Interactive gate backed by the terminal.
pub struct ConsoleGate;

impl OperatorGate for ConsoleGate {
    fn review_feedback(&self, qa_report: &str, security_report: &str) -> Result<String> {
        println!();
        println!("{}", style("═══ QA Review ═══").cyan().bold());
        println!("{qa_report}");
        println!();
        println!("{}", style("═══ Security Review ═══").cyan().bold());
        println!("{security_report}");
        println!();
        println!(
            "{}",
            style(format!(
                "Type '{APPROVE}' to accept the automated feedback, or describe \
                 additional changes to request."
            ))
            .yellow()
        );

        let answer: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Your feedback")
            .interact_text()?;
        Ok(answer)
    }
}

/// Deterministic gate for tests: hands out pre-loaded answers in order.
pub struct ScriptedGate {
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedGate {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|s| s.to_string()).collect()),
        }
    }
}

impl OperatorGate for ScriptedGate {
    fn review_feedback(&self, _qa_report: &str, _security_report: &str) -> Result<String> {
        let mut answers = self.answers.lock().unwrap_or_else(|e| e.into_inner());
        answers
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("scripted gate ran out of answers"))
    }
}
