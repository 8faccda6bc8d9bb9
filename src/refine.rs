//! Iterative self-refinement of a generated artifact.
//!
//! Converges a draft against a specification through a bounded
//! draft → critique → revise → confidence-gate cycle. Each cycle re-derives
//! a single distilled reasoning string over a fixed number of critique
//! rounds — only the latest reasoning survives, keeping context and cost
//! bounded. The loop stops when a self-assessed confidence score meets the
//! cycle's threshold or when the cycle cap is reached, whichever comes
//! first; it never regenerates the draft from scratch after cycle 0 and it
//! always terminates.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::dispatch::{BackendFamily, CapabilityDispatcher};
use crate::errors::DispatchError;
use crate::ledger::InteractionLedger;
use crate::tools::{LintOutcome, StaticAnalyzer};

/// Hard cap on refinement cycles.
const MAX_CYCLES: u32 = 16;
/// Critique rounds per cycle, constant across cycles.
const CRITIQUE_ROUNDS: u32 = 6;
/// Starting confidence threshold.
const BASE_THRESHOLD: u32 = 7;
/// Cycles between threshold increments.
const THRESHOLD_STEP_PERIOD: u32 = 4;

const INITIAL_REASONING: &str = "Initial thoughts: the draft seems to cover the basics.";

/// Confidence required to stop refining at a given cycle.
///
/// Non-decreasing step function: starts at 7, steps up every 4 cycles. The
/// exact constants are policy; the structural guarantees are monotonic
/// non-decrease and the finite cycle cap.
pub fn confidence_threshold(cycle: u32) -> u32 {
    BASE_THRESHOLD + cycle / THRESHOLD_STEP_PERIOD
}

/// Parse the first run of digits in a confidence response.
///
/// No digits means no confidence — never an error.
pub fn parse_confidence(response: &str) -> Option<u32> {
    let digits: String = response
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Runs the bounded draft/critique/revise/confidence cycle for one artifact.
pub struct RefinementController {
    dispatcher: Arc<CapabilityDispatcher>,
    ledger: Arc<InteractionLedger>,
    analyzer: StaticAnalyzer,
    preferred: BackendFamily,
    max_cycles: u32,
    critique_rounds: u32,
}

impl RefinementController {
    pub fn new(
        dispatcher: Arc<CapabilityDispatcher>,
        ledger: Arc<InteractionLedger>,
        analyzer: StaticAnalyzer,
        preferred: BackendFamily,
    ) -> Self {
        Self {
            dispatcher,
            ledger,
            analyzer,
            preferred,
            max_cycles: MAX_CYCLES,
            critique_rounds: CRITIQUE_ROUNDS,
        }
    }

    /// Override the cycle and critique bounds (tests, cheap dry runs).
    pub fn with_limits(mut self, max_cycles: u32, critique_rounds: u32) -> Self {
        self.max_cycles = max_cycles;
        self.critique_rounds = critique_rounds;
        self
    }

    /// Converge an artifact against `spec` and return the final draft.
    ///
    /// Fails only when no backend is configured at all; every other failure
    /// flows through as error text inside the draft.
    pub async fn refine(&self, spec: &str) -> Result<String, DispatchError> {
        let mut draft = String::new();

        for cycle in 0..self.max_cycles {
            info!(cycle, max = self.max_cycles, "refinement cycle");

            if draft.is_empty() {
                draft = self.invoke(&draft_prompt(spec)).await?;
            }

            // Critique rounds re-derive one distilled reasoning string; the
            // earlier rounds' text is discarded, not accumulated.
            let mut reasoning = INITIAL_REASONING.to_string();
            for round in 0..self.critique_rounds {
                debug!(round, "critique round");
                reasoning = self
                    .invoke(&critique_prompt(spec, &draft, &reasoning))
                    .await?;
            }

            draft = self
                .invoke(&revise_prompt(spec, &draft, &reasoning))
                .await?;

            if let Some(report) = self.lint(&draft).await {
                draft = self
                    .invoke(&correction_prompt(spec, &draft, &report))
                    .await?;
            }

            let response = self.invoke(&confidence_prompt(&draft)).await?;
            let threshold = confidence_threshold(cycle);
            match parse_confidence(&response) {
                Some(score) if score >= threshold => {
                    info!(score, threshold, "confidence met, finalizing");
                    return Ok(draft);
                }
                Some(score) => {
                    info!(score, threshold, "confidence below threshold, refining again");
                }
                None => {
                    warn!("confidence response had no digits, assuming low confidence");
                }
            }
        }

        info!("cycle cap reached, returning last draft");
        Ok(draft)
    }

    async fn invoke(&self, prompt: &str) -> Result<String, DispatchError> {
        self.dispatcher.invoke(self.preferred, prompt).await
    }

    /// Run static analysis on the draft; `Some(report)` means one targeted
    /// correction call is warranted. Unavailability degrades to no findings.
    async fn lint(&self, draft: &str) -> Option<String> {
        match self.analyzer.check(draft).await {
            LintOutcome::Clean => {
                self.ledger.record("lint", true, draft, "no findings");
                None
            }
            LintOutcome::Issues(report) => {
                self.ledger.record("lint", true, draft, &report);
                Some(report)
            }
            LintOutcome::Unavailable(message) => {
                self.ledger
                    .record_failure("lint", "ToolUnavailableOrTimedOut", draft, message);
                None
            }
        }
    }
}

fn draft_prompt(spec: &str) -> String {
    format!(
        "Generate a complete, rough draft of a module for the following \
         specification. Focus on getting a full implementation down quickly; \
         refinement will happen later.\n\n{spec}"
    )
}

fn critique_prompt(spec: &str, draft: &str, reasoning: &str) -> String {
    format!(
        "You are self-critiquing a draft solution. Your goal is to improve \
         your reasoning. The original problem was: '{spec}'\n\n\
         The current draft is:\n```\n{draft}\n```\n\n\
         Your current reasoning is: '{reasoning}'\n\n\
         Review your reasoning. Does it fully address the problem? Where are \
         the logical errors or gaps? Provide a new, more refined line of \
         reasoning."
    )
}

fn revise_prompt(spec: &str, draft: &str, reasoning: &str) -> String {
    format!(
        "You will revise a code draft. You have already thought deeply about \
         the problem. Use your refined reasoning to create a new, much better \
         version of the code.\n\n\
         Original Specification:\n{spec}\n\n\
         Original (Flawed) Draft:\n```\n{draft}\n```\n\n\
         Your Final, Refined Reasoning:\n{reasoning}\n\n\
         Now, write the new, complete, and correct module."
    )
}

fn correction_prompt(spec: &str, draft: &str, report: &str) -> String {
    format!(
        "Static analysis reported the following issues in your draft. Fix \
         exactly these issues and return the corrected module in full.\n\n\
         Specification:\n{spec}\n\n\
         Draft:\n```\n{draft}\n```\n\n\
         Reported issues:\n{report}"
    )
}

fn confidence_prompt(draft: &str) -> String {
    format!(
        "You are a code reviewer. On a scale of 1 to 10, where 1 is \
         'completely wrong' and 10 is 'perfectly correct and \
         production-ready', rate the following code. Your answer must be a \
         single integer and nothing else.\n\n--- Code to Rate ---\n```\n{draft}\n```"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Credentials};
    use crate::dispatch::client::ScriptedClient;
    use std::time::Duration;
    use tempfile::tempdir;

    fn setup(
        client: Arc<ScriptedClient>,
        lint_cmd: &str,
    ) -> (RefinementController, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = Arc::new(Config::for_project(
            dir.path(),
            Credentials {
                anthropic: Some("key-a".to_string()),
                gemini: Some("key-g".to_string()),
                openai: Some("key-o".to_string()),
            },
        ));
        let ledger = Arc::new(InteractionLedger::new(dir.path().to_path_buf()));
        let dispatcher = Arc::new(CapabilityDispatcher::new(
            config,
            Arc::clone(&ledger),
            client,
        ));
        let analyzer = StaticAnalyzer::new(lint_cmd, Duration::from_secs(5));
        let controller = RefinementController::new(
            dispatcher,
            ledger,
            analyzer,
            BackendFamily::Codex,
        );
        (controller, dir)
    }

    const NO_LINTER: &str = "crucible-no-such-linter";

    #[test]
    fn threshold_is_non_decreasing_and_steps_every_four_cycles() {
        assert_eq!(confidence_threshold(0), 7);
        assert_eq!(confidence_threshold(3), 7);
        assert_eq!(confidence_threshold(4), 8);
        assert_eq!(confidence_threshold(8), 9);
        for c in 0..100 {
            assert!(confidence_threshold(c + 1) >= confidence_threshold(c));
        }
    }

    #[test]
    fn parse_confidence_takes_first_digit_run() {
        assert_eq!(parse_confidence("8"), Some(8));
        assert_eq!(parse_confidence("I'd rate this 6/10"), Some(6));
        assert_eq!(parse_confidence("score: 10 out of 10"), Some(10));
        assert_eq!(parse_confidence("no digits here"), None);
        assert_eq!(parse_confidence(""), None);
    }

    #[tokio::test]
    async fn two_cycle_convergence_returns_second_revision() {
        let client = Arc::new(
            ScriptedClient::new("unused")
                .on("rough draft", &["draft-v0"])
                .on("self-critiquing", &["reasoning"])
                .on("revise a code draft", &["draft-v1", "draft-v2"])
                .on("scale of 1 to 10", &["6", "9"]),
        );
        let (controller, _dir) = setup(Arc::clone(&client), NO_LINTER);

        let artifact = controller.refine("build a calculator").await.unwrap();
        // First confidence 6 < 7 forces a second cycle; 9 >= 7 ends it.
        assert_eq!(artifact, "draft-v2");

        let confidence_calls = client
            .calls()
            .iter()
            .filter(|(_, p)| p.contains("scale of 1 to 10"))
            .count();
        assert_eq!(confidence_calls, 2);

        // The draft is produced once and never regenerated from scratch.
        let draft_calls = client
            .calls()
            .iter()
            .filter(|(_, p)| p.contains("rough draft"))
            .count();
        assert_eq!(draft_calls, 1);

        // Six critique rounds per cycle, two cycles.
        let critique_calls = client
            .calls()
            .iter()
            .filter(|(_, p)| p.contains("self-critiquing"))
            .count();
        assert_eq!(critique_calls, 12);
    }

    #[tokio::test]
    async fn cycle_cap_returns_last_draft_without_confidence() {
        let client = Arc::new(
            ScriptedClient::new("filler")
                .on("rough draft", &["draft-v0"])
                .on("self-critiquing", &["reasoning"])
                .on("revise a code draft", &["rev-1", "rev-2", "rev-3"])
                .on("scale of 1 to 10", &["1"]),
        );
        let (controller, _dir) = setup(Arc::clone(&client), NO_LINTER);
        let controller = controller.with_limits(3, 1);

        let artifact = controller.refine("spec").await.unwrap();
        assert_eq!(artifact, "rev-3");
    }

    #[tokio::test]
    async fn unparseable_confidence_is_low_confidence_not_an_error() {
        let client = Arc::new(
            ScriptedClient::new("filler")
                .on("rough draft", &["draft-v0"])
                .on("self-critiquing", &["reasoning"])
                .on("revise a code draft", &["rev-1", "rev-2"])
                .on("scale of 1 to 10", &["I cannot rate this", "9"]),
        );
        let (controller, _dir) = setup(Arc::clone(&client), NO_LINTER);
        let controller = controller.with_limits(4, 1);

        let artifact = controller.refine("spec").await.unwrap();
        assert_eq!(artifact, "rev-2");
    }

    #[tokio::test]
    async fn lint_findings_trigger_exactly_one_correction_call() {
        // `grep -c` prints a match count of "0" and exits non-zero, which
        // reads as a one-line issue report.
        let client = Arc::new(
            ScriptedClient::new("filler")
                .on("rough draft", &["draft-v0"])
                .on("self-critiquing", &["reasoning"])
                .on("revise a code draft", &["rev-1"])
                .on("Static analysis reported", &["rev-1-fixed"])
                .on("scale of 1 to 10", &["9"]),
        );
        let (controller, _dir) = setup(Arc::clone(&client), "grep -c zzz-no-match");

        let artifact = controller.refine("spec").await.unwrap();
        assert_eq!(artifact, "rev-1-fixed");

        let correction_calls = client
            .calls()
            .iter()
            .filter(|(_, p)| p.contains("Static analysis reported"))
            .count();
        assert_eq!(correction_calls, 1);
    }

    #[tokio::test]
    async fn lint_unavailable_skips_correction_and_is_ledgered() {
        let client = Arc::new(
            ScriptedClient::new("filler")
                .on("rough draft", &["draft-v0"])
                .on("self-critiquing", &["reasoning"])
                .on("revise a code draft", &["rev-1"])
                .on("scale of 1 to 10", &["9"]),
        );
        let (controller, dir) = setup(Arc::clone(&client), NO_LINTER);

        let artifact = controller.refine("spec").await.unwrap();
        assert_eq!(artifact, "rev-1");

        let lint_ledger = std::fs::read_to_string(dir.path().join("lint.md")).unwrap();
        assert!(lint_ledger.contains("ToolUnavailableOrTimedOut"));
    }
}
