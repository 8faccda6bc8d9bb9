//! The resumable workflow engine.
//!
//! Drives a run through its phases in fixed forward order, checkpointing
//! after every transition so an interrupted process picks up at the next
//! phase with all earlier artifacts intact. Each phase hands artifacts to
//! one or more workers, stores what comes back, and never inspects the text
//! for semantic errors — a backend failure travels through the pipeline as
//! an error-text artifact, visible in the ledger, without stopping the run.

pub mod gate;
pub mod state;

use futures::future::BoxFuture;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::dispatch::CapabilityDispatcher;
use crate::errors::{DispatchError, EngineError};
use crate::memory::MemoryStore;
use crate::review;
use crate::workers::WorkerSet;

pub use gate::{is_approval, ConsoleGate, OperatorGate, ScriptedGate, APPROVE};
pub use state::{Artifacts, FeedbackEntry, Phase, StateStore, WorkflowState};

/// Fixed component description handed to the UI/UX worker during planning.
const UI_COMPONENT_BRIEF: &str = "User authentication and profile page.";

/// Orchestrates one run of the worker team from goal to completion.
pub struct WorkflowEngine {
    store: StateStore,
    state: WorkflowState,
    dispatcher: Arc<CapabilityDispatcher>,
    workers: WorkerSet,
    gate: Box<dyn OperatorGate>,
    memory: MemoryStore,
}

impl WorkflowEngine {
    /// Build the engine, loading any existing checkpoint.
    pub fn new(
        config: &crate::config::Config,
        dispatcher: Arc<CapabilityDispatcher>,
        workers: WorkerSet,
        gate: Box<dyn OperatorGate>,
    ) -> Result<Self, EngineError> {
        let store = StateStore::new(config.state_file.clone());
        let state = store.load()?;
        let memory = MemoryStore::new(config.memory.clone());
        Ok(Self {
            store,
            state,
            dispatcher,
            workers,
            gate,
            memory,
        })
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// Begin a fresh run, or keep the resumed one.
    ///
    /// When a checkpoint already holds a run in progress the stored goal
    /// wins; the new goal is only adopted from `Idle`.
    pub fn start(&mut self, goal: &str) -> Result<(), EngineError> {
        if self.state.phase == Phase::Idle {
            self.state.goal = goal.to_string();
            self.state.phase = Phase::Planning;
            self.checkpoint()?;
            info!(goal, "workflow started");
        } else {
            if self.state.goal != goal {
                warn!(
                    stored = %self.state.goal,
                    requested = goal,
                    "ignoring new goal, resuming run in progress (use reset to start over)"
                );
            }
            info!(phase = %self.state.phase, "resuming workflow");
        }
        Ok(())
    }

    /// Run the whole workflow to completion, resuming where the checkpoint
    /// left off.
    pub async fn run(&mut self, goal: &str) -> Result<(), EngineError> {
        if self.dispatcher.available_families().is_empty() {
            return Err(DispatchError::NoBackendConfigured.into());
        }
        self.start(goal)?;
        while self.state.phase != Phase::Completed {
            self.advance().await?;
        }
        // The post-completion step exports the finished run to memory once.
        self.advance().await?;
        Ok(())
    }

    /// Execute the current phase and move to the next one.
    ///
    /// A no-op in `Idle` (nothing has been started) and in `Completed`,
    /// except that the first call after completion exports the run to the
    /// memory store.
    pub async fn advance(&mut self) -> Result<Phase, EngineError> {
        match self.state.phase {
            Phase::Idle => {
                warn!("advance called before start; nothing to do");
                Ok(Phase::Idle)
            }
            Phase::Completed => {
                self.export_to_memory().await?;
                Ok(Phase::Completed)
            }
            phase => {
                info!(%phase, "entering phase");
                println!(
                    "{}",
                    console::style(format!("━━━ {phase} ━━━")).magenta().bold()
                );
                match phase {
                    Phase::Planning => self.run_planning().await?,
                    Phase::Generation => self.run_generation().await?,
                    Phase::Review => self.run_review().await?,
                    Phase::Feedback => self.run_feedback().await?,
                    Phase::Repair => self.run_repair().await?,
                    Phase::Verification => self.run_verification().await?,
                    Phase::Finalization => self.run_finalization().await?,
                    Phase::Idle | Phase::Completed => {}
                }
                if let Some(next) = phase.next() {
                    self.state.phase = next;
                }
                self.checkpoint()?;
                Ok(self.state.phase)
            }
        }
    }

    fn checkpoint(&self) -> Result<(), EngineError> {
        self.store.save(&self.state)
    }

    /// Architecture, database and UI plans, combined into the full plan.
    async fn run_planning(&mut self) -> Result<(), EngineError> {
        let architecture = self.workers.architect.execute(&self.state.goal).await?;
        let database = self.workers.database.execute(&architecture).await?;
        let ui = self.workers.ui_ux.execute(UI_COMPONENT_BRIEF).await?;

        let full_plan = format!("{architecture}\n\n{database}\n\n{ui}");
        self.state.artifacts.architecture_plan = Some(architecture);
        self.state.artifacts.database_plan = Some(database);
        self.state.artifacts.ui_plan = Some(ui);
        self.state.artifacts.full_plan = Some(full_plan);
        Ok(())
    }

    async fn run_generation(&mut self) -> Result<(), EngineError> {
        let plan = self.state.artifacts.full_plan.clone().unwrap_or_default();
        let code = self.workers.coder.execute(&plan).await?;
        self.state.artifacts.generated_code = Some(code);
        Ok(())
    }

    /// QA and security review the generated code concurrently.
    async fn run_review(&mut self) -> Result<(), EngineError> {
        let code = self
            .state
            .artifacts
            .generated_code
            .clone()
            .unwrap_or_default();

        let mut tasks: HashMap<String, BoxFuture<'static, Result<String, DispatchError>>> =
            HashMap::new();
        let qa = Arc::clone(&self.workers.qa);
        let qa_code = code.clone();
        tasks.insert(
            "qa".to_string(),
            Box::pin(async move { qa.execute(&qa_code).await }),
        );
        let security = Arc::clone(&self.workers.security);
        tasks.insert(
            "security".to_string(),
            Box::pin(async move { security.execute(&code).await }),
        );

        let mut results = review::run_parallel(tasks).await;
        self.state.artifacts.qa_feedback = results.remove("qa");
        self.state.artifacts.security_feedback = results.remove("security");
        Ok(())
    }

    /// Present the review findings to the operator and queue the feedback
    /// the repair phase will act on.
    async fn run_feedback(&mut self) -> Result<(), EngineError> {
        let qa = self.state.artifacts.qa_feedback.clone().unwrap_or_default();
        let security = self
            .state
            .artifacts
            .security_feedback
            .clone()
            .unwrap_or_default();

        let answer = self.gate.review_feedback(&qa, &security)?;

        self.state.pending_feedback.clear();
        self.state.pending_feedback.push(FeedbackEntry::new("QA", qa));
        self.state
            .pending_feedback
            .push(FeedbackEntry::new("Security", security));
        if is_approval(&answer) {
            info!("operator approved the automated feedback");
        } else {
            info!("operator added feedback of their own");
            self.state
                .pending_feedback
                .push(FeedbackEntry::new("Human Operator", answer));
        }
        Ok(())
    }

    /// One repair pass over the generated code using all queued feedback.
    async fn run_repair(&mut self) -> Result<(), EngineError> {
        let code = self
            .state
            .artifacts
            .generated_code
            .clone()
            .unwrap_or_default();
        let feedback = self
            .state
            .pending_feedback
            .iter()
            .map(|entry| format!("[{}]\n{}", entry.source, entry.feedback))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!("Original Code:\n{code}\n\nReview Feedback:\n{feedback}");
        let fixed = self.workers.coder.execute(&prompt).await?;

        self.state.artifacts.fixed_code = Some(fixed);
        self.state.pending_feedback.clear();
        Ok(())
    }

    async fn run_verification(&mut self) -> Result<(), EngineError> {
        let fixed = self.state.artifacts.fixed_code.clone().unwrap_or_default();
        let report = self.workers.qa.execute(&fixed).await?;
        self.state.artifacts.qa_verification = Some(report);
        Ok(())
    }

    async fn run_finalization(&mut self) -> Result<(), EngineError> {
        let fixed = self.state.artifacts.fixed_code.clone().unwrap_or_default();
        let documentation = self.workers.documentation.execute(&fixed).await?;
        self.state.artifacts.documentation = Some(documentation);
        Ok(())
    }

    /// Export the finished run to long-term memory, at most once.
    ///
    /// The attempt itself is fire-and-forget; the persisted flag guards
    /// against repeat exports on later invocations against the same
    /// checkpoint.
    async fn export_to_memory(&mut self) -> Result<(), EngineError> {
        if self.state.memory_exported || !self.memory.is_enabled() {
            return Ok(());
        }

        let artifacts = &self.state.artifacts;
        let document = format!(
            "Goal:\n{}\n\nPlan:\n{}\n\nFinal Code:\n{}\n\nDocumentation:\n{}",
            self.state.goal,
            artifacts.full_plan.as_deref().unwrap_or_default(),
            artifacts.fixed_code.as_deref().unwrap_or_default(),
            artifacts.documentation.as_deref().unwrap_or_default(),
        );
        let id = uuid::Uuid::new_v4().to_string();
        let metadata = json!({
            "goal": self.state.goal,
            "completed_at": chrono::Utc::now().to_rfc3339(),
        });
        self.memory.add_memory(&document, metadata, &id).await;

        self.state.memory_exported = true;
        self.checkpoint()
    }
}
