//! Workflow phases, run state, and the checkpoint store.
//!
//! The whole run is one serializable [`WorkflowState`] value, checkpointed to
//! `.crucible/state.json` after every phase. Resume is just "load the file and
//! keep going" — an absent file means a fresh run sitting in [`Phase::Idle`].

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::EngineError;

/// The phases of a run, in execution order. Transitions only ever move
/// forward; there is no retry or rollback edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Phase {
    Idle,
    Planning,
    Generation,
    Review,
    Feedback,
    Repair,
    Verification,
    Finalization,
    Completed,
}

impl Phase {
    /// The phase that follows this one, or `None` from `Completed`.
    pub fn next(self) -> Option<Phase> {
        match self {
            Phase::Idle => Some(Phase::Planning),
            Phase::Planning => Some(Phase::Generation),
            Phase::Generation => Some(Phase::Review),
            Phase::Review => Some(Phase::Feedback),
            Phase::Feedback => Some(Phase::Repair),
            Phase::Repair => Some(Phase::Verification),
            Phase::Verification => Some(Phase::Finalization),
            Phase::Finalization => Some(Phase::Completed),
            Phase::Completed => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Idle => "Idle",
            Phase::Planning => "Planning",
            Phase::Generation => "Generation",
            Phase::Review => "Review",
            Phase::Feedback => "Feedback",
            Phase::Repair => "Repair",
            Phase::Verification => "Verification",
            Phase::Finalization => "Finalization",
            Phase::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The named artifact slots the phases fill in as the run progresses.
///
/// Each phase writes only its own slots; earlier slots are never mutated by
/// later phases, so a resumed run sees exactly what the interrupted one
/// produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artifacts {
    pub architecture_plan: Option<String>,
    pub database_plan: Option<String>,
    pub ui_plan: Option<String>,
    pub full_plan: Option<String>,
    pub generated_code: Option<String>,
    pub qa_feedback: Option<String>,
    pub security_feedback: Option<String>,
    pub fixed_code: Option<String>,
    pub qa_verification: Option<String>,
    pub documentation: Option<String>,
}

/// One entry in the feedback queue consumed by the repair phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub source: String,
    pub feedback: String,
}

impl FeedbackEntry {
    pub fn new(source: impl Into<String>, feedback: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            feedback: feedback.into(),
        }
    }
}

/// The complete, serializable state of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    pub phase: Phase,
    pub goal: String,
    #[serde(default)]
    pub artifacts: Artifacts,
    #[serde(default)]
    pub pending_feedback: Vec<FeedbackEntry>,
    #[serde(default)]
    pub memory_exported: bool,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            goal: String::new(),
            artifacts: Artifacts::default(),
            pending_feedback: Vec::new(),
            memory_exported: false,
        }
    }
}

/// Loads and checkpoints [`WorkflowState`] as JSON on disk.
///
/// Writes go through a temporary file in the same directory followed by a
/// rename, so an interrupted write can never leave a half-written checkpoint
/// behind. Any persistence failure is fatal: continuing past a failed
/// checkpoint would make the next resume lie about what already ran.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the checkpoint, or a fresh `Idle` state when none exists.
    ///
    /// A file that exists but cannot be read or parsed is fatal — a
    /// checkpoint we cannot trust must not be silently replaced.
    pub fn load(&self) -> Result<WorkflowState, EngineError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no checkpoint found, starting idle");
                return Ok(WorkflowState::default());
            }
            Err(e) => {
                return Err(EngineError::StateLoadFailed {
                    path: self.path.clone(),
                    source: anyhow::Error::new(e),
                });
            }
        };

        let state: WorkflowState =
            serde_json::from_str(&raw).map_err(|e| EngineError::StateLoadFailed {
                path: self.path.clone(),
                source: anyhow::Error::new(e).context("checkpoint file is not valid"),
            })?;
        info!(phase = %state.phase, "resumed workflow checkpoint");
        Ok(state)
    }

    /// Atomically persist the state.
    pub fn save(&self, state: &WorkflowState) -> Result<(), EngineError> {
        self.save_inner(state)
            .map_err(|source| EngineError::StatePersistenceFailed {
                path: self.path.clone(),
                source,
            })
    }

    fn save_inner(&self, state: &WorkflowState) -> std::io::Result<()> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| std::io::Error::other("checkpoint path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;

        let body = serde_json::to_string_pretty(state)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(body.as_bytes())?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        debug!(phase = %state.phase, path = %self.path.display(), "checkpoint written");
        Ok(())
    }

    /// Delete the checkpoint, if present.
    pub fn reset(&self) -> anyhow::Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("failed to remove checkpoint at {}", self.path.display())
            }),
        }
    }
}
