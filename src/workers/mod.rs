//! The specialized worker team.
//!
//! Each worker role implements the one-method [`Capability`] interface and
//! owns its prompt content and preferred backend family. The set is built
//! explicitly once at startup and handed to the engine — no role registry,
//! no dynamic lookup by name.

pub mod coder;
pub mod qa;
pub mod roles;

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::dispatch::CapabilityDispatcher;
use crate::errors::DispatchError;
use crate::ledger::InteractionLedger;
use crate::refine::RefinementController;
use crate::tools::{StaticAnalyzer, TestRunner};

pub use coder::CoderWorker;
pub use qa::QaWorker;
pub use roles::{
    ArchitectWorker, DatabaseWorker, DocumentationWorker, SecurityWorker, UiUxWorker,
};

/// A worker able to turn one task description into one text artifact.
///
/// Workers never fail on backend errors — those arrive as error-text
/// payloads from the dispatcher. The only propagated failure is a total
/// absence of configured backends.
#[async_trait]
pub trait Capability: Send + Sync {
    async fn execute(&self, input: &str) -> Result<String, DispatchError>;
}

/// The full agent team, constructed once at startup.
pub struct WorkerSet {
    pub architect: Arc<dyn Capability>,
    pub database: Arc<dyn Capability>,
    pub ui_ux: Arc<dyn Capability>,
    pub coder: Arc<dyn Capability>,
    pub security: Arc<dyn Capability>,
    pub qa: Arc<dyn Capability>,
    pub documentation: Arc<dyn Capability>,
}

impl WorkerSet {
    pub fn new(
        config: &Config,
        dispatcher: Arc<CapabilityDispatcher>,
        ledger: Arc<InteractionLedger>,
    ) -> Self {
        let timeout = std::time::Duration::from_secs(config.tools.timeout_secs);
        let refiner = RefinementController::new(
            Arc::clone(&dispatcher),
            Arc::clone(&ledger),
            StaticAnalyzer::new(&config.tools.lint_cmd, timeout),
            crate::dispatch::BackendFamily::Codex,
        );
        let test_runner = TestRunner::new(&config.tools.test_cmd, timeout);

        Self {
            architect: Arc::new(ArchitectWorker::new(Arc::clone(&dispatcher))),
            database: Arc::new(DatabaseWorker::new(Arc::clone(&dispatcher))),
            ui_ux: Arc::new(UiUxWorker::new(Arc::clone(&dispatcher))),
            coder: Arc::new(CoderWorker::new(refiner)),
            security: Arc::new(SecurityWorker::new(Arc::clone(&dispatcher))),
            qa: Arc::new(QaWorker::new(Arc::clone(&dispatcher), test_runner)),
            documentation: Arc::new(DocumentationWorker::new(dispatcher)),
        }
    }
}
