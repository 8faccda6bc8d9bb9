//! Code-generation worker backed by the refinement loop.

use async_trait::async_trait;
use tracing::info;

use super::Capability;
use crate::errors::DispatchError;
use crate::refine::RefinementController;

/// Generates implementation code through the full draft/critique/revise/
/// confidence cycle rather than a single capability call.
pub struct CoderWorker {
    refiner: RefinementController,
}

impl CoderWorker {
    pub fn new(refiner: RefinementController) -> Self {
        Self { refiner }
    }
}

#[async_trait]
impl Capability for CoderWorker {
    async fn execute(&self, input: &str) -> Result<String, DispatchError> {
        info!("starting refinement-loop code generation");
        self.refiner.refine(input).await
    }
}
