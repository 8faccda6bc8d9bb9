//! Typed error hierarchy for the Crucible orchestrator.
//!
//! Two top-level enums cover the two subsystems that are allowed to fail hard:
//! - `DispatchError` — capability dispatch failures
//! - `EngineError` — workflow engine and checkpoint failures
//!
//! Everything else (a backend call raising, an unparseable confidence score,
//! a missing linter binary) is recovered locally into a textual payload and
//! surfaced only through the interaction ledger.

use thiserror::Error;

/// Errors from the capability dispatcher.
///
/// An individual backend call failing is *not* an error at this level — the
/// dispatcher converts it into an error-text payload and records the failure
/// in the ledger. Only a total absence of usable backends is propagated.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no capability backend is configured - set at least one API key in crucible.toml")]
    NoBackendConfigured,
}

/// Errors from the workflow engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no usable backend credential is configured")]
    ConfigurationMissing(#[from] DispatchError),

    #[error("failed to persist workflow checkpoint at {path}: {source}")]
    StatePersistenceFailed {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read workflow checkpoint at {path}: {source}")]
    StateLoadFailed {
        path: std::path::PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
