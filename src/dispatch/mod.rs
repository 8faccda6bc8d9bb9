//! Capability dispatch: resolving a logical generation request to a
//! concrete, currently-usable backend family.
//!
//! The dispatcher applies a fixed global preference order (Claude → Gemini →
//! Codex). When the preferred family has no usable credential it silently
//! substitutes the first available one — callers receive a successful result
//! without being told which family served it; the ledger records the family
//! actually used. Availability is re-evaluated on every invoke rather than
//! cached at construction time.
//!
//! A backend call failing is recovered here, at the dispatch boundary: the
//! caller gets an error-text payload that flows downstream like any other
//! worker output, and the ledger entry carries the error kind. Only a total
//! absence of configured backends aborts the run.

pub mod client;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::DispatchError;
use crate::ledger::InteractionLedger;
use client::ModelClient;

/// The capability families known to the dispatcher, in preference order.
pub const PREFERENCE_ORDER: [BackendFamily; 3] = [
    BackendFamily::Claude,
    BackendFamily::Gemini,
    BackendFamily::Codex,
];

/// A class of backend able to satisfy a text-generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendFamily {
    Claude,
    Gemini,
    Codex,
}

impl BackendFamily {
    /// Lowercase identifier used for ledger file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Claude => "claude",
            Self::Gemini => "gemini",
            Self::Codex => "codex",
        }
    }
}

impl std::fmt::Display for BackendFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Claude => write!(f, "Claude"),
            Self::Gemini => write!(f, "Gemini"),
            Self::Codex => write!(f, "Codex"),
        }
    }
}

/// Resolves a preferred backend family to a usable one and invokes it.
pub struct CapabilityDispatcher {
    config: Arc<Config>,
    ledger: Arc<InteractionLedger>,
    client: Arc<dyn ModelClient>,
}

impl CapabilityDispatcher {
    pub fn new(
        config: Arc<Config>,
        ledger: Arc<InteractionLedger>,
        client: Arc<dyn ModelClient>,
    ) -> Self {
        Self {
            config,
            ledger,
            client,
        }
    }

    /// All families with a usable credential right now, in preference order.
    pub fn available_families(&self) -> Vec<BackendFamily> {
        PREFERENCE_ORDER
            .iter()
            .copied()
            .filter(|family| self.config.credential(*family).is_some())
            .collect()
    }

    /// Pick the family that will serve a request preferring `preferred`.
    ///
    /// Fails only when zero families are available at all.
    fn resolve(&self, preferred: BackendFamily) -> Result<BackendFamily, DispatchError> {
        let available = self.available_families();
        if available.contains(&preferred) {
            return Ok(preferred);
        }
        match available.first() {
            Some(family) => {
                warn!(
                    preferred = preferred.name(),
                    substitute = family.name(),
                    "preferred backend unavailable, substituting"
                );
                Ok(*family)
            }
            None => Err(DispatchError::NoBackendConfigured),
        }
    }

    /// Invoke a generation capability.
    ///
    /// Returns `Err` only for [`DispatchError::NoBackendConfigured`]. A
    /// failing backend call is converted into an error-text payload and
    /// returned as `Ok` — downstream phases treat it as ordinary worker
    /// output, and the ledger entry exposes the failure.
    pub async fn invoke(
        &self,
        preferred: BackendFamily,
        prompt: &str,
    ) -> Result<String, DispatchError> {
        let family = self.resolve(preferred)?;
        let model_id = self.config.model_id(family);
        let credential = self
            .config
            .credential(family)
            .ok_or(DispatchError::NoBackendConfigured)?
            .to_string();

        info!(family = family.name(), model = model_id, "dispatching capability call");

        match self
            .client
            .generate(family, model_id, &credential, prompt)
            .await
        {
            Ok(text) => {
                self.ledger.record(family.name(), true, prompt, &text);
                Ok(text)
            }
            Err(e) => {
                let detail = e.to_string();
                self.ledger.record_failure(
                    family.name(),
                    "BackendInvocationFailed",
                    prompt,
                    &detail,
                );
                warn!(family = family.name(), error = %detail, "backend invocation failed");
                Ok(format!(
                    "ERROR: failed to get a response from the {family} backend. \
                     Check the interaction ledger for details."
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use client::ScriptedClient;
    use tempfile::tempdir;

    fn dispatcher_with(
        credentials: Credentials,
        client: Arc<ScriptedClient>,
    ) -> (CapabilityDispatcher, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let config = Arc::new(Config::for_project(dir.path(), credentials));
        let ledger = Arc::new(InteractionLedger::new(dir.path().to_path_buf()));
        (CapabilityDispatcher::new(config, ledger, client), dir)
    }

    fn all_keys() -> Credentials {
        Credentials {
            anthropic: Some("key-a".to_string()),
            gemini: Some("key-g".to_string()),
            openai: Some("key-o".to_string()),
        }
    }

    #[tokio::test]
    async fn preferred_family_is_used_when_available() {
        let client = Arc::new(ScriptedClient::new("out"));
        let (dispatcher, _dir) = dispatcher_with(all_keys(), Arc::clone(&client));

        let out = dispatcher.invoke(BackendFamily::Codex, "p").await.unwrap();
        assert_eq!(out, "out");
        assert_eq!(client.calls()[0].0, BackendFamily::Codex);
    }

    #[tokio::test]
    async fn unavailable_preferred_silently_substitutes_first_available() {
        let client = Arc::new(ScriptedClient::new("out"));
        let credentials = Credentials {
            anthropic: None,
            gemini: Some("key-g".to_string()),
            openai: Some("key-o".to_string()),
        };
        let (dispatcher, dir) = dispatcher_with(credentials, Arc::clone(&client));

        // Claude is unavailable; Gemini is first in preference order.
        let out = dispatcher.invoke(BackendFamily::Claude, "p").await.unwrap();
        assert_eq!(out, "out");
        assert_eq!(client.calls()[0].0, BackendFamily::Gemini);

        // The ledger records the family actually used, not the preferred one.
        assert!(dir.path().join("gemini.md").exists());
        assert!(!dir.path().join("claude.md").exists());
    }

    #[tokio::test]
    async fn zero_backends_fails_with_no_backend_configured() {
        let client = Arc::new(ScriptedClient::new("out"));
        let (dispatcher, dir) = dispatcher_with(Credentials::default(), client);

        let err = dispatcher
            .invoke(BackendFamily::Claude, "p")
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NoBackendConfigured));
        // No ledger entry claims success.
        assert!(!dir.path().join("claude.md").exists());
        assert!(!dir.path().join("gemini.md").exists());
        assert!(!dir.path().join("codex.md").exists());
    }

    #[tokio::test]
    async fn backend_failure_becomes_error_text_payload() {
        let client = Arc::new(ScriptedClient::new("out").fail_on("p", "rate limited"));
        let (dispatcher, dir) = dispatcher_with(all_keys(), client);

        let out = dispatcher.invoke(BackendFamily::Claude, "p").await.unwrap();
        assert!(out.starts_with("ERROR:"));
        assert!(out.contains("Claude"));

        let ledger = std::fs::read_to_string(dir.path().join("claude.md")).unwrap();
        assert!(ledger.contains("**Status:** FAILED"));
        assert!(ledger.contains("BackendInvocationFailed"));
        assert!(ledger.contains("rate limited"));
    }

    #[tokio::test]
    async fn availability_is_reevaluated_per_invoke() {
        let client = Arc::new(ScriptedClient::new("out"));
        let dir = tempdir().unwrap();
        let mut config = Config::for_project(dir.path(), Credentials::default());
        let ledger = Arc::new(InteractionLedger::new(dir.path().to_path_buf()));

        config.credentials.anthropic = Some("late-key".to_string());
        let dispatcher = CapabilityDispatcher::new(Arc::new(config), ledger, client);
        // The key was set after construction time of the surrounding pieces;
        // the dispatcher still sees it because nothing is cached.
        assert_eq!(
            dispatcher.available_families(),
            vec![BackendFamily::Claude]
        );
    }
}
