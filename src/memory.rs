//! Optional long-term memory collaborator.
//!
//! Talks to a Chroma-style vector store over HTTP. The engine exports each
//! completed run once; everything here is fire-and-forget — a disabled,
//! unreachable or failing store is logged and otherwise invisible to the
//! workflow.

use serde_json::json;
use tracing::{error, info, warn};

use crate::config::MemorySettings;

/// Client for the vector memory service.
pub struct MemoryStore {
    settings: MemorySettings,
    http: reqwest::Client,
}

impl MemoryStore {
    pub fn new(settings: MemorySettings) -> Self {
        if !settings.enabled {
            warn!("long-term memory is disabled in the configuration");
        }
        Self {
            settings,
            http: reqwest::Client::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    fn collection_url(&self, action: &str) -> String {
        format!(
            "{}/collections/{}/{}",
            self.settings.url.trim_end_matches('/'),
            self.settings.collection,
            action
        )
    }

    /// Store one document. Errors are logged, never propagated.
    pub async fn add_memory(&self, text: &str, metadata: serde_json::Value, id: &str) {
        if !self.is_enabled() {
            return;
        }
        info!(id, "adding memory");
        let body = json!({
            "documents": [text],
            "metadatas": [metadata],
            "ids": [id],
        });
        match self
            .http
            .post(self.collection_url("add"))
            .json(&body)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!(id, "memory stored");
            }
            Ok(response) => {
                error!(id, status = %response.status(), "memory store rejected document");
            }
            Err(e) => {
                error!(id, error = %e, "failed to reach memory store");
            }
        }
    }

    /// Query for the `n` most similar documents. Returns an empty list when
    /// disabled or on any failure.
    pub async fn query_memory(&self, text: &str, n: usize) -> Vec<String> {
        if !self.is_enabled() {
            return Vec::new();
        }
        let body = json!({
            "query_texts": [text],
            "n_results": n,
        });
        let response = match self
            .http
            .post(self.collection_url("query"))
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "failed to reach memory store");
                return Vec::new();
            }
        };

        let payload: serde_json::Value = match response.json().await {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "memory query returned a non-JSON body");
                return Vec::new();
            }
        };

        payload["documents"][0]
            .as_array()
            .map(|docs| {
                docs.iter()
                    .filter_map(|d| d.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}
