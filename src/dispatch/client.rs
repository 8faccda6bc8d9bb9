//! Model client seam for the capability dispatcher.
//!
//! The dispatcher talks to text-generation providers only through the
//! [`ModelClient`] trait — one narrow method, provider errors surfaced as
//! opaque `anyhow` errors. [`HttpModelClient`] is the production
//! implementation; [`ScriptedClient`] provides deterministic responses for
//! tests and offline dry runs.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::{info, warn};

use super::BackendFamily;

/// Maximum tokens requested per generation call.
const MAX_TOKENS: u32 = 4000;

/// Narrow collaborator interface to a text-generation provider.
///
/// Implementations must not panic on provider failures; they return an error
/// that the dispatcher converts into an error-text payload.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate text from a prompt using the given concrete model.
    async fn generate(
        &self,
        family: BackendFamily,
        model_id: &str,
        credential: &str,
        prompt: &str,
    ) -> Result<String>;
}

/// HTTP-backed model client.
///
/// Only the Claude family has a real wire implementation (the Anthropic
/// messages API); Gemini and Codex return clearly-labelled simulated
/// responses until their clients land. The dispatcher neither knows nor
/// cares — it sees text either way.
pub struct HttpModelClient {
    http: reqwest::Client,
    anthropic_url: String,
}

impl HttpModelClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            anthropic_url: "https://api.anthropic.com/v1/messages".to_string(),
        }
    }

    /// Override the Anthropic endpoint (proxies, test servers).
    pub fn with_anthropic_url(mut self, url: &str) -> Self {
        self.anthropic_url = url.to_string();
        self
    }

    async fn call_anthropic(
        &self,
        model_id: &str,
        credential: &str,
        prompt: &str,
    ) -> Result<String> {
        info!(model = model_id, "calling Anthropic messages API");
        let body = json!({
            "model": model_id,
            "max_tokens": MAX_TOKENS,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .http
            .post(&self.anthropic_url)
            .header("x-api-key", credential)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .context("Anthropic API request failed")?;

        let status = response.status();
        let payload: serde_json::Value = response
            .json()
            .await
            .context("Anthropic API returned a non-JSON body")?;

        if !status.is_success() {
            return Err(anyhow!("Anthropic API returned {status}: {payload}"));
        }

        payload["content"][0]["text"]
            .as_str()
            .map(|text| text.to_string())
            .ok_or_else(|| anyhow!("Anthropic API response had no text content"))
    }
}

impl Default for HttpModelClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn generate(
        &self,
        family: BackendFamily,
        model_id: &str,
        credential: &str,
        prompt: &str,
    ) -> Result<String> {
        match family {
            BackendFamily::Claude => self.call_anthropic(model_id, credential, prompt).await,
            BackendFamily::Gemini | BackendFamily::Codex => {
                warn!(
                    family = family.name(),
                    "client not yet implemented, returning simulated response"
                );
                Ok(format!(
                    "--- SIMULATED RESPONSE ({}) ---\nModel '{}' would be called for: {}",
                    family, model_id, prompt
                ))
            }
        }
    }
}

enum Script {
    Respond(VecDeque<String>),
    Fail(String),
}

struct Rule {
    needle: String,
    script: Script,
}

/// Deterministic model client for tests and offline dry runs.
///
/// Rules match on a substring of the prompt, first match wins. A matched
/// response queue pops until one response remains, which then repeats.
/// Prompts matching no rule get the default response.
pub struct ScriptedClient {
    rules: Mutex<Vec<Rule>>,
    default_response: String,
    calls: Mutex<Vec<(BackendFamily, String)>>,
}

impl ScriptedClient {
    pub fn new(default_response: &str) -> Self {
        Self {
            rules: Mutex::new(Vec::new()),
            default_response: default_response.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Respond to prompts containing `needle` with the given responses, in order.
    pub fn on(self, needle: &str, responses: &[&str]) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            script: Script::Respond(responses.iter().map(|r| r.to_string()).collect()),
        });
        self
    }

    /// Fail (provider error) on prompts containing `needle`.
    pub fn fail_on(self, needle: &str, message: &str) -> Self {
        self.rules.lock().unwrap().push(Rule {
            needle: needle.to_string(),
            script: Script::Fail(message.to_string()),
        });
        self
    }

    /// Every `(family, prompt)` pair seen so far, in call order.
    pub fn calls(&self) -> Vec<(BackendFamily, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    async fn generate(
        &self,
        family: BackendFamily,
        _model_id: &str,
        _credential: &str,
        prompt: &str,
    ) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((family, prompt.to_string()));

        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if prompt.contains(&rule.needle) {
                return match &mut rule.script {
                    Script::Respond(queue) => {
                        let response = if queue.len() > 1 {
                            queue.pop_front().unwrap_or_default()
                        } else {
                            queue.front().cloned().unwrap_or_default()
                        };
                        Ok(response)
                    }
                    Script::Fail(message) => Err(anyhow!("{}", message.clone())),
                };
            }
        }
        Ok(self.default_response.clone())
    }
}
