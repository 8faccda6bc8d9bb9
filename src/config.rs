//! Configuration for the Crucible orchestrator.
//!
//! Settings are read from `crucible.toml` in the project directory, with
//! credentials overridable through the environment. The loaded [`Config`] is
//! constructed once at process start and passed by `Arc` into the engine,
//! the dispatcher and the memory store — there is no ambient global lookup.
//!
//! # Configuration File Format
//!
//! ```toml
//! [credentials]
//! anthropic = "sk-ant-..."
//! gemini = ""
//! openai = ""
//!
//! [models]
//! claude = "claude-3-5-sonnet-latest"
//! gemini = "gemini-1.5-pro"
//! codex = "gpt-4o"
//!
//! [memory]
//! enabled = false
//! url = "http://localhost:8000"
//! collection = "crucible-memory"
//!
//! [tools]
//! lint_cmd = "ruff check --quiet"
//! test_cmd = "python3 -m unittest"
//! timeout_secs = 30
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::dispatch::BackendFamily;

/// Name of the configuration file expected in the project directory.
pub const CONFIG_FILE: &str = "crucible.toml";

/// Directory under the project root holding checkpoint and ledger files.
pub const CRUCIBLE_DIR: &str = ".crucible";

/// API credentials per backend family.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub anthropic: Option<String>,
    #[serde(default)]
    pub gemini: Option<String>,
    #[serde(default)]
    pub openai: Option<String>,
}

/// Concrete model identifiers per backend family.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Models {
    #[serde(default = "Models::default_claude")]
    pub claude: String,
    #[serde(default = "Models::default_gemini")]
    pub gemini: String,
    #[serde(default = "Models::default_codex")]
    pub codex: String,
}

impl Models {
    fn default_claude() -> String {
        "claude-3-5-sonnet-latest".to_string()
    }
    fn default_gemini() -> String {
        "gemini-1.5-pro".to_string()
    }
    fn default_codex() -> String {
        "gpt-4o".to_string()
    }
}

impl Default for Models {
    fn default() -> Self {
        Self {
            claude: Self::default_claude(),
            gemini: Self::default_gemini(),
            codex: Self::default_codex(),
        }
    }
}

/// Long-term memory settings. Disabled by default; the engine treats the
/// memory store as fire-and-forget either way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemorySettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "MemorySettings::default_url")]
    pub url: String,
    #[serde(default = "MemorySettings::default_collection")]
    pub collection: String,
}

impl MemorySettings {
    fn default_url() -> String {
        "http://localhost:8000".to_string()
    }
    fn default_collection() -> String {
        "crucible-memory".to_string()
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            url: Self::default_url(),
            collection: Self::default_collection(),
        }
    }
}

/// External tool settings (linter and test runner commands).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSettings {
    #[serde(default = "ToolSettings::default_lint_cmd")]
    pub lint_cmd: String,
    #[serde(default = "ToolSettings::default_test_cmd")]
    pub test_cmd: String,
    #[serde(default = "ToolSettings::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ToolSettings {
    fn default_lint_cmd() -> String {
        "ruff check --quiet".to_string()
    }
    fn default_test_cmd() -> String {
        "python3 -m unittest".to_string()
    }
    fn default_timeout_secs() -> u64 {
        30
    }
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            lint_cmd: Self::default_lint_cmd(),
            test_cmd: Self::default_test_cmd(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

/// On-disk shape of `crucible.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    credentials: Credentials,
    #[serde(default)]
    models: Models,
    #[serde(default)]
    memory: MemorySettings,
    #[serde(default)]
    tools: ToolSettings,
}

/// Runtime configuration for Crucible.
///
/// Bridges the on-disk `crucible.toml` with the runtime needs of the
/// orchestrator: resolved paths for the checkpoint and ledger files plus
/// credential lookups with placeholder detection.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub state_file: PathBuf,
    pub ledger_dir: PathBuf,
    pub credentials: Credentials,
    pub models: Models,
    pub memory: MemorySettings,
    pub tools: ToolSettings,
    pub verbose: bool,
}

impl Config {
    /// Load configuration from `crucible.toml` in the project directory.
    ///
    /// A missing or unparseable config file is a fatal startup error.
    /// Credentials in the environment (`ANTHROPIC_API_KEY`, `GEMINI_API_KEY`,
    /// `OPENAI_API_KEY`) take precedence over the file.
    pub fn load(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let config_path = project_dir.join(CONFIG_FILE);
        let raw = std::fs::read_to_string(&config_path).with_context(|| {
            format!(
                "failed to read {} - create it before running (see crucible.toml.example)",
                config_path.display()
            )
        })?;
        let file: ConfigFile = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", config_path.display()))?;

        Ok(Self::from_parts(project_dir, file, verbose))
    }

    fn from_parts(project_dir: PathBuf, file: ConfigFile, verbose: bool) -> Self {
        let crucible_dir = project_dir.join(CRUCIBLE_DIR);

        let mut credentials = file.credentials;
        if let Ok(key) = std::env::var("ANTHROPIC_API_KEY") {
            credentials.anthropic = Some(key);
        }
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            credentials.gemini = Some(key);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            credentials.openai = Some(key);
        }

        Self {
            state_file: crucible_dir.join("state.json"),
            ledger_dir: crucible_dir.join("ledger"),
            project_dir,
            credentials,
            models: file.models,
            memory: file.memory,
            tools: file.tools,
            verbose,
        }
    }

    /// Build a config directly from parts, bypassing the file system.
    /// Intended for tests and embedding.
    pub fn for_project(project_dir: &Path, credentials: Credentials) -> Self {
        let crucible_dir = project_dir.join(CRUCIBLE_DIR);
        Self {
            state_file: crucible_dir.join("state.json"),
            ledger_dir: crucible_dir.join("ledger"),
            project_dir: project_dir.to_path_buf(),
            credentials,
            models: Models::default(),
            memory: MemorySettings::default(),
            tools: ToolSettings::default(),
            verbose: false,
        }
    }

    /// Create the `.crucible/` directory tree.
    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.ledger_dir)
            .context("failed to create ledger directory")?;
        Ok(())
    }

    /// Return the usable credential for a backend family, if any.
    ///
    /// Placeholder values (empty strings or template keys ending in `...`,
    /// e.g. `sk-ant-...`) count as absent. The check runs against the
    /// snapshot taken at load time; environment changes after startup are
    /// not observed.
    pub fn credential(&self, family: BackendFamily) -> Option<&str> {
        let raw = match family {
            BackendFamily::Claude => self.credentials.anthropic.as_deref(),
            BackendFamily::Gemini => self.credentials.gemini.as_deref(),
            BackendFamily::Codex => self.credentials.openai.as_deref(),
        };
        raw.filter(|key| !key.trim().is_empty() && !key.ends_with("..."))
    }

    /// Concrete model identifier for a backend family.
    pub fn model_id(&self, family: BackendFamily) -> &str {
        match family {
            BackendFamily::Claude => &self.models.claude,
            BackendFamily::Gemini => &self.models.gemini,
            BackendFamily::Codex => &self.models.codex,
        }
    }
}
