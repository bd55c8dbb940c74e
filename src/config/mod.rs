//! Engine configuration (layered: code > env > file).

use std::collections::HashSet;
use std::path::Path;

use bon::Builder;
use serde::Deserialize;

use crate::approval::ApprovalPolicy;
use crate::error::{EngineError, Result};

/// Identical trailing tool calls tolerated before the repetition prompt.
pub const DEFAULT_REPETITION_WINDOW: usize = 3;
/// Cap on blocks handled within a single presentation pass.
pub const DEFAULT_MAX_PASS_ITERATIONS: usize = 256;

/// Tuning knobs for the execution engine.
///
/// # Example
///
/// ```
/// use cadenza::config::EngineConfig;
///
/// let config = EngineConfig::builder()
///     .repetition_window(2)
///     .build();
/// assert_eq!(config.repetition_window, 2);
/// ```
#[derive(Debug, Clone, Builder)]
pub struct EngineConfig {
    /// Identical trailing tool calls tolerated before the repetition prompt.
    #[builder(default = DEFAULT_REPETITION_WINDOW)]
    pub repetition_window: usize,
    /// Cap on blocks handled within a single presentation pass.
    #[builder(default = DEFAULT_MAX_PASS_ITERATIONS)]
    pub max_pass_iterations: usize,
    /// Tool names permitted this session. `None` permits every registered tool.
    pub allowed_tools: Option<HashSet<String>>,
    /// Default decision for tools that request approval.
    #[builder(default)]
    pub approval_policy: ApprovalPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// File layer: every field optional, merged over the defaults.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    repetition_window: Option<usize>,
    max_pass_iterations: Option<usize>,
    allowed_tools: Option<Vec<String>>,
    approval_policy: Option<ApprovalPolicy>,
}

impl EngineConfig {
    /// Load overrides from `CADENZA_*` environment variables (reading a
    /// `.env` file if present).
    ///
    /// Recognized: `CADENZA_REPETITION_WINDOW`, `CADENZA_MAX_PASS_ITERATIONS`,
    /// `CADENZA_ALLOWED_TOOLS` (comma-separated), `CADENZA_APPROVAL_POLICY`
    /// (`always` / `never` / `ask`).
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("CADENZA_REPETITION_WINDOW") {
            config.repetition_window = parse_env("CADENZA_REPETITION_WINDOW", &raw)?;
        }
        if let Ok(raw) = std::env::var("CADENZA_MAX_PASS_ITERATIONS") {
            config.max_pass_iterations = parse_env("CADENZA_MAX_PASS_ITERATIONS", &raw)?;
        }
        if let Ok(raw) = std::env::var("CADENZA_ALLOWED_TOOLS") {
            config.allowed_tools = Some(
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect(),
            );
        }
        if let Ok(raw) = std::env::var("CADENZA_APPROVAL_POLICY") {
            config.approval_policy = raw.parse().map_err(|_| {
                EngineError::Configuration(format!(
                    "CADENZA_APPROVAL_POLICY: unknown policy '{raw}'"
                ))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load overrides from a TOML file, merged over the defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let file: FileConfig = toml::from_str(&raw)
            .map_err(|err| EngineError::Configuration(format!("invalid config file: {err}")))?;

        let mut config = Self::default();
        if let Some(window) = file.repetition_window {
            config.repetition_window = window;
        }
        if let Some(cap) = file.max_pass_iterations {
            config.max_pass_iterations = cap;
        }
        if let Some(tools) = file.allowed_tools {
            config.allowed_tools = Some(tools.into_iter().collect());
        }
        if let Some(policy) = file.approval_policy {
            config.approval_policy = policy;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.repetition_window == 0 {
            return Err(EngineError::Configuration(
                "repetition_window must be at least 1".into(),
            ));
        }
        if self.max_pass_iterations == 0 {
            return Err(EngineError::Configuration(
                "max_pass_iterations must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn parse_env(name: &str, raw: &str) -> Result<usize> {
    raw.trim()
        .parse()
        .map_err(|_| EngineError::Configuration(format!("{name}: expected an integer, got '{raw}'")))
}
