//! Session configuration
//!
//! Loaded from `<project>/.flowcoder/config.toml`. Every field has a default,
//! so a missing file (or a partial one) is fine.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::paths;

/// Hard ceiling on plan/execute rounds per turn.
pub const MAX_ROUNDS_CEILING: usize = 15;
const DEFAULT_MAX_ROUNDS: usize = 12;

/// Whether several engines may stay resident at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Residency {
    /// Engines stay loaded; the next phase's engine may be prefetched.
    #[default]
    Shared,
    /// Only one engine is resident; others are unloaded before generating.
    Exclusive,
}

/// Overrides for discovered project commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandOverrides {
    pub build: Option<String>,
    pub lint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    pub models_dir: PathBuf,
    /// Model file (relative to `models_dir`) for planning/building roles.
    pub default_model: String,
    /// Model file (relative to `models_dir`) for lightweight roles.
    pub tiny_model: String,
    pub context_size: u32,
    pub max_rounds: usize,
    pub max_tool_output_chars: usize,
    pub tool_timeout_secs: u64,
    pub verify_timeout_secs: u64,
    pub approval_timeout_secs: u64,
    pub metrics_top_n: usize,
    pub residency: Residency,
    pub commands: CommandOverrides,
    pub llama_server_bin: String,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            models_dir: paths::models_dir(),
            default_model: "qwen2.5-coder-1.5b-instruct-q4_k_m.gguf".to_string(),
            tiny_model: "qwen2.5-coder-0.5b-instruct-q4_k_m.gguf".to_string(),
            context_size: 4096,
            max_rounds: DEFAULT_MAX_ROUNDS,
            max_tool_output_chars: 30_000,
            tool_timeout_secs: 120,
            verify_timeout_secs: 600,
            approval_timeout_secs: 300,
            metrics_top_n: 5,
            residency: Residency::default(),
            commands: CommandOverrides::default(),
            llama_server_bin: "llama-server".to_string(),
        }
    }
}

impl FlowConfig {
    /// Load the project config, falling back to defaults when absent.
    pub fn load(project_root: &Path) -> Result<Self> {
        let path = paths::project_config_path(project_root);
        if !path.exists() {
            tracing::debug!("No config found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Failed to parse {:?}", path))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: FlowConfig = toml::from_str(content)?;
        config.max_rounds = config.max_rounds.clamp(1, MAX_ROUNDS_CEILING);
        Ok(config)
    }

    pub fn default_model_path(&self) -> PathBuf {
        self.models_dir.join(&self.default_model)
    }

    pub fn tiny_model_path(&self) -> PathBuf {
        self.models_dir.join(&self.tiny_model)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout_secs)
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_secs(self.approval_timeout_secs)
    }
}
