//! Centralized path utilities
//!
//! Global paths live under `~/.flowcoder`, per-project state under
//! `<project>/.flowcoder`.

use std::path::{Path, PathBuf};

pub const CONFIG_DIR_NAME: &str = ".flowcoder";

/// Get the global flowcoder directory (~/.flowcoder)
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR_NAME)
}

/// Get the models directory (~/.flowcoder/models)
pub fn models_dir() -> PathBuf {
    config_dir().join("models")
}

/// Get the logs directory (~/.flowcoder/logs)
pub fn logs_dir() -> PathBuf {
    config_dir().join("logs")
}

/// Per-project state directory (<project>/.flowcoder)
pub fn project_dir(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR_NAME)
}

/// Project config file (<project>/.flowcoder/config.toml)
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_dir(project_root).join("config.toml")
}

/// Project descriptor (<project>/.flowcoder/project.json)
pub fn project_file_path(project_root: &Path) -> PathBuf {
    project_dir(project_root).join("project.json")
}

/// Scratchpad used to hand plans between phases (<project>/.flowcoder/context/scratchpad.md)
pub fn scratchpad_path(project_root: &Path) -> PathBuf {
    project_dir(project_root).join("context").join("scratchpad.md")
}
