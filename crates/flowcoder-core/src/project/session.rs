//! Session context: project summary and the scratchpad shared between phases

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::paths;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Short description of the project for the system prompt. Empty if unknown.
    async fn project_summary(&self) -> Result<String>;

    /// Current scratchpad content. Empty if none.
    async fn read_scratchpad(&self) -> Result<String>;

    /// Append an entry to the scratchpad.
    async fn write_scratchpad(&self, text: &str) -> Result<()>;
}

/// Contents of `.flowcoder/project.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectInfo {
    pub name: String,
    pub goals: Vec<String>,
    pub conventions: Vec<String>,
}

impl ProjectInfo {
    pub fn summary(&self) -> String {
        let mut out = String::new();
        if !self.name.is_empty() {
            out.push_str(&format!("Project: {}\n", self.name));
        }
        if !self.goals.is_empty() {
            out.push_str(&format!("Goals: {}\n", self.goals.join("; ")));
        }
        if !self.conventions.is_empty() {
            out.push_str(&format!("Conventions: {}\n", self.conventions.join("; ")));
        }
        out
    }
}

/// [`SessionStore`] backed by files under `<project>/.flowcoder`.
pub struct FileSessionStore {
    project_file: PathBuf,
    scratchpad: PathBuf,
}

impl FileSessionStore {
    pub fn new(project_root: &Path) -> Self {
        Self {
            project_file: paths::project_file_path(project_root),
            scratchpad: paths::scratchpad_path(project_root),
        }
    }

    pub fn scratchpad_path(&self) -> &Path {
        &self.scratchpad
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn project_summary(&self) -> Result<String> {
        if !self.project_file.exists() {
            return Ok(String::new());
        }
        let content = fs::read_to_string(&self.project_file)
            .await
            .with_context(|| format!("Failed to read {:?}", self.project_file))?;
        let info: ProjectInfo = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {:?}", self.project_file))?;
        Ok(info.summary())
    }

    async fn read_scratchpad(&self) -> Result<String> {
        match fs::read_to_string(&self.scratchpad).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e).with_context(|| format!("Failed to read {:?}", self.scratchpad)),
        }
    }

    async fn write_scratchpad(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.scratchpad.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }

        let entry = format!(
            "\n## {}\n\n{}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            text.trim_end()
        );
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.scratchpad)
            .await
            .with_context(|| format!("Failed to open {:?}", self.scratchpad))?;
        file.write_all(entry.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
