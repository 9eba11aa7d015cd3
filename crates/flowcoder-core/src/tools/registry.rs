//! Tool registry for built-in tools
//!
//! Tools are looked up by name and executed with a per-call timeout.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::tools::path_utils;

/// Tool category, used to decide what may run without approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    /// Never modifies state.
    ReadOnly,
    /// Modifies files or runs commands.
    Write,
    /// Needs the human.
    Interactive,
}

/// Categorize a built-in tool by name.
pub fn tool_category(name: &str) -> ToolCategory {
    match name {
        "read_file" | "list_files" | "search" | "fetch_url" => ToolCategory::ReadOnly,
        "ask_user" => ToolCategory::Interactive,
        _ => ToolCategory::Write,
    }
}

const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(120);

/// Tool execution result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    pub output: String,
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            is_error: false,
        }
    }

    /// A tool that failed while running.
    pub fn error(msg: impl std::fmt::Display) -> Self {
        Self {
            output: format!("Error executing tool: {}", msg),
            is_error: true,
        }
    }

    /// A call that names no known tool.
    pub fn not_found(name: &str) -> Self {
        Self {
            output: format!("Error: Tool {} not found.", name),
            is_error: true,
        }
    }

    /// A call stopped by policy before it ran.
    pub fn rejected(reason: &str) -> Self {
        Self {
            output: format!("Error: Tool call rejected. {}", reason),
            is_error: true,
        }
    }

    /// A call the human declined.
    pub fn declined(name: &str) -> Self {
        Self {
            output: format!("User rejected execution of {}.", name),
            is_error: true,
        }
    }
}

/// Parse tool parameters, returning a ToolResult error on failure
pub fn parse_params<T: serde::de::DeserializeOwned>(params: Value) -> Result<T, ToolResult> {
    serde_json::from_value(params)
        .map_err(|e| ToolResult::error(format!("Invalid parameters: {}", e)))
}

/// Name, description and parameter schema advertised to agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

/// Context for tool execution
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub project_root: PathBuf,
    /// Optional per-call timeout override
    pub timeout: Option<Duration>,
}

impl ToolContext {
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: path_utils::normalize_root(&project_root.into()),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Resolve a tool path inside the project root.
    ///
    /// The guard has already checked the path; this repeats the check so a
    /// tool can never be pointed outside the project by a caller that skips it.
    pub fn resolve(&self, path: &str) -> Result<PathBuf, String> {
        path_utils::resolve_within(&self.project_root, path)
    }

    /// Path relative to the project root, for display.
    pub fn display_path(&self, path: &std::path::Path) -> String {
        let relative = path.strip_prefix(&self.project_root).unwrap_or(path);
        if relative.as_os_str().is_empty() {
            ".".to_string()
        } else {
            relative.display().to_string()
        }
    }
}

/// Trait for tool implementations
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (id)
    fn name(&self) -> &str;

    /// Tool description for agents
    fn description(&self) -> &str;

    /// JSON schema for parameters
    fn parameters_schema(&self) -> Value;

    /// Execute the tool
    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult;
}

pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
    default_timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
            default_timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        let mut tools = self.tools.write().await;
        tools.insert(name, tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.tools.read().await.contains_key(name)
    }

    /// Definitions of every registered tool, sorted by name.
    pub async fn definitions(&self) -> Vec<ToolDefinition> {
        let tools = self.tools.read().await;
        let mut defs: Vec<ToolDefinition> = tools
            .values()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                schema: t.parameters_schema(),
            })
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool by name with timeout. `None` when no such tool is registered.
    pub async fn execute(
        &self,
        name: &str,
        params: Value,
        ctx: &ToolContext,
    ) -> Option<ToolResult> {
        let tool = self.get(name).await?;
        let timeout = ctx.timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();

        let result = match tokio::time::timeout(timeout, tool.execute(params, ctx)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    tool = name,
                    timeout_secs = timeout.as_secs(),
                    "Tool execution timed out"
                );
                ToolResult::error(format!(
                    "Tool '{}' timed out after {} seconds",
                    name,
                    timeout.as_secs()
                ))
            }
        };

        tracing::debug!(
            tool = name,
            is_error = result.is_error,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tool finished"
        );
        Some(result)
    }
}
