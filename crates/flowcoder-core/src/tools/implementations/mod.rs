//! Built-in tool implementations
//!
//! - read_file: Read files
//! - list_files: List directory contents
//! - write_file: Create/overwrite files
//! - patch_file: Exact text replacement with a unified diff
//! - search: Regex search across the project
//! - fetch_url: Fetch a web page as text
//! - run_cmd: Execute shell commands
//! - ask_user: Pause for a human answer (handled by the orchestrator)

pub mod ask_user;
pub mod bash;
pub mod edit;
pub mod fetch;
pub mod list;
pub mod read;
pub mod search;
pub mod write;

pub use ask_user::AskUserTool;
pub use bash::RunCmdTool;
pub use edit::PatchFileTool;
pub use fetch::FetchUrlTool;
pub use list::ListFilesTool;
pub use read::ReadFileTool;
pub use search::SearchTool;
pub use write::WriteFileTool;

use std::sync::Arc;

use crate::tools::registry::ToolRegistry;

/// Register every built-in tool.
pub async fn register_builtin_tools(registry: &ToolRegistry) {
    registry.register(Arc::new(ReadFileTool)).await;
    registry.register(Arc::new(ListFilesTool)).await;
    registry.register(Arc::new(WriteFileTool)).await;
    registry.register(Arc::new(PatchFileTool)).await;
    registry.register(Arc::new(SearchTool)).await;
    registry.register(Arc::new(FetchUrlTool)).await;
    registry.register(Arc::new(RunCmdTool)).await;
    registry.register(Arc::new(AskUserTool)).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registers_all_builtins() {
        let registry = ToolRegistry::new();
        register_builtin_tools(&registry).await;
        let names: Vec<String> = registry
            .definitions()
            .await
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(
            names,
            [
                "ask_user",
                "fetch_url",
                "list_files",
                "patch_file",
                "read_file",
                "run_cmd",
                "search",
                "write_file"
            ]
        );
    }
}
