//! run_cmd - Execute a shell command in the project root

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::process::run_shell;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct RunCmdTool;

#[derive(Deserialize)]
struct Params {
    command: String,
}

#[async_trait]
impl Tool for RunCmdTool {
    fn name(&self) -> &str {
        "run_cmd"
    }

    fn description(&self) -> &str {
        "Run a shell command in the project root and return its output. Requires user confirmation."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        // Finish inside the registry timeout so the transcript still comes back.
        let timeout = ctx
            .timeout
            .unwrap_or(DEFAULT_TIMEOUT)
            .saturating_sub(Duration::from_millis(250))
            .max(Duration::from_millis(250));

        match run_shell(&params.command, &ctx.project_root, timeout).await {
            Ok(output) if output.success() => {
                let text = output.stdout.trim_end();
                if text.is_empty() && output.stderr.trim().is_empty() {
                    ToolResult::success("(Command executed successfully with no output)")
                } else if output.stderr.trim().is_empty() {
                    ToolResult::success(text)
                } else {
                    ToolResult::success(output.transcript())
                }
            }
            Ok(output) => ToolResult {
                output: output.transcript(),
                is_error: true,
            },
            Err(e) => ToolResult::error(format!("{:#}", e)),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn returns_stdout_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());
        let result = RunCmdTool.execute(json!({ "command": "echo hello" }), &ctx).await;
        assert_eq!(result, ToolResult::success("hello"));
    }

    #[tokio::test]
    async fn failure_is_an_error_result_with_transcript() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());
        let result = RunCmdTool
            .execute(json!({ "command": "echo broken >&2; exit 1" }), &ctx)
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("[exit code 1]"));
        assert!(result.output.contains("broken"));
    }

    #[tokio::test]
    async fn silent_success_is_described() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new(dir.path());
        let result = RunCmdTool.execute(json!({ "command": "true" }), &ctx).await;
        assert!(result.output.contains("no output"));
    }
}
