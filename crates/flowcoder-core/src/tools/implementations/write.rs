//! write_file - Create or overwrite a file

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct WriteFileTool;

#[derive(Deserialize)]
struct Params {
    path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating parent directories as needed. Overwrites existing files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file, relative to the project root"
                },
                "content": {
                    "type": "string",
                    "description": "Full content to write"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let path = match ctx.resolve(&params.path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e),
        };

        if path.is_dir() {
            return ToolResult::error(format!("{} is a directory", params.path));
        }

        if let Some(parent) = path.parent() {
            if let Err(e) = fs::create_dir_all(parent).await {
                return ToolResult::error(format!("Failed to create directories: {}", e));
            }
        }

        let existed = path.exists();
        match fs::write(&path, &params.content).await {
            Ok(_) => ToolResult::success(format!(
                "{} {} ({} bytes)",
                if existed { "Overwrote" } else { "Created" },
                ctx.display_path(&path),
                params.content.len()
            )),
            Err(e) => ToolResult::error(format!("Failed to write file: {}", e)),
        }
    }
}
