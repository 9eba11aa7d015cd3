//! patch_file - Replace an exact text span in a file and report a unified diff

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use similar::TextDiff;

use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

pub struct PatchFileTool;

#[derive(Deserialize)]
struct Params {
    path: String,
    old_string: String,
    new_string: String,
    #[serde(default)]
    replace_all: bool,
}

#[async_trait]
impl Tool for PatchFileTool {
    fn name(&self) -> &str {
        "patch_file"
    }

    fn description(&self) -> &str {
        "Replace old_string with new_string in a file. old_string must match exactly and be unique unless replace_all is true."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file, relative to the project root"
                },
                "old_string": {
                    "type": "string",
                    "description": "The exact text to replace"
                },
                "new_string": {
                    "type": "string",
                    "description": "The replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence (default: false)",
                    "default": false
                }
            },
            "required": ["path", "old_string", "new_string"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        if params.old_string.is_empty() {
            return ToolResult::error("old_string must not be empty");
        }

        let path = match ctx.resolve(&params.path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e),
        };

        if !path.is_file() {
            return ToolResult::error(format!("File not found at {}", params.path));
        }

        let content = match fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) => return ToolResult::error(format!("Failed to read file: {}", e)),
        };

        let count = content.matches(&params.old_string).count();
        if count == 0 {
            return ToolResult::error(format!(
                "String not found in file: {:?}",
                params.old_string
            ));
        }
        if count > 1 && !params.replace_all {
            return ToolResult::error(format!(
                "String found {} times. Use replace_all=true or include more context to make it unique.",
                count
            ));
        }

        let new_content = if params.replace_all {
            content.replace(&params.old_string, &params.new_string)
        } else {
            content.replacen(&params.old_string, &params.new_string, 1)
        };

        let display = ctx.display_path(&path);
        let diff = generate_compact_diff(&content, &new_content, &display);

        match fs::write(&path, &new_content).await {
            Ok(_) => ToolResult::success(format!(
                "Patched {} ({} replacement{})\n{}",
                display,
                count,
                if count == 1 { "" } else { "s" },
                diff
            )),
            Err(e) => ToolResult::error(format!("Failed to write file: {}", e)),
        }
    }
}

fn generate_compact_diff(old: &str, new: &str, display: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();
    for hunk in diff.unified_diff().context_radius(3).iter_hunks() {
        output.push_str(&format!("{}", hunk));
    }
    if output.is_empty() {
        return String::new();
    }
    format!("--- {}\n+++ {}\n{}", display, display, output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replaces_unique_match_and_shows_diff() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {\n    old();\n}\n").unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = PatchFileTool
            .execute(
                json!({ "path": "main.rs", "old_string": "old();", "new_string": "new();" }),
                &ctx,
            )
            .await;
        assert!(!result.is_error, "{}", result.output);
        assert!(result.output.contains("-    old();"));
        assert!(result.output.contains("+    new();"));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("main.rs")).unwrap(),
            "fn main() {\n    new();\n}\n"
        );
    }

    #[tokio::test]
    async fn ambiguous_match_is_rejected_without_writing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x x").unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = PatchFileTool
            .execute(json!({ "path": "a.txt", "old_string": "x", "new_string": "y" }), &ctx)
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("found 2 times"));
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "x x");

        let all = PatchFileTool
            .execute(
                json!({ "path": "a.txt", "old_string": "x", "new_string": "y", "replace_all": true }),
                &ctx,
            )
            .await;
        assert!(!all.is_error);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "y y");
    }

    #[tokio::test]
    async fn missing_text_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "abc").unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = PatchFileTool
            .execute(json!({ "path": "a.txt", "old_string": "zzz", "new_string": "y" }), &ctx)
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("String not found"));
    }
}
