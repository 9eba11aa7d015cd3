//! search - Regex search over project files, honoring ignore files

use async_trait::async_trait;
use regex::RegexBuilder;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::path_utils::walk_files;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

const MAX_MATCHES_PER_FILE: usize = 20;
const MAX_TOTAL_MATCHES: usize = 200;
const MAX_LINE_CHARS: usize = 200;

pub struct SearchTool;

#[derive(Deserialize)]
struct Params {
    query: String,
    #[serde(default = "default_path")]
    path: String,
}

fn default_path() -> String {
    ".".to_string()
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the project for a case-insensitive regex pattern. Returns path:line: text for each match."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search, relative to the project root (default '.')"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let pattern = match RegexBuilder::new(&params.query)
            .case_insensitive(true)
            .build()
        {
            Ok(re) => re,
            Err(e) => return ToolResult::error(format!("Invalid pattern: {}", e)),
        };

        let base = match ctx.resolve(&params.path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e),
        };

        let ctx = ctx.clone();
        let search = tokio::task::spawn_blocking(move || {
            let mut hits = Vec::new();
            let mut truncated = false;

            'files: for file in walk_files(&base) {
                let Ok(content) = std::fs::read_to_string(&file) else {
                    continue; // binary or unreadable
                };
                let display = ctx.display_path(&file);

                let mut in_file = 0;
                for (idx, line) in content.lines().enumerate() {
                    if !pattern.is_match(line) {
                        continue;
                    }
                    if hits.len() >= MAX_TOTAL_MATCHES {
                        truncated = true;
                        break 'files;
                    }
                    let text: String = line.trim().chars().take(MAX_LINE_CHARS).collect();
                    hits.push(format!("{}:{}: {}", display, idx + 1, text));
                    in_file += 1;
                    if in_file >= MAX_MATCHES_PER_FILE {
                        break;
                    }
                }
            }
            (hits, truncated)
        })
        .await;

        match search {
            Ok((hits, _)) if hits.is_empty() => ToolResult::success("No matches found."),
            Ok((hits, truncated)) => {
                let mut output = hits.join("\n");
                if truncated {
                    output.push_str(&format!("\n[stopped after {} matches]", MAX_TOTAL_MATCHES));
                }
                ToolResult::success(output)
            }
            Err(e) => ToolResult::error(format!("Search task failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_case_insensitive_matches_with_locations() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "fn alpha() {}\nfn Beta() {}\n").unwrap();
        std::fs::create_dir(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("target/gen.rs"), "fn beta() {}\n").unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = SearchTool.execute(json!({ "query": "beta" }), &ctx).await;
        assert_eq!(result, ToolResult::success("src/lib.rs:2: fn Beta() {}"));
    }

    #[tokio::test]
    async fn caps_matches_per_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("many.txt"), "hit\n".repeat(50)).unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = SearchTool.execute(json!({ "query": "hit" }), &ctx).await;
        assert_eq!(result.output.lines().count(), MAX_MATCHES_PER_FILE);
    }

    #[tokio::test]
    async fn reports_no_matches_and_bad_patterns() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "nothing").unwrap();
        let ctx = ToolContext::new(dir.path());

        let none = SearchTool.execute(json!({ "query": "zebra" }), &ctx).await;
        assert_eq!(none.output, "No matches found.");

        let bad = SearchTool.execute(json!({ "query": "(" }), &ctx).await;
        assert!(bad.is_error);
    }
}
