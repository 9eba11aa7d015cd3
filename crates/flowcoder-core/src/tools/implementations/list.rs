//! list_files - Directory listing that honors ignore files

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::path_utils::project_walker;
use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

const DEFAULT_DEPTH: usize = 1;
const MAX_DEPTH: usize = 8;
const DEFAULT_LIMIT: usize = 200;
const MAX_LIMIT: usize = 5_000;

pub struct ListFilesTool;

#[derive(Deserialize)]
struct Params {
    #[serde(default = "default_path")]
    path: String,
    #[serde(default)]
    depth: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

fn default_path() -> String {
    ".".to_string()
}

#[derive(Debug, Default, PartialEq)]
struct Listing {
    entries: Vec<String>,
    truncated: bool,
}

impl Listing {
    fn render(&self, limit: usize) -> String {
        if self.entries.is_empty() {
            return "(empty directory)".to_string();
        }
        let mut out = self.entries.join("\n");
        if self.truncated {
            out.push_str(&format!("\n[listing truncated at {} entries]", limit));
        }
        out
    }
}

/// Entries under `dir` down to `depth` levels, parents before children.
/// Directories carry a trailing `/`.
fn list_dir(dir: &Path, depth: usize, limit: usize) -> Listing {
    let mut walker = project_walker(dir);
    walker.max_depth(Some(depth));

    let mut listing = Listing::default();
    for entry in walker.build().filter_map(Result::ok) {
        if entry.depth() == 0 {
            continue;
        }
        if listing.entries.len() >= limit {
            listing.truncated = true;
            break;
        }

        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let mut line = relative.to_string_lossy().replace('\\', "/");
        if entry.file_type().is_some_and(|ft| ft.is_dir()) {
            line.push('/');
        }
        listing.entries.push(line);
    }
    listing
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files in a project directory, skipping ignored paths. Directories end with '/'. Use depth to recurse (default 1) and limit to cap entries (default 200)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory relative to the project root (default '.')"
                },
                "depth": {
                    "type": "number",
                    "description": "How many directory levels to descend (default: 1)"
                },
                "limit": {
                    "type": "number",
                    "description": "Maximum number of entries to return (default: 200)"
                }
            }
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let dir = match ctx.resolve(&params.path) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e),
        };
        if !dir.is_dir() {
            return ToolResult::error(format!("Directory not found at {}", params.path));
        }

        let depth = params.depth.unwrap_or(DEFAULT_DEPTH).clamp(1, MAX_DEPTH);
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        match tokio::task::spawn_blocking(move || list_dir(&dir, depth, limit)).await {
            Ok(listing) => ToolResult::success(listing.render(limit)),
            Err(e) => ToolResult::error(format!("Listing failed: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/bin")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join("src/bin/cli.rs"), "").unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "").unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        std::fs::create_dir(dir.path().join("dist")).unwrap();
        std::fs::write(dir.path().join("dist/bundle.js"), "").unwrap();
        std::fs::write(dir.path().join(".gitignore"), "dist/\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn lists_one_level_without_ignored_paths() {
        let dir = project();
        let ctx = ToolContext::new(dir.path());

        let result = ListFilesTool.execute(json!({}), &ctx).await;
        assert_eq!(result, ToolResult::success(".gitignore\nCargo.toml\nsrc/"));
    }

    #[tokio::test]
    async fn depth_descends_parents_first() {
        let dir = project();
        let ctx = ToolContext::new(dir.path());

        let result = ListFilesTool
            .execute(json!({ "path": "src", "depth": 2 }), &ctx)
            .await;
        assert_eq!(result.output, "bin/\nbin/cli.rs\nlib.rs");
    }

    #[tokio::test]
    async fn limit_truncates_and_missing_dirs_error() {
        let dir = project();
        let ctx = ToolContext::new(dir.path());

        let result = ListFilesTool
            .execute(json!({ "depth": 3, "limit": 2 }), &ctx)
            .await;
        assert!(result.output.starts_with(".gitignore\nCargo.toml\n"));
        assert!(result.output.ends_with("[listing truncated at 2 entries]"));

        let missing = ListFilesTool.execute(json!({ "path": "nope" }), &ctx).await;
        assert!(missing.is_error);
        assert!(missing.output.contains("Directory not found at nope"));
    }

    #[test]
    fn empty_directory_renders_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let listing = list_dir(dir.path(), 1, 10);
        assert_eq!(listing, Listing::default());
        assert_eq!(listing.render(10), "(empty directory)");
    }
}
