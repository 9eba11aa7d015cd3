//! read_file - Read a project file, whole or as a line window

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::fs;

use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

/// Lines returned when no explicit window is requested.
const DEFAULT_WINDOW: usize = 2_000;
/// Files larger than this are never loaded whole.
const MAX_FILE_BYTES: u64 = 8 * 1024 * 1024;
/// Leading bytes inspected for NUL when deciding a file is binary.
const BINARY_SNIFF_BYTES: usize = 8_192;

pub struct ReadFileTool;

#[derive(Deserialize)]
struct Params {
    path: String,
    #[serde(default)]
    offset: Option<usize>,
    #[serde(default)]
    limit: Option<usize>,
}

/// Select lines `offset..offset+limit` (1-indexed) and note the range when
/// the result is not the whole file.
fn line_window(content: &str, offset: Option<usize>, limit: Option<usize>) -> Result<String, String> {
    let lines: Vec<&str> = content.lines().collect();
    let total = lines.len();

    if offset.is_none() && limit.is_none() && total <= DEFAULT_WINDOW {
        return Ok(content.to_string());
    }

    let first = offset.unwrap_or(1).max(1);
    if first > total.max(1) {
        return Err(format!("Line {} is past the end of the file ({} lines)", first, total));
    }
    let last = (first - 1 + limit.unwrap_or(DEFAULT_WINDOW)).min(total);

    let body = lines.get(first - 1..last).unwrap_or_default().join("\n");
    if first == 1 && last == total {
        return Ok(body);
    }
    Ok(format!("{}\n\n[lines {}-{} of {}]", body, first, last, total))
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the content of a file in the project. Large files can be read in windows with a 1-indexed line offset and a line limit."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Path of the file, relative to the project root"
                },
                "offset": {
                    "type": "number",
                    "description": "First line to return (1-indexed)"
                },
                "limit": {
                    "type": "number",
                    "description": "How many lines to return (default 2000)"
                }
            },
            "required": ["path"]
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

        let size = match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => return ToolResult::error(format!("File not found at {}", params.path)),
        };
        if size > MAX_FILE_BYTES {
            return ToolResult::error(format!(
                "{} is {} bytes; files over {} bytes are not read",
                params.path, size, MAX_FILE_BYTES
            ));
        }

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => return ToolResult::error(format!("Failed to read {}: {}", params.path, e)),
        };
        if bytes.iter().take(BINARY_SNIFF_BYTES).any(|b| *b == 0) {
            return ToolResult::success(format!("Binary file: {} ({} bytes)", params.path, size));
        }

        let content = match String::from_utf8(bytes) {
            Ok(s) => s,
            Err(_) => return ToolResult::error(format!("{} is not valid UTF-8", params.path)),
        };

        match line_window(&content, params.offset, params.limit) {
            Ok(text) => ToolResult::success(text),
            Err(e) => ToolResult::error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn small_files_come_back_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = ReadFileTool.execute(json!({ "path": "a.txt" }), &ctx).await;
        assert_eq!(result, ToolResult::success("one\ntwo\n"));
    }

    #[tokio::test]
    async fn binary_and_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blob.bin"), [0u8, 159, 146, 150]).unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        let ctx = ToolContext::new(dir.path());

        let result = ReadFileTool.execute(json!({ "path": "blob.bin" }), &ctx).await;
        assert_eq!(result, ToolResult::success("Binary file: blob.bin (4 bytes)"));

        for path in ["nope.txt", "src"] {
            let result = ReadFileTool.execute(json!({ "path": path }), &ctx).await;
            assert!(result.is_error);
            assert!(result.output.contains(&format!("File not found at {path}")));
        }
    }

    #[test]
    fn windows_report_their_range() {
        let content = "1\n2\n3\n4\n5";
        assert_eq!(
            line_window(content, Some(2), Some(2)).unwrap(),
            "2\n3\n\n[lines 2-3 of 5]"
        );
        assert_eq!(line_window(content, Some(4), None).unwrap(), "4\n5\n\n[lines 4-5 of 5]");
        assert_eq!(line_window(content, Some(1), Some(10)).unwrap(), content);
        assert!(line_window(content, Some(9), None)
            .unwrap_err()
            .contains("past the end"));
        assert_eq!(line_window("", Some(1), None).unwrap(), "");
    }

    #[test]
    fn long_files_default_to_the_first_window() {
        let content: String = (1..=DEFAULT_WINDOW + 5).map(|n| format!("{n}\n")).collect();
        let window = line_window(&content, None, None).unwrap();
        assert!(window.starts_with("1\n2\n"));
        assert!(window.ends_with(&format!("[lines 1-{0} of {1}]", DEFAULT_WINDOW, DEFAULT_WINDOW + 5)));
    }
}
