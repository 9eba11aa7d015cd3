//! fetch_url - Fetch a web page as text

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::tools::registry::Tool;
use crate::tools::{parse_params, ToolContext, ToolResult};

/// Characters of page text handed back to the agent.
const MAX_PAGE_CHARS: usize = 5_000;
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

pub struct FetchUrlTool;

#[derive(Deserialize)]
struct Params {
    url: String,
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> &str {
        "Fetch content from an http(s) URL and return it as text. HTML pages are converted to markdown."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value, ctx: &ToolContext) -> ToolResult {
        let params = match parse_params::<Params>(params) {
            Ok(p) => p,
            Err(e) => return e,
        };

        let url = match Url::parse(params.url.trim()) {
            Ok(url) => url,
            Err(e) => return ToolResult::error(format!("Invalid URL '{}': {}", params.url, e)),
        };
        if !matches!(url.scheme(), "http" | "https") {
            return ToolResult::error(format!(
                "Unsupported URL scheme '{}': only http and https are allowed",
                url.scheme()
            ));
        }

        let client = match reqwest::Client::builder()
            .timeout(ctx.timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT))
            .build()
        {
            Ok(client) => client,
            Err(e) => return ToolResult::error(format!("Failed to build HTTP client: {}", e)),
        };

        tracing::debug!(url = %url, "Fetching URL");
        let response = match client.get(url).send().await {
            Ok(response) => response,
            Err(e) => return ToolResult::error(format!("Error fetching URL: {}", e)),
        };

        let status = response.status();
        if !status.is_success() {
            return ToolResult::error(format!("Error fetching URL: HTTP {}", status));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("html"));

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return ToolResult::error(format!("Failed to read response body: {}", e)),
        };

        ToolResult::success(page_text(&body, is_html))
    }
}

/// Markdown for HTML bodies, the raw text otherwise, capped at [`MAX_PAGE_CHARS`].
fn page_text(body: &str, is_html: bool) -> String {
    let text = if is_html {
        html2md::parse_html(body)
    } else {
        body.to_string()
    };
    let text = text.trim();

    match text.char_indices().nth(MAX_PAGE_CHARS) {
        Some((cut, _)) => format!(
            "{}\n\n[truncated at {} characters]",
            &text[..cut],
            MAX_PAGE_CHARS
        ),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response on a local port and return its URL.
    async fn serve_once(status: &'static str, content_type: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = [0u8; 1024];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
        });
        format!("http://{addr}/page")
    }

    #[tokio::test]
    async fn rejects_malformed_and_non_http_urls() {
        let ctx = ToolContext::new(std::env::temp_dir());

        let result = FetchUrlTool.execute(json!({ "url": "not a url" }), &ctx).await;
        assert!(result.is_error);
        assert!(result.output.contains("Invalid URL"));

        let result = FetchUrlTool
            .execute(json!({ "url": "ftp://example.com/file" }), &ctx)
            .await;
        assert!(result.is_error);
        assert!(result.output.contains("Unsupported URL scheme 'ftp'"));

        let result = FetchUrlTool.execute(json!({}), &ctx).await;
        assert!(result.is_error);
    }

    #[tokio::test]
    async fn html_pages_come_back_as_markdown() {
        let url = serve_once(
            "200 OK",
            "text/html; charset=utf-8",
            "<html><body><h1>Release notes</h1><p>Fixed the <b>parser</b>.</p></body></html>",
        )
        .await;
        let ctx = ToolContext::new(std::env::temp_dir());

        let result = FetchUrlTool.execute(json!({ "url": url }), &ctx).await;
        assert!(!result.is_error, "{}", result.output);
        assert!(result.output.contains("Release notes"));
        assert!(result.output.contains("parser"));
        assert!(!result.output.contains("<h1>"));
    }

    #[tokio::test]
    async fn http_errors_are_error_results() {
        let url = serve_once("404 Not Found", "text/plain", "missing").await;
        let ctx = ToolContext::new(std::env::temp_dir());

        let result = FetchUrlTool.execute(json!({ "url": url }), &ctx).await;
        assert!(result.is_error);
        assert!(result.output.contains("404"));
    }

    #[test]
    fn long_pages_are_truncated() {
        let body = "é".repeat(MAX_PAGE_CHARS + 10);
        let text = page_text(&body, false);
        assert!(text.starts_with(&"é".repeat(MAX_PAGE_CHARS)));
        assert!(text.ends_with("[truncated at 5000 characters]"));
        assert_eq!(page_text("  plain  ", false), "plain");
    }
}
