//! Single-shot HTTP probe tool

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{header, Method, Request};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde_json::{json, Value};
use tracing::debug;

use crate::mcp::{McpTool, McpToolResult};
use crate::Result;

const MAX_BODY_EXCERPT: usize = 4 * 1024;

/// Sends one HTTP request and reports status, interesting headers and a
/// body excerpt. Plain HTTP only; TLS endpoints are out of scope for the
/// built-in probe.
pub struct HttpProbeTool {
    client: Client<hyper_util::client::legacy::connect::HttpConnector, Full<Bytes>>,
}

impl HttpProbeTool {
    pub fn new() -> Self {
        Self {
            client: Client::builder(TokioExecutor::new()).build_http(),
        }
    }
}

impl Default for HttpProbeTool {
    fn default() -> Self {
        Self::new()
    }
}

/// Response headers worth surfacing in a security probe.
const REPORTED_HEADERS: &[&str] = &[
    "server",
    "content-type",
    "location",
    "x-powered-by",
    "strict-transport-security",
    "content-security-policy",
];

#[async_trait]
impl McpTool for HttpProbeTool {
    fn name(&self) -> &str {
        "http_probe"
    }

    fn description(&self) -> &str {
        "Send a single HTTP request and return status, headers and a body excerpt"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Target URL (http only)"
                },
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST", "HEAD"],
                    "description": "HTTP method (default GET)"
                },
                "body": {
                    "type": "string",
                    "description": "Optional request body"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<McpToolResult> {
        let Some(url) = arguments.get("url").and_then(|v| v.as_str()) else {
            return Ok(McpToolResult::error("Missing 'url' argument"));
        };
        if url.starts_with("https://") {
            return Ok(McpToolResult::error(
                "http_probe supports plain http URLs only",
            ));
        }

        let method = match arguments
            .get("method")
            .and_then(|v| v.as_str())
            .unwrap_or("GET")
        {
            "POST" => Method::POST,
            "HEAD" => Method::HEAD,
            _ => Method::GET,
        };
        let body = arguments
            .get("body")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();

        debug!(url, %method, "http_probe");

        let request = match Request::builder()
            .method(method)
            .uri(url)
            .header(header::USER_AGENT, "opsentry-probe")
            .body(Full::new(Bytes::from(body)))
        {
            Ok(req) => req,
            Err(e) => return Ok(McpToolResult::error(format!("invalid request: {}", e))),
        };

        let response = match self.client.request(request).await {
            Ok(resp) => resp,
            Err(e) => return Ok(McpToolResult::error(format!("request failed: {}", e))),
        };

        let status = response.status();
        let mut report = format!("status: {}\n", status);
        for name in REPORTED_HEADERS {
            if let Some(value) = response.headers().get(*name) {
                report.push_str(&format!("{}: {}\n", name, value.to_str().unwrap_or("?")));
            }
        }

        match response.into_body().collect().await {
            Ok(collected) => {
                let bytes = collected.to_bytes();
                let text = String::from_utf8_lossy(&bytes);
                let excerpt: String = text.chars().take(MAX_BODY_EXCERPT).collect();
                if !excerpt.is_empty() {
                    report.push_str("\n");
                    report.push_str(&excerpt);
                }
            }
            Err(e) => report.push_str(&format!("\n[body read failed: {}]", e)),
        }

        Ok(McpToolResult::text(report))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::mcp::McpContent;

    fn result_text(result: &McpToolResult) -> &str {
        match &result.content.as_ref().unwrap()[0] {
            McpContent::Text { text } => text,
        }
    }

    #[tokio::test]
    async fn test_probe_missing_url() {
        let tool = HttpProbeTool::new();
        let result = tool.execute(json!({})).await.unwrap();
        assert_eq!(result.is_error, Some(true));
    }

    #[tokio::test]
    async fn test_probe_rejects_https() {
        let tool = HttpProbeTool::new();
        let result = tool
            .execute(json!({"url": "https://example.com"}))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(result_text(&result).contains("plain http"));
    }

    #[tokio::test]
    async fn test_probe_connection_refused_is_tool_error() {
        let tool = HttpProbeTool::new();
        let result = tool
            .execute(json!({"url": "http://127.0.0.1:1/"}))
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
        assert!(result_text(&result).contains("request failed"));
    }
}
