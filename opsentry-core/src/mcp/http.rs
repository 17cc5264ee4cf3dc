//! HTTP transport for external MCP tool servers
//!
//! Speaks JSON-RPC over HTTP POST against a remote tool server's
//! endpoint. Only `tools/list` is needed by the association store;
//! requests are lazy and a connection failure surfaces as
//! `ToolServerUnavailable` for that server alone.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::{header, Method, Request, StatusCode};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::debug;

use crate::mcp::associations::ToolServer;
use crate::mcp::protocol::{JsonRpcRequest, JsonRpcResponse, ToolDescriptor};
use crate::{Error, Result};

/// [`ToolServer`] backed by a remote MCP endpoint over HTTP.
pub struct HttpToolServer {
    name: String,
    url: String,
    client: Client<hyper_util::client::legacy::connect::HttpConnector, Full<Bytes>>,
    next_id: AtomicU64,
}

impl HttpToolServer {
    /// Create a handle for the server at `url` (e.g. `http://127.0.0.1:8931`).
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            client: Client::builder(TokioExecutor::new()).build_http(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn unavailable(&self, reason: impl Into<String>) -> Error {
        Error::ToolServerUnavailable {
            server: self.name.clone(),
            reason: reason.into(),
        }
    }

    async fn call(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        let body = serde_json::to_vec(&request)?;

        let http_request = Request::builder()
            .method(Method::POST)
            .uri(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| self.unavailable(format!("invalid request: {}", e)))?;

        debug!(server = %self.name, method = %request.method, "MCP HTTP request");

        let response = self
            .client
            .request(http_request)
            .await
            .map_err(|e| self.unavailable(e.to_string()))?;

        if response.status() != StatusCode::OK {
            return Err(self.unavailable(format!("HTTP status {}", response.status())));
        }

        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| self.unavailable(format!("body read failed: {}", e)))?
            .to_bytes();

        serde_json::from_slice(&bytes)
            .map_err(|e| self.unavailable(format!("invalid JSON-RPC response: {}", e)))
    }
}

#[async_trait]
impl ToolServer for HttpToolServer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new("tools/list").with_id(id);
        let response = self.call(request).await?;

        if let Some(err) = response.error {
            return Err(self.unavailable(format!("JSON-RPC error {}: {}", err.code, err.message)));
        }

        let result = response
            .result
            .ok_or_else(|| self.unavailable("empty JSON-RPC result"))?;
        let tools = result
            .get("tools")
            .cloned()
            .ok_or_else(|| self.unavailable("missing 'tools' in response"))?;
        let descriptors: Vec<ToolDescriptor> = serde_json::from_value(tools)?;

        Ok(descriptors
            .into_iter()
            .map(|d| d.with_origin(&self.name))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_construction() {
        let server = HttpToolServer::new("remote", "http://127.0.0.1:8931");
        assert_eq!(server.name(), "remote");
        assert_eq!(server.url(), "http://127.0.0.1:8931");
    }

    #[tokio::test]
    async fn test_list_tools_unreachable_server() {
        // Nothing listens on this port; the handle must report itself
        // unavailable rather than panic or hang.
        let server = HttpToolServer::new("remote", "http://127.0.0.1:1");
        let err = server.list_tools().await.unwrap_err();
        assert!(matches!(err, Error::ToolServerUnavailable { .. }));
    }
}
