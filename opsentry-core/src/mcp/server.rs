//! In-process MCP server hosting the built-in tools
//!
//! The server speaks the same JSON-RPC surface an external tool server
//! would (`initialize`, `tools/list`, `tools/call`), so the association
//! store can treat local and remote servers uniformly through
//! [`LocalToolServer`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::mcp::associations::ToolServer;
use crate::mcp::protocol::{
    error_codes, JsonRpcRequest, JsonRpcResponse, McpToolCall, McpToolResult, ToolDescriptor,
};
use crate::Result;

/// Trait for tools hosted by the in-process MCP server
#[async_trait]
pub trait McpTool: Send + Sync {
    /// Tool name (must be unique within one server)
    fn name(&self) -> &str;

    /// Tool description
    fn description(&self) -> &str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    /// Execute the tool with given arguments
    async fn execute(&self, arguments: Value) -> Result<McpToolResult>;
}

/// MCP server that manages tools and handles JSON-RPC requests
pub struct McpServer {
    tools: RwLock<HashMap<String, Arc<dyn McpTool>>>,
    server_name: String,
    server_version: String,
}

impl McpServer {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            server_name: name.into(),
            server_version: version.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.server_name
    }

    /// Register a tool. A tool with the same name replaces the previous one.
    pub async fn register_tool(&self, tool: Arc<dyn McpTool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    /// Current tool descriptors, origin tagged with this server's name.
    pub async fn tool_descriptors(&self) -> Vec<ToolDescriptor> {
        let tools = self.tools.read().await;
        let mut descriptors: Vec<ToolDescriptor> = tools
            .values()
            .map(|t| {
                ToolDescriptor::new(t.name(), t.description(), t.input_schema())
                    .with_origin(&self.server_name)
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Handle an incoming JSON-RPC request
    pub async fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        match request.method.as_str() {
            "initialize" => self.handle_initialize(request.id),
            "tools/list" => self.handle_list_tools(request.id).await,
            "tools/call" => self.handle_call_tool(request.id, request.params).await,
            _ => JsonRpcResponse::error(
                request.id,
                error_codes::METHOD_NOT_FOUND,
                format!("Unknown method: {}", request.method),
            ),
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": self.server_name,
                    "version": self.server_version
                }
            }),
        )
    }

    async fn handle_list_tools(&self, id: Option<Value>) -> JsonRpcResponse {
        let descriptors = self.tool_descriptors().await;
        JsonRpcResponse::success(id, serde_json::json!({ "tools": descriptors }))
    }

    async fn handle_call_tool(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let Some(params) = params else {
            return JsonRpcResponse::error(
                id,
                error_codes::INVALID_PARAMS,
                "Missing params for tools/call",
            );
        };

        let call: McpToolCall = match serde_json::from_value(params) {
            Ok(c) => c,
            Err(e) => {
                return JsonRpcResponse::error(
                    id,
                    error_codes::INVALID_PARAMS,
                    format!("Invalid tool call params: {}", e),
                );
            }
        };

        let tool = {
            let tools = self.tools.read().await;
            match tools.get(&call.name) {
                Some(t) => Arc::clone(t),
                None => {
                    return JsonRpcResponse::error(
                        id,
                        error_codes::METHOD_NOT_FOUND,
                        format!("Unknown tool: {}", call.name),
                    );
                }
            }
        };

        match tool.execute(call.arguments).await {
            Ok(result) => match serde_json::to_value(result) {
                Ok(v) => JsonRpcResponse::success(id, v),
                Err(e) => JsonRpcResponse::error(
                    id,
                    error_codes::INTERNAL_ERROR,
                    format!("Failed to serialize tool result: {}", e),
                ),
            },
            Err(e) => match serde_json::to_value(McpToolResult::error(e.to_string())) {
                Ok(v) => JsonRpcResponse::success(id, v),
                Err(ser_err) => JsonRpcResponse::error(
                    id,
                    error_codes::INTERNAL_ERROR,
                    format!("Tool error: {}; serialization failed: {}", e, ser_err),
                ),
            },
        }
    }
}

/// [`ToolServer`] adapter over an in-process [`McpServer`].
pub struct LocalToolServer {
    server: Arc<McpServer>,
}

impl LocalToolServer {
    pub fn new(server: Arc<McpServer>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl ToolServer for LocalToolServer {
    fn name(&self) -> &str {
        self.server.name()
    }

    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>> {
        // Go through the JSON-RPC surface so local and remote servers
        // exercise the same protocol path.
        let request = JsonRpcRequest::new("tools/list").with_id(1);
        let response = self.server.handle_request(request).await;

        if let Some(err) = response.error {
            return Err(crate::Error::ToolServerUnavailable {
                server: self.server.name().to_string(),
                reason: format!("JSON-RPC error {}: {}", err.code, err.message),
            });
        }

        let tools = response
            .result
            .and_then(|r| r.get("tools").cloned())
            .unwrap_or(Value::Null);
        let mut descriptors: Vec<ToolDescriptor> = serde_json::from_value(tools)?;
        for descriptor in &mut descriptors {
            descriptor.origin = self.server.name().to_string();
        }
        Ok(descriptors)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl McpTool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echoes back the input"
        }

        fn input_schema(&self) -> Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "message": { "type": "string" }
                },
                "required": ["message"]
            })
        }

        async fn execute(&self, arguments: Value) -> Result<McpToolResult> {
            let message = arguments
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("no message");
            Ok(McpToolResult::text(message))
        }
    }

    #[tokio::test]
    async fn test_server_initialize() {
        let server = McpServer::new("local", "1.0.0");
        let req = JsonRpcRequest::new("initialize").with_id(1);
        let resp = server.handle_request(req).await;
        let result = resp.result.unwrap();
        assert_eq!(result["serverInfo"]["name"], "local");
    }

    #[tokio::test]
    async fn test_server_list_tools() {
        let server = McpServer::new("local", "1.0.0");
        server.register_tool(Arc::new(EchoTool)).await;

        let req = JsonRpcRequest::new("tools/list").with_id(1);
        let resp = server.handle_request(req).await;
        let result = resp.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["name"], "echo");
    }

    #[tokio::test]
    async fn test_server_call_tool() {
        let server = McpServer::new("local", "1.0.0");
        server.register_tool(Arc::new(EchoTool)).await;

        let req = JsonRpcRequest::new("tools/call")
            .with_id(1)
            .with_params(serde_json::json!({
                "name": "echo",
                "arguments": { "message": "hello" }
            }));
        let resp = server.handle_request(req).await;
        let result = resp.result.unwrap();
        assert_eq!(result["content"][0]["text"], "hello");
    }

    #[tokio::test]
    async fn test_server_unknown_method() {
        let server = McpServer::new("local", "1.0.0");
        let req = JsonRpcRequest::new("unknown/method").with_id(1);
        let resp = server.handle_request(req).await;
        assert_eq!(resp.error.unwrap().code, error_codes::METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_server_unknown_tool() {
        let server = McpServer::new("local", "1.0.0");
        let req = JsonRpcRequest::new("tools/call")
            .with_id(1)
            .with_params(serde_json::json!({
                "name": "nonexistent",
                "arguments": {}
            }));
        let resp = server.handle_request(req).await;
        assert!(resp.error.is_some());
    }

    #[tokio::test]
    async fn test_local_tool_server_lists_with_origin() {
        let server = Arc::new(McpServer::new("local", "1.0.0"));
        server.register_tool(Arc::new(EchoTool)).await;

        let adapter = LocalToolServer::new(Arc::clone(&server));
        let tools = adapter.list_tools().await.unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].origin, "local");
    }
}
