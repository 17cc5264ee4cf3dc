//! Built-in tools hosted by the local MCP server

mod probe;
mod shell;

pub use probe::HttpProbeTool;
pub use shell::ShellExecTool;

use std::sync::Arc;

use crate::mcp::{LocalToolServer, McpServer};

/// Name the local tool server registers under.
pub const LOCAL_SERVER_NAME: &str = "local";

/// Build the in-process tool server with the built-in tools registered.
pub async fn local_tool_server() -> LocalToolServer {
    let server = Arc::new(McpServer::new(
        LOCAL_SERVER_NAME,
        env!("CARGO_PKG_VERSION"),
    ));
    server.register_tool(Arc::new(ShellExecTool::default())).await;
    server.register_tool(Arc::new(HttpProbeTool::new())).await;
    LocalToolServer::new(server)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::mcp::ToolServer;

    #[tokio::test]
    async fn test_local_server_exposes_builtin_tools() {
        let server = local_tool_server().await;
        assert_eq!(server.name(), LOCAL_SERVER_NAME);

        let tools = server.list_tools().await.unwrap();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"shell_exec"));
        assert!(names.contains(&"http_probe"));
    }
}
