//! Generic command execution tool

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use crate::mcp::{McpTool, McpToolResult};
use crate::Result;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_OUTPUT_BYTES: usize = 16 * 1024;

/// Executes a shell command and captures stdout/stderr.
///
/// Output is truncated to keep tool results inside a sane prompt budget.
pub struct ShellExecTool {
    timeout: Duration,
}

impl ShellExecTool {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for ShellExecTool {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

fn truncate_output(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    if text.len() <= MAX_OUTPUT_BYTES {
        return text.into_owned();
    }
    let mut cut = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}\n[output truncated]", &text[..cut])
}

#[async_trait]
impl McpTool for ShellExecTool {
    fn name(&self) -> &str {
        "shell_exec"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return its captured output"
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Command line to execute"
                },
                "timeout_secs": {
                    "type": "integer",
                    "description": "Optional timeout in seconds (default 30)"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: Value) -> Result<McpToolResult> {
        let Some(command) = arguments.get("command").and_then(|v| v.as_str()) else {
            return Ok(McpToolResult::error("Missing 'command' argument"));
        };

        let timeout = arguments
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .map(Duration::from_secs)
            .unwrap_or(self.timeout);

        debug!(command, "shell_exec");

        let run = Command::new("sh").arg("-c").arg(command).output();
        let output = match tokio::time::timeout(timeout, run).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Ok(McpToolResult::error(format!("spawn failed: {}", e))),
            Err(_) => {
                return Ok(McpToolResult::error(format!(
                    "command timed out after {}s",
                    timeout.as_secs()
                )));
            }
        };

        let mut text = truncate_output(&output.stdout);
        if !output.stderr.is_empty() {
            text.push_str("\n[stderr]\n");
            text.push_str(&truncate_output(&output.stderr));
        }
        if !output.status.success() {
            text.push_str(&format!(
                "\n[exit status: {}]",
                output.status.code().unwrap_or(-1)
            ));
        }

        Ok(McpToolResult::text(text))
    }
}
