//! Tool-server (MCP) integration
//!
//! Agents gain tools from external tool servers speaking the MCP
//! JSON-RPC protocol. The association store records which servers are
//! attached to which agents; resolution merges each attached server's
//! `tools/list` into the agent's effective tool set.

mod associations;
mod http;
mod protocol;
mod server;

pub use associations::*;
pub use http::*;
pub use protocol::*;
pub use server::*;
