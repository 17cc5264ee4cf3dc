//! opsentry-core: security-persona agent framework library
//!
//! Provides the agent registry, tool-server association store, model
//! rebinder and interactive session orchestrator that back the opsentry
//! CLI. LLM execution is delegated to providers behind the
//! [`engine::ExecutionEngine`] boundary.

#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod agents;
pub mod config;
pub mod engine;
pub mod error;
pub mod mcp;
pub mod pricing;
pub mod providers;
pub mod repl;
pub mod session;
pub mod tools;

pub use error::{Error, Result};
