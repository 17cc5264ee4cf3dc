//! Error types for opsentry-core

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using opsentry Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for opsentry
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(opsentry::config))]
    Config(String),

    #[error("Unknown agent: {0}")]
    #[diagnostic(code(opsentry::agent))]
    UnknownAgent(String),

    #[error("Tool server '{server}' unavailable: {reason}")]
    #[diagnostic(code(opsentry::tool_server))]
    ToolServerUnavailable { server: String, reason: String },

    #[error("Input guardrail '{0}' tripped")]
    #[diagnostic(code(opsentry::guardrail::input))]
    InputGuardrail(String),

    #[error("Output guardrail '{0}' tripped")]
    #[diagnostic(code(opsentry::guardrail::output))]
    OutputGuardrail(String),

    #[error("Provider error: {0}")]
    #[diagnostic(code(opsentry::provider))]
    Provider(String),

    #[error("Tool execution error: {0}")]
    #[diagnostic(code(opsentry::tool))]
    Tool(String),

    #[error("Database error: {0}")]
    #[diagnostic(code(opsentry::database))]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    #[diagnostic(code(opsentry::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(opsentry::serde))]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    #[diagnostic(code(opsentry::toml))]
    Toml(#[from] toml::de::Error),

    #[error("Session not found: {0}")]
    #[diagnostic(code(opsentry::session))]
    SessionNotFound(String),
}

impl Error {
    /// Whether this error is a guardrail tripwire (input or output variant).
    pub fn is_guardrail(&self) -> bool {
        matches!(self, Error::InputGuardrail(_) | Error::OutputGuardrail(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guardrail_classification() {
        assert!(Error::InputGuardrail("scope".into()).is_guardrail());
        assert!(Error::OutputGuardrail("leak".into()).is_guardrail());
        assert!(!Error::Provider("timeout".into()).is_guardrail());
        assert!(!Error::UnknownAgent("ghost".into()).is_guardrail());
    }

    #[test]
    fn test_tool_server_display_names_server() {
        let err = Error::ToolServerUnavailable {
            server: "shodan".into(),
            reason: "connection refused".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("shodan"));
        assert!(msg.contains("connection refused"));
    }
}
