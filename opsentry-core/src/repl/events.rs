//! Events emitted by the orchestrator for the UI to render
//!
//! The orchestrator never prints; it sends events over an unbounded
//! channel and the frontend (CLI, tests) decides how to display them.

use std::collections::BTreeSet;

use crate::session::SessionStatus;

/// One observable step of the session loop.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Informational notice (config changes, unknown commands, partial
    /// tool resolution).
    Notice(String),
    /// The active agent switched to a different persona.
    AgentSwitched { agent: String },
    /// The active model was rebound across the handoff graph.
    ModelRebound { model: String, agents: usize },
    /// Some attached tool servers failed to resolve.
    ToolServersFailed { servers: BTreeSet<String> },
    /// A successful turn's output.
    Output { agent: String, text: String },
    /// A guardrail vetoed the turn.
    Blocked { agent: String, guardrail: String },
    /// The turn failed with a non-guardrail error.
    TurnError { agent: String, message: String },
    /// The turn limit was hit; prompts are refused until it is raised.
    TurnLimitReached { limit: u32 },
    /// The turn limit was raised and prompts are accepted again.
    TurnLimitLifted,
    /// Session teardown completed.
    SessionEnded {
        status: SessionStatus,
        total_cost_usd: f64,
        turns: u32,
    },
}
