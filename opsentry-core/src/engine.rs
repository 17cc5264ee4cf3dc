//! Execution engine boundary
//!
//! The orchestrator talks to the model runtime through this trait; the
//! production implementation wraps an [`LlmProvider`] and evaluates the
//! agent's guardrails around the provider call, so guardrail tripwires
//! surface as errors of this boundary.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::agents::AgentInstance;
use crate::config::ProviderConfig;
use crate::providers::{
    create_provider, CompletionRequest, LlmProvider, Message, TokenUsage, ToolCall, ToolDefinition,
};
use crate::session::MetricsTracker;
use crate::Result;

/// Result of one engine invocation.
#[derive(Debug, Clone, Default)]
pub struct EngineRun {
    pub output: String,
    pub usage: TokenUsage,
    pub tool_calls: Vec<ToolCall>,
}

/// One call into the model runtime. May suspend; errors distinguish
/// guardrail tripwires from generic engine failures via
/// [`crate::Error::is_guardrail`].
#[async_trait]
pub trait ExecutionEngine: Send + Sync {
    async fn run(&self, agent: &AgentInstance, prompt: &str) -> Result<EngineRun>;
}

/// Production engine backed by an LLM provider.
///
/// Provider clients are cached per model id; a model rebind reaches a
/// different cache slot, so the first turn after a rebind establishes a
/// fresh client connection.
pub struct ProviderEngine {
    config: ProviderConfig,
    metrics: MetricsTracker,
    clients: Mutex<HashMap<String, Arc<dyn LlmProvider>>>,
}

impl ProviderEngine {
    pub fn new(config: ProviderConfig, metrics: MetricsTracker) -> Self {
        Self {
            config,
            metrics,
            clients: Mutex::new(HashMap::new()),
        }
    }

    pub fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }

    async fn client_for(&self, model: &str) -> Result<Arc<dyn LlmProvider>> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(model) {
            return Ok(Arc::clone(client));
        }

        debug!(model, "establishing provider client");
        let client = create_provider(&self.config, model, self.metrics.clone())?;
        clients.insert(model.to_string(), Arc::clone(&client));
        Ok(client)
    }
}

#[async_trait]
impl ExecutionEngine for ProviderEngine {
    async fn run(&self, agent: &AgentInstance, prompt: &str) -> Result<EngineRun> {
        agent.guardrails().check_input(prompt)?;

        let client = self.client_for(&agent.model).await?;
        let tools: Vec<ToolDefinition> = agent.tools.iter().map(ToolDefinition::from).collect();

        let request = CompletionRequest::new(vec![Message::user(prompt)])
            .with_system(&agent.instructions)
            .with_tools(tools);

        let response = client.complete(request).await?;
        let output = response.content.unwrap_or_default();

        agent.guardrails().check_output(&output)?;

        Ok(EngineRun {
            output,
            usage: response.usage,
            tool_calls: response.tool_calls,
        })
    }
}
