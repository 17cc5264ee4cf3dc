//! Agent specifications
//!
//! An [`AgentSpec`] is the registry's arena entry for one persona:
//! instructions template, model binding, static tools, guardrails and
//! handoff targets (stored as name references, so the handoff graph may
//! contain cycles without embedded pointers). An [`AgentInstance`] is the
//! resolved, runnable snapshot handed to the execution engine.

use std::collections::BTreeSet;

use chrono::Utc;
use serde_json::Value;

use crate::agents::guardrails::GuardrailSet;
use crate::mcp::ToolDescriptor;
use crate::providers::ToolCall;
use crate::{Error, Result};

/// Placeholders an instructions template may reference.
const KNOWN_PLACEHOLDERS: &[&str] = &["agent", "date"];

/// System-prompt template with `{placeholder}` substitution.
///
/// Placeholders are validated at construction so a malformed template
/// fails at registry build time, not mid-session.
#[derive(Debug, Clone)]
pub struct InstructionsTemplate {
    raw: String,
}

impl InstructionsTemplate {
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        for placeholder in extract_placeholders(&raw) {
            if !KNOWN_PLACEHOLDERS.contains(&placeholder.as_str()) {
                return Err(Error::Config(format!(
                    "Unknown placeholder '{{{}}}' in instructions template",
                    placeholder
                )));
            }
        }
        Ok(Self { raw })
    }

    /// Render the template for the given agent display name.
    pub fn render(&self, agent: &str) -> String {
        self.raw
            .replace("{agent}", agent)
            .replace("{date}", &Utc::now().format("%Y-%m-%d").to_string())
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Collect `{name}` placeholder names from a template string.
fn extract_placeholders(raw: &str) -> Vec<String> {
    let mut found = Vec::new();
    let mut rest = raw;
    while let Some(open) = rest.find('{') {
        let Some(close) = rest[open..].find('}') else {
            break;
        };
        let inner = &rest[open + 1..open + close];
        if !inner.is_empty() && inner.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            found.push(inner.to_string());
        }
        rest = &rest[open + close + 1..];
    }
    found
}

/// Cached state tied to an agent's current model binding.
///
/// Cleared whenever the model is rebound so the next turn re-establishes
/// a fresh provider connection instead of reusing stale client state.
#[derive(Debug, Clone, Default)]
pub struct ModelBinding {
    /// `provider/model` the agent last completed a turn against
    bound: Option<String>,
    recent_tool_calls: Vec<ToolCall>,
    tool_outputs: Vec<String>,
}

impl ModelBinding {
    pub fn is_bound(&self) -> bool {
        self.bound.is_some()
    }

    pub fn bound(&self) -> Option<&str> {
        self.bound.as_deref()
    }

    pub fn note_bound(&mut self, provider_model: impl Into<String>) {
        self.bound = Some(provider_model.into());
    }

    pub fn record_tool_activity(&mut self, calls: Vec<ToolCall>, outputs: Vec<String>) {
        self.recent_tool_calls.extend(calls);
        self.tool_outputs.extend(outputs);
    }

    pub fn recent_tool_calls(&self) -> &[ToolCall] {
        &self.recent_tool_calls
    }

    pub fn invalidate(&mut self) {
        self.bound = None;
        self.recent_tool_calls.clear();
        self.tool_outputs.clear();
    }
}

/// Capability for live model rebinding.
///
/// The rebinder only needs these two operations; implementing them
/// explicitly replaces the original system's defensive attribute probing.
pub trait Rebindable {
    fn set_model(&mut self, model_id: &str);
    fn invalidate_binding(&mut self);
}

/// Registry entry for one persona agent.
#[derive(Debug)]
pub struct AgentSpec {
    name: String,
    display_name: String,
    description: String,
    instructions: InstructionsTemplate,
    model_id: String,
    tools: Vec<ToolDescriptor>,
    guardrails: GuardrailSet,
    handoffs: BTreeSet<String>,
    binding: ModelBinding,
}

impl AgentSpec {
    /// Construct a spec, validating tool-name uniqueness.
    ///
    /// Handoff-target existence is validated by the registry builder,
    /// which can see the whole graph.
    pub fn new(
        name: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        instructions: InstructionsTemplate,
        model_id: impl Into<String>,
        tools: Vec<ToolDescriptor>,
        guardrails: GuardrailSet,
        handoffs: BTreeSet<String>,
    ) -> Result<Self> {
        let name = name.into();
        let mut seen = BTreeSet::new();
        for tool in &tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(Error::Config(format!(
                    "Agent '{}' declares duplicate tool '{}'",
                    name, tool.name
                )));
            }
        }

        Ok(Self {
            name,
            display_name: display_name.into(),
            description: description.into(),
            instructions,
            model_id: model_id.into(),
            tools,
            guardrails,
            handoffs,
            binding: ModelBinding::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn instructions(&self) -> &InstructionsTemplate {
        &self.instructions
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn guardrails(&self) -> &GuardrailSet {
        &self.guardrails
    }

    pub fn handoffs(&self) -> &BTreeSet<String> {
        &self.handoffs
    }

    pub fn binding(&self) -> &ModelBinding {
        &self.binding
    }

    pub fn binding_mut(&mut self) -> &mut ModelBinding {
        &mut self.binding
    }
}

impl Rebindable for AgentSpec {
    fn set_model(&mut self, model_id: &str) {
        self.model_id = model_id.to_string();
    }

    fn invalidate_binding(&mut self) {
        self.binding.invalidate();
    }
}

/// A resolved, runnable snapshot of an agent: rendered instructions plus
/// the effective tool set (static tools merged with resolved MCP tools).
///
/// Instances are cheap to clone; fan-out execution clones one instance
/// per branch so no mutable state is shared across branches.
#[derive(Debug, Clone)]
pub struct AgentInstance {
    pub name: String,
    pub display_name: String,
    pub instructions: String,
    pub model: String,
    pub tools: Vec<ToolDescriptor>,
    guardrails: GuardrailSet,
}

impl AgentInstance {
    pub fn from_spec(spec: &AgentSpec, mcp_tools: Vec<ToolDescriptor>) -> Self {
        let mut tools = spec.tools.clone();
        // Effective tool set is unique by name; a resolved MCP tool shadows
        // a static tool of the same name, consistent with the
        // later-resolved-wins rule across servers.
        for tool in mcp_tools {
            if let Some(existing) = tools.iter_mut().find(|t| t.name == tool.name) {
                *existing = tool;
            } else {
                tools.push(tool);
            }
        }

        Self {
            name: spec.name.clone(),
            display_name: spec.display_name.clone(),
            instructions: spec.instructions.render(&spec.display_name),
            model: spec.model_id.clone(),
            tools,
            guardrails: spec.guardrails.clone(),
        }
    }

    pub fn guardrails(&self) -> &GuardrailSet {
        &self.guardrails
    }

    /// Label this instance as one branch of a parallel fan-out.
    pub fn branch(&self, index: u32) -> Self {
        let mut clone = self.clone();
        clone.display_name = format!("{} [P{}]", self.display_name, index);
        clone
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_template() -> InstructionsTemplate {
        InstructionsTemplate::new("You are {agent}. Today is {date}.").unwrap()
    }

    fn sample_spec() -> AgentSpec {
        AgentSpec::new(
            "red_teamer",
            "Red Team Agent",
            "Offensive security persona",
            sample_template(),
            "m0",
            vec![ToolDescriptor::new("shell_exec", "Run a command", json!({"type": "object"}))],
            GuardrailSet::default(),
            BTreeSet::from(["reporter".to_string()]),
        )
        .unwrap()
    }

    #[test]
    fn test_template_rejects_unknown_placeholder() {
        let err = InstructionsTemplate::new("Hello {target}").unwrap_err();
        assert!(err.to_string().contains("target"));
    }

    #[test]
    fn test_template_renders_agent_and_date() {
        let rendered = sample_template().render("Red Team Agent");
        assert!(rendered.contains("You are Red Team Agent."));
        assert!(!rendered.contains("{date}"));
    }

    #[test]
    fn test_template_ignores_non_placeholder_braces() {
        // JSON snippets inside prompts must not be treated as placeholders
        let tpl = InstructionsTemplate::new("Reply with {\"ok\": true}").unwrap();
        assert_eq!(tpl.render("x"), "Reply with {\"ok\": true}");
    }

    #[test]
    fn test_duplicate_tool_names_rejected() {
        let result = AgentSpec::new(
            "a",
            "A",
            "",
            sample_template(),
            "m0",
            vec![
                ToolDescriptor::new("t", "first", json!({})),
                ToolDescriptor::new("t", "second", json!({})),
            ],
            GuardrailSet::default(),
            BTreeSet::new(),
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_rebindable_updates_model_and_clears_binding() {
        let mut spec = sample_spec();
        spec.binding_mut().note_bound("anthropic/m0");
        spec.binding_mut()
            .record_tool_activity(vec![], vec!["output".into()]);
        assert!(spec.binding().is_bound());

        spec.set_model("m1");
        spec.invalidate_binding();

        assert_eq!(spec.model_id(), "m1");
        assert!(!spec.binding().is_bound());
        assert!(spec.binding().recent_tool_calls().is_empty());
    }

    #[test]
    fn test_instance_merges_mcp_tools_uniquely() {
        let spec = sample_spec();
        let mcp = vec![
            ToolDescriptor::new("shell_exec", "Server-side shell", json!({})).with_origin("srv1"),
            ToolDescriptor::new("dns_lookup", "Resolve names", json!({})).with_origin("srv1"),
        ];
        let instance = AgentInstance::from_spec(&spec, mcp);

        assert_eq!(instance.tools.len(), 2);
        let shell = instance.tools.iter().find(|t| t.name == "shell_exec").unwrap();
        assert_eq!(shell.origin, "srv1", "MCP tool shadows the static tool");
    }

    #[test]
    fn test_branch_labels_display_name() {
        let spec = sample_spec();
        let instance = AgentInstance::from_spec(&spec, vec![]);
        let branch = instance.branch(2);
        assert_eq!(branch.display_name, "Red Team Agent [P2]");
        assert_eq!(branch.name, instance.name);
    }
}
