//! Agent registry: name-indexed table of persona specs
//!
//! Built once at process start. All configuration problems (bad
//! templates, handoffs to unregistered names, duplicate names) surface
//! at build time; `resolve` can only fail with `UnknownAgent`.

use std::collections::{BTreeSet, HashMap};

use serde_json::json;

use crate::agents::guardrails::{security_guardrails, GuardrailSet};
use crate::agents::prompts::Prompts;
use crate::agents::spec::{AgentSpec, InstructionsTemplate};
use crate::mcp::ToolDescriptor;
use crate::{Error, Result};

/// Name-indexed table of agent specs.
///
/// Handoffs are stored as name references into this table, so the
/// handoff graph may contain cycles without self-referential ownership.
#[derive(Debug)]
pub struct AgentRegistry {
    specs: HashMap<String, AgentSpec>,
}

impl AgentRegistry {
    /// Resolve an agent by name.
    pub fn resolve(&self, name: &str) -> Result<&AgentSpec> {
        self.specs
            .get(name)
            .ok_or_else(|| Error::UnknownAgent(name.to_string()))
    }

    /// Mutable access for the rebinder and turn bookkeeping.
    pub fn resolve_mut(&mut self, name: &str) -> Result<&mut AgentSpec> {
        self.specs
            .get_mut(name)
            .ok_or_else(|| Error::UnknownAgent(name.to_string()))
    }

    pub(crate) fn spec_mut(&mut self, name: &str) -> Option<&mut AgentSpec> {
        self.specs.get_mut(name)
    }

    /// Registered agent names, stable across a process run.
    pub fn list_names(&self) -> BTreeSet<String> {
        self.specs.keys().cloned().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    /// Build the registry of built-in personas with the given default model.
    pub fn builtin(default_model: &str) -> Result<Self> {
        let prompts = Prompts::default();
        let mut builder = RegistryBuilder::new(default_model);

        fn prompt<'a>(prompts: &'a Prompts, name: &str) -> Result<&'a str> {
            prompts
                .get(name)
                .ok_or_else(|| Error::Config(format!("No prompt defined for persona '{}'", name)))
        }

        builder.agent(
            "one_tool_agent",
            "One Tool Agent",
            "Minimal persona with a single command execution tool",
            prompt(&prompts, "one_tool_agent")?,
            vec![shell_exec_descriptor()],
            GuardrailSet::default(),
            [],
        )?;

        builder.agent(
            "red_teamer",
            "Red Team Agent",
            "Mimics a red teamer in a security assessment; recon and exploitation",
            prompt(&prompts, "red_teamer")?,
            vec![shell_exec_descriptor(), http_probe_descriptor()],
            security_guardrails(),
            ["reporter"],
        )?;

        builder.agent(
            "blue_teamer",
            "Blue Team Agent",
            "Defensive review: detection, hardening, mitigations",
            prompt(&prompts, "blue_teamer")?,
            vec![shell_exec_descriptor()],
            GuardrailSet::default(),
            ["reporter", "dfir"],
        )?;

        builder.agent(
            "bug_bounter",
            "Bug Bounty Hunter",
            "Hunts high-signal issues and writes up candidates",
            prompt(&prompts, "bug_bounter")?,
            vec![http_probe_descriptor()],
            security_guardrails(),
            ["red_teamer", "reporter"],
        )?;

        builder.agent(
            "dfir",
            "DFIR Analyst",
            "Forensics and incident response timelines",
            prompt(&prompts, "dfir")?,
            vec![shell_exec_descriptor()],
            GuardrailSet::default(),
            ["reporter"],
        )?;

        // reporter -> retester -> red_teamer -> reporter closes a cycle in
        // the handoff graph; the rebinder must terminate on it.
        builder.agent(
            "retester",
            "Retester",
            "Re-verifies previously reported findings",
            prompt(&prompts, "retester")?,
            vec![shell_exec_descriptor(), http_probe_descriptor()],
            security_guardrails(),
            ["red_teamer"],
        )?;

        builder.agent(
            "reporter",
            "Reporter",
            "Turns findings into an engagement report",
            prompt(&prompts, "reporter")?,
            vec![],
            GuardrailSet::default(),
            ["retester"],
        )?;

        builder.build()
    }
}

/// Builder validating the whole agent graph before any spec is used.
#[derive(Debug)]
pub struct RegistryBuilder {
    default_model: String,
    specs: Vec<AgentSpec>,
}

impl RegistryBuilder {
    pub fn new(default_model: impl Into<String>) -> Self {
        Self {
            default_model: default_model.into(),
            specs: Vec::new(),
        }
    }

    /// Add an agent definition. Template validation happens here, so a
    /// malformed prompt fails the build immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn agent<'a>(
        &mut self,
        name: &str,
        display_name: &str,
        description: &str,
        instructions: &str,
        tools: Vec<ToolDescriptor>,
        guardrails: GuardrailSet,
        handoffs: impl IntoIterator<Item = &'a str>,
    ) -> Result<&mut Self> {
        let template = InstructionsTemplate::new(instructions)
            .map_err(|e| Error::Config(format!("Agent '{}': {}", name, e)))?;
        let handoffs: BTreeSet<String> = handoffs.into_iter().map(str::to_string).collect();

        let spec = AgentSpec::new(
            name,
            display_name,
            description,
            template,
            self.default_model.clone(),
            tools,
            guardrails,
            handoffs,
        )?;
        self.specs.push(spec);
        Ok(self)
    }

    /// Validate the graph and produce the registry.
    pub fn build(self) -> Result<AgentRegistry> {
        let mut specs: HashMap<String, AgentSpec> = HashMap::new();
        for spec in self.specs {
            let name = spec.name().to_string();
            if specs.insert(name.clone(), spec).is_some() {
                return Err(Error::Config(format!("Duplicate agent name '{}'", name)));
            }
        }

        for spec in specs.values() {
            for target in spec.handoffs() {
                if !specs.contains_key(target) {
                    return Err(Error::Config(format!(
                        "Agent '{}' hands off to unregistered agent '{}'",
                        spec.name(),
                        target
                    )));
                }
            }
        }

        Ok(AgentRegistry { specs })
    }
}

fn shell_exec_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "shell_exec",
        "Execute a shell command and return its captured output",
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
        }),
    )
}

fn http_probe_descriptor() -> ToolDescriptor {
    ToolDescriptor::new(
        "http_probe",
        "Send a single HTTP request and return status, headers and a body excerpt",
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "Target URL (http only)"
                },
                "method": {
                    "type": "string",
                    "enum": ["GET", "POST", "HEAD"],
                    "description": "HTTP method (default GET)"
                },
                "body": {
                    "type": "string",
                    "description": "Optional request body"
                }
            },
            "required": ["url"]
        }),
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::agents::spec::Rebindable;

    #[test]
    fn test_builtin_registry_resolves_all_names() {
        let registry = AgentRegistry::builtin("m0").unwrap();
        for name in registry.list_names() {
            let spec = registry.resolve(&name).unwrap();
            assert_eq!(spec.model_id(), "m0", "{} starts on the default model", name);
        }
        assert!(registry.contains("red_teamer"));
        assert!(registry.contains("one_tool_agent"));
    }

    #[test]
    fn test_resolve_unknown_agent() {
        let registry = AgentRegistry::builtin("m0").unwrap();
        let err = registry.resolve("ghost").unwrap_err();
        assert!(matches!(err, Error::UnknownAgent(_)));
    }

    #[test]
    fn test_resolve_stable_across_calls() {
        let registry = AgentRegistry::builtin("m0").unwrap();
        let first = registry.resolve("red_teamer").unwrap().model_id().to_string();
        let second = registry.resolve("red_teamer").unwrap().model_id().to_string();
        assert_eq!(first, second);
    }

    #[test]
    fn test_list_names_stable() {
        let registry = AgentRegistry::builtin("m0").unwrap();
        assert_eq!(registry.list_names(), registry.list_names());
        assert_eq!(registry.list_names().len(), registry.len());
    }

    #[test]
    fn test_handoff_graph_contains_cycle() {
        // red_teamer -> reporter -> retester -> red_teamer
        let registry = AgentRegistry::builtin("m0").unwrap();
        let red = registry.resolve("red_teamer").unwrap();
        assert!(red.handoffs().contains("reporter"));
        let reporter = registry.resolve("reporter").unwrap();
        assert!(reporter.handoffs().contains("retester"));
        let retester = registry.resolve("retester").unwrap();
        assert!(retester.handoffs().contains("red_teamer"));
    }

    #[test]
    fn test_build_rejects_dangling_handoff() {
        let mut builder = RegistryBuilder::new("m0");
        builder
            .agent(
                "solo",
                "Solo",
                "",
                "You are {agent}.",
                vec![],
                GuardrailSet::default(),
                ["missing"],
            )
            .unwrap();
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("unregistered"));
    }

    #[test]
    fn test_build_rejects_duplicate_name() {
        let mut builder = RegistryBuilder::new("m0");
        builder
            .agent("dup", "Dup", "", "x", vec![], GuardrailSet::default(), [])
            .unwrap();
        builder
            .agent("dup", "Dup 2", "", "y", vec![], GuardrailSet::default(), [])
            .unwrap();
        let err = builder.build().unwrap_err();
        assert!(err.to_string().contains("Duplicate"));
    }

    #[test]
    fn test_build_rejects_malformed_template() {
        let mut builder = RegistryBuilder::new("m0");
        let err = builder
            .agent(
                "bad",
                "Bad",
                "",
                "You are {nobody}.",
                vec![],
                GuardrailSet::default(),
                [],
            )
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_mutation_visible_through_resolve() {
        let mut registry = AgentRegistry::builtin("m0").unwrap();
        registry.resolve_mut("dfir").unwrap().set_model("m1");
        assert_eq!(registry.resolve("dfir").unwrap().model_id(), "m1");
        // Siblings untouched
        assert_eq!(registry.resolve("reporter").unwrap().model_id(), "m0");
    }
}
