//! System prompts for the persona agents

use serde::Deserialize;
use std::path::Path;

use crate::{Error, Result};

/// A single persona prompt
#[derive(Debug, Clone, Deserialize)]
pub struct PersonaPrompt {
    pub prompt: String,
}

/// All persona prompts
#[derive(Debug, Clone, Deserialize)]
pub struct Prompts {
    pub one_tool_agent: PersonaPrompt,
    pub red_teamer: PersonaPrompt,
    pub blue_teamer: PersonaPrompt,
    pub bug_bounter: PersonaPrompt,
    pub dfir: PersonaPrompt,
    pub retester: PersonaPrompt,
    pub reporter: PersonaPrompt,
}

impl Prompts {
    /// Load prompts from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse prompts from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse prompts: {}", e)))
    }

    /// Load from default location (embedded)
    #[allow(clippy::expect_used)]
    pub fn default_prompts() -> Self {
        let content = include_str!("../../prompts.toml");
        Self::parse(content).expect("Embedded prompts.toml should be valid")
    }

    /// Get prompt for a specific persona
    pub fn get(&self, persona: &str) -> Option<&str> {
        match persona {
            "one_tool_agent" => Some(&self.one_tool_agent.prompt),
            "red_teamer" => Some(&self.red_teamer.prompt),
            "blue_teamer" => Some(&self.blue_teamer.prompt),
            "bug_bounter" => Some(&self.bug_bounter.prompt),
            "dfir" => Some(&self.dfir.prompt),
            "retester" => Some(&self.retester.prompt),
            "reporter" => Some(&self.reporter.prompt),
            _ => None,
        }
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self::default_prompts()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_prompts_parse() {
        let prompts = Prompts::default();
        assert!(prompts.get("red_teamer").is_some());
        assert!(prompts.get("reporter").is_some());
        assert!(prompts.get("nonexistent").is_none());
    }

    #[test]
    fn test_prompts_carry_placeholders() {
        let prompts = Prompts::default();
        let red = prompts.get("red_teamer").unwrap();
        assert!(red.contains("{agent}"));
    }
}
