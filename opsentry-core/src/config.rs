//! Configuration types for opsentry sessions
//!
//! Two layers: [`SessionConfig`] is the TOML file loaded once at startup
//! (provider credentials, session directory, launch defaults), and
//! [`SettingsSource`] is the live surface the orchestrator polls once per
//! turn boundary for the settings that may change mid-session (model,
//! agent type, turn limit, parallel fan-out).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// LLM provider selection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    #[default]
    Anthropic,
    OpenAi,
    LiteLlm,
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub name: ProviderName,
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            api_key: None,
            base_url: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
}

fn default_session_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".opsentry")
        .join("sessions")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            session_dir: default_session_dir(),
        }
    }
}

/// Launch defaults for the interactive loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplConfig {
    #[serde(default = "default_agent_type")]
    pub agent_type: String,
    /// Turn limit; absent means unbounded
    #[serde(default)]
    pub max_turns: Option<u32>,
    #[serde(default = "default_parallel")]
    pub parallel: u32,
}

fn default_agent_type() -> String {
    "one_tool_agent".to_string()
}

fn default_parallel() -> u32 {
    1
}

impl Default for ReplConfig {
    fn default() -> Self {
        Self {
            agent_type: default_agent_type(),
            max_turns: None,
            parallel: default_parallel(),
        }
    }
}

/// Complete session configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub repl: ReplConfig,
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> crate::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from default locations with cascade:
    /// 1. ./opsentry.toml (local override)
    /// 2. ~/.opsentry/config.toml (global defaults)
    /// 3. Built-in defaults
    pub fn load_default() -> Self {
        if let Ok(config) = Self::from_file("opsentry.toml") {
            return config;
        }

        if let Some(home) = dirs::home_dir() {
            let global_path = home.join(".opsentry").join("config.toml");
            if let Ok(config) = Self::from_file(&global_path) {
                return config;
            }
        }

        Self::default()
    }

    /// Expand `${VAR}` environment references in the API key field
    pub fn expand_env_vars(&mut self) {
        if let Some(ref key) = self.provider.api_key {
            if key.starts_with("${") && key.ends_with('}') {
                let var_name = &key[2..key.len() - 1];
                if let Ok(value) = std::env::var(var_name) {
                    self.provider.api_key = Some(value);
                }
            }
        }
    }
}

/// Snapshot of the live settings taken once per turn boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub model: String,
    pub agent_type: String,
    /// None means unbounded
    pub max_turns: Option<u32>,
    pub parallel: u32,
}

impl Settings {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            model: config.provider.model.clone(),
            agent_type: config.repl.agent_type.clone(),
            max_turns: config.repl.max_turns,
            parallel: config.repl.parallel.max(1),
        }
    }
}

/// Live-settings surface the orchestrator re-checks between turns.
///
/// Reads are non-blocking and cheap; changes take effect at the next turn
/// boundary, never mid-turn.
pub trait SettingsSource: Send + Sync {
    /// Current settings snapshot.
    fn snapshot(&self) -> Settings;

    /// Optional per-agent-type model override, taking precedence over the
    /// global model for that agent type.
    fn agent_model_override(&self, _agent_type: &str) -> Option<String> {
        None
    }
}

/// Settings backed by environment variables, polled fresh on every snapshot.
///
/// Reads `OPSENTRY_MODEL`, `OPSENTRY_AGENT_TYPE`, `OPSENTRY_MAX_TURNS`
/// (number or `inf`), `OPSENTRY_PARALLEL` and the per-agent override
/// `OPSENTRY_<AGENT_TYPE>_MODEL`. Unset or unparseable values fall back to
/// the defaults supplied at construction.
pub struct EnvSettings {
    defaults: Settings,
}

impl EnvSettings {
    pub fn new(defaults: Settings) -> Self {
        Self { defaults }
    }
}

/// `Some(None)` means explicitly unbounded; `None` means unparseable.
fn parse_max_turns(raw: &str) -> Option<Option<u32>> {
    if raw.eq_ignore_ascii_case("inf") || raw.eq_ignore_ascii_case("none") {
        return Some(None);
    }
    raw.parse().ok().map(Some)
}

impl SettingsSource for EnvSettings {
    fn snapshot(&self) -> Settings {
        let model = std::env::var("OPSENTRY_MODEL").unwrap_or_else(|_| self.defaults.model.clone());
        let agent_type = std::env::var("OPSENTRY_AGENT_TYPE")
            .unwrap_or_else(|_| self.defaults.agent_type.clone());
        let max_turns = match std::env::var("OPSENTRY_MAX_TURNS") {
            Ok(raw) => parse_max_turns(&raw).unwrap_or(self.defaults.max_turns),
            Err(_) => self.defaults.max_turns,
        };
        let parallel = std::env::var("OPSENTRY_PARALLEL")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(self.defaults.parallel)
            .max(1);

        Settings {
            model,
            agent_type,
            max_turns,
            parallel,
        }
    }

    fn agent_model_override(&self, agent_type: &str) -> Option<String> {
        let var = format!("OPSENTRY_{}_MODEL", agent_type.to_uppercase());
        std::env::var(var).ok()
    }
}

/// Shared in-memory settings, mutated by the command handler between turns.
///
/// Cloning shares the underlying state; the orchestrator and the CLI
/// command handler hold clones of the same instance.
#[derive(Clone)]
pub struct SharedSettings {
    inner: Arc<RwLock<SharedState>>,
}

struct SharedState {
    settings: Settings,
    agent_models: HashMap<String, String>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SharedState {
                settings,
                agent_models: HashMap::new(),
            })),
        }
    }

    pub fn set_model(&self, model: impl Into<String>) {
        self.write().settings.model = model.into();
    }

    pub fn set_agent_type(&self, agent_type: impl Into<String>) {
        self.write().settings.agent_type = agent_type.into();
    }

    pub fn set_max_turns(&self, max_turns: Option<u32>) {
        self.write().settings.max_turns = max_turns;
    }

    pub fn set_parallel(&self, parallel: u32) {
        self.write().settings.parallel = parallel.max(1);
    }

    pub fn set_agent_model(&self, agent_type: impl Into<String>, model: impl Into<String>) {
        self.write()
            .agent_models
            .insert(agent_type.into(), model.into());
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SharedState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SharedState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }
}

impl SettingsSource for SharedSettings {
    fn snapshot(&self) -> Settings {
        self.read().settings.clone()
    }

    fn agent_model_override(&self, agent_type: &str) -> Option<String> {
        self.read().agent_models.get(agent_type).cloned()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_only_config() {
        let toml = r#"
[provider]
name = "openai"
model = "gpt-4o"
"#;
        let config = SessionConfig::parse(toml).unwrap();
        assert_eq!(config.provider.name, ProviderName::OpenAi);
        assert_eq!(config.provider.model, "gpt-4o");
        assert_eq!(config.repl.agent_type, "one_tool_agent");
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
[provider]
name = "anthropic"
model = "claude-sonnet-4-20250514"

[repl]
agent_type = "red_teamer"
max_turns = 20
parallel = 3
"#;
        let config = SessionConfig::parse(toml).unwrap();
        assert_eq!(config.repl.agent_type, "red_teamer");
        assert_eq!(config.repl.max_turns, Some(20));
        assert_eq!(config.repl.parallel, 3);
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("TEST_OPSENTRY_KEY", "expanded_value");
        let toml = r#"
[provider]
name = "anthropic"
model = "claude-sonnet-4-20250514"
api_key = "${TEST_OPSENTRY_KEY}"
"#;
        let mut config = SessionConfig::parse(toml).unwrap();
        config.expand_env_vars();
        assert_eq!(config.provider.api_key, Some("expanded_value".to_string()));
        std::env::remove_var("TEST_OPSENTRY_KEY");
    }

    #[test]
    fn test_settings_from_config_clamps_parallel() {
        let toml = r#"
[repl]
parallel = 0
"#;
        let config = SessionConfig::parse(toml).unwrap();
        let settings = Settings::from_config(&config);
        assert_eq!(settings.parallel, 1);
    }

    #[test]
    fn test_parse_max_turns() {
        assert_eq!(parse_max_turns("10"), Some(Some(10)));
        assert_eq!(parse_max_turns("inf"), Some(None));
        assert_eq!(parse_max_turns("INF"), Some(None));
        assert_eq!(parse_max_turns("garbage"), None, "unparseable keeps the default");
    }

    #[test]
    fn test_shared_settings_mutation_visible_in_snapshot() {
        let shared = SharedSettings::new(Settings {
            model: "m0".into(),
            agent_type: "one_tool_agent".into(),
            max_turns: None,
            parallel: 1,
        });
        let other = shared.clone();

        other.set_model("m1");
        other.set_max_turns(Some(3));
        other.set_parallel(0);

        let snap = shared.snapshot();
        assert_eq!(snap.model, "m1");
        assert_eq!(snap.max_turns, Some(3));
        assert_eq!(snap.parallel, 1, "parallel is clamped to at least 1");
    }

    #[test]
    fn test_shared_settings_agent_override() {
        let shared = SharedSettings::new(Settings {
            model: "m0".into(),
            agent_type: "red_teamer".into(),
            max_turns: None,
            parallel: 1,
        });
        assert_eq!(shared.agent_model_override("red_teamer"), None);

        shared.set_agent_model("red_teamer", "m-special");
        assert_eq!(
            shared.agent_model_override("red_teamer"),
            Some("m-special".to_string())
        );
        assert_eq!(shared.agent_model_override("blue_teamer"), None);
    }
}
