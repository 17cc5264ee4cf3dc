//! Agent-to-tool-server associations
//!
//! The store records which tool servers are attached to which agents and
//! resolves the attached servers into an agent's effective MCP tool set.
//! Associations have strict set semantics: attaching a pair twice is a
//! no-op, as is detaching an absent pair. Attach never contacts the
//! server; resolution is the only operation that suspends.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::mcp::protocol::ToolDescriptor;
use crate::Result;

/// External resource exposing a set of schema-described tools.
#[async_trait]
pub trait ToolServer: Send + Sync {
    /// Unique server name used for registration and association.
    fn name(&self) -> &str;

    /// List the tools this server exposes. May suspend; invoked lazily,
    /// never at attach time.
    async fn list_tools(&self) -> Result<Vec<ToolDescriptor>>;
}

/// A tool-name collision between two servers during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCollision {
    pub tool: String,
    pub kept_from: String,
    pub shadowed_from: String,
}

/// Result of resolving an agent's attached servers into tools.
#[derive(Debug, Clone, Default)]
pub struct ToolResolution {
    /// Merged tools, unique by name, later-resolved server wins.
    pub tools: Vec<ToolDescriptor>,
    /// Servers that failed to respond (or were never registered).
    pub failed: BTreeSet<String>,
    /// Recorded name collisions; never fatal, never silently dropped.
    pub collisions: Vec<ToolCollision>,
}

impl ToolResolution {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Process-wide store of server handles and agent associations.
///
/// Created at session start and passed to the orchestrator explicitly;
/// mutation happens only from the orchestrator thread between turns.
#[derive(Default)]
pub struct AssociationStore {
    servers: HashMap<String, Arc<dyn ToolServer>>,
    associations: HashMap<String, BTreeSet<String>>,
    generation: u64,
}

impl AssociationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a server handle under its unique name. The first
    /// registration owns the name; a repeat registration is ignored.
    pub fn register_server(&mut self, server: Arc<dyn ToolServer>) -> bool {
        let name = server.name().to_string();
        if self.servers.contains_key(&name) {
            warn!(server = %name, "tool server already registered, keeping first");
            return false;
        }
        self.servers.insert(name, server);
        true
    }

    pub fn server(&self, name: &str) -> Option<Arc<dyn ToolServer>> {
        self.servers.get(name).map(Arc::clone)
    }

    pub fn server_names(&self) -> BTreeSet<String> {
        self.servers.keys().cloned().collect()
    }

    /// Attach a server to an agent. Returns false (no-op) if the pair is
    /// already present. Does not contact the server.
    pub fn attach(&mut self, agent: &str, server: &str) -> bool {
        let added = self
            .associations
            .entry(agent.to_string())
            .or_default()
            .insert(server.to_string());
        if added {
            self.generation += 1;
        }
        added
    }

    /// Detach a server from an agent. Returns false (no-op) if the pair
    /// was not present.
    pub fn detach(&mut self, agent: &str, server: &str) -> bool {
        let removed = self
            .associations
            .get_mut(agent)
            .map(|set| set.remove(server))
            .unwrap_or(false);
        if removed {
            self.generation += 1;
        }
        removed
    }

    /// Server names attached to an agent; empty set if none.
    pub fn list_for_agent(&self, agent: &str) -> BTreeSet<String> {
        self.associations.get(agent).cloned().unwrap_or_default()
    }

    /// Monotonic counter bumped on every effective attach/detach, so the
    /// orchestrator can cheaply detect association changes between turns.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resolve an agent's attached servers into a merged tool set.
    ///
    /// A failing server is recorded and the remaining servers still
    /// resolve; one dead server never blanks out the others. Tool-name
    /// collisions keep the later-resolved tool and record the collision.
    pub async fn resolve_tools(&self, agent: &str) -> ToolResolution {
        let mut resolution = ToolResolution::default();
        let mut index: HashMap<String, usize> = HashMap::new();

        for server_name in self.list_for_agent(agent) {
            let Some(server) = self.servers.get(&server_name) else {
                warn!(server = %server_name, agent, "attached server not registered");
                resolution.failed.insert(server_name);
                continue;
            };

            let tools = match server.list_tools().await {
                Ok(tools) => tools,
                Err(e) => {
                    warn!(server = %server_name, agent, error = %e, "tool listing failed");
                    resolution.failed.insert(server_name);
                    continue;
                }
            };

            for tool in tools {
                let tool = tool.with_origin(&server_name);
                match index.get(&tool.name) {
                    Some(&slot) => {
                        resolution.collisions.push(ToolCollision {
                            tool: tool.name.clone(),
                            kept_from: server_name.clone(),
                            shadowed_from: resolution.tools[slot].origin.clone(),
                        });
                        resolution.tools[slot] = tool;
                    }
                    None => {
                        index.insert(tool.name.clone(), resolution.tools.len());
                        resolution.tools.push(tool);
                    }
                }
            }
        }

        resolution
    }
}
