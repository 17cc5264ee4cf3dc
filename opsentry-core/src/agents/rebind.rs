//! Live model rebinding across the handoff graph
//!
//! Walks everything reachable from a root agent via handoffs and
//! rewrites the active model in place, clearing each agent's cached
//! model binding so the next turn reconnects under the new model. The
//! traversal carries an explicit visited set keyed by agent name, so it
//! terminates on cyclic graphs and touches each reachable agent exactly
//! once per call.

use std::collections::HashSet;

use tracing::debug;

use crate::agents::registry::AgentRegistry;
use crate::agents::spec::Rebindable;
use crate::Result;

/// Outcome of a rebind pass.
#[derive(Debug, Clone)]
pub struct RebindReport {
    pub model: String,
    /// Agents rebound, in visit order; each appears exactly once.
    pub visited: Vec<String>,
}

impl RebindReport {
    pub fn visit_count(&self) -> usize {
        self.visited.len()
    }
}

/// Rebind `root` and every agent reachable from it via handoffs to
/// `new_model`. Agents not reachable from the root are untouched. A leaf
/// agent (empty handoff set) is rebound and the traversal terminates.
pub fn rebind(
    registry: &mut AgentRegistry,
    root: &str,
    new_model: &str,
) -> Result<RebindReport> {
    // Fail on an unknown root before mutating anything.
    registry.resolve(root)?;

    let mut visited: HashSet<String> = HashSet::new();
    let mut order: Vec<String> = Vec::new();
    let mut stack: Vec<String> = vec![root.to_string()];

    while let Some(name) = stack.pop() {
        if !visited.insert(name.clone()) {
            continue;
        }

        // Handoff targets are validated at registry build time, so every
        // name on the stack resolves.
        let Some(spec) = registry.spec_mut(&name) else {
            continue;
        };
        spec.set_model(new_model);
        spec.invalidate_binding();
        order.push(name.clone());

        for target in spec.handoffs() {
            if !visited.contains(target) {
                stack.push(target.clone());
            }
        }
    }

    debug!(
        model = new_model,
        agents = order.len(),
        root,
        "rebound handoff graph"
    );

    Ok(RebindReport {
        model: new_model.to_string(),
        visited: order,
    })
}
