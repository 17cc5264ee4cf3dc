//! Agent framework: persona specs, registry, guardrails, model rebinding

pub mod guardrails;
pub mod prompts;
pub mod rebind;
pub mod registry;
pub mod spec;

pub use guardrails::{Guardrail, GuardrailSet};
pub use prompts::Prompts;
pub use rebind::{rebind, RebindReport};
pub use registry::{AgentRegistry, RegistryBuilder};
pub use spec::{AgentInstance, AgentSpec, InstructionsTemplate, Rebindable};
