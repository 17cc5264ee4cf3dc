//! Interactive session loop

pub mod events;
pub mod orchestrator;

pub use events::SessionEvent;
pub use orchestrator::{
    CommandHandler, CommandOutcome, Orchestrator, PromptSource, QueuedPrompts, SessionSummary,
};
