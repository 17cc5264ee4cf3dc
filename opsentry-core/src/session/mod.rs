//! Session state: on-disk persistence and usage tracking

pub mod metrics;
pub mod migrations;
pub mod schema;
pub mod store;

pub use metrics::{Metrics, MetricsTracker, TokenCounter, TokenCounts};
pub use migrations::run_migrations;
pub use store::{SessionStore, SessionStatus, TurnOutcome};
