//! Application State

use std::sync::Arc;

use agent_core::Agent;
use task_assistant::TaskStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Immutable agent; every request gets its own conversation
    pub agent: Arc<Agent>,

    /// Task store behind the agent's tools
    pub store: Arc<dyn TaskStore>,
}
