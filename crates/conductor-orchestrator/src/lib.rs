//! Session lifecycle orchestration.
//!
//! A [`SessionOrchestrator`] owns one session end to end: it asks the
//! planner for a task graph, validates it, walks it in dependency order one
//! task at a time, and keeps session status and derived progress consistent
//! after every transition. The process-wide [`SessionRegistry`] maps session
//! ids to orchestrators and is the only shared mutable structure.

mod graph;
mod orchestrator;
mod registry;
#[cfg(test)]
pub(crate) mod test_util;

pub use graph::TaskGraph;
pub use orchestrator::{SessionOrchestrator, TaskArtifact};
pub use registry::SessionRegistry;

use conductor_gateway::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    /// Planning produced a cycle, a duplicate id, or a dangling dependency.
    /// Fails the session before any task executes.
    #[error("invalid dependency graph: {0}")]
    InvalidDependencyGraph(String),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("session `{0}` not found")]
    SessionNotFound(String),
}
