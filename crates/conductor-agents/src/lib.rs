//! Agent executors.
//!
//! Each executor wraps the model gateway with a fixed prompt template and
//! the structured-extraction pipeline. The shared failure policy: genuine
//! upstream failures surface to the orchestrator as errors, timeouts degrade
//! to the executor's synthetic fallback, and malformed model output never
//! surfaces as an error at all.

mod coder;
mod context;
mod designer;
mod planner;

pub use coder::{scan_file_markers, Coder};
pub use context::ContextRetriever;
pub use designer::{fallback_spec, Designer};
pub use planner::Planner;

use std::sync::Arc;

use conductor_extract::Extraction;
use conductor_gateway::{Completion, GatewayError};
use conductor_memory::MemoryStore;

/// The four executors bundled for the orchestrator.
pub struct ExecutorSet {
    pub planner: Planner,
    pub designer: Designer,
    pub coder: Coder,
    pub context: ContextRetriever,
}

impl ExecutorSet {
    pub fn new(gateway: Arc<dyn Completion>, memory: Arc<dyn MemoryStore>) -> Self {
        Self {
            planner: Planner::new(gateway.clone()),
            designer: Designer::new(gateway.clone()),
            coder: Coder::new(gateway),
            context: ContextRetriever::new(memory),
        }
    }
}

/// Timeouts degrade to the executor's fallback synthesis instead of failing
/// the task; other gateway errors propagate.
pub(crate) fn degrade_timeout<T>(
    err: GatewayError,
    synth: impl FnOnce() -> T,
) -> Result<Extraction<T>, GatewayError> {
    match err {
        GatewayError::Timeout(secs) => {
            let reason = format!("model call timed out after {secs}s");
            tracing::warn!(target: "conductor.agents", %reason, "degrading timeout to fallback synthesis");
            Ok(Extraction::Fallback {
                value: synth(),
                reason,
            })
        }
        other => Err(other),
    }
}
