use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use conductor_agents::ExecutorSet;
use conductor_gateway::{Completion, EndpointRole, GatewayError};
use conductor_memory::NullMemoryStore;
use conductor_types::{ChatMessage, Session};

use crate::orchestrator::SessionOrchestrator;

/// One canned behavior for a single executor role.
pub enum Script {
    Reply(String),
    /// Successive calls pop successive replies; exhaustion errors.
    Seq(std::sync::Mutex<std::collections::VecDeque<String>>),
    Fail(fn() -> GatewayError),
    /// Blocks until the test releases a permit, then replies.
    Gated(Mutex<mpsc::Receiver<()>>, String),
    /// Parks until cancellation, mimicking an aborted in-flight call.
    AwaitCancel,
}

impl Script {
    pub fn reply(text: &str) -> Self {
        Script::Reply(text.to_string())
    }

    pub fn seq(replies: &[&str]) -> Self {
        Script::Seq(std::sync::Mutex::new(
            replies.iter().map(|r| r.to_string()).collect(),
        ))
    }

    async fn run(&self, cancel: &CancellationToken) -> Result<String, GatewayError> {
        match self {
            Script::Reply(text) => Ok(text.clone()),
            Script::Seq(replies) => replies
                .lock()
                .expect("script lock")
                .pop_front()
                .ok_or_else(|| GatewayError::Unavailable("script exhausted".to_string())),
            Script::Fail(make) => Err(make()),
            Script::Gated(rx, text) => {
                rx.lock().await.recv().await;
                Ok(text.clone())
            }
            Script::AwaitCancel => {
                cancel.cancelled().await;
                Err(GatewayError::Unavailable("call cancelled".to_string()))
            }
        }
    }
}

/// Routes each gateway call to a per-role script by inspecting the prompt.
pub struct RoutedCompletion {
    pub plan: Script,
    pub design: Script,
    pub code: Script,
}

#[async_trait]
impl Completion for RoutedCompletion {
    async fn complete(
        &self,
        _role: EndpointRole,
        messages: &[ChatMessage],
        _timeout_secs: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let prompt = messages
            .last()
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        if prompt.contains("planner agent") {
            self.plan.run(cancel).await
        } else if prompt.contains("designer agent") {
            self.design.run(cancel).await
        } else if prompt.contains("coder agent") {
            self.code.run(cancel).await
        } else {
            Err(GatewayError::Unavailable("unscripted prompt".to_string()))
        }
    }
}

pub fn executors(completion: RoutedCompletion) -> Arc<ExecutorSet> {
    Arc::new(ExecutorSet::new(
        Arc::new(completion),
        Arc::new(NullMemoryStore),
    ))
}

pub const SPEC_JSON: &str =
    r#"{"architecture":"two tier","components":["api"],"implementation_notes":"wire it up"}"#;

pub const CODE_JSON: &str = r#"{"files_written":[{"filename":"main.py","content":"print(1)"}],
    "stdout":"ok","errors":[]}"#;

/// Polls snapshots until `pred` holds or the deadline passes.
pub async fn wait_for(
    orchestrator: &SessionOrchestrator,
    pred: impl Fn(&Session) -> bool,
) -> Session {
    for _ in 0..400 {
        let session = orchestrator.snapshot().await;
        if pred(&session) {
            return session;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "condition not reached, last snapshot: {:?}",
        orchestrator.snapshot().await
    );
}
