use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use conductor_agents::{fallback_spec, ExecutorSet};
use conductor_extract::Extraction;
use conductor_gateway::GatewayError;
use conductor_types::{
    AgentRole, CodeResult, Priority, Session, SessionStatus, Spec, Task, TaskPlan, TaskStatus,
};

use crate::graph::{ready_task_index, TaskGraph};
use crate::OrchestrationError;

/// Transient per-task payload, retained for the task's lifetime so status
/// queries can report what a completed task produced.
#[derive(Debug, Clone)]
pub enum TaskArtifact {
    Spec(Spec),
    Code(CodeResult),
    Context(String),
    Plan(Vec<TaskPlan>),
}

impl TaskArtifact {
    fn summary(&self) -> String {
        match self {
            TaskArtifact::Spec(spec) => format!(
                "spec: {} ({} components)",
                spec.architecture,
                spec.components.len()
            ),
            TaskArtifact::Code(code) => {
                let names: Vec<&str> = code
                    .files_written
                    .iter()
                    .map(|f| f.filename.as_str())
                    .collect();
                format!("files: {}", names.join(", "))
            }
            TaskArtifact::Context(text) => format!("context ({} chars)", text.len()),
            TaskArtifact::Plan(plans) => format!("sub-plan with {} tasks", plans.len()),
        }
    }
}

/// Owns one session's lifecycle. All mutation of the session and its tasks
/// happens here, behind a single writer; snapshot reads clone the whole
/// session so pollers never observe a partially-updated task list.
pub struct SessionOrchestrator {
    session: RwLock<Session>,
    artifacts: RwLock<HashMap<String, TaskArtifact>>,
    executors: Arc<ExecutorSet>,
    cancel: CancellationToken,
    has_debugged: AtomicBool,
    timeout_secs: Option<u64>,
}

impl SessionOrchestrator {
    pub fn new(
        objective: impl Into<String>,
        priority: Priority,
        executors: Arc<ExecutorSet>,
        timeout_secs: Option<u64>,
    ) -> Self {
        Self {
            session: RwLock::new(Session::new(objective, priority)),
            artifacts: RwLock::new(HashMap::new()),
            executors,
            cancel: CancellationToken::new(),
            has_debugged: AtomicBool::new(false),
            timeout_secs,
        }
    }

    pub async fn id(&self) -> String {
        self.session.read().await.id.clone()
    }

    /// Atomic copy of the session with progress freshly derived.
    pub async fn snapshot(&self) -> Session {
        let mut session = self.session.read().await.clone();
        session.progress = session.computed_progress();
        session
    }

    pub async fn artifact(&self, task_id: &str) -> Option<TaskArtifact> {
        self.artifacts.read().await.get(task_id).cloned()
    }

    /// Flips the abort flag; the run loop observes it at the next suspension
    /// point, and in-flight gateway calls are aborted cooperatively. Also
    /// resets the auxiliary debug sub-pipeline to its initial state.
    pub async fn cancel(&self) {
        self.cancel.cancel();
        self.has_debugged.store(false, Ordering::SeqCst);
        let mut session = self.session.write().await;
        if session.status.can_transition_to(SessionStatus::Cancelled) {
            session.status = SessionStatus::Cancelled;
            session.current_task = None;
            session.refresh_progress();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn mark_debugged(&self) {
        self.has_debugged.store(true, Ordering::SeqCst);
    }

    pub fn has_debugged(&self) -> bool {
        self.has_debugged.load(Ordering::SeqCst)
    }

    /// Drives the session to a terminal state. Infallible from the caller's
    /// perspective: failures land in the session status.
    pub async fn run(&self) {
        if let Err(err) = self.plan_and_dispatch().await {
            self.fail_session(err.to_string()).await;
        }
    }

    async fn plan_and_dispatch(&self) -> Result<(), OrchestrationError> {
        let objective = { self.session.read().await.objective.clone() };

        let extraction = self
            .executors
            .planner
            .plan(&objective, self.timeout_secs, &self.cancel)
            .await?;
        if let Some(reason) = extraction.fallback_reason() {
            tracing::warn!(target: "conductor.orchestrator", %reason, "planner degraded to fallback plan");
        }

        if self.cancel.is_cancelled() {
            self.finish_cancelled().await;
            return Ok(());
        }

        let graph = TaskGraph::build(extraction.into_value())?;
        {
            let mut session = self.session.write().await;
            if session.status.is_terminal() {
                return Ok(());
            }
            session.tasks = graph.into_tasks();
            session.status = SessionStatus::Running;
            session.refresh_progress();
        }

        loop {
            if self.cancel.is_cancelled() {
                self.finish_cancelled().await;
                return Ok(());
            }

            let next = {
                let session = self.session.read().await;
                if session.status.is_terminal() {
                    return Ok(());
                }
                ready_task_index(&session.tasks).map(|idx| session.tasks[idx].clone())
            };

            let Some(task) = next else {
                let mut session = self.session.write().await;
                let all_done = session
                    .tasks
                    .iter()
                    .all(|t| t.status == TaskStatus::Completed);
                if all_done && session.status.can_transition_to(SessionStatus::Completed) {
                    session.status = SessionStatus::Completed;
                    session.current_task = None;
                    session.refresh_progress();
                }
                return Ok(());
            };

            self.begin_task(&task.id).await;
            let context = self.dependency_context(&task).await;

            match self.execute(&task, &context).await {
                Ok(artifact) => {
                    tracing::info!(
                        target: "conductor.orchestrator",
                        task = %task.id,
                        agent = task.agent.as_str(),
                        outcome = %artifact.summary(),
                        "task completed"
                    );
                    self.complete_task(&task.id, artifact).await;
                }
                Err(err) => {
                    self.fail_task(&task.id, err.to_string()).await;
                    return Ok(());
                }
            }
        }
    }

    /// Routes the task to the executor named by its agent role. Timeouts
    /// were already degraded to fallbacks inside the executors; errors here
    /// are genuine upstream failures.
    async fn execute(&self, task: &Task, context: &str) -> Result<TaskArtifact, GatewayError> {
        let timeout = self.timeout_secs;
        match task.agent {
            AgentRole::Designer => {
                let extraction = self
                    .executors
                    .designer
                    .design(task, context, timeout, &self.cancel)
                    .await?;
                self.log_fallback(&task.id, &extraction);
                Ok(TaskArtifact::Spec(extraction.into_value()))
            }
            AgentRole::Coder => {
                let spec = self.spec_for(task).await;
                let extraction = self
                    .executors
                    .coder
                    .code(&spec, context, timeout, &self.cancel)
                    .await?;
                self.log_fallback(&task.id, &extraction);
                let mut code = extraction.into_value();
                if !code.errors.is_empty() && !self.has_debugged() {
                    code = self.debug_pass(task, &spec, code).await;
                }
                Ok(TaskArtifact::Code(code))
            }
            AgentRole::Context => {
                let text = self.executors.context.retrieve(&task.description).await;
                Ok(TaskArtifact::Context(text))
            }
            AgentRole::Planner => {
                let extraction = self
                    .executors
                    .planner
                    .plan(&task.description, timeout, &self.cancel)
                    .await?;
                self.log_fallback(&task.id, &extraction);
                Ok(TaskArtifact::Plan(extraction.into_value()))
            }
        }
    }

    /// One extra coder pass over a result that reported errors. Runs at most
    /// once per session; any failure keeps the original result.
    async fn debug_pass(&self, task: &Task, spec: &Spec, original: CodeResult) -> CodeResult {
        self.mark_debugged();
        let error_context = format!(
            "The previous attempt reported errors:\n{}",
            original.errors.join("\n")
        );
        match self
            .executors
            .coder
            .code(spec, &error_context, self.timeout_secs, &self.cancel)
            .await
        {
            Ok(retry) => {
                let retry = retry.into_value();
                if retry.errors.is_empty() && !retry.files_written.is_empty() {
                    tracing::info!(
                        target: "conductor.orchestrator",
                        task = %task.id,
                        "debug pass replaced errored code result"
                    );
                    retry
                } else {
                    original
                }
            }
            Err(err) => {
                tracing::warn!(
                    target: "conductor.orchestrator",
                    task = %task.id,
                    error = %err,
                    "debug pass failed, keeping original result"
                );
                original
            }
        }
    }

    /// A coder task implements the most recent spec among its completed
    /// dependencies; without one it synthesizes a minimal spec from the task
    /// itself.
    async fn spec_for(&self, task: &Task) -> Spec {
        let artifacts = self.artifacts.read().await;
        for dep in task.dependencies.iter().rev() {
            if let Some(TaskArtifact::Spec(spec)) = artifacts.get(dep) {
                return spec.clone();
            }
        }
        fallback_spec(task)
    }

    /// Completed dependency outputs, summarized for prompt embedding.
    async fn dependency_context(&self, task: &Task) -> String {
        let artifacts = self.artifacts.read().await;
        let mut parts = Vec::new();
        for dep in &task.dependencies {
            match artifacts.get(dep) {
                Some(TaskArtifact::Context(text)) if !text.is_empty() => {
                    parts.push(format!("Task {dep} Output: {text}"));
                }
                Some(artifact) => parts.push(format!("Task {dep} Output: {}", artifact.summary())),
                None => {}
            }
        }
        parts.join("\n")
    }

    fn log_fallback<T>(&self, task_id: &str, extraction: &Extraction<T>) {
        if let Some(reason) = extraction.fallback_reason() {
            tracing::warn!(
                target: "conductor.orchestrator",
                task = task_id,
                %reason,
                "executor degraded to fallback synthesis"
            );
        }
    }

    async fn begin_task(&self, task_id: &str) {
        let mut session = self.session.write().await;
        if session.status.is_terminal() {
            return;
        }
        session.current_task = Some(task_id.to_string());
        if let Some(task) = session.tasks.iter_mut().find(|t| t.id == task_id) {
            task.status = TaskStatus::InProgress;
            task.progress = 50;
            task.updated_at = Utc::now();
        }
        session.refresh_progress();
    }

    async fn complete_task(&self, task_id: &str, artifact: TaskArtifact) {
        let mut session = self.session.write().await;
        // A cancel that won the race to a terminal state keeps it; the task
        // result is dropped rather than resurrecting the session.
        if session.status.is_terminal() {
            return;
        }
        if let Some(task) = session.tasks.iter_mut().find(|t| t.id == task_id) {
            task.status = TaskStatus::Completed;
            task.progress = 100;
            task.updated_at = Utc::now();
        }
        if session.current_task.as_deref() == Some(task_id) {
            session.current_task = None;
        }
        session.refresh_progress();
        drop(session);
        self.artifacts
            .write()
            .await
            .insert(task_id.to_string(), artifact);
    }

    async fn fail_task(&self, task_id: &str, error: String) {
        let mut session = self.session.write().await;
        // Cancellation aborts the in-flight call; that abort is not a task
        // failure once the session is already terminal.
        if session.status.is_terminal() {
            return;
        }
        if let Some(task) = session.tasks.iter_mut().find(|t| t.id == task_id) {
            task.status = TaskStatus::Failed;
            task.progress = 0;
            task.error_message = Some(error.clone());
            task.updated_at = Utc::now();
        }
        if session.status.can_transition_to(SessionStatus::Failed) {
            session.status = SessionStatus::Failed;
            session.error_message = Some(error);
            session.current_task = None;
        }
        session.refresh_progress();
    }

    async fn fail_session(&self, error: String) {
        let mut session = self.session.write().await;
        if session.status.can_transition_to(SessionStatus::Failed) {
            session.status = SessionStatus::Failed;
            session.error_message = Some(error);
            session.current_task = None;
            session.refresh_progress();
        }
    }

    async fn finish_cancelled(&self) {
        self.has_debugged.store(false, Ordering::SeqCst);
        let mut session = self.session.write().await;
        if session.status.can_transition_to(SessionStatus::Cancelled) {
            session.status = SessionStatus::Cancelled;
            session.current_task = None;
            session.refresh_progress();
        }
    }
}
