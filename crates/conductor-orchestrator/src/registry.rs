use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio::sync::RwLock;

use conductor_agents::ExecutorSet;
use conductor_types::{Priority, Session};

use crate::orchestrator::SessionOrchestrator;
use crate::OrchestrationError;

/// Process-wide session index. Holds every orchestrator for the life of the
/// process so finished sessions stay pollable; `evict_completed` is the
/// opt-in pressure valve.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<SessionOrchestrator>>>,
    executors: Arc<ExecutorSet>,
    timeout_secs: Option<u64>,
}

impl SessionRegistry {
    pub fn new(executors: Arc<ExecutorSet>, timeout_secs: Option<u64>) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            executors,
            timeout_secs,
        }
    }

    /// Registers a new session and starts driving it on a background task.
    /// Returns once the session is registered, before any task runs.
    pub async fn submit(&self, objective: impl Into<String>, priority: Priority) -> String {
        let orchestrator = Arc::new(SessionOrchestrator::new(
            objective,
            priority,
            Arc::clone(&self.executors),
            self.timeout_secs,
        ));
        let id = orchestrator.id().await;
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::clone(&orchestrator));
        tracing::info!(target: "conductor.registry", session = %id, "session submitted");
        tokio::spawn(async move {
            orchestrator.run().await;
        });
        id
    }

    pub async fn get(&self, id: &str) -> Option<Arc<SessionOrchestrator>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn snapshot(&self, id: &str) -> Result<Session, OrchestrationError> {
        let orchestrator = self
            .get(id)
            .await
            .ok_or_else(|| OrchestrationError::SessionNotFound(id.to_string()))?;
        Ok(orchestrator.snapshot().await)
    }

    /// Every known session, oldest first.
    pub async fn list(&self) -> Vec<Session> {
        let orchestrators: Vec<Arc<SessionOrchestrator>> =
            self.sessions.read().await.values().cloned().collect();
        let mut sessions = Vec::with_capacity(orchestrators.len());
        for orchestrator in orchestrators {
            sessions.push(orchestrator.snapshot().await);
        }
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        sessions
    }

    pub async fn cancel(&self, id: &str) -> Result<(), OrchestrationError> {
        let orchestrator = self
            .get(id)
            .await
            .ok_or_else(|| OrchestrationError::SessionNotFound(id.to_string()))?;
        orchestrator.cancel().await;
        tracing::info!(target: "conductor.registry", session = %id, "session cancelled");
        Ok(())
    }

    /// Sessions not yet in a terminal state.
    pub async fn active_count(&self) -> usize {
        let mut active = 0;
        for session in self.list().await {
            if !session.status.is_terminal() {
                active += 1;
            }
        }
        active
    }

    /// Drops terminal sessions whose last update is older than `retention`.
    /// Returns how many were evicted.
    pub async fn evict_completed(&self, retention: Duration) -> usize {
        let cutoff = Utc::now() - retention;
        let mut stale = Vec::new();
        for session in self.list().await {
            if session.status.is_terminal() && session.updated_at < cutoff {
                stale.push(session.id);
            }
        }
        let mut sessions = self.sessions.write().await;
        let mut evicted = 0;
        for id in stale {
            if sessions.remove(&id).is_some() {
                evicted += 1;
            }
        }
        if evicted > 0 {
            tracing::debug!(target: "conductor.registry", evicted, "evicted terminal sessions");
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{executors, RoutedCompletion, Script, CODE_JSON, SPEC_JSON};
    use crate::OrchestrationError;
    use conductor_types::SessionStatus;

    const PLAN: &str =
        r#"[{"id":"t1","title":"Build","description":"build","agent":"coder","dependencies":[]}]"#;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(
            executors(RoutedCompletion {
                plan: Script::reply(PLAN),
                design: Script::reply(SPEC_JSON),
                code: Script::reply(CODE_JSON),
            }),
            None,
        )
    }

    async fn poll_terminal(registry: &SessionRegistry, id: &str) -> Session {
        for _ in 0..400 {
            let session = registry.snapshot(id).await.expect("known session");
            if session.status.is_terminal() {
                return session;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("session never reached a terminal state");
    }

    #[tokio::test]
    async fn submitted_session_is_pollable_to_completion() {
        let registry = registry();
        let id = registry.submit("build a service", Priority::Normal).await;

        let session = poll_terminal(&registry, &id).await;
        assert_eq!(session.status, SessionStatus::Completed);
        assert_eq!(session.progress, 100.0);

        let listed = registry.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, id);
        assert_eq!(registry.active_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_session_id_is_an_error() {
        let registry = registry();
        assert!(matches!(
            registry.snapshot("no-such-id").await,
            Err(OrchestrationError::SessionNotFound(_))
        ));
        assert!(matches!(
            registry.cancel("no-such-id").await,
            Err(OrchestrationError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn listing_orders_sessions_by_submission_time() {
        let registry = registry();
        let first = registry.submit("first objective", Priority::Normal).await;
        let second = registry.submit("second objective", Priority::High).await;
        poll_terminal(&registry, &first).await;
        poll_terminal(&registry, &second).await;

        let listed = registry.list().await;
        assert_eq!(listed.len(), 2);
        assert!(listed[0].created_at <= listed[1].created_at);
    }

    #[tokio::test]
    async fn eviction_drops_only_stale_terminal_sessions() {
        let registry = registry();
        let id = registry.submit("short lived", Priority::Low).await;
        poll_terminal(&registry, &id).await;

        // Zero retention evicts anything terminal.
        assert_eq!(registry.evict_completed(Duration::zero()).await, 1);
        assert!(registry.list().await.is_empty());

        let survivor = registry.submit("still running or fresh", Priority::Normal).await;
        poll_terminal(&registry, &survivor).await;
        assert_eq!(registry.evict_completed(Duration::hours(1)).await, 0);
        assert_eq!(registry.list().await.len(), 1);
    }
}
