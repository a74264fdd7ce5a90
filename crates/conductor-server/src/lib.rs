//! HTTP surface of the Conductor engine.
//!
//! Everything is poll-based: submitting an objective returns a session id
//! immediately and clients poll `/tasks/{id}/status` for the evolving
//! snapshot. No websockets, no server push.

mod config;
mod http;
mod screenshots;

pub use config::ConductorConfig;
pub use http::app_router;
pub use screenshots::{ScreenshotEntry, ScreenshotQueues, MAIN_QUEUE_CAP};

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use conductor_agents::ExecutorSet;
use conductor_automation::{Automation, HeadlessMock};
use conductor_gateway::{Completion, ModelGateway};
use conductor_memory::{HttpMemoryStore, MemoryStore, NullMemoryStore};
use conductor_orchestrator::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<SessionRegistry>,
    pub gateway: Arc<dyn Completion>,
    pub memory: Arc<dyn MemoryStore>,
    pub automation: Arc<dyn Automation>,
    pub screenshots: Arc<RwLock<ScreenshotQueues>>,
    pub config: Arc<ConductorConfig>,
}

impl AppState {
    pub fn new(config: ConductorConfig) -> Self {
        let gateway: Arc<dyn Completion> = Arc::new(ModelGateway::new(config.gateway.clone()));
        let memory: Arc<dyn MemoryStore> = match &config.memory_url {
            Some(url) => Arc::new(HttpMemoryStore::new(url.clone())),
            None => Arc::new(NullMemoryStore),
        };
        if !config.headless {
            // No live browser driver ships with the engine yet; automation
            // degrades to the mock rather than refusing to start.
            tracing::warn!(target: "conductor.server", "no live browser driver available, using headless mock");
        }
        Self::with_collaborators(config, gateway, memory, Arc::new(HeadlessMock))
    }

    /// Wires the state from injected collaborators. Production uses
    /// [`AppState::new`]; tests inject fakes here.
    pub fn with_collaborators(
        config: ConductorConfig,
        gateway: Arc<dyn Completion>,
        memory: Arc<dyn MemoryStore>,
        automation: Arc<dyn Automation>,
    ) -> Self {
        let executors = Arc::new(ExecutorSet::new(
            Arc::clone(&gateway),
            Arc::clone(&memory),
        ));
        let registry = Arc::new(SessionRegistry::new(
            executors,
            Some(config.gateway.timeout_secs),
        ));
        Self {
            registry,
            gateway,
            memory,
            automation,
            screenshots: Arc::new(RwLock::new(ScreenshotQueues::default())),
            config: Arc::new(config),
        }
    }
}

pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let reaper = state.config.session_retention_minutes.map(|minutes| {
        let registry = Arc::clone(&state.registry);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                let evicted = registry
                    .evict_completed(chrono::Duration::minutes(minutes as i64))
                    .await;
                if evicted > 0 {
                    tracing::info!(target: "conductor.server", evicted, "session reaper pass");
                }
            }
        })
    });

    let app = app_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(target: "conductor.server", %addr, "engine listening");
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_err() {
                std::future::pending::<()>().await;
            }
        })
        .await;
    if let Some(handle) = reaper {
        handle.abort();
    }
    result?;
    Ok(())
}
