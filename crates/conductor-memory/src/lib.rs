//! Client for the external vector-memory collaborator.
//!
//! The store's indexing is not Conductor's concern; this crate only speaks
//! its retrieve/store interface. Retrieval is best-effort enrichment, so the
//! context path fails open — callers receive an empty result rather than an
//! error when the store is unreachable.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// Nearest documents for `query`, best match first.
    async fn retrieve(&self, query: &str, n_results: usize) -> anyhow::Result<Vec<String>>;

    /// Persist a document for later retrieval.
    async fn store(&self, id: &str, text: &str, metadata: Value) -> anyhow::Result<()>;
}

/// HTTP client for a vector-store service exposing `/retrieve` and `/store`.
pub struct HttpMemoryStore {
    base_url: String,
    client: Client,
}

impl HttpMemoryStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl MemoryStore for HttpMemoryStore {
    async fn retrieve(&self, query: &str, n_results: usize) -> anyhow::Result<Vec<String>> {
        let response = self
            .client
            .post(self.endpoint("retrieve"))
            .json(&json!({"query": query, "n_results": n_results}))
            .send()
            .await?
            .error_for_status()?;
        let value: Value = response.json().await?;
        let documents = value
            .get("documents")
            .and_then(|v| v.as_array())
            .map(|docs| {
                docs.iter()
                    .filter_map(|d| d.as_str().map(|s| s.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(documents)
    }

    async fn store(&self, id: &str, text: &str, metadata: Value) -> anyhow::Result<()> {
        self.client
            .post(self.endpoint("store"))
            .json(&json!({
                "id": id,
                "text": text,
                "metadata": metadata,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// No-op store for deployments without a vector-memory service. Retrieval
/// returns nothing; stores are dropped.
#[derive(Default)]
pub struct NullMemoryStore;

#[async_trait]
impl MemoryStore for NullMemoryStore {
    async fn retrieve(&self, _query: &str, _n_results: usize) -> anyhow::Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn store(&self, _id: &str, _text: &str, _metadata: Value) -> anyhow::Result<()> {
        Ok(())
    }
}

/// In-process store used by tests; ranks by naive substring overlap.
#[derive(Default)]
pub struct InMemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn retrieve(&self, query: &str, n_results: usize) -> anyhow::Result<Vec<String>> {
        let entries = self.entries.read().await;
        let query_lower = query.to_lowercase();
        let mut matches: Vec<&String> = entries
            .values()
            .filter(|text| {
                query_lower
                    .split_whitespace()
                    .any(|word| text.to_lowercase().contains(word))
            })
            .collect();
        matches.sort();
        Ok(matches
            .into_iter()
            .take(n_results)
            .cloned()
            .collect())
    }

    async fn store(&self, id: &str, text: &str, _metadata: Value) -> anyhow::Result<()> {
        self.entries
            .write()
            .await
            .insert(id.to_string(), text.to_string());
        Ok(())
    }
}
