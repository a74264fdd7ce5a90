use std::sync::Arc;

use conductor_memory::MemoryStore;

const DEFAULT_TOP_K: usize = 5;

/// Best-effort context enrichment from the vector-memory collaborator.
/// Never fails: an unreachable store yields an empty string.
pub struct ContextRetriever {
    memory: Arc<dyn MemoryStore>,
}

impl ContextRetriever {
    pub fn new(memory: Arc<dyn MemoryStore>) -> Self {
        Self { memory }
    }

    pub async fn retrieve(&self, query: &str) -> String {
        match self.memory.retrieve(query, DEFAULT_TOP_K).await {
            Ok(documents) => documents.join("\n"),
            Err(err) => {
                tracing::warn!(target: "conductor.agents", error = %err, "context retrieval failed open");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;

    struct FailingStore;

    #[async_trait]
    impl MemoryStore for FailingStore {
        async fn retrieve(&self, _query: &str, _n: usize) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("store offline")
        }

        async fn store(&self, _id: &str, _text: &str, _metadata: Value) -> anyhow::Result<()> {
            anyhow::bail!("store offline")
        }
    }

    #[tokio::test]
    async fn retrieval_joins_documents_with_newlines() {
        let store = conductor_memory::InMemoryStore::default();
        store
            .store("a", "alpha fact", serde_json::json!({}))
            .await
            .expect("store");
        store
            .store("b", "beta fact", serde_json::json!({}))
            .await
            .expect("store");
        let retriever = ContextRetriever::new(Arc::new(store));
        let context = retriever.retrieve("fact").await;
        assert_eq!(context, "alpha fact\nbeta fact");
    }

    #[tokio::test]
    async fn failures_yield_empty_string_not_error() {
        let retriever = ContextRetriever::new(Arc::new(FailingStore));
        assert_eq!(retriever.retrieve("anything").await, "");
    }
}
