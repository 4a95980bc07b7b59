//! Retrieval - nearest stored chunks for a query.

use std::sync::Arc;

use tracing::debug;

use crate::config::ForesightConfig;
use crate::error::{ForesightError, ForesightResult};
use crate::knowledge_base::{Embedder, KnowledgeStore, RetrievedChunk};
use crate::retry::RetryPolicy;

/// Embeds a query and asks the store for its nearest chunks.
///
/// Results are not filtered by relevance: an empty store, or an unrelated
/// one, simply returns what it has.
pub struct RetrievalService {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn KnowledgeStore>,
    top_k: usize,
    retry: RetryPolicy,
}

impl RetrievalService {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn KnowledgeStore>) -> Self {
        Self::from_config(&ForesightConfig::default(), embedder, store)
    }

    pub fn from_config(
        config: &ForesightConfig,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self {
            embedder,
            store,
            top_k: config.retrieval.top_k,
            retry: config.retry.policy(),
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Query with the configured `top_k`.
    pub async fn query(&self, text: &str) -> ForesightResult<Vec<RetrievedChunk>> {
        self.query_top_k(text, self.top_k).await
    }

    /// Up to `top_k` chunks, most similar first.
    pub async fn query_top_k(&self, text: &str, top_k: usize) -> ForesightResult<Vec<RetrievedChunk>> {
        if top_k == 0 || text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let vector = self
            .retry
            .run("embed", || self.embedder.embed(text))
            .await
            .map_err(|e| ForesightError::from_exhausted("embed", e))?;

        let chunks = self.store.similarity_search(&vector, top_k).await?;
        debug!(top_k, found = chunks.len(), "retrieved context");
        Ok(chunks)
    }
}
