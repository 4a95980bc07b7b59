//! Knowledge store - the boundary to the vector index.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use super::{ChunkMetadata, Embedder, EmbeddingError, RetrievedChunk};
use crate::retry::Transient;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error("{texts} texts but {metadatas} metadata entries")]
    LengthMismatch { texts: usize, metadatas: usize },

    #[error("embedding has {actual} dimensions, store holds {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("vector index error: {0}")]
    Backend(String),
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Embedding(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Similarity-searchable chunk storage.
#[async_trait]
pub trait KnowledgeStore: Send + Sync {
    /// Store texts with their metadata, pairwise. All of them become visible, or none.
    async fn add(&self, texts: &[String], metadatas: &[ChunkMetadata]) -> Result<(), StoreError>;

    /// Up to `k` chunks, most similar first. Equal scores keep insertion order.
    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, StoreError>;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl<T: KnowledgeStore + ?Sized> KnowledgeStore for Arc<T> {
    async fn add(&self, texts: &[String], metadatas: &[ChunkMetadata]) -> Result<(), StoreError> {
        (**self).add(texts, metadatas).await
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, StoreError> {
        (**self).similarity_search(query, k).await
    }

    async fn len(&self) -> usize {
        (**self).len().await
    }
}

/// A stored chunk with its vector.
#[derive(Debug, Clone)]
struct KnowledgeEntry {
    text: String,
    metadata: ChunkMetadata,
    embedding: Vec<f32>,
}

/// Brute-force cosine search over an in-process list.
///
/// Embeds on `add` with the embedder it was built with; queries must come from
/// the same embedder.
pub struct InMemoryKnowledgeStore {
    embedder: Arc<dyn Embedder>,
    entries: RwLock<Vec<KnowledgeEntry>>,
}

impl InMemoryKnowledgeStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Copy of every stored chunk in insertion order.
    pub async fn chunks(&self) -> Vec<(String, ChunkMetadata)> {
        self.entries
            .read()
            .await
            .iter()
            .map(|e| (e.text.clone(), e.metadata.clone()))
            .collect()
    }
}

#[async_trait]
impl KnowledgeStore for InMemoryKnowledgeStore {
    async fn add(&self, texts: &[String], metadatas: &[ChunkMetadata]) -> Result<(), StoreError> {
        if texts.len() != metadatas.len() {
            return Err(StoreError::LengthMismatch {
                texts: texts.len(),
                metadatas: metadatas.len(),
            });
        }
        if texts.is_empty() {
            return Ok(());
        }

        // Embed outside the lock; a failure leaves nothing behind.
        let embeddings = self.embedder.embed_batch(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: embeddings.len(),
            }
            .into());
        }

        let mut entries = self.entries.write().await;
        if let Some(expected) = entries.first().map(|e| e.embedding.len()) {
            if let Some(bad) = embeddings.iter().find(|v| v.len() != expected) {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: bad.len(),
                });
            }
        }
        entries.extend(
            texts
                .iter()
                .zip(metadatas)
                .zip(embeddings)
                .map(|((text, metadata), embedding)| KnowledgeEntry {
                    text: text.clone(),
                    metadata: metadata.clone(),
                    embedding,
                }),
        );
        debug!(added = texts.len(), total = entries.len(), "stored chunks");
        Ok(())
    }

    async fn similarity_search(&self, query: &[f32], k: usize) -> Result<Vec<RetrievedChunk>, StoreError> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let entries = self.entries.read().await;
        if let Some(expected) = entries.first().map(|e| e.embedding.len()) {
            if expected != query.len() {
                return Err(StoreError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut scored: Vec<(usize, f32)> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, cosine_similarity(query, &e.embedding)))
            .collect();
        // Stable sort: equal similarities stay in insertion order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, similarity)| RetrievedChunk {
                text: entries[i].text.clone(),
                metadata: entries[i].metadata.clone(),
                similarity,
            })
            .collect())
    }

    async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

/// Cosine similarity; 0 when either vector has zero length or the dimensions differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= f32::EPSILON || norm_b <= f32::EPSILON {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
