//! Embedding providers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::config::EmbeddingsConfig;
use crate::retry::Transient;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EmbeddingError {
    #[error("API key not configured")]
    NoApiKey,

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

impl Transient for EmbeddingError {
    fn is_transient(&self) -> bool {
        match self {
            EmbeddingError::Network(_) | EmbeddingError::Timeout => true,
            EmbeddingError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EmbeddingError::Timeout
        } else {
            EmbeddingError::Network(err.to_string())
        }
    }
}

/// Turns text into a vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts, in order. The default embeds one at a time.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }

    fn name(&self) -> &str;
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// OpenAI-compatible `/v1/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    api_key: String,
    settings: EmbeddingsConfig,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: impl Into<String>,
        settings: EmbeddingsConfig,
        timeout: Duration,
    ) -> Result<Self, EmbeddingError> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(EmbeddingError::NoApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbeddingError::Network(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            settings,
        })
    }

    /// Read the key from `OPENAI_API_KEY`.
    pub fn from_env(settings: EmbeddingsConfig, timeout: Duration) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| EmbeddingError::NoApiKey)?;
        Self::new(api_key, settings, timeout)
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbedRequest {
                model: &self.settings.model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Api { status, message });
        }

        let mut body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Parse(e.to_string()))?;
        if body.data.len() != texts.len() {
            return Err(EmbeddingError::CountMismatch {
                expected: texts.len(),
                actual: body.data.len(),
            });
        }
        body.data.sort_by_key(|d| d.index);
        debug!(count = texts.len(), model = %self.settings.model, "embedded batch");

        Ok(body.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.request_embeddings(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request_embeddings(texts).await
    }

    fn name(&self) -> &str {
        &self.settings.model
    }
}

/// Offline bag-of-words embedder.
///
/// Lowercased alphanumeric terms are hashed (FNV-1a) into a fixed number of
/// buckets, counted, and the vector is L2-normalized. Texts sharing words score
/// close under cosine similarity, which is enough for tests and air-gapped runs.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn bucket(&self, term: &str) -> usize {
        let mut h: u64 = 0xcbf29ce484222325;
        for b in term.as_bytes() {
            h ^= *b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        (h % self.dimensions as u64) as usize
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        for term in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            vector[self.bucket(&term.to_lowercase())] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Ok(self.vector(text))
    }

    fn name(&self) -> &str {
        "hashing"
    }
}
