//! Language model providers.
//!
//! The orchestrator only ever sees the [`LanguageModel`] trait: a prompt goes in,
//! completion text comes out. Hosted providers live in submodules.

pub mod anthropic;

pub use anthropic::*;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::retry::Transient;

/// Errors from a language model call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("API key not configured")]
    NoApiKey,

    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out")]
    Timeout,

    #[error("rate limited")]
    RateLimited,

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("model returned no text")]
    EmptyCompletion,
}

impl Transient for ModelError {
    fn is_transient(&self) -> bool {
        match self {
            ModelError::Network(_) | ModelError::Timeout | ModelError::RateLimited => true,
            ModelError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ModelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelError::Timeout
        } else if err.is_decode() {
            ModelError::Parse(err.to_string())
        } else {
            ModelError::Network(err.to_string())
        }
    }
}

/// Text completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Send a prompt and return the completion text.
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;

    /// Send a prompt with the start of the answer already written.
    ///
    /// The returned text is the whole answer, prefill included. Providers without
    /// prefill support answer the bare prompt.
    async fn complete_prefilled(&self, prompt: &str, prefill: &str) -> Result<String, ModelError> {
        let _ = prefill;
        self.complete(prompt).await
    }

    /// Provider and model, for logs.
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: LanguageModel + ?Sized> LanguageModel for Arc<T> {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        (**self).complete(prompt).await
    }

    async fn complete_prefilled(&self, prompt: &str, prefill: &str) -> Result<String, ModelError> {
        (**self).complete_prefilled(prompt, prefill).await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
