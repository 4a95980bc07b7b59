//! Source discovery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SearchConfig;
use crate::retry::Transient;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
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
}

impl Transient for SearchError {
    fn is_transient(&self) -> bool {
        match self {
            SearchError::Network(_) | SearchError::Timeout => true,
            SearchError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SearchError::Timeout
        } else {
            SearchError::Network(err.to_string())
        }
    }
}

/// Finds candidate source URLs for a query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// At most `limit` URLs, best first. Fewer, or none, is a valid answer.
    async fn find_urls(&self, query: &str, limit: usize) -> Result<Vec<String>, SearchError>;
}

#[async_trait]
impl<T: SearchProvider + ?Sized> SearchProvider for Arc<T> {
    async fn find_urls(&self, query: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        (**self).find_urls(query, limit).await
    }
}

/// Tavily web search.
pub struct TavilySearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

#[derive(Serialize)]
struct TavilyRequest<'a> {
    query: &'a str,
    max_results: usize,
    search_depth: &'static str,
    include_answer: bool,
}

#[derive(Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Deserialize)]
struct TavilyResult {
    url: String,
}

impl TavilySearch {
    pub fn new(api_key: impl Into<String>, settings: &SearchConfig, timeout: Duration) -> Result<Self, SearchError> {
        let api_key = api_key.into().trim().to_string();
        if api_key.is_empty() {
            return Err(SearchError::NoApiKey);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::Network(e.to_string()))?;
        Ok(Self {
            client,
            api_key,
            endpoint: settings.endpoint.clone(),
        })
    }

    /// Read the key from `TAVILY_API_KEY`.
    pub fn from_env(settings: &SearchConfig, timeout: Duration) -> Result<Self, SearchError> {
        let api_key = std::env::var("TAVILY_API_KEY").map_err(|_| SearchError::NoApiKey)?;
        Self::new(api_key, settings, timeout)
    }
}

#[async_trait]
impl SearchProvider for TavilySearch {
    async fn find_urls(&self, query: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&TavilyRequest {
                query,
                max_results: limit,
                search_depth: "basic",
                include_answer: false,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(SearchError::Api { status, message });
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|e| SearchError::Parse(e.to_string()))?;
        Ok(body.results.into_iter().map(|r| r.url).take(limit).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_parsing() {
        let body: TavilyResponse = serde_json::from_str(
            r#"{"query":"q","results":[{"title":"A","url":"https://a.example","content":"..."},{"url":"https://b.example"}]}"#,
        )
        .unwrap();
        let urls: Vec<_> = body.results.into_iter().map(|r| r.url).collect();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);

        let empty: TavilyResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.results.is_empty());
    }

    #[test]
    fn test_blank_key_rejected() {
        let result = TavilySearch::new("   ", &SearchConfig::default(), Duration::from_secs(1));
        assert!(matches!(result, Err(SearchError::NoApiKey)));
    }
}
