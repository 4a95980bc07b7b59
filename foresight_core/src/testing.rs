//! Deterministic collaborators for tests and offline runs.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::ingestion::{FetchError, PageFetcher, SearchError, SearchProvider};
use crate::llm::{LanguageModel, ModelError};

/// Replies with queued responses in order and records every prompt.
///
/// When the queue runs dry it returns the fallback, if any, or `EmptyCompletion`.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<String, ModelError>>>,
    fallback: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.push(Ok(response.into()));
        self
    }

    pub fn with_error(self, error: ModelError) -> Self {
        self.push(Err(error));
        self
    }

    /// Reply used once the queue is empty.
    pub fn with_fallback(mut self, response: impl Into<String>) -> Self {
        self.fallback = Some(response.into());
        self
    }

    fn push(&self, response: Result<String, ModelError>) {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(response);
        }
    }

    /// Prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let next = self.responses.lock().ok().and_then(|mut q| q.pop_front());
        match next {
            Some(response) => response,
            None => self.fallback.clone().ok_or(ModelError::EmptyCompletion),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Times out a fixed number of times, then answers with a fixed response.
#[derive(Debug)]
pub struct FlakyModel {
    failures_left: AtomicU32,
    calls: AtomicU32,
    response: String,
}

impl FlakyModel {
    pub fn new(failures: u32, response: impl Into<String>) -> Self {
        Self {
            failures_left: AtomicU32::new(failures),
            calls: AtomicU32::new(0),
            response: response.into(),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageModel for FlakyModel {
    async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failed = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            Err(ModelError::Timeout)
        } else {
            Ok(self.response.clone())
        }
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

/// Fixed query-to-URLs table. Unknown queries find nothing.
#[derive(Debug, Default)]
pub struct StaticSearch {
    results: HashMap<String, Vec<String>>,
    failing: HashMap<String, SearchError>,
}

impl StaticSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_results<I, S>(mut self, query: &str, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.results
            .insert(query.to_string(), urls.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_failure(mut self, query: &str, error: SearchError) -> Self {
        self.failing.insert(query.to_string(), error);
        self
    }
}

#[async_trait]
impl SearchProvider for StaticSearch {
    async fn find_urls(&self, query: &str, limit: usize) -> Result<Vec<String>, SearchError> {
        if let Some(error) = self.failing.get(query) {
            return Err(error.clone());
        }
        Ok(self
            .results
            .get(query)
            .map(|urls| urls.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

/// Fixed URL-to-HTML table. Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, String>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .get(url)
            .cloned()
            .ok_or(FetchError::Status { status: 404 })
    }
}
