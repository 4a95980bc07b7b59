//! Pipeline configuration.
//!
//! Every field has a default, so an empty TOML document is a valid configuration.
//! API keys are never read from here; adapters take them from the environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use event_graph::ScoreAggregation;
use serde::{Deserialize, Serialize};

use crate::error::{ForesightError, ForesightResult};
use crate::retry::RetryPolicy;

/// Top-level configuration for ingestion, retrieval and generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForesightConfig {
    pub chunking: ChunkingConfig,
    pub ingestion: IngestionConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub retry: RetryConfig,
    pub http: HttpConfig,
    pub anthropic: AnthropicConfig,
    pub embeddings: EmbeddingsConfig,
    pub search: SearchConfig,
}

impl ForesightConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(source: &str) -> ForesightResult<Self> {
        let config: Self =
            toml::from_str(source).map_err(|e| ForesightError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub async fn from_file(path: impl AsRef<Path>) -> ForesightResult<Self> {
        let path = path.as_ref();
        let source = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ForesightError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&source)
    }

    /// Reject combinations that cannot work.
    pub fn validate(&self) -> ForesightResult<()> {
        let invalid = |msg: &str| Err(ForesightError::Config(msg.to_string()));

        if self.chunking.chunk_size == 0 {
            return invalid("chunking.chunk_size must be positive");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return invalid("chunking.chunk_overlap must be smaller than chunk_size");
        }
        if self.chunking.max_chunk_len == 0 {
            return invalid("chunking.max_chunk_len must be positive");
        }
        if self.ingestion.concurrency == 0 {
            return invalid("ingestion.concurrency must be positive");
        }
        if self.retrieval.top_k == 0 {
            return invalid("retrieval.top_k must be positive");
        }
        if let EventCount::Fixed(0) = self.generation.events_per_expansion {
            return invalid("generation.events_per_expansion must be positive");
        }
        if self.generation.options_per_stakeholder == 0 {
            return invalid("generation.options_per_stakeholder must be positive");
        }
        let (min, max) = (self.generation.score_min, self.generation.score_max);
        if !min.is_finite() || !max.is_finite() || min > max {
            return invalid("generation.score_min must not exceed score_max");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.http.timeout_secs == 0 {
            return invalid("http.timeout_secs must be positive");
        }
        Ok(())
    }
}

/// Chunk window sizes, in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub max_chunk_len: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 400,
            chunk_overlap: 20,
            max_chunk_len: 8000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// URLs requested from the search provider per relation.
    pub max_urls_per_relation: usize,
    /// Upper bound on search and fetch requests in flight for a whole batch.
    pub concurrency: usize,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            max_urls_per_relation: 5,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { top_k: 4 }
    }
}

/// How many events one expansion must produce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCount {
    /// One event per stakeholder in the graph.
    #[default]
    PerStakeholder,
    Fixed(usize),
}

impl EventCount {
    /// Resolve against the number of stakeholders. Never returns zero.
    pub fn resolve(self, stakeholder_count: usize) -> usize {
        match self {
            EventCount::PerStakeholder => stakeholder_count.max(1),
            EventCount::Fixed(n) => n.max(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub events_per_expansion: EventCount,
    pub score_min: f64,
    pub score_max: f64,
    /// Prompt template on disk. `None` uses the built-in template.
    pub template_path: Option<PathBuf>,
    /// Aggregation rendered into the `{path_score}` slot.
    pub path_scoring: ScoreAggregation,
    /// Strategic options generated when one stakeholder acts.
    pub options_per_stakeholder: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            events_per_expansion: EventCount::PerStakeholder,
            score_min: -1.0,
            score_max: 1.0,
            template_path: None,
            path_scoring: ScoreAggregation::default(),
            options_per_stakeholder: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/58.0.3029.110 Safari/537.3"
                .to_string(),
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub endpoint: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Assistant turn the reply continues from. Empty disables prefill.
    pub prefill: String,
    pub timeout_secs: u64,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.anthropic.com/v1/messages".to_string(),
            model: "claude-3-5-sonnet-20241022".to_string(),
            max_tokens: 4096,
            temperature: 0.7,
            prefill: "[".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub endpoint: String,
    pub model: String,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.openai.com/v1/embeddings".to_string(),
            model: "text-embedding-3-small".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.tavily.com/search".to_string(),
        }
    }
}
