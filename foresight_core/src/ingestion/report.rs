//! Ingestion outcome reporting.

use event_graph::RelationId;
use serde::{Deserialize, Serialize};

/// Where in the per-source pipeline an item failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStage {
    Search,
    Fetch,
    Extract,
    Store,
}

impl std::fmt::Display for IngestionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            IngestionStage::Search => "search",
            IngestionStage::Fetch => "fetch",
            IngestionStage::Extract => "extract",
            IngestionStage::Store => "store",
        };
        f.write_str(name)
    }
}

/// One skipped relation or source. Collected, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionItemError {
    pub relation_id: RelationId,
    /// Absent when the whole relation was skipped before any URL was known.
    pub url: Option<String>,
    pub stage: IngestionStage,
    pub message: String,
}

impl std::fmt::Display for IngestionItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.url {
            Some(url) => write!(f, "relation {} ({}) {}: {}", self.relation_id, url, self.stage, self.message),
            None => write!(f, "relation {} {}: {}", self.relation_id, self.stage, self.message),
        }
    }
}

impl std::error::Error for IngestionItemError {}

/// Per-item summary of an ingestion batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub relations_processed: usize,
    /// Source documents that produced at least one stored chunk.
    pub sources_stored: usize,
    pub chunks_stored: usize,
    pub failures: Vec<IngestionItemError>,
}

impl IngestionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Failures recorded at `stage`.
    pub fn failures_at(&self, stage: IngestionStage) -> impl Iterator<Item = &IngestionItemError> {
        self.failures.iter().filter(move |f| f.stage == stage)
    }

    pub fn merge(&mut self, other: IngestionReport) {
        self.relations_processed += other.relations_processed;
        self.sources_stored += other.sources_stored;
        self.chunks_stored += other.chunks_stored;
        self.failures.extend(other.failures);
    }
}
