//! Chunk definitions - stored text segments and their provenance.

use event_graph::{Relation, RelationId, StakeholderId};
use serde::{Deserialize, Serialize};

/// Provenance attached to every chunk cut from the same source document.
///
/// Keys keep the names the stored documents have always used, so existing
/// indexes stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    #[serde(rename = "relationID")]
    pub relation_id: RelationId,

    #[serde(rename = "stakeholder1Id", alias = "stakeholderAId")]
    pub stakeholder_a: StakeholderId,

    #[serde(rename = "stakeholder2Id", alias = "stakeholderBId")]
    pub stakeholder_b: StakeholderId,

    /// Search query the source was found with.
    #[serde(rename = "originalQuery")]
    pub original_query: String,

    #[serde(rename = "sourceUrl", default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,

    /// Position of the chunk within its source document.
    #[serde(rename = "chunkIndex", default)]
    pub chunk_index: usize,
}

impl ChunkMetadata {
    /// Metadata for content found while researching `relation`.
    pub fn for_relation(relation: &Relation, query: impl Into<String>) -> Self {
        Self {
            relation_id: relation.id,
            stakeholder_a: relation.stakeholder_a,
            stakeholder_b: relation.stakeholder_b,
            original_query: query.into(),
            source_url: None,
            chunk_index: 0,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_chunk_index(mut self, index: usize) -> Self {
        self.chunk_index = index;
        self
    }
}

/// A chunk returned by similarity search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub text: String,
    pub metadata: ChunkMetadata,
    /// Similarity to the query, higher is closer.
    #[serde(default)]
    pub similarity: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_keys() {
        let relation = Relation::new(
            "NATO sanctions on Russia",
            StakeholderId::new(),
            StakeholderId::new(),
        );
        let metadata = ChunkMetadata::for_relation(&relation, &relation.text)
            .with_source_url("https://example.org/a")
            .with_chunk_index(2);

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["relationID"], relation.id.0.to_string());
        assert_eq!(json["stakeholder1Id"], relation.stakeholder_a.0.to_string());
        assert_eq!(json["stakeholder2Id"], relation.stakeholder_b.0.to_string());
        assert_eq!(json["originalQuery"], "NATO sanctions on Russia");
        assert_eq!(json["sourceUrl"], "https://example.org/a");
        assert_eq!(json["chunkIndex"], 2);
    }

    #[test]
    fn test_metadata_accepts_letter_aliases() {
        let a = StakeholderId::new();
        let b = StakeholderId::new();
        let relation_id = RelationId::new();
        let json = format!(
            r#"{{"relationID":"{}","stakeholderAId":"{}","stakeholderBId":"{}","originalQuery":"q"}}"#,
            relation_id, a, b
        );

        let metadata: ChunkMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(metadata.stakeholder_a, a);
        assert_eq!(metadata.stakeholder_b, b);
        assert_eq!(metadata.source_url, None);
        assert_eq!(metadata.chunk_index, 0);
    }
}
