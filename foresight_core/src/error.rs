//! Errors surfaced by expansion and by the pipeline's setup paths.
//!
//! Ingestion is the exception: per-item failures are collected into an
//! [`IngestionReport`](crate::ingestion::IngestionReport) instead of being returned here.

use event_graph::{EventId, GraphError};
use thiserror::Error;

use crate::knowledge_base::{EmbeddingError, StoreError};
use crate::llm::ModelError;
use crate::retry::Exhausted;

pub type ForesightResult<T> = Result<T, ForesightError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForesightError {
    /// The target event does not exist. The graph was not touched.
    #[error("event {event_id} not found in graph")]
    NotFound { event_id: EventId },

    #[error("prompt template {source_name} unavailable: {reason}")]
    TemplateMissing { source_name: String, reason: String },

    /// Model output did not match the expected structure. `raw_response` is the text as received.
    #[error("could not parse generation{}: {reason}", for_target(.target))]
    GenerationParse {
        target: Option<EventId>,
        reason: String,
        raw_response: String,
    },

    /// A retried call that kept failing transiently.
    #[error("{operation} failed after {attempts} attempts: {message}")]
    TransientCall {
        operation: &'static str,
        attempts: u32,
        message: String,
    },

    #[error("language model error: {0}")]
    Model(#[from] ModelError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("knowledge store error: {0}")]
    Store(#[from] StoreError),

    #[error("graph error: {0}")]
    Graph(GraphError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ForesightError {
    /// Map an exhausted retry: transient errors become `TransientCall`, others keep their type.
    pub(crate) fn from_exhausted<E>(operation: &'static str, exhausted: Exhausted<E>) -> Self
    where
        E: crate::retry::Transient + std::fmt::Display + Into<ForesightError>,
    {
        if exhausted.error.is_transient() {
            ForesightError::TransientCall {
                operation,
                attempts: exhausted.attempts,
                message: exhausted.error.to_string(),
            }
        } else {
            exhausted.error.into()
        }
    }

    /// Raw model text attached to a parse failure.
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            ForesightError::GenerationParse { raw_response, .. } => Some(raw_response),
            _ => None,
        }
    }
}

fn for_target(target: &Option<EventId>) -> String {
    target.map(|t| format!(" for event {t}")).unwrap_or_default()
}

impl From<GraphError> for ForesightError {
    fn from(err: GraphError) -> Self {
        match err {
            GraphError::NotFound { event_id } => ForesightError::NotFound { event_id },
            other => ForesightError::Graph(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_through() {
        let err: ForesightError = GraphError::NotFound { event_id: EventId(99) }.into();
        assert_eq!(err, ForesightError::NotFound { event_id: EventId(99) });
        assert_eq!(err.to_string(), "event 99 not found in graph");
    }

    #[test]
    fn test_exhausted_mapping() {
        let transient = ForesightError::from_exhausted(
            "model",
            Exhausted {
                error: ModelError::Timeout,
                attempts: 3,
            },
        );
        assert_eq!(
            transient,
            ForesightError::TransientCall {
                operation: "model",
                attempts: 3,
                message: "request timed out".into()
            }
        );

        let permanent = ForesightError::from_exhausted(
            "model",
            Exhausted {
                error: ModelError::NoApiKey,
                attempts: 1,
            },
        );
        assert_eq!(permanent, ForesightError::Model(ModelError::NoApiKey));
    }

    #[test]
    fn test_parse_error_display_and_raw() {
        let err = ForesightError::GenerationParse {
            target: Some(EventId(3)),
            reason: "expected 2 events, got 1".into(),
            raw_response: "[]".into(),
        };
        assert_eq!(
            err.to_string(),
            "could not parse generation for event 3: expected 2 events, got 1"
        );
        assert_eq!(err.raw_response(), Some("[]"));
    }
}
