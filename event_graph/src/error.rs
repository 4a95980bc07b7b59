//! Errors raised by the scenario model.

use thiserror::Error;

use crate::graph::EventId;

/// Result alias for graph operations.
pub type GraphResult<T> = Result<T, GraphError>;

/// Errors that can occur when querying or mutating an [`EventGraph`](crate::EventGraph).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// No node in the graph carries the requested ID.
    #[error("event {event_id} not found in graph")]
    NotFound { event_id: EventId },

    /// A stakeholder name appears more than once.
    #[error("duplicate stakeholder: {name}")]
    DuplicateStakeholder { name: String },

    /// An evaluation score is NaN or infinite. Such a score cannot be written
    /// to a document and read back.
    #[error("evaluation score {score} of event {text:?} is not finite")]
    InvalidScore { text: String, score: f64 },

    /// A serialized graph violates a structural invariant.
    #[error("invalid graph document: {reason}")]
    InvalidDocument { reason: String },

    /// A serialized graph was written by a newer schema.
    #[error("unsupported graph schema version {found} (supported: {supported})")]
    UnsupportedSchemaVersion { found: u32, supported: u32 },
}

impl GraphError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            reason: reason.into(),
        }
    }

    /// The event ID this error refers to, if any.
    pub fn event_id(&self) -> Option<EventId> {
        match self {
            GraphError::NotFound { event_id } => Some(*event_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = GraphError::NotFound {
            event_id: EventId(99),
        };
        assert_eq!(err.to_string(), "event 99 not found in graph");
        assert_eq!(err.event_id(), Some(EventId(99)));
    }

    #[test]
    fn test_invalid_score_display() {
        let err = GraphError::InvalidScore {
            text: "Pipeline sabotaged".into(),
            score: f64::INFINITY,
        };
        assert_eq!(
            err.to_string(),
            "evaluation score inf of event \"Pipeline sabotaged\" is not finite"
        );
    }

    #[test]
    fn test_schema_version_display() {
        let err = GraphError::UnsupportedSchemaVersion {
            found: 7,
            supported: 1,
        };
        assert!(err.to_string().contains("version 7"));
        assert_eq!(err.event_id(), None);
    }
}
