//! Versioned serialization format for event graphs.
//!
//! Older revisions of the format lacked scores, metadata or the event counter;
//! all of those default to neutral values. Loading a document re-checks every
//! structural invariant before an [`EventGraph`] is handed out.
//!
//! Events nest one JSON object per level, and `serde_json` gives up after 128
//! levels, which is a chain of about 64 events. [`EventGraph::to_json`] and
//! [`EventGraph::from_json`] have no depth limit and should be preferred to
//! going through `serde_json` directly.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use super::{EventGraph, EventId, EventNode, EventRecord};
use crate::error::{GraphError, GraphResult};

/// Schema version written by this crate.
pub const GRAPH_SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    GRAPH_SCHEMA_VERSION
}

/// On-disk and on-wire form of an [`EventGraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub root_node: EventNode,
    #[serde(default)]
    pub total_events: Option<u64>,
    #[serde(default)]
    pub stakeholders: Vec<String>,
    #[serde(default)]
    pub stakeholder_metadata: BTreeMap<String, Vec<String>>,
}

impl From<EventGraph> for GraphDocument {
    fn from(graph: EventGraph) -> Self {
        Self {
            schema_version: GRAPH_SCHEMA_VERSION,
            root_node: graph.to_tree(),
            total_events: Some(graph.total_events()),
            stakeholders: graph.stakeholders,
            stakeholder_metadata: graph.stakeholder_metadata,
        }
    }
}

impl TryFrom<GraphDocument> for EventGraph {
    type Error = GraphError;

    fn try_from(document: GraphDocument) -> Result<Self, Self::Error> {
        if document.schema_version == 0 || document.schema_version > GRAPH_SCHEMA_VERSION {
            return Err(GraphError::UnsupportedSchemaVersion {
                found: document.schema_version,
                supported: GRAPH_SCHEMA_VERSION,
            });
        }

        let count = document.root_node.count() as u64;
        if let Some(total) = document.total_events {
            if total != count {
                return Err(GraphError::invalid(format!(
                    "totalEvents is {total} but the tree holds {count} events"
                )));
            }
        }

        if document.root_node.event_id != EventId::ROOT {
            return Err(GraphError::invalid(format!(
                "root event must carry ID {}, found {}",
                EventId::ROOT,
                document.root_node.event_id
            )));
        }

        let mut slots: Vec<Option<EventRecord>> = vec![None; count as usize];
        let mut stack: Vec<(&EventNode, Option<EventId>)> = vec![(&document.root_node, None)];

        while let Some((node, parent)) = stack.pop() {
            let id = node.event_id;
            if id.0 == 0 || id.0 > count {
                return Err(GraphError::invalid(format!(
                    "event ID {id} outside 1..={count}"
                )));
            }
            if let Some(parent) = parent {
                if id <= parent {
                    return Err(GraphError::invalid(format!(
                        "event {id} was allocated before its parent {parent}"
                    )));
                }
            }

            if !node.evaluation_score.is_finite() {
                return Err(GraphError::InvalidScore {
                    text: node.text.clone(),
                    score: node.evaluation_score,
                });
            }

            let slot = &mut slots[(id.0 - 1) as usize];
            if slot.is_some() {
                return Err(GraphError::invalid(format!("duplicate event ID {id}")));
            }
            *slot = Some(EventRecord {
                id,
                text: node.text.clone(),
                evaluation_score: node.evaluation_score,
                parent,
                children: node.children.iter().map(|c| c.event_id).collect(),
            });

            stack.extend(node.children.iter().map(|child| (child, Some(id))));
        }

        // The tree holds exactly `count` nodes and none collided, so every slot is filled.
        let nodes: Vec<EventRecord> = slots.into_iter().flatten().collect();

        let mut seen = HashSet::new();
        for name in &document.stakeholders {
            if !seen.insert(name.as_str()) {
                return Err(GraphError::DuplicateStakeholder { name: name.clone() });
            }
        }

        Ok(EventGraph {
            nodes,
            stakeholders: document.stakeholders,
            stakeholder_metadata: document.stakeholder_metadata,
        })
    }
}

impl EventGraph {
    /// Serialize to a JSON document, whatever the depth of the tree.
    pub fn to_json(&self) -> GraphResult<String> {
        let document = GraphDocument::from(self.clone());
        let mut out = Vec::new();
        let mut serializer = serde_json::Serializer::new(&mut out);
        document
            .serialize(serde_stacker::Serializer::new(&mut serializer))
            .map_err(|e| GraphError::invalid(e.to_string()))?;
        String::from_utf8(out).map_err(|e| GraphError::invalid(e.to_string()))
    }

    /// Parse a JSON document, whatever the depth of the tree.
    ///
    /// Syntax errors are `InvalidDocument`; a well-formed document that breaks a
    /// graph invariant fails with the matching [`GraphError`].
    pub fn from_json(json: &str) -> GraphResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json);
        deserializer.disable_recursion_limit();
        let document = GraphDocument::deserialize(serde_stacker::Deserializer::new(&mut deserializer))
            .map_err(|e| GraphError::invalid(e.to_string()))?;
        deserializer.end().map_err(|e| GraphError::invalid(e.to_string()))?;
        EventGraph::try_from(document)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NewEvent;

    fn sample_graph() -> EventGraph {
        let mut graph = EventGraph::new("Russia invades Ukraine", 0.2)
            .with_stakeholders(["Ukraine", "Russia"])
            .unwrap();
        graph.add_stakeholder_fact("Russia", "Holds a UN Security Council veto");
        graph
            .insert_children(
                EventId::ROOT,
                [
                    NewEvent::new("Ukraine mobilises", 0.4),
                    NewEvent::new("Russia destroys Nord Stream 2", -0.3),
                ],
            )
            .unwrap();
        graph
            .insert_children(EventId(3), [NewEvent::new("Gas prices spike", -0.6)])
            .unwrap();
        graph
    }

    #[test]
    fn test_round_trip_preserves_ids_and_order() {
        let graph = sample_graph();
        let json = serde_json::to_string(&graph).unwrap();
        let restored: EventGraph = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, graph);
        assert_eq!(restored.preorder(), graph.preorder());
        assert_eq!(restored.total_events(), 4);
    }

    #[test]
    fn test_document_uses_camel_case_keys() {
        let json = serde_json::to_value(sample_graph()).unwrap();
        assert_eq!(json["schemaVersion"], 1);
        assert_eq!(json["totalEvents"], 4);
        assert_eq!(json["rootNode"]["eventID"], 1);
        assert_eq!(json["rootNode"]["children"][1]["children"][0]["eventID"], 4);
        assert!(json["stakeholderMetadata"]["Russia"].is_array());
    }

    #[test]
    fn test_root_only_document_without_optional_fields() {
        let graph: EventGraph =
            serde_json::from_str(r#"{"rootNode": {"eventID": 1, "text": "Start"}}"#).unwrap();
        assert_eq!(graph.total_events(), 1);
        assert_eq!(graph.root().evaluation_score, 0.0);
        assert!(graph.stakeholders().is_empty());
    }

    #[test]
    fn test_rejects_duplicate_ids() {
        let json = r#"{
            "rootNode": {"eventID": 1, "text": "r", "children": [
                {"eventID": 2, "text": "a"},
                {"eventID": 2, "text": "b"}
            ]}
        }"#;
        let err = serde_json::from_str::<EventGraph>(json).unwrap_err();
        assert!(err.to_string().contains("outside") || err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_rejects_mismatched_total() {
        let json = r#"{"rootNode": {"eventID": 1, "text": "r"}, "totalEvents": 3}"#;
        let err = serde_json::from_str::<EventGraph>(json).unwrap_err();
        assert!(err.to_string().contains("totalEvents"));
    }

    #[test]
    fn test_rejects_child_older_than_parent() {
        let json = r#"{
            "rootNode": {"eventID": 1, "text": "r", "children": [
                {"eventID": 3, "text": "a", "children": [{"eventID": 2, "text": "b"}]}
            ]}
        }"#;
        assert!(serde_json::from_str::<EventGraph>(json).is_err());
    }

    fn chain(length: u64) -> EventGraph {
        let mut graph = EventGraph::new("step 1", 0.0);
        for i in 1..length {
            graph
                .insert_children(EventId(i), [NewEvent::new(format!("step {}", i + 1), i as f64 / length as f64)])
                .unwrap();
        }
        graph
    }

    #[test]
    fn test_deep_chain_round_trips() {
        let graph = chain(500);
        let json = graph.to_json().unwrap();
        let restored = EventGraph::from_json(&json).unwrap();

        assert_eq!(restored, graph);
        assert_eq!(restored.depth(EventId(500)).unwrap(), 499);
    }

    #[test]
    fn test_plain_serde_json_output_reads_back_deep() {
        let graph = chain(300);
        let json = serde_json::to_string(&graph).unwrap();
        assert_eq!(EventGraph::from_json(&json).unwrap(), graph);
    }

    #[test]
    fn test_from_json_keeps_typed_errors() {
        assert!(matches!(
            EventGraph::from_json(r#"{"rootNode": {"eventID": 1, "text": "r"}, "stakeholders": ["A", "A"]}"#),
            Err(GraphError::DuplicateStakeholder { ref name }) if name == "A"
        ));
        assert!(matches!(
            EventGraph::from_json(r#"{"rootNode": {"eventID": 1, "text": "r"}} extra"#),
            Err(GraphError::InvalidDocument { .. })
        ));
        assert!(matches!(
            EventGraph::from_json(r#"{"rootNode": {"eventID": 1, "text": "r", "evaluationScore": null}}"#),
            Err(GraphError::InvalidDocument { .. })
        ));
    }

    #[test]
    fn test_rejects_non_finite_scores() {
        let document = GraphDocument {
            schema_version: GRAPH_SCHEMA_VERSION,
            root_node: EventNode::leaf(EventId::ROOT, "r", 0.0)
                .with_child(EventNode::leaf(EventId(2), "runaway", f64::NAN)),
            total_events: Some(2),
            stakeholders: Vec::new(),
            stakeholder_metadata: BTreeMap::new(),
        };
        assert!(matches!(
            EventGraph::try_from(document),
            Err(GraphError::InvalidScore { ref text, .. }) if text == "runaway"
        ));
    }

    #[test]
    fn test_rejects_future_schema() {
        let document = GraphDocument {
            schema_version: GRAPH_SCHEMA_VERSION + 1,
            root_node: EventNode::leaf(EventId::ROOT, "r", 0.0),
            total_events: None,
            stakeholders: Vec::new(),
            stakeholder_metadata: BTreeMap::new(),
        };
        assert!(matches!(
            EventGraph::try_from(document),
            Err(GraphError::UnsupportedSchemaVersion { found: 2, .. })
        ));
    }
}
