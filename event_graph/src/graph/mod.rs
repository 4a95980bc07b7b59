//! Event graph - the causality tree of a scenario.
//!
//! Nodes live in an arena indexed by [`EventId`], with parent and child links
//! stored alongside each record. IDs are allocated by the graph alone, one
//! counter per graph, so that every node ever inserted gets a fresh, contiguous ID.

mod document;
mod node;

pub use document::*;
pub use node::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{GraphError, GraphResult};
use crate::scoring::ScoreAggregation;
use crate::stakeholders::Stakeholder;

/// Identifier of an event node, unique within one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(pub u64);

impl EventId {
    /// The root of every graph is the first event inserted.
    pub const ROOT: EventId = EventId(1);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EventId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// A candidate event waiting to be attached under a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub text: String,
    pub evaluation_score: f64,
}

impl NewEvent {
    pub fn new(text: impl Into<String>, evaluation_score: f64) -> Self {
        Self {
            text: text.into(),
            evaluation_score,
        }
    }
}

impl<S: Into<String>> From<(S, f64)> for NewEvent {
    fn from((text, score): (S, f64)) -> Self {
        Self::new(text, score)
    }
}

/// One arena slot.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub id: EventId,
    pub text: String,
    pub evaluation_score: f64,
    pub parent: Option<EventId>,
    pub children: Vec<EventId>,
}

/// The events and evaluation scores from the root down to a target, inclusive.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPath {
    pub ids: Vec<EventId>,
    pub events: Vec<String>,
    pub evaluations: Vec<f64>,
}

impl EventPath {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The node the path ends at.
    pub fn target(&self) -> Option<EventId> {
        self.ids.last().copied()
    }

    /// Text of the deepest event on the path.
    pub fn leaf_text(&self) -> Option<&str> {
        self.events.last().map(String::as_str)
    }
}

/// The causality tree for one scenario, plus its stakeholders.
///
/// Invariants:
/// - node `i` of the arena carries `EventId(i + 1)`, so IDs are unique and
///   `total_events()` equals the number of nodes ever inserted;
/// - every node except the root has exactly one parent;
/// - children lists only ever grow, in insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "GraphDocument", into = "GraphDocument")]
pub struct EventGraph {
    nodes: Vec<EventRecord>,
    stakeholders: Vec<String>,
    stakeholder_metadata: BTreeMap<String, Vec<String>>,
}

impl EventGraph {
    /// Create a graph holding only its root event.
    ///
    /// A NaN or infinite root score is stored as the neutral score 0.
    pub fn new(root_text: impl Into<String>, root_score: f64) -> Self {
        Self {
            nodes: vec![EventRecord {
                id: EventId::ROOT,
                text: root_text.into(),
                evaluation_score: if root_score.is_finite() { root_score } else { 0.0 },
                parent: None,
                children: Vec::new(),
            }],
            stakeholders: Vec::new(),
            stakeholder_metadata: BTreeMap::new(),
        }
    }

    /// Register stakeholders by name. Names must be unique.
    pub fn with_stakeholders<I, S>(mut self, names: I) -> GraphResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.add_stakeholder(name)?;
        }
        Ok(self)
    }

    /// Register stakeholder profiles, deriving metadata facts from their role and interests.
    pub fn with_stakeholder_profiles(mut self, profiles: &[Stakeholder]) -> GraphResult<Self> {
        for profile in profiles {
            self.add_stakeholder(profile.name.clone())?;
            for fact in profile.facts() {
                self.add_stakeholder_fact(profile.name.clone(), fact);
            }
        }
        Ok(self)
    }

    /// Add one stakeholder at the end of the ordered list.
    pub fn add_stakeholder(&mut self, name: impl Into<String>) -> GraphResult<()> {
        let name = name.into();
        if self.stakeholders.contains(&name) {
            return Err(GraphError::DuplicateStakeholder { name });
        }
        self.stakeholders.push(name);
        Ok(())
    }

    /// Append a fact to a stakeholder's metadata.
    pub fn add_stakeholder_fact(&mut self, name: impl Into<String>, fact: impl Into<String>) {
        self.stakeholder_metadata
            .entry(name.into())
            .or_default()
            .push(fact.into());
    }

    /// Replace a stakeholder's metadata.
    pub fn set_stakeholder_metadata(&mut self, name: impl Into<String>, facts: Vec<String>) {
        self.stakeholder_metadata.insert(name.into(), facts);
    }

    pub fn stakeholders(&self) -> &[String] {
        &self.stakeholders
    }

    pub fn stakeholder_metadata(&self) -> &BTreeMap<String, Vec<String>> {
        &self.stakeholder_metadata
    }

    /// Number of events ever inserted, root included. Also the last allocated ID.
    pub fn total_events(&self) -> u64 {
        self.nodes.len() as u64
    }

    pub fn root_id(&self) -> EventId {
        EventId::ROOT
    }

    pub fn root(&self) -> &EventRecord {
        &self.nodes[0]
    }

    pub fn contains(&self, id: EventId) -> bool {
        self.slot(id).is_some()
    }

    pub fn node(&self, id: EventId) -> Option<&EventRecord> {
        self.slot(id).map(|index| &self.nodes[index])
    }

    /// Children of a node in insertion order.
    pub fn children(&self, id: EventId) -> GraphResult<&[EventId]> {
        self.require(id).map(|node| node.children.as_slice())
    }

    pub fn parent(&self, id: EventId) -> GraphResult<Option<EventId>> {
        self.require(id).map(|node| node.parent)
    }

    /// Number of edges between the root and a node.
    pub fn depth(&self, id: EventId) -> GraphResult<usize> {
        Ok(self.find_path(id)?.len() - 1)
    }

    /// All node IDs in pre-order, children visited in stored order.
    pub fn preorder(&self) -> Vec<EventId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![EventId::ROOT];

        while let Some(id) = stack.pop() {
            order.push(id);
            if let Some(node) = self.node(id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }

        order
    }

    /// Nodes without children, in pre-order.
    pub fn leaves(&self) -> Vec<EventId> {
        self.preorder()
            .into_iter()
            .filter(|id| self.node(*id).is_some_and(|n| n.children.is_empty()))
            .collect()
    }

    /// Texts and scores from the root down to `target`, inclusive.
    pub fn find_path(&self, target: EventId) -> GraphResult<EventPath> {
        let mut cursor = Some(self.require(target)?);
        let mut reversed = Vec::new();

        while let Some(node) = cursor {
            reversed.push(node);
            cursor = node.parent.and_then(|parent| self.node(parent));
        }

        let mut path = EventPath::default();
        for node in reversed.into_iter().rev() {
            path.ids.push(node.id);
            path.events.push(node.text.clone());
            path.evaluations.push(node.evaluation_score);
        }
        Ok(path)
    }

    /// Aggregate the evaluation scores along the path to `target`.
    pub fn path_score(&self, target: EventId, aggregation: ScoreAggregation) -> GraphResult<f64> {
        let path = self.find_path(target)?;
        Ok(aggregation.aggregate(&path.evaluations))
    }

    /// Attach new leaf events under `target`, in order, with fresh contiguous IDs.
    ///
    /// Either every event is attached or nothing changes: an absent `target`
    /// fails with `NotFound`, a NaN or infinite score with `InvalidScore`.
    pub fn insert_children<I, E>(&mut self, target: EventId, events: I) -> GraphResult<Vec<EventId>>
    where
        I: IntoIterator<Item = E>,
        E: Into<NewEvent>,
    {
        let target_index = self
            .slot(target)
            .ok_or(GraphError::NotFound { event_id: target })?;

        let events: Vec<NewEvent> = events.into_iter().map(Into::into).collect();
        if let Some(bad) = events.iter().find(|e| !e.evaluation_score.is_finite()) {
            return Err(GraphError::InvalidScore {
                text: bad.text.clone(),
                score: bad.evaluation_score,
            });
        }

        let mut allocated = Vec::with_capacity(events.len());
        for event in events {
            let id = EventId(self.total_events() + 1);
            self.nodes.push(EventRecord {
                id,
                text: event.text,
                evaluation_score: event.evaluation_score,
                parent: Some(target),
                children: Vec::new(),
            });
            self.nodes[target_index].children.push(id);
            allocated.push(id);
        }

        Ok(allocated)
    }

    /// Like [`insert_children`](Self::insert_children) but leaves `self` untouched
    /// and returns the updated graph.
    pub fn add_children<I, E>(&self, target: EventId, events: I) -> GraphResult<EventGraph>
    where
        I: IntoIterator<Item = E>,
        E: Into<NewEvent>,
    {
        self.require(target)?;
        let mut updated = self.clone();
        updated.insert_children(target, events)?;
        Ok(updated)
    }

    /// Nested view of the tree, as stored in documents.
    pub fn to_tree(&self) -> EventNode {
        // A child always carries a larger ID than its parent, so walking the
        // arena backwards finds every child subtree already built.
        let mut built: Vec<Option<EventNode>> = vec![None; self.nodes.len()];
        for index in (1..self.nodes.len()).rev() {
            built[index] = Some(self.assemble_node(index, &mut built));
        }
        self.assemble_node(0, &mut built)
    }

    fn assemble_node(&self, index: usize, built: &mut [Option<EventNode>]) -> EventNode {
        let record = &self.nodes[index];
        EventNode {
            event_id: record.id,
            text: record.text.clone(),
            evaluation_score: record.evaluation_score,
            children: record
                .children
                .iter()
                .filter_map(|child| built[(child.0 - 1) as usize].take())
                .collect(),
        }
    }

    fn slot(&self, id: EventId) -> Option<usize> {
        if id.0 >= 1 && id.0 <= self.total_events() {
            Some((id.0 - 1) as usize)
        } else {
            None
        }
    }

    fn require(&self, id: EventId) -> GraphResult<&EventRecord> {
        self.node(id).ok_or(GraphError::NotFound { event_id: id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Root 1 with children 2, 3, 4.
    fn ukraine_graph() -> EventGraph {
        let mut graph = EventGraph::new("Russia invades Ukraine", 0.1)
            .with_stakeholders(["Ukraine", "Russia", "USA"])
            .unwrap();
        graph
            .insert_children(
                EventId::ROOT,
                [
                    ("Ukraine declares full scale war on russia", 0.4),
                    ("Russia destroys Nord Stream 2", 0.3),
                    ("USA sanctions Russia", 0.5),
                ],
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_new_graph_has_only_root() {
        let graph = EventGraph::new("Start", 0.0);
        assert_eq!(graph.total_events(), 1);
        assert_eq!(graph.root().id, EventId::ROOT);
        assert!(graph.root().parent.is_none());
        assert_eq!(graph.leaves(), vec![EventId::ROOT]);
    }

    #[test]
    fn test_add_children_to_middle_node() {
        let graph = ukraine_graph();
        assert_eq!(graph.total_events(), 4);

        let updated = graph
            .add_children(
                EventId(3),
                [NewEvent::new("Russia destroys Nord Stream 2 pipeline B", 0.7)],
            )
            .unwrap();

        assert_eq!(updated.total_events(), 5);
        assert_eq!(updated.children(EventId(3)).unwrap(), &[EventId(5)]);

        let path = updated.find_path(EventId(5)).unwrap();
        assert_eq!(
            path.events,
            vec![
                "Russia invades Ukraine",
                "Russia destroys Nord Stream 2",
                "Russia destroys Nord Stream 2 pipeline B",
            ]
        );
        assert_eq!(path.evaluations, vec![0.1, 0.3, 0.7]);
        assert_eq!(path.ids, vec![EventId(1), EventId(3), EventId(5)]);

        // The source value is untouched.
        assert_eq!(graph.total_events(), 4);
        assert!(graph.children(EventId(3)).unwrap().is_empty());
    }

    #[test]
    fn test_add_children_unknown_target() {
        let graph = ukraine_graph();
        let before = graph.clone();

        let err = graph
            .add_children(EventId(99), [("Anything", 0.5)])
            .unwrap_err();

        assert_eq!(err, GraphError::NotFound { event_id: EventId(99) });
        assert_eq!(graph.total_events(), 4);
        assert_eq!(graph, before);
    }

    #[test]
    fn test_insert_children_unknown_target_leaves_graph_unchanged() {
        let mut graph = ukraine_graph();
        let before = graph.clone();

        assert!(graph.insert_children(EventId(0), [("x", 0.0)]).is_err());
        assert!(graph.insert_children(EventId(5), [("x", 0.0)]).is_err());
        assert_eq!(graph, before);
    }

    #[test]
    fn test_find_path_root() {
        let graph = ukraine_graph();
        let path = graph.find_path(EventId::ROOT).unwrap();
        assert_eq!(path.len(), 1);
        assert_eq!(path.events, vec!["Russia invades Ukraine"]);
        assert_eq!(path.evaluations, vec![0.1]);
        assert_eq!(path.leaf_text(), Some("Russia invades Ukraine"));
    }

    #[test]
    fn test_find_path_unknown() {
        let graph = ukraine_graph();
        assert!(matches!(
            graph.find_path(EventId(42)),
            Err(GraphError::NotFound { event_id: EventId(42) })
        ));
    }

    #[test]
    fn test_ids_are_contiguous_across_batches() {
        let mut graph = ukraine_graph();
        let first = graph.insert_children(EventId(2), [("a", 0.0), ("b", 0.0)]).unwrap();
        let second = graph.insert_children(EventId(2), [("c", 0.0)]).unwrap();

        assert_eq!(first, vec![EventId(5), EventId(6)]);
        assert_eq!(second, vec![EventId(7)]);
        assert_eq!(
            graph.children(EventId(2)).unwrap(),
            &[EventId(5), EventId(6), EventId(7)]
        );
    }

    #[test]
    fn test_empty_batch_is_a_no_op() {
        let mut graph = ukraine_graph();
        let ids = graph
            .insert_children(EventId(4), Vec::<NewEvent>::new())
            .unwrap();
        assert!(ids.is_empty());
        assert_eq!(graph.total_events(), 4);
    }

    #[test]
    fn test_preorder_and_leaves() {
        let mut graph = ukraine_graph();
        graph.insert_children(EventId(2), [("deep", 0.0)]).unwrap();

        assert_eq!(
            graph.preorder(),
            vec![EventId(1), EventId(2), EventId(5), EventId(3), EventId(4)]
        );
        assert_eq!(graph.leaves(), vec![EventId(5), EventId(3), EventId(4)]);
        assert_eq!(graph.depth(EventId(5)).unwrap(), 2);
        assert_eq!(graph.parent(EventId(5)).unwrap(), Some(EventId(2)));
    }

    #[test]
    fn test_duplicate_stakeholder_rejected() {
        let result = EventGraph::new("Start", 0.0).with_stakeholders(["Russia", "Russia"]);
        assert!(matches!(
            result,
            Err(GraphError::DuplicateStakeholder { name }) if name == "Russia"
        ));
    }

    #[test]
    fn test_stakeholder_profiles_become_metadata() {
        let profiles = vec![
            Stakeholder::new("Ukraine")
                .with_role("Defending state")
                .with_interest("Territorial integrity"),
            Stakeholder::new("USA").with_interest("NATO cohesion"),
        ];
        let graph = EventGraph::new("Start", 0.0)
            .with_stakeholder_profiles(&profiles)
            .unwrap();

        assert_eq!(graph.stakeholders(), &["Ukraine", "USA"]);
        let ukraine = &graph.stakeholder_metadata()["Ukraine"];
        assert!(ukraine.iter().any(|f| f.contains("Defending state")));
        assert!(ukraine.iter().any(|f| f.contains("Territorial integrity")));
    }

    #[test]
    fn test_non_finite_scores_rejected_before_allocation() {
        let mut graph = ukraine_graph();
        let before = graph.clone();

        let err = graph
            .insert_children(EventId(2), [("fine", 0.2), ("broken", f64::NAN)])
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidScore { ref text, .. } if text == "broken"));
        assert_eq!(graph, before);

        let err = graph
            .add_children(EventId(3), [("overflow", f64::NEG_INFINITY)])
            .unwrap_err();
        assert!(matches!(err, GraphError::InvalidScore { score, .. } if score == f64::NEG_INFINITY));
        assert_eq!(graph.total_events(), 4);
    }

    #[test]
    fn test_non_finite_root_score_is_neutral() {
        let graph = EventGraph::new("Start", f64::NAN);
        assert_eq!(graph.root().evaluation_score, 0.0);
    }

    #[test]
    fn test_to_tree_handles_long_chains() {
        let mut graph = EventGraph::new("step 1", 0.0);
        for i in 1..50_000u64 {
            graph.insert_children(EventId(i), [(format!("step {}", i + 1), 0.0)]).unwrap();
        }

        let tree = graph.to_tree();
        assert_eq!(tree.count(), 50_000);
        assert_eq!(tree.children[0].event_id, EventId(2));
    }

    #[test]
    fn test_to_tree_keeps_child_order() {
        let mut graph = ukraine_graph();
        graph.insert_children(EventId(2), [("deep", -0.2)]).unwrap();

        let tree = graph.to_tree();
        let ids: Vec<EventId> = tree.children.iter().map(|c| c.event_id).collect();
        assert_eq!(ids, vec![EventId(2), EventId(3), EventId(4)]);
        assert_eq!(tree.children[0].children[0].text, "deep");
        assert_eq!(tree.count(), 5);
    }

    #[test]
    fn test_path_score_uses_aggregation() {
        let mut graph = ukraine_graph();
        graph.insert_children(EventId(3), [("escalation", 0.7)]).unwrap();

        let last = graph.path_score(EventId(5), ScoreAggregation::Last).unwrap();
        let min = graph.path_score(EventId(5), ScoreAggregation::Min).unwrap();
        assert!((last - 0.7).abs() < 1e-9);
        assert!((min - 0.1).abs() < 1e-9);
    }
}
