//! Nested node view of an event graph.

use serde::{Deserialize, Serialize};

use super::EventId;

/// An event and its subtree, in the nested shape used by clients and documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventNode {
    #[serde(rename = "eventID")]
    pub event_id: EventId,
    pub text: String,
    #[serde(default)]
    pub evaluation_score: f64,
    #[serde(default)]
    pub children: Vec<EventNode>,
}

impl EventNode {
    /// A childless node.
    pub fn leaf(event_id: EventId, text: impl Into<String>, evaluation_score: f64) -> Self {
        Self {
            event_id,
            text: text.into(),
            evaluation_score,
            children: Vec::new(),
        }
    }

    /// Add a child node.
    pub fn with_child(mut self, child: EventNode) -> Self {
        self.children.push(child);
        self
    }

    /// Number of nodes in this subtree, this one included.
    pub fn count(&self) -> usize {
        let mut total = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            total += 1;
            stack.extend(node.children.iter());
        }
        total
    }
}

impl Drop for EventNode {
    // Unlinks the subtree level by level; the derived drop would recurse once per level.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}
