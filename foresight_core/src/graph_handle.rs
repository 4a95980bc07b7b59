//! Shared, concurrently readable event graph.

use std::sync::Arc;

use event_graph::{EventGraph, EventId, GraphResult, NewEvent};
use tokio::sync::RwLock;
use tracing::debug;

/// An [`EventGraph`] shared between concurrent expansions.
///
/// Readers take an immutable snapshot and keep it as long as they like. Writers
/// serialize on one lock and copy the graph only while an older snapshot is
/// still alive, so a snapshot never changes under its holder and never shows
/// half an insertion.
#[derive(Debug, Clone)]
pub struct SharedEventGraph {
    inner: Arc<RwLock<Arc<EventGraph>>>,
}

impl SharedEventGraph {
    pub fn new(graph: EventGraph) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(graph))),
        }
    }

    /// The current graph.
    pub async fn snapshot(&self) -> Arc<EventGraph> {
        self.inner.read().await.clone()
    }

    pub async fn total_events(&self) -> u64 {
        self.inner.read().await.total_events()
    }

    /// Insert under `target` and return the new IDs with the resulting graph.
    ///
    /// Nothing changes when `target` is absent.
    pub async fn add_children<I, E>(&self, target: EventId, events: I) -> GraphResult<(Vec<EventId>, Arc<EventGraph>)>
    where
        I: IntoIterator<Item = E>,
        E: Into<NewEvent>,
    {
        let mut current = self.inner.write().await;
        if !current.contains(target) {
            return Err(event_graph::GraphError::NotFound { event_id: target });
        }

        let graph = Arc::make_mut(&mut current);
        let ids = graph.insert_children(target, events)?;
        debug!(event_id = %target, added = ids.len(), total = graph.total_events(), "graph updated");
        Ok((ids, current.clone()))
    }

    /// Apply an arbitrary mutation under the write lock.
    ///
    /// `mutate` runs on a copy, which replaces the graph only if it succeeds.
    pub async fn update<T>(&self, mutate: impl FnOnce(&mut EventGraph) -> GraphResult<T>) -> GraphResult<T> {
        let mut current = self.inner.write().await;
        let mut next = (**current).clone();
        let value = mutate(&mut next)?;
        *current = Arc::new(next);
        Ok(value)
    }
}

impl From<EventGraph> for SharedEventGraph {
    fn from(graph: EventGraph) -> Self {
        Self::new(graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_graph::GraphError;

    #[tokio::test]
    async fn test_snapshot_is_isolated_from_later_writes() {
        let shared = SharedEventGraph::new(EventGraph::new("root", 0.0));
        let before = shared.snapshot().await;

        let (ids, after) = shared
            .add_children(EventId::ROOT, [("a", 0.1), ("b", 0.2)])
            .await
            .unwrap();

        assert_eq!(ids, vec![EventId(2), EventId(3)]);
        assert_eq!(before.total_events(), 1);
        assert_eq!(after.total_events(), 3);
        assert_eq!(shared.total_events().await, 3);
    }

    #[tokio::test]
    async fn test_missing_target_changes_nothing() {
        let shared = SharedEventGraph::new(EventGraph::new("root", 0.0));
        let err = shared.add_children(EventId(7), [("x", 0.0)]).await.unwrap_err();
        assert_eq!(err, GraphError::NotFound { event_id: EventId(7) });
        assert_eq!(shared.total_events().await, 1);
    }

    #[tokio::test]
    async fn test_update_is_all_or_nothing() {
        let shared = SharedEventGraph::new(EventGraph::new("root", 0.0).with_stakeholders(["A"]).unwrap());

        let result = shared
            .update(|graph| {
                graph.add_stakeholder("B")?;
                graph.add_stakeholder("A")
            })
            .await;

        assert!(matches!(result, Err(GraphError::DuplicateStakeholder { .. })));
        assert_eq!(shared.snapshot().await.stakeholders(), ["A".to_string()]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_get_disjoint_ranges() {
        let shared = SharedEventGraph::new(EventGraph::new("root", 0.0));
        shared
            .add_children(EventId::ROOT, [("a", 0.0), ("b", 0.0)])
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for i in 0..16u64 {
            let shared = shared.clone();
            let target = EventId(2 + i % 2);
            tasks.push(tokio::spawn(async move {
                shared
                    .add_children(target, [(format!("x{i}"), 0.0), (format!("y{i}"), 0.0)])
                    .await
                    .unwrap()
                    .0
            }));
        }

        let mut all = Vec::new();
        for task in tasks {
            let ids = task.await.unwrap();
            assert_eq!(ids[1].0, ids[0].0 + 1);
            all.extend(ids);
        }
        all.sort();
        let expected: Vec<EventId> = (4..=35).map(EventId).collect();
        assert_eq!(all, expected);
        assert_eq!(shared.total_events().await, 35);
    }
}
