//! In-memory graph store.
//!
//! Stands in for the external graph database in tests and serves as the
//! CLI's export surface. Honors the same merge-by-key contract a real store
//! must provide, and can inject transient write failures.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::GraphWriteError;

use super::{DependencyEdge, GraphStore, ServiceNode};

type EdgeKey = (String, String, String, String);

/// Serializable view of the whole graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<ServiceNode>,
    pub edges: Vec<DependencyEdge>,
}

#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    nodes: Mutex<BTreeMap<String, ServiceNode>>,
    edges: Mutex<BTreeMap<EdgeKey, DependencyEdge>>,
    fail_budget: AtomicUsize,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `count` write operations fail with a transient error.
    pub fn fail_next_writes(&self, count: usize) {
        self.fail_budget.store(count, Ordering::SeqCst);
    }

    pub fn node_count(&self) -> usize {
        self.lock_nodes().len()
    }

    pub fn edge_count(&self) -> usize {
        self.lock_edges().len()
    }

    pub fn export(&self) -> GraphExport {
        GraphExport {
            nodes: self.lock_nodes().values().cloned().collect(),
            edges: self.lock_edges().values().cloned().collect(),
        }
    }

    fn check_failure(&self) -> Result<(), GraphWriteError> {
        let remaining = self.fail_budget.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_budget.store(remaining - 1, Ordering::SeqCst);
            return Err(GraphWriteError::new("injected transient write failure"));
        }
        Ok(())
    }

    fn lock_nodes(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, ServiceNode>> {
        self.nodes.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_edges(&self) -> std::sync::MutexGuard<'_, BTreeMap<EdgeKey, DependencyEdge>> {
        self.edges.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn upsert_nodes(&self, nodes: &[ServiceNode]) -> Result<(), GraphWriteError> {
        self.check_failure()?;
        let mut map = self.lock_nodes();
        for node in nodes {
            map.insert(node.name.clone(), node.clone());
        }
        Ok(())
    }

    async fn upsert_edges(&self, edges: &[DependencyEdge]) -> Result<(), GraphWriteError> {
        self.check_failure()?;
        let mut map = self.lock_edges();
        for edge in edges {
            map.insert(edge.key(), edge.clone());
        }
        Ok(())
    }

    async fn clear(&self) -> Result<(), GraphWriteError> {
        self.check_failure()?;
        self.lock_nodes().clear();
        self.lock_edges().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::ResolutionMethod;

    fn node(name: &str) -> ServiceNode {
        ServiceNode {
            name: name.to_string(),
        }
    }

    fn edge(caller: &str, callee: &str, confidence: f32) -> DependencyEdge {
        DependencyEdge {
            caller: caller.to_string(),
            callee: callee.to_string(),
            method: "GET".to_string(),
            url: format!("http://{callee}/x"),
            confidence,
            resolution: ResolutionMethod::Deterministic,
        }
    }

    #[tokio::test]
    async fn test_upsert_merges_by_key() {
        let store = InMemoryGraphStore::new();
        store.upsert_nodes(&[node("a"), node("a")]).await.unwrap();
        assert_eq!(store.node_count(), 1);

        store
            .upsert_edges(&[edge("a", "b", 0.5)])
            .await
            .unwrap();
        store
            .upsert_edges(&[edge("a", "b", 0.9)])
            .await
            .unwrap();

        assert_eq!(store.edge_count(), 1);
        // Properties of the later write win.
        assert_eq!(store.export().edges[0].confidence, 0.9);
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = InMemoryGraphStore::new();
        store.upsert_nodes(&[node("a")]).await.unwrap();
        store.upsert_edges(&[edge("a", "b", 1.0)]).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.node_count(), 0);
        assert_eq!(store.edge_count(), 0);
    }

    #[tokio::test]
    async fn test_injected_failures_expire() {
        let store = InMemoryGraphStore::new();
        store.fail_next_writes(1);
        assert!(store.upsert_nodes(&[node("a")]).await.is_err());
        assert!(store.upsert_nodes(&[node("a")]).await.is_ok());
    }
}
