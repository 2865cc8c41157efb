//! Graph projection: idempotent upserts of service nodes and call edges.

mod memory;
mod projector;

pub use memory::{GraphExport, InMemoryGraphStore};
pub use projector::{GraphProjector, ProjectionSummary};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::GraphWriteError;
use crate::resolve::ResolutionMethod;

/// A service node. Identity is the normalized name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceNode {
    pub name: String,
}

/// A call edge between two services. Identity is
/// (caller, callee, method, url); repeated upserts merge properties.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyEdge {
    pub caller: String,
    pub callee: String,
    pub method: String,
    pub url: String,
    pub confidence: f32,
    pub resolution: ResolutionMethod,
}

impl DependencyEdge {
    /// Identity key for merge semantics.
    pub fn key(&self) -> (String, String, String, String) {
        (
            self.caller.clone(),
            self.callee.clone(),
            self.method.clone(),
            self.url.clone(),
        )
    }
}

/// How projection treats pre-existing graph content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Merge into whatever is already present (default).
    Merge,
    /// Clear all prior nodes and edges first.
    Replace,
}

/// Graph store collaborator. Writes must be idempotent merges keyed by node
/// name / edge key; no particular query language is assumed.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_nodes(&self, nodes: &[ServiceNode]) -> Result<(), GraphWriteError>;

    async fn upsert_edges(&self, edges: &[DependencyEdge]) -> Result<(), GraphWriteError>;

    /// Removes all nodes and edges. Used by [`LoadMode::Replace`].
    async fn clear(&self) -> Result<(), GraphWriteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_key_identity() {
        let edge = DependencyEdge {
            caller: "a".into(),
            callee: "b".into(),
            method: "GET".into(),
            url: "http://b/x".into(),
            confidence: 0.5,
            resolution: ResolutionMethod::Inferred,
        };
        let mut other = edge.clone();
        other.confidence = 0.9;
        // Same identity regardless of properties.
        assert_eq!(edge.key(), other.key());
    }
}
