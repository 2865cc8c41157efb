//! Projects resolved dependencies into the graph store.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::error::GraphWriteError;
use crate::resolve::{normalize, ResolvedDependency};

use super::{DependencyEdge, GraphStore, LoadMode, ServiceNode};

/// Counts of graph entities written by one projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionSummary {
    pub nodes_written: usize,
    pub edges_written: usize,
}

/// Idempotent projector over a [`GraphStore`].
///
/// Writes are retried with exponential backoff; an exhausted retry budget
/// escalates, since a partially projected graph is worse than a failed job
/// that can be re-run.
pub struct GraphProjector {
    store: Arc<dyn GraphStore>,
    max_attempts: u32,
    backoff: Duration,
}

impl GraphProjector {
    pub fn new(store: Arc<dyn GraphStore>, config: &AnalyzerConfig) -> Self {
        Self {
            store,
            max_attempts: config.max_graph_write_attempts.max(1),
            backoff: config.graph_write_backoff,
        }
    }

    /// Upserts the nodes and edges for `dependencies`.
    ///
    /// Final graph state is independent of input order: node and edge sets
    /// are deduplicated by identity key before writing, with later entries
    /// overwriting earlier properties (merge semantics).
    pub async fn project(
        &self,
        dependencies: &[ResolvedDependency],
        mode: LoadMode,
    ) -> Result<ProjectionSummary, GraphWriteError> {
        let (nodes, edges) = build_mutations(dependencies);

        if mode == LoadMode::Replace {
            self.with_retry("clear", || self.store.clear()).await?;
        }

        if nodes.is_empty() {
            return Ok(ProjectionSummary::default());
        }

        self.with_retry("upsert_nodes", || self.store.upsert_nodes(&nodes))
            .await?;
        self.with_retry("upsert_edges", || self.store.upsert_edges(&edges))
            .await?;

        debug!(
            nodes = nodes.len(),
            edges = edges.len(),
            "graph projection complete"
        );

        Ok(ProjectionSummary {
            nodes_written: nodes.len(),
            edges_written: edges.len(),
        })
    }

    async fn with_retry<F, Fut>(&self, op: &str, mut attempt_fn: F) -> Result<(), GraphWriteError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), GraphWriteError>>,
    {
        let mut last_error = GraphWriteError::new("no attempts made");
        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                tokio::time::sleep(self.backoff * 2u32.pow(attempt - 2)).await;
            }
            match attempt_fn().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(
                        op,
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %e,
                        "graph write failed"
                    );
                    last_error = e;
                }
            }
        }
        Err(GraphWriteError::new(format!(
            "{op} failed after {} attempts: {}",
            self.max_attempts, last_error.message
        )))
    }
}

/// Deduplicated, normalized node and edge sets for a dependency sequence.
/// BTreeMaps keep write order deterministic.
fn build_mutations(
    dependencies: &[ResolvedDependency],
) -> (Vec<ServiceNode>, Vec<DependencyEdge>) {
    let mut nodes: BTreeMap<String, ServiceNode> = BTreeMap::new();
    let mut edges: BTreeMap<(String, String, String, String), DependencyEdge> = BTreeMap::new();

    for dep in dependencies {
        let caller = normalize(&dep.caller);
        let callee = normalize(&dep.callee);
        if caller.is_empty() || callee.is_empty() {
            continue;
        }

        nodes
            .entry(caller.clone())
            .or_insert_with(|| ServiceNode {
                name: caller.clone(),
            });
        nodes
            .entry(callee.clone())
            .or_insert_with(|| ServiceNode {
                name: callee.clone(),
            });

        let edge = DependencyEdge {
            caller,
            callee,
            method: dep.http_method.as_str().to_string(),
            url: dep.url.clone(),
            confidence: dep.confidence,
            resolution: dep.method,
        };
        edges.insert(edge.key(), edge);
    }

    (nodes.into_values().collect(), edges.into_values().collect())
}
