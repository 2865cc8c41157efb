//! Pipeline controller: drives one job through its stages.
//!
//! Stage order is fixed: ingestion → extraction → resolution → projection.
//! Per-item problems become warnings; only ingestion failure, an empty
//! source tree, or an exhausted graph-write budget fail the job.
//! Cancellation is checked between stages, never inside one.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::extract::CallExtractor;
use crate::job::{CancelToken, JobHandle, JobSnapshot, Stage};
use crate::resolve::NameResolver;
use crate::graph::GraphProjector;

use super::context::AnalysisContext;

pub struct PipelineController {
    ctx: AnalysisContext,
}

impl PipelineController {
    pub fn new(ctx: AnalysisContext) -> Self {
        Self { ctx }
    }

    /// Runs the job to a terminal state and returns the final snapshot.
    ///
    /// The caller owns the job exclusively; `job` and `cancel` are the only
    /// channels through which this run is observed or interrupted.
    pub async fn run(&self, job: &JobHandle, cancel: &CancelToken) -> JobSnapshot {
        let start = Instant::now();

        if let Err(e) = job.claim() {
            warn!(job = %job.id(), error = %e, "job could not be claimed");
            return job.snapshot();
        }
        info!(job = %job.id(), "analysis started");

        // Stage 1: ingestion. Fatal on failure.
        let tree = match self.ctx.source.fetch().await {
            Ok(tree) => tree,
            Err(e) => {
                let _ = job.fail(PipelineError::Ingestion(e).to_string());
                return job.snapshot();
            }
        };
        if tree.is_empty() {
            let _ = job.fail(PipelineError::NoSourceFiles.to_string());
            return job.snapshot();
        }
        job.stage_complete(Stage::Ingestion);

        if self.cancelled(job, cancel) {
            return job.snapshot();
        }

        // Stage 2: extraction. Per-file failures are warnings.
        let extractor = CallExtractor::new(&self.ctx.config);
        let extraction = extractor.extract(&tree);
        job.warn_all(extraction.warnings.iter().cloned());
        job.update_counts(|c| {
            c.files_parsed = extraction.files_parsed;
            c.files_skipped = extraction.files_skipped;
            c.calls_found = extraction.call_sites.len();
            c.calls_unattributed = extraction.unattributed;
        });
        job.stage_complete(Stage::Extraction);
        debug!(
            job = %job.id(),
            calls = extraction.call_sites.len(),
            "extraction finished"
        );

        if self.cancelled(job, cancel) {
            return job.snapshot();
        }

        // Stage 3: resolution. Inference exhaustion degrades, never fails.
        let known_services = self.ctx.directory.snapshot().await;
        let resolver = NameResolver::new(self.ctx.inference.clone(), self.ctx.config.clone());
        let resolution = {
            let job = job.clone();
            resolver
                .resolve_all(&extraction.call_sites, &known_services, &move |f| {
                    job.stage_fraction(Stage::Resolution, f)
                })
                .await
        };
        job.warn_all(resolution.warnings.iter().cloned());
        job.update_counts(|c| {
            c.resolved_deterministic = resolution.deterministic;
            c.resolved_inferred = resolution.inferred;
            c.unresolved = resolution.unresolved;
        });
        job.stage_complete(Stage::Resolution);

        if self.cancelled(job, cancel) {
            return job.snapshot();
        }

        // Stage 4: projection. Fatal once the write retry budget runs out.
        let projector = GraphProjector::new(self.ctx.graph.clone(), &self.ctx.config);
        match projector
            .project(&resolution.dependencies, self.ctx.load_mode)
            .await
        {
            Ok(summary) => {
                job.update_counts(|c| {
                    c.nodes_written = summary.nodes_written;
                    c.edges_written = summary.edges_written;
                });
                // The projection fraction is left to `complete()`, which pins
                // progress to 100; no RUNNING update ever reports 100.
            }
            Err(e) => {
                let _ = job.fail(PipelineError::Graph(e).to_string());
                return job.snapshot();
            }
        }

        if job.complete().is_ok() {
            info!(
                job = %job.id(),
                elapsed_ms = start.elapsed().as_millis(),
                "analysis complete"
            );
        }
        job.snapshot()
    }

    /// Stage-boundary cancellation check.
    fn cancelled(&self, job: &JobHandle, cancel: &CancelToken) -> bool {
        if !cancel.is_cancelled() {
            return false;
        }
        info!(job = %job.id(), "cancellation requested; stopping at stage boundary");
        let _ = job.cancel();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalyzerConfig;
    use crate::graph::{InMemoryGraphStore, LoadMode};
    use crate::job::{JobStatus, NoOpTracker};
    use crate::llm::MockInferenceClient;
    use crate::resolve::StaticServiceDirectory;
    use crate::source::{SourceProvider, SourceTree};
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::time::Duration;

    struct FixedSource(SourceTree);

    #[async_trait]
    impl SourceProvider for FixedSource {
        async fn fetch(&self) -> Result<SourceTree, crate::error::IngestionError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl SourceProvider for FailingSource {
        async fn fetch(&self) -> Result<SourceTree, crate::error::IngestionError> {
            Err(crate::error::IngestionError::Other(
                "clone failed".to_string(),
            ))
        }
    }

    fn context(source: Arc<dyn SourceProvider>, known: Vec<String>) -> AnalysisContext {
        let config = AnalyzerConfig::default()
            .with_inference_backoff(Duration::from_millis(1))
            .with_inference_timeout(Duration::from_millis(200));
        AnalysisContext::new(
            source,
            Arc::new(StaticServiceDirectory::new(known)),
            Arc::new(MockInferenceClient::new()),
            Arc::new(InMemoryGraphStore::new()),
            config,
        )
    }

    #[tokio::test]
    async fn test_ingestion_failure_fails_job() {
        let controller = PipelineController::new(context(Arc::new(FailingSource), vec![]));
        let job = JobHandle::new(Arc::new(NoOpTracker));

        let snapshot = controller.run(&job, &CancelToken::new()).await;

        assert_eq!(snapshot.status, JobStatus::Failed);
        assert!(snapshot.error.as_deref().unwrap_or("").contains("ingestion"));
    }

    #[tokio::test]
    async fn test_empty_tree_fails_job() {
        let tree = SourceTree::from_pairs::<&str, &str>("/repo", vec![]);
        let controller = PipelineController::new(context(Arc::new(FixedSource(tree)), vec![]));
        let job = JobHandle::new(Arc::new(NoOpTracker));

        let snapshot = controller.run(&job, &CancelToken::new()).await;

        assert_eq!(snapshot.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_pre_cancelled_job_stops_after_first_stage() {
        let tree = SourceTree::from_pairs(
            "/repo",
            vec![("svc/a.py", r#"requests.get("http://billing.internal/x")"#)],
        );
        let controller = PipelineController::new(context(
            Arc::new(FixedSource(tree)),
            vec!["billing".to_string()],
        ));
        let job = JobHandle::new(Arc::new(NoOpTracker));
        let cancel = CancelToken::new();
        cancel.cancel();

        let snapshot = controller.run(&job, &cancel).await;

        assert_eq!(snapshot.status, JobStatus::Cancelled);
        // Ingestion ran to completion before the boundary check.
        assert!(snapshot.progress >= 10.0);
        assert!(snapshot.progress < 100.0);
    }

    #[tokio::test]
    async fn test_happy_path_completes() {
        let tree = SourceTree::from_pairs(
            "/repo",
            vec![(
                "orders/app.py",
                r#"requests.post("http://billing.internal/api/charge")"#,
            )],
        );
        let controller = PipelineController::new(context(
            Arc::new(FixedSource(tree)),
            vec!["billing".to_string()],
        ));
        let job = JobHandle::new(Arc::new(NoOpTracker));

        let snapshot = controller.run(&job, &CancelToken::new()).await;

        assert_eq!(snapshot.status, JobStatus::Completed);
        assert_eq!(snapshot.progress, 100.0);
        assert_eq!(snapshot.counts.calls_found, 1);
        assert_eq!(snapshot.counts.resolved_deterministic, 1);
        assert_eq!(snapshot.counts.nodes_written, 2);
        assert_eq!(snapshot.counts.edges_written, 1);
    }

    #[tokio::test]
    async fn test_graph_failure_exhausts_and_fails() {
        let tree = SourceTree::from_pairs(
            "/repo",
            vec![(
                "orders/app.py",
                r#"requests.post("http://billing.internal/api/charge")"#,
            )],
        );
        let store = Arc::new(InMemoryGraphStore::new());
        store.fail_next_writes(100);

        let config = AnalyzerConfig::default()
            .with_graph_write_backoff(Duration::from_millis(1))
            .with_inference_timeout(Duration::from_millis(100));
        let ctx = AnalysisContext::new(
            Arc::new(FixedSource(tree)),
            Arc::new(StaticServiceDirectory::new(vec!["billing".to_string()])),
            Arc::new(MockInferenceClient::new()),
            store,
            config,
        )
        .with_load_mode(LoadMode::Merge);

        let job = JobHandle::new(Arc::new(NoOpTracker));
        let snapshot = PipelineController::new(ctx)
            .run(&job, &CancelToken::new())
            .await;

        assert_eq!(snapshot.status, JobStatus::Failed);
        assert!(snapshot.error.is_some());
    }
}
