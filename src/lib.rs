//! svcmap - static discovery of service-to-service HTTP dependencies
//!
//! This library finds implicit dependencies between services in a codebase
//! by statically extracting HTTP call sites and resolving each call's
//! destination to a named logical service, falling back to a language model
//! when deterministic matching cannot decide.
//!
//! # Core Concepts
//!
//! - **Call Extractor**: parses source files with tree-sitter and yields
//!   call-site records for HTTP client invocations, in deterministic order
//! - **Name Resolver**: matches each call against the known-service
//!   directory, then falls back to LLM inference with retry and backoff;
//!   every call site yields exactly one resolved dependency
//! - **Pipeline Controller**: drives ingestion → extraction → resolution →
//!   projection as a job state machine with monotonic progress
//! - **Graph Projector**: idempotently upserts service nodes and call
//!   edges into a graph store
//!
//! # Example Usage
//!
//! ```ignore
//! use std::sync::Arc;
//! use svcmap::config::AnalyzerConfig;
//! use svcmap::graph::InMemoryGraphStore;
//! use svcmap::job::{CancelToken, JobHandle, LoggingTracker};
//! use svcmap::llm::OllamaClient;
//! use svcmap::pipeline::{AnalysisContext, PipelineController};
//! use svcmap::resolve::StaticServiceDirectory;
//! use svcmap::source::LocalSourceProvider;
//!
//! # async fn example() {
//! let ctx = AnalysisContext::new(
//!     Arc::new(LocalSourceProvider::new("/path/to/repo")),
//!     Arc::new(StaticServiceDirectory::new(vec!["billing".into()])),
//!     Arc::new(OllamaClient::new(
//!         "http://localhost:11434".into(),
//!         "qwen2.5:3b".into(),
//!     )),
//!     Arc::new(InMemoryGraphStore::new()),
//!     AnalyzerConfig::default(),
//! );
//!
//! let job = JobHandle::new(Arc::new(LoggingTracker));
//! let snapshot = PipelineController::new(ctx)
//!     .run(&job, &CancelToken::new())
//!     .await;
//! println!("{:?}: {} edges", snapshot.status, snapshot.counts.edges_written);
//! # }
//! ```

pub mod config;
pub mod error;
pub mod extract;
pub mod graph;
pub mod job;
pub mod llm;
pub mod pipeline;
pub mod resolve;
pub mod source;

pub use config::AnalyzerConfig;
pub use extract::{CallExtractor, CallSite, HttpMethod};
pub use graph::{GraphProjector, GraphStore, InMemoryGraphStore, LoadMode};
pub use job::{CancelToken, JobHandle, JobSnapshot, JobStatus, JobTracker};
pub use llm::{InferenceClient, MockInferenceClient, OllamaClient};
pub use pipeline::{AnalysisContext, PipelineController};
pub use resolve::{
    NameResolver, ResolutionMethod, ResolvedDependency, ServiceDirectory,
    StaticServiceDirectory, UNRESOLVED_SERVICE,
};
pub use source::{LocalSourceProvider, SourceProvider, SourceTree};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
