//! Analysis context: every long-lived collaborator the pipeline needs,
//! passed explicitly instead of living in module state.

use std::sync::Arc;

use crate::config::AnalyzerConfig;
use crate::graph::{GraphStore, LoadMode};
use crate::llm::InferenceClient;
use crate::resolve::ServiceDirectory;
use crate::source::SourceProvider;

pub struct AnalysisContext {
    pub source: Arc<dyn SourceProvider>,
    pub directory: Arc<dyn ServiceDirectory>,
    pub inference: Arc<dyn InferenceClient>,
    pub graph: Arc<dyn GraphStore>,
    pub config: AnalyzerConfig,
    pub load_mode: LoadMode,
}

impl AnalysisContext {
    pub fn new(
        source: Arc<dyn SourceProvider>,
        directory: Arc<dyn ServiceDirectory>,
        inference: Arc<dyn InferenceClient>,
        graph: Arc<dyn GraphStore>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            source,
            directory,
            inference,
            graph,
            config,
            load_mode: LoadMode::Merge,
        }
    }

    pub fn with_load_mode(mut self, mode: LoadMode) -> Self {
        self.load_mode = mode;
        self
    }
}
