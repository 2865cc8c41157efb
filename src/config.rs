//! Analyzer configuration.
//!
//! All heuristic constants (match threshold, confidence weights, retry
//! budgets) are tunable here rather than hard-coded at their use sites.

use std::time::Duration;

/// Configuration for one analysis run.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Minimum score for a deterministic directory match to be accepted.
    pub match_threshold: f64,

    /// Weight of the model's self-reported confidence when scoring an
    /// inferred resolution.
    pub model_weight: f32,

    /// Weight of the token-overlap heuristic when scoring an inferred
    /// resolution.
    pub overlap_weight: f32,

    /// Confidence assumed for a model answer that carries no self-reported
    /// confidence.
    pub default_model_confidence: f32,

    /// Maximum attempts per inference call, including the first.
    pub max_inference_attempts: u32,

    /// Base backoff between inference attempts; doubles per attempt.
    pub inference_backoff: Duration,

    /// Per-request inference timeout.
    pub inference_timeout: Duration,

    /// Maximum simultaneous in-flight inference requests.
    pub inference_concurrency: usize,

    /// Maximum prompt size in characters; longer URLs are truncated.
    pub max_prompt_chars: usize,

    /// Maximum attempts per graph write, including the first.
    pub max_graph_write_attempts: u32,

    /// Base backoff between graph write attempts; doubles per attempt.
    pub graph_write_backoff: Duration,

    /// Module names whose verb-named calls are always treated as HTTP
    /// clients (e.g. `requests.get(...)`).
    pub http_client_modules: Vec<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.85,
            model_weight: 0.7,
            overlap_weight: 0.3,
            default_model_confidence: 0.8,
            max_inference_attempts: 3,
            inference_backoff: Duration::from_millis(250),
            inference_timeout: Duration::from_secs(30),
            inference_concurrency: 4,
            max_prompt_chars: 2048,
            max_graph_write_attempts: 3,
            graph_write_backoff: Duration::from_millis(500),
            http_client_modules: vec!["requests".to_string(), "httpx".to_string()],
        }
    }
}

impl AnalyzerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_match_threshold(mut self, threshold: f64) -> Self {
        self.match_threshold = threshold;
        self
    }

    pub fn with_max_inference_attempts(mut self, attempts: u32) -> Self {
        self.max_inference_attempts = attempts;
        self
    }

    pub fn with_inference_backoff(mut self, backoff: Duration) -> Self {
        self.inference_backoff = backoff;
        self
    }

    pub fn with_inference_timeout(mut self, timeout: Duration) -> Self {
        self.inference_timeout = timeout;
        self
    }

    pub fn with_inference_concurrency(mut self, concurrency: usize) -> Self {
        self.inference_concurrency = concurrency.max(1);
        self
    }

    pub fn with_graph_write_backoff(mut self, backoff: Duration) -> Self {
        self.graph_write_backoff = backoff;
        self
    }

    pub fn with_max_graph_write_attempts(mut self, attempts: u32) -> Self {
        self.max_graph_write_attempts = attempts;
        self
    }
}
