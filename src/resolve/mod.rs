//! Name Resolver: turns call sites into resolved dependencies.
//!
//! Resolution never fails past this boundary. Every attributed call site
//! yields exactly one [`ResolvedDependency`]; when both the deterministic
//! match and the inference fallback come up empty the dependency degrades
//! to [`ResolutionMethod::Unresolved`] with confidence 0.

mod directory;
pub(crate) mod matcher;

pub use directory::{ServiceDirectory, StaticServiceDirectory};
pub use matcher::normalize;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::{stream, StreamExt};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::AnalyzerConfig;
use crate::extract::{CallSite, HttpMethod};
use crate::llm::{parse_service_answer, InferenceClient, InferenceError, InferenceRequest};

/// Sentinel callee used when resolution is exhausted, so unattributed
/// external calls still appear in the graph.
pub const UNRESOLVED_SERVICE: &str = "__unresolved__";

/// How a callee identity was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionMethod {
    Deterministic,
    Inferred,
    Unresolved,
}

impl ResolutionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deterministic => "deterministic",
            Self::Inferred => "inferred",
            Self::Unresolved => "unresolved",
        }
    }
}

/// The resolved counterpart of one call site. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedDependency {
    /// Call-site identity within the run.
    pub file: PathBuf,
    pub line: usize,
    pub caller: String,
    pub callee: String,
    pub http_method: HttpMethod,
    pub url: String,
    /// Trustworthiness of this edge, always in [0,1].
    pub confidence: f32,
    pub method: ResolutionMethod,
    /// Model identifier, set only on inferred resolutions.
    pub model: Option<String>,
    /// Raw model output, set only on inferred resolutions.
    pub raw_response: Option<String>,
}

/// Result of resolving a call-site sequence.
#[derive(Debug, Default)]
pub struct ResolutionReport {
    pub dependencies: Vec<ResolvedDependency>,
    pub deterministic: usize,
    pub inferred: usize,
    pub unresolved: usize,
    pub warnings: Vec<String>,
}

/// Shared outcome for one unique (method, URL) key.
#[derive(Debug, Clone)]
enum KeyOutcome {
    Deterministic {
        service: String,
    },
    Inferred {
        service: String,
        confidence: f32,
        model: String,
        raw: String,
    },
    Unresolved,
}

pub struct NameResolver {
    client: Arc<dyn InferenceClient>,
    config: AnalyzerConfig,
}

impl NameResolver {
    pub fn new(client: Arc<dyn InferenceClient>, config: AnalyzerConfig) -> Self {
        Self { client, config }
    }

    /// Resolves every attributed call site against the directory snapshot.
    ///
    /// Call sites sharing a (method, resolved URL) key share one outcome;
    /// inference for distinct keys runs under the configured concurrency
    /// limit. `progress` receives the stage completion fraction in [0,1].
    pub async fn resolve_all(
        &self,
        sites: &[CallSite],
        known_services: &[String],
        progress: &(dyn Fn(f32) + Send + Sync),
    ) -> ResolutionReport {
        let mut report = ResolutionReport::default();

        let attributed: Vec<&CallSite> = sites.iter().filter(|s| s.is_attributed()).collect();
        if attributed.is_empty() {
            progress(1.0);
            return report;
        }

        // Unique keys in first-seen order; the first caller provides prompt
        // context for the shared inference.
        let mut keys: Vec<(HttpMethod, String)> = Vec::new();
        let mut first_caller: HashMap<(HttpMethod, String), String> = HashMap::new();
        for site in &attributed {
            let key = (site.method, site.url.clone());
            if !first_caller.contains_key(&key) {
                keys.push(key.clone());
                first_caller.insert(key, site.caller.clone());
            }
        }

        let total_keys = keys.len();
        let mut outcomes: HashMap<(HttpMethod, String), KeyOutcome> = HashMap::new();
        let mut pending: Vec<(HttpMethod, String)> = Vec::new();

        for key in keys {
            match matcher::best_match(known_services, &key.1, self.config.match_threshold) {
                Some(service) => {
                    debug!(url = %key.1, %service, "deterministic match");
                    outcomes.insert(key, KeyOutcome::Deterministic { service });
                }
                None => pending.push(key),
            }
        }

        let mut completed = total_keys - pending.len();
        progress(completed as f32 / total_keys as f32);

        // Bounded-concurrency inference over the keys the directory could
        // not settle.
        let mut inferences = stream::iter(pending.into_iter().map(|key| {
            let caller = first_caller.get(&key).cloned().unwrap_or_default();
            async move {
                let (outcome, warning) = self.infer_key(&key.0, &key.1, &caller).await;
                (key, outcome, warning)
            }
        }))
        .buffer_unordered(self.config.inference_concurrency);

        while let Some((key, outcome, warning)) = inferences.next().await {
            outcomes.insert(key, outcome);
            if let Some(warning) = warning {
                report.warnings.push(warning);
            }
            completed += 1;
            progress(completed as f32 / total_keys as f32);
        }

        // Map call sites to their shared outcomes in extraction order.
        for site in attributed {
            let key = (site.method, site.url.clone());
            let outcome = outcomes.get(&key).cloned().unwrap_or(KeyOutcome::Unresolved);
            let dependency = self.to_dependency(
                site,
                outcome,
                &mut report.deterministic,
                &mut report.inferred,
                &mut report.unresolved,
            );
            report.dependencies.push(dependency);
        }

        progress(1.0);
        report
    }

    fn to_dependency(
        &self,
        site: &CallSite,
        outcome: KeyOutcome,
        deterministic: &mut usize,
        inferred: &mut usize,
        unresolved: &mut usize,
    ) -> ResolvedDependency {
        let (callee, confidence, method, model, raw) = match outcome {
            KeyOutcome::Deterministic { service } => {
                *deterministic += 1;
                (service, 1.0, ResolutionMethod::Deterministic, None, None)
            }
            KeyOutcome::Inferred {
                service,
                confidence,
                model,
                raw,
            } => {
                *inferred += 1;
                (
                    service,
                    confidence,
                    ResolutionMethod::Inferred,
                    Some(model),
                    Some(raw),
                )
            }
            KeyOutcome::Unresolved => {
                *unresolved += 1;
                (
                    UNRESOLVED_SERVICE.to_string(),
                    0.0,
                    ResolutionMethod::Unresolved,
                    None,
                    None,
                )
            }
        };

        ResolvedDependency {
            file: site.file.clone(),
            line: site.line,
            caller: site.caller.clone(),
            callee,
            http_method: site.method,
            url: site.url.clone(),
            confidence: confidence.clamp(0.0, 1.0),
            method,
            model,
            raw_response: raw,
        }
    }

    /// One inference with the full retry budget. Returns the outcome plus a
    /// warning when the budget is exhausted.
    async fn infer_key(
        &self,
        method: &HttpMethod,
        url: &str,
        caller: &str,
    ) -> (KeyOutcome, Option<String>) {
        let prompt = self.build_prompt(method, url, caller);
        let mut last_failure: Option<InferenceError> = None;

        for attempt in 1..=self.config.max_inference_attempts {
            if attempt > 1 {
                let backoff = self.config.inference_backoff * 2u32.pow(attempt - 2);
                tokio::time::sleep(backoff).await;
            }

            let request = InferenceRequest::new(prompt.clone());
            let attempt_result = tokio::time::timeout(
                self.config.inference_timeout,
                self.client.infer(request),
            )
            .await;

            let failure = match attempt_result {
                Err(_) => InferenceError::Timeout {
                    seconds: self.config.inference_timeout.as_secs(),
                },
                Ok(Err(e)) => e,
                Ok(Ok(response)) => match parse_service_answer(&response.text) {
                    Ok(answer) => {
                        let confidence =
                            self.combined_confidence(answer.confidence, &answer.service, url);
                        return (
                            KeyOutcome::Inferred {
                                service: answer.service,
                                confidence,
                                model: response.model,
                                raw: response.text,
                            },
                            None,
                        );
                    }
                    Err(parse_err) => InferenceError::Malformed {
                        message: parse_err.to_string(),
                        raw: Some(response.text),
                    },
                },
            };

            debug!(
                %url,
                attempt,
                max_attempts = self.config.max_inference_attempts,
                failure = %failure,
                "inference attempt failed"
            );
            last_failure = Some(failure);
        }

        let detail = last_failure
            .map(|e| e.to_string())
            .unwrap_or_else(|| "unknown failure".to_string());
        warn!(%url, "inference retries exhausted");
        (
            KeyOutcome::Unresolved,
            Some(format!(
                "inference exhausted after {} attempts for {} {}: {}",
                self.config.max_inference_attempts, method, url, detail
            )),
        )
    }

    fn build_prompt(&self, method: &HttpMethod, url: &str, caller: &str) -> String {
        let mut url = url.to_string();
        // Keep the prompt bounded no matter what the extractor produced.
        let max_url = self.config.max_prompt_chars.saturating_sub(256);
        if url.len() > max_url {
            url.truncate(max_url);
        }

        format!(
            "The service \"{caller}\" makes an HTTP {method} request to the URL {url}.\n\
             Which internal service is most likely being called?\n\
             Answer with a single JSON object and nothing else, for example:\n\
             {{\"service\": \"payment_gateway\", \"confidence\": 0.9}}"
        )
    }

    fn combined_confidence(&self, model_confidence: Option<f32>, service: &str, url: &str) -> f32 {
        let model_confidence = model_confidence.unwrap_or(self.config.default_model_confidence);
        let overlap = matcher::token_overlap(service, url) as f32;
        (self.config.model_weight * model_confidence + self.config.overlap_weight * overlap)
            .clamp(0.0, 1.0)
    }
}
