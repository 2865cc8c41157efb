//! Ollama HTTP backend for service-name inference.
//!
//! Talks to a local Ollama server through its `/api/generate` endpoint.
//! Any locally pulled model works; small instruct models are enough for
//! single-token service-name answers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::client::{InferenceClient, InferenceError};
use super::types::{InferenceRequest, InferenceResponse};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Ollama client. Thread-safe; share it with `Arc`.
pub struct OllamaClient {
    endpoint: String,
    model: String,
    http_client: Client,
    timeout: Duration,
}

impl OllamaClient {
    pub fn new(endpoint: String, model: String) -> Self {
        Self::with_timeout(endpoint, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(endpoint: String, model: String, timeout: Duration) -> Self {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            endpoint,
            model,
            http_client,
            timeout,
        }
    }

    /// Lightweight reachability probe against `/api/tags`.
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/api/tags", self.endpoint);
        match self.http_client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "ollama health check failed");
                false
            }
        }
    }

    async fn generate(&self, prompt: String) -> Result<String, InferenceError> {
        let url = format!("{}/api/generate", self.endpoint);

        let request = OllamaRequest {
            model: self.model.clone(),
            prompt,
            stream: false,
            temperature: Some(0.1),
            num_predict: Some(64),
        };

        debug!(
            model = %self.model,
            prompt_chars = request.prompt.len(),
            "sending inference request to ollama"
        );

        let start = Instant::now();
        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    error!(timeout = ?self.timeout, "ollama request timed out");
                    InferenceError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    error!(error = %e, "ollama request failed");
                    InferenceError::Backend {
                        message: format!("request failed: {e}"),
                    }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%status, "ollama returned error status");
            return Err(InferenceError::Backend {
                message: format!("HTTP {status}: {body}"),
            });
        }

        let ollama_response: OllamaResponse = response.json().await.map_err(|e| {
            InferenceError::Malformed {
                message: format!("JSON parse error: {e}"),
                raw: None,
            }
        })?;

        if !ollama_response.done {
            warn!("ollama response indicates incomplete generation");
        }

        info!(
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis(),
            "ollama generation complete"
        );

        Ok(ollama_response.response)
    }
}

#[async_trait]
impl InferenceClient for OllamaClient {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        let start = Instant::now();
        let text = self.generate(request.prompt).await?;
        Ok(InferenceResponse::new(
            text,
            self.model.clone(),
            start.elapsed(),
        ))
    }

    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaResponse {
    response: String,
    done: bool,
    #[serde(default)]
    #[allow(dead_code)]
    eval_count: Option<u32>,
}
