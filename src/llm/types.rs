//! Inference request/response types, independent of any backend.

use std::time::Duration;

/// A single inference request.
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    /// Prompt text; already bounded by the resolver.
    pub prompt: String,
}

impl InferenceRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }
}

/// A raw model answer, before service-name parsing.
#[derive(Debug, Clone)]
pub struct InferenceResponse {
    /// Free text expected to contain a service name.
    pub text: String,
    /// Identifier of the model that produced the answer.
    pub model: String,
    /// Wall-clock time of the request.
    pub response_time: Duration,
}

impl InferenceResponse {
    pub fn new(text: impl Into<String>, model: impl Into<String>, response_time: Duration) -> Self {
        Self {
            text: text.into(),
            model: model.into(),
            response_time,
        }
    }
}
