//! Inference collaborator trait and its failure classification.

use async_trait::async_trait;
use thiserror::Error;

use super::types::{InferenceRequest, InferenceResponse};

/// Why an inference attempt failed. Every variant is retryable; the retry
/// policy operates on these tags, not on caught panics or opaque errors.
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("inference request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("malformed inference response: {message}")]
    Malformed {
        message: String,
        raw: Option<String>,
    },

    #[error("inference backend error: {message}")]
    Backend { message: String },
}

/// A model backend that can answer a service-name prompt.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn infer(&self, request: InferenceRequest) -> Result<InferenceResponse, InferenceError>;

    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Model identifier recorded on inferred dependencies.
    fn model(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    struct TestClient;

    #[async_trait]
    impl InferenceClient for TestClient {
        async fn infer(
            &self,
            _request: InferenceRequest,
        ) -> Result<InferenceResponse, InferenceError> {
            Ok(InferenceResponse::new(
                "billing",
                "test-model",
                Duration::from_millis(1),
            ))
        }

        fn name(&self) -> &str {
            "TestClient"
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    #[tokio::test]
    async fn test_client_trait() {
        let client = TestClient;
        let response = client.infer(InferenceRequest::new("prompt")).await.unwrap();
        assert_eq!(response.text, "billing");
        assert_eq!(client.name(), "TestClient");
    }

    #[test]
    fn test_error_display() {
        let err = InferenceError::Timeout { seconds: 30 };
        assert!(err.to_string().contains("30s"));
    }
}
