//! Scripted inference client for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::client::{InferenceClient, InferenceError};
use super::types::{InferenceRequest, InferenceResponse};

type ScriptedResult = Result<String, InferenceError>;

/// Returns scripted responses in order; falls back to a default once the
/// queue is exhausted.
pub struct MockInferenceClient {
    responses: Mutex<VecDeque<ScriptedResult>>,
    default: Mutex<Option<ScriptedResult>>,
    calls: AtomicUsize,
    model: String,
}

impl MockInferenceClient {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            default: Mutex::new(None),
            calls: AtomicUsize::new(0),
            model: "mock-model".to_string(),
        }
    }

    pub fn add_response(&self, text: impl Into<String>) {
        self.lock_queue().push_back(Ok(text.into()));
    }

    pub fn add_error(&self, error: InferenceError) {
        self.lock_queue().push_back(Err(error));
    }

    /// Result returned whenever the scripted queue is empty.
    pub fn set_default(&self, result: ScriptedResult) {
        *self
            .default
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(result);
    }

    /// Convenience: every call (beyond any scripted ones) times out.
    pub fn always_timeout(&self) {
        self.set_default(Err(InferenceError::Timeout { seconds: 30 }));
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<ScriptedResult>> {
        self.responses.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MockInferenceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn infer(&self, _request: InferenceRequest) -> Result<InferenceResponse, InferenceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let scripted = self.lock_queue().pop_front();
        let result = match scripted {
            Some(result) => result,
            None => self
                .default
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
                .unwrap_or_else(|| {
                    Err(InferenceError::Backend {
                        message: "no scripted response".to_string(),
                    })
                }),
        };

        result.map(|text| InferenceResponse::new(text, self.model.clone(), Duration::from_millis(1)))
    }

    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        &self.model
    }
}
