//! Inference collaborator: the LLM fallback used when deterministic
//! matching cannot name a callee service.

mod client;
mod mock;
mod ollama;
mod response;
mod types;

pub use client::{InferenceClient, InferenceError};
pub use mock::MockInferenceClient;
pub use ollama::OllamaClient;
pub use response::{parse_service_answer, AnswerParseError, ServiceAnswer};
pub use types::{InferenceRequest, InferenceResponse};
