//! Collaborator contracts and their implementations

pub mod openai;

use crate::{AnswerRequest, Classification, Embedding, Result, SplitTask};
use async_trait::async_trait;

/// Assigns an intent and service type to a piece of text
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification>;
}

/// Splits one utterance into typed sub-tasks
#[async_trait]
pub trait TaskDecomposer: Send + Sync {
    /// Must return at least one task on success
    async fn split(&self, text: &str) -> Result<Vec<SplitTask>>;
}

/// Produces free-form answer text
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    async fn answer(&self, request: &AnswerRequest) -> Result<String>;
}

/// Turns text into a fixed-dimension vector
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Embedding>;
}

/// Get an API key from a provided value or the first set environment variable
pub fn get_api_key(provided: Option<&str>, env_vars: &[&str]) -> Result<String> {
    if let Some(key) = provided.filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }

    env_vars
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .ok_or(crate::Error::InvalidApiKey)
}
