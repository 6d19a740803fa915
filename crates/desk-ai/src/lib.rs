//! desk-ai: model-side collaborators for the support desk workflow
//!
//! This crate defines the classifier, task decomposer, answer generator and
//! embedder contracts, the domain vocabulary they share, and an
//! OpenAI-compatible client implementing all of them.

pub mod error;
pub mod providers;
pub mod retry;
pub mod types;

pub use error::{Error, Result};
pub use providers::{AnswerGenerator, Classifier, Embedder, TaskDecomposer};
pub use retry::{RetryConfig, Retrying};
pub use types::*;
