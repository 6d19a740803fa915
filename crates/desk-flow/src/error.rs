//! Error types for desk-flow

use thiserror::Error;

/// Result type alias using desk-flow Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can escape the workflow engine
#[derive(Error, Debug)]
pub enum Error {
    /// An error from a model-side collaborator
    #[error(transparent)]
    Ai(#[from] desk_ai::Error),

    /// A record store failed
    #[error("Store error: {0}")]
    Store(String),

    /// A record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller-supplied input was rejected
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic engine error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if this error came from bad caller input rather than a fault
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::NotFound(_))
    }
}
