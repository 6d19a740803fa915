//! Error types for desk-ai

use thiserror::Error;

/// Result type alias using desk-ai Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur when calling a model-side collaborator
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// API returned an error response
    #[error("API error: {message} (type: {error_type})")]
    Api { error_type: String, message: String },

    /// Rate limit exceeded
    #[error("Rate limited: retry after {retry_after:?} seconds")]
    RateLimited { retry_after: Option<u64> },

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Invalid API key
    #[error("Invalid or missing API key")]
    InvalidApiKey,

    /// The collaborator did not answer in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Unexpected response format
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Output did not satisfy the collaborator contract
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Create an API error from type and message
    pub fn api(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            error_type: error_type.into(),
            message: message.into(),
        }
    }

    /// Check if this error is transient and worth retrying.
    ///
    /// Validation-class failures are never retryable, even when their message
    /// happens to mention a transient condition.
    pub fn is_retryable(&self) -> bool {
        if self.is_validation() {
            return false;
        }
        match self {
            Error::RateLimited { .. } | Error::Timeout(_) => true,
            Error::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            Error::Api { error_type, message } => {
                is_transient_message(error_type) || is_transient_message(message)
            }
            _ => false,
        }
    }

    /// Check if this error resembles a validation or permission failure
    pub fn is_validation(&self) -> bool {
        match self {
            Error::Validation(_)
            | Error::Auth(_)
            | Error::InvalidApiKey
            | Error::InvalidConfig(_)
            | Error::Json(_) => true,
            Error::Api { error_type, message } => {
                is_validation_message(error_type) || is_validation_message(message)
            }
            _ => false,
        }
    }
}

/// Check if an error message describes a transient condition
pub fn is_transient_message(message: &str) -> bool {
    let msg = message.to_lowercase();
    [
        "timeout",
        "timed out",
        "rate limit",
        "rate_limit",
        "too many requests",
        "429",
        "500",
        "502",
        "503",
        "504",
        "connection",
        "server error",
        "overloaded",
    ]
    .iter()
    .any(|needle| msg.contains(needle))
}

/// Check if an error message describes a validation or permission problem
pub fn is_validation_message(message: &str) -> bool {
    let msg = message.to_lowercase();
    ["validation", "invalid", "bad request", "400", "permission"]
        .iter()
        .any(|needle| msg.contains(needle))
}
