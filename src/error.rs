//! Error types for the rate limiter.

use axum::http::StatusCode;
use thiserror::Error;

use crate::ratelimit::ValidationError;
use crate::store::StoreError;

/// Main error type for rate limiter operations.
#[derive(Error, Debug)]
pub enum LimitError {
    /// The shared store failed
    #[error("shared store error: {0}")]
    Store(#[from] StoreError),

    /// No configuration document exists in the shared store
    #[error("rate limit configuration not found under key {key:?}")]
    ConfigMissing { key: String },

    /// Loading the configuration for a decision or admin read failed
    #[error("failed to load rate limit configuration: {0}")]
    ConfigLoad(#[source] Box<LimitError>),

    /// A configuration document or admin body could not be decoded
    #[error("invalid JSON document: {0}")]
    Decode(#[from] serde_json::Error),

    /// A configuration document failed validation
    #[error("invalid rate limit configuration: {0}")]
    Validation(#[from] ValidationError),

    /// A stored counter is not a decimal integer
    #[error("counter {key:?} holds a non-integer value {value:?}")]
    InvalidCounter { key: String, value: String },

    /// The TTL could not be attached to a freshly incremented counter
    #[error("expire was not applied to counter {key:?}")]
    ExpireNotApplied { key: String },

    /// The request exceeded its effective limit
    #[error("allowed amount of API calls exceeded")]
    LimitExceeded,

    /// The limiter has not been constructed yet
    #[error("rate limiter not initialised")]
    NotInitialized,

    /// The limiter was built without a responder
    #[error("a responder is required to build the rate limiter")]
    MissingResponder,

    /// Service configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LimitError {
    /// HTTP status reported when this error reaches a client.
    pub fn status(&self) -> StatusCode {
        match self {
            LimitError::Decode(_) | LimitError::Validation(_) => StatusCode::BAD_REQUEST,
            LimitError::LimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Result type alias for rate limiter operations.
pub type Result<T> = std::result::Result<T, LimitError>;
