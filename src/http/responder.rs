//! Rendering of rejections and internal errors.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;

use super::{json_response, ErrorEnvelope};
use crate::error::LimitError;

/// A request the middleware refuses to pass on, with the status to report.
#[derive(Debug)]
pub struct Rejection {
    pub status: StatusCode,
    pub error: LimitError,
}

impl Rejection {
    pub fn new(status: StatusCode, error: LimitError) -> Self {
        Self { status, error }
    }

    /// The request exceeded its limit.
    pub fn limit_exceeded() -> Self {
        Self::new(StatusCode::TOO_MANY_REQUESTS, LimitError::LimitExceeded)
    }

    /// The decision could not be made.
    pub fn internal(error: LimitError) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

/// Renders rejections in the embedding application's style.
///
/// Implemented for any `Fn(Rejection, &Request<Body>) -> Response`, so a
/// closure can be passed where a responder is expected.
pub trait Responder: Send + Sync {
    fn respond(&self, rejection: Rejection, request: &Request<Body>) -> Response;
}

impl<F> Responder for F
where
    F: Fn(Rejection, &Request<Body>) -> Response + Send + Sync,
{
    fn respond(&self, rejection: Rejection, request: &Request<Body>) -> Response {
        self(rejection, request)
    }
}

/// Writes the rejection as `{"error": "<message>"}` with its status.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvelopeResponder;

impl Responder for EnvelopeResponder {
    fn respond(&self, rejection: Rejection, _request: &Request<Body>) -> Response {
        json_response(rejection.status, &ErrorEnvelope::new(rejection.error.to_string()))
    }
}
