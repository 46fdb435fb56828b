//! HTTP surface: decision middleware, responder plumbing and admin routes.

pub mod admin;
pub mod middleware;
pub mod responder;

use axum::body::Body;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::LimitError;

pub use admin::{admin_router, EnabledToggle};
pub use middleware::{RateLimitLayer, RateLimitService, HEADER_LIMIT, HEADER_REMAINING};
pub use responder::{EnvelopeResponder, Rejection, Responder};

/// Content type of every JSON body written by this crate.
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Error body returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub error: String,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Serialize `body` as JSON with the given status.
pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response {
    let (status, bytes) = match serde_json::to_vec(body) {
        Ok(bytes) => (status, bytes),
        Err(e) => {
            error!(error = %e, "Failed to encode response body");
            let fallback = br#"{"error":"failed to encode response"}"#.to_vec();
            (StatusCode::INTERNAL_SERVER_ERROR, fallback)
        }
    };

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    response
}

impl IntoResponse for LimitError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        } else {
            warn!(error = %self, status = %status, "Request rejected");
        }
        json_response(status, &ErrorEnvelope::new(self.to_string()))
    }
}
