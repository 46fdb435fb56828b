//! Tower middleware enforcing a group limit in front of a handler.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::response::Response;
use futures::future::BoxFuture;
use tower::{Layer, Service};
use tracing::error;

use super::responder::Rejection;
use crate::ratelimit::{Decision, RateLimiter};

pub const HEADER_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const HEADER_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");

/// Layer produced by [`RateLimiter::check`].
#[derive(Clone)]
pub struct RateLimitLayer {
    limiter: Arc<RateLimiter>,
    group: Arc<str>,
    key: Arc<str>,
}

impl RateLimitLayer {
    pub fn new(limiter: Arc<RateLimiter>, group: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            limiter,
            group: Arc::from(group.into()),
            key: Arc::from(key.into()),
        }
    }
}

impl<S> Layer<S> for RateLimitLayer {
    type Service = RateLimitService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimitService {
            inner,
            limiter: self.limiter.clone(),
            group: self.group.clone(),
            key: self.key.clone(),
        }
    }
}

/// Service wrapping a handler with the limit of one group and key.
///
/// Denied requests and failed decisions never reach the inner service; they
/// are rendered by the limiter's responder. Admitted requests carry the
/// limit and remaining headers on their response.
#[derive(Clone)]
pub struct RateLimitService<S> {
    inner: S,
    limiter: Arc<RateLimiter>,
    group: Arc<str>,
    key: Arc<str>,
}

impl<S> Service<Request<Body>> for RateLimitService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // The clone may not be ready; keep the one that was polled.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let limiter = self.limiter.clone();
        let group = self.group.clone();
        let key = self.key.clone();

        Box::pin(async move {
            match limiter.evaluate(&group, &key).await {
                Ok(Decision::PassThrough) => inner.call(request).await,
                Ok(Decision::Admitted {
                    limit, remaining, ..
                }) => {
                    let mut response = inner.call(request).await?;
                    let headers = response.headers_mut();
                    headers.insert(HEADER_LIMIT, HeaderValue::from(limit));
                    headers.insert(HEADER_REMAINING, HeaderValue::from(remaining));
                    Ok(response)
                }
                Ok(Decision::Denied { .. }) => {
                    Ok(limiter.responder().respond(Rejection::limit_exceeded(), &request))
                }
                Err(e) => {
                    error!(group = %group, key = %key, error = %e, "Rate limit decision failed");
                    Ok(limiter.responder().respond(Rejection::internal(e), &request))
                }
            }
        })
    }
}
