//! Admin endpoints for reading and writing the rate limit configuration.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Response;
use axum::routing::{get, patch};
use axum::Router;
use serde::{Deserialize, Serialize};

use super::json_response;
use crate::error::LimitError;
use crate::ratelimit::{LimiterSlot, RateLimitConfig};

/// Body and response of the enable toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnabledToggle {
    pub enabled: bool,
}

/// Routes relative to the admin prefix:
///
/// - `GET /config`: current configuration document
/// - `PUT /config`: replace the configuration document
/// - `PATCH /enabled`: flip the master switch
/// - `GET /health`: health of the background refresher
pub fn admin_router(slot: LimiterSlot) -> Router {
    Router::new()
        .route("/config", get(get_config).put(replace_config))
        .route("/enabled", patch(set_enabled))
        .route("/health", get(refresh_health))
        .with_state(slot)
}

async fn get_config(State(slot): State<LimiterSlot>) -> Result<Response, LimitError> {
    let limiter = slot.get()?;
    let config = limiter.current_config().await?;
    Ok(json_response(StatusCode::OK, config.document()))
}

async fn replace_config(State(slot): State<LimiterSlot>, body: Bytes) -> Result<Response, LimitError> {
    let limiter = slot.get()?;
    let document: RateLimitConfig = serde_json::from_slice(&body)?;
    let stored = limiter.replace_config(document).await?;
    Ok(json_response(StatusCode::OK, &stored))
}

async fn set_enabled(State(slot): State<LimiterSlot>, body: Bytes) -> Result<Response, LimitError> {
    let limiter = slot.get()?;
    let toggle: EnabledToggle = serde_json::from_slice(&body)?;
    let enabled = limiter.set_enabled(toggle.enabled).await?;
    Ok(json_response(StatusCode::OK, &EnabledToggle { enabled }))
}

async fn refresh_health(State(slot): State<LimiterSlot>) -> Result<Response, LimitError> {
    let limiter = slot.get()?;
    let health = limiter.refresh_health();
    let status = if health.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok(json_response(status, &health))
}
