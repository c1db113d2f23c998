//! HTTP API for Dredd
//!
//! A small admin surface: health for load balancers, a status probe, and
//! operator triggers for the dedup sweep and refinement scan. Everything
//! under `/api/v1` sits behind static bearer auth; an empty configured token
//! disables the check so the service can run open in development.

mod dedup;
mod health;
mod refinements;

use crate::bus::Bus;
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use thiserror::Error;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,
    /// Bus handle for refinement publishing; absent in tests
    pub bus: Option<Bus>,
    /// Static bearer token; empty disables auth
    pub api_token: String,
}

impl AppState {
    pub fn new(db: PgPool, bus: Option<Bus>, api_token: String) -> Self {
        Self { db, bus, api_token }
    }
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/dredd/status", get(status))
        .route("/dedup", post(dedup::run_dedup))
        .route(
            "/refinements/scan",
            post(refinements::scan).get(refinements::scan_dry_run),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            bearer_auth_middleware,
        ));

    Router::new()
        .merge(health::health_routes())
        .nest("/api/v1", protected)
        .with_state(state)
}

/// GET /api/v1/dredd/status
async fn status() -> Json<serde_json::Value> {
    // Shadow mode: signals only, no actions.
    Json(json!({"agent": "dredd", "status": "shadow"}))
}

/// Bearer auth for the `/api/v1` routes. An empty configured token allows
/// all requests.
async fn bearer_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.api_token.is_empty() {
        return Ok(next.run(request).await);
    }

    let authorized = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.api_token);

    if !authorized {
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or bad bearer token (401)
    #[error("unauthorized")]
    Unauthorized,

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({"error": message}));
        (status, body).into_response()
    }
}

impl From<dredd_common::Error> for ApiError {
    fn from(err: dredd_common::Error) -> Self {
        match err {
            dredd_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
