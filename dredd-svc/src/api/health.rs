//! Health check endpoint

use super::AppState;
use axum::{routing::get, Json, Router};
use serde_json::json;

/// GET /health
///
/// Unauthenticated, used by load balancers. Always 200; the body never
/// carries anything but the status.
async fn health_check() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
