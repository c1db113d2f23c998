//! Refinement scan endpoints

use super::{ApiError, ApiResult, AppState};
use crate::refinement::{self, publisher, PatternCluster};
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const DEFAULT_SOUL_SLUG: &str = "kai-soul";

#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    /// RFC3339 timestamp; only patterns created at or after it are scanned
    #[serde(default)]
    pub since: Option<String>,
    /// Target soul slug for published proposals
    #[serde(default)]
    pub soul_slug: Option<String>,
    /// Cosine similarity threshold
    #[serde(default)]
    pub threshold: Option<f64>,
    /// Report clusters without publishing proposals
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
pub struct ScanResponse {
    pub clusters: Vec<PatternCluster>,
    pub count: usize,
    pub dry_run: bool,
}

/// POST /api/v1/refinements/scan
pub async fn scan(
    State(state): State<AppState>,
    Json(req): Json<ScanRequest>,
) -> ApiResult<Json<ScanResponse>> {
    let clusters = perform_scan(&state, &req).await?;

    if !req.dry_run && !clusters.is_empty() {
        let soul_slug = req.soul_slug.as_deref().unwrap_or(DEFAULT_SOUL_SLUG);
        match &state.bus {
            Some(bus) => {
                for cluster in &clusters {
                    // Publish failures degrade to warnings; the scan result
                    // is still returned.
                    if let Err(e) =
                        publisher::publish_refinement_proposal(bus, cluster, soul_slug).await
                    {
                        tracing::warn!(
                            pattern_type = %cluster.pattern_type,
                            cluster_size = cluster.count,
                            error = %e,
                            "failed to publish refinement proposal"
                        );
                    }
                }
            }
            None => tracing::warn!("no bus connected, refinement proposals not published"),
        }
    }

    Ok(Json(ScanResponse {
        count: clusters.len(),
        dry_run: req.dry_run,
        clusters,
    }))
}

/// GET /api/v1/refinements/scan — always a dry run.
pub async fn scan_dry_run(
    State(state): State<AppState>,
    Query(mut req): Query<ScanRequest>,
) -> ApiResult<Json<ScanResponse>> {
    req.dry_run = true;

    let clusters = perform_scan(&state, &req).await?;
    Ok(Json(ScanResponse {
        count: clusters.len(),
        dry_run: true,
        clusters,
    }))
}

async fn perform_scan(state: &AppState, req: &ScanRequest) -> ApiResult<Vec<PatternCluster>> {
    let since = match &req.since {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| ApiError::BadRequest(format!("invalid since timestamp: {e}")))?,
        ),
        None => None,
    };

    let threshold = req.threshold.unwrap_or(refinement::DEFAULT_THRESHOLD);

    refinement::find_clusters(&state.db, since, threshold)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "refinement scan failed");
            ApiError::Internal(format!("scan failed: {e}"))
        })
}
