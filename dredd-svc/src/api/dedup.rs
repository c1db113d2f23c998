//! Dedup sweep endpoint

use super::{ApiError, ApiResult, AppState};
use crate::dedup::{self, DedupReport, DedupTable};
use axum::{extract::State, Json};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct DedupRequest {
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub execute: bool,
    #[serde(default)]
    pub table: Option<String>,
}

/// POST /api/v1/dedup
///
/// Runs the sweep over one table or both. Dry-run by default; `execute`
/// tombstones the losers. Returns one report for a single table, an array
/// for "all".
pub async fn run_dedup(
    State(state): State<AppState>,
    Json(req): Json<DedupRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let threshold = req.threshold.unwrap_or(dedup::DEFAULT_THRESHOLD);
    if threshold <= 0.0 || threshold > 1.0 {
        return Err(ApiError::BadRequest(
            "threshold must be in (0.0, 1.0]".to_string(),
        ));
    }

    let table = req.table.as_deref().unwrap_or("all");
    if !matches!(table, "patterns" | "decisions" | "all") {
        return Err(ApiError::BadRequest(
            "table must be 'patterns', 'decisions', or 'all'".to_string(),
        ));
    }

    let mut reports: Vec<DedupReport> = Vec::new();

    if table == "patterns" || table == "all" {
        let report = dedup::deduplicate(&state.db, DedupTable::Patterns, threshold, req.execute)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to deduplicate reasoning patterns");
                ApiError::Internal(format!("failed to deduplicate reasoning patterns: {e}"))
            })?;
        reports.push(report);
    }

    if table == "decisions" || table == "all" {
        let report = dedup::deduplicate(&state.db, DedupTable::Decisions, threshold, req.execute)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "failed to deduplicate decisions");
                ApiError::Internal(format!("failed to deduplicate decisions: {e}"))
            })?;
        reports.push(report);
    }

    let body = if reports.len() == 1 {
        serde_json::to_value(&reports[0])
    } else {
        serde_json::to_value(&reports)
    }
    .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(body))
}
