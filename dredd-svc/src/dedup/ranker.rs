//! Survivor selection
//!
//! Each duplicate cluster keeps exactly one record. Priority: review status
//! first (a confirmed record always beats a pending or rejected one), then a
//! type-specific tiebreak, then recency.

use chrono::{DateTime, Utc};
use dredd_common::{Error, Result};
use sqlx::PgPool;
use uuid::Uuid;

/// Ranking view of a reasoning pattern.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PatternRank {
    pub id: Uuid,
    pub review_status: String,
    pub dredd_confidence: f64,
    pub created_at: DateTime<Utc>,
}

/// Ranking view of a decision.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DecisionRank {
    pub id: Uuid,
    pub review_status: String,
    pub severity: String,
    pub created_at: DateTime<Utc>,
}

/// Picks the survivor from a cluster of reasoning pattern ids.
pub async fn rank_patterns(pool: &PgPool, ids: &[Uuid]) -> Result<Uuid> {
    if ids.is_empty() {
        return Err(Error::InvalidInput("empty cluster".to_string()));
    }
    if ids.len() == 1 {
        return Ok(ids[0]);
    }

    let records = sqlx::query_as::<_, PatternRank>(
        r#"
        SELECT id, review_status, dredd_confidence, created_at
        FROM reasoning_patterns
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    best_pattern(&records)
        .map(|r| r.id)
        .ok_or_else(|| Error::NotFound("no records found for cluster".to_string()))
}

/// Picks the survivor from a cluster of decision ids.
pub async fn rank_decisions(pool: &PgPool, ids: &[Uuid]) -> Result<Uuid> {
    if ids.is_empty() {
        return Err(Error::InvalidInput("empty cluster".to_string()));
    }
    if ids.len() == 1 {
        return Ok(ids[0]);
    }

    let records = sqlx::query_as::<_, DecisionRank>(
        r#"
        SELECT id, review_status, severity, created_at
        FROM decisions
        WHERE id = ANY($1)
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    best_decision(&records)
        .map(|r| r.id)
        .ok_or_else(|| Error::NotFound("no records found for cluster".to_string()))
}

fn best_pattern(records: &[PatternRank]) -> Option<&PatternRank> {
    records.iter().reduce(|best, candidate| {
        if pattern_beats(candidate, best) {
            candidate
        } else {
            best
        }
    })
}

fn best_decision(records: &[DecisionRank]) -> Option<&DecisionRank> {
    records.iter().reduce(|best, candidate| {
        if decision_beats(candidate, best) {
            candidate
        } else {
            best
        }
    })
}

fn pattern_beats(a: &PatternRank, b: &PatternRank) -> bool {
    let (sa, sb) = (
        review_status_priority(&a.review_status),
        review_status_priority(&b.review_status),
    );
    if sa != sb {
        return sa > sb;
    }
    if a.dredd_confidence != b.dredd_confidence {
        return a.dredd_confidence > b.dredd_confidence;
    }
    a.created_at > b.created_at
}

fn decision_beats(a: &DecisionRank, b: &DecisionRank) -> bool {
    let (sa, sb) = (
        review_status_priority(&a.review_status),
        review_status_priority(&b.review_status),
    );
    if sa != sb {
        return sa > sb;
    }
    let (va, vb) = (severity_priority(&a.severity), severity_priority(&b.severity));
    if va != vb {
        return va > vb;
    }
    a.created_at > b.created_at
}

fn review_status_priority(status: &str) -> u8 {
    match status {
        "confirmed" => 3,
        "pending" => 2,
        "rejected" => 1,
        _ => 0,
    }
}

fn severity_priority(severity: &str) -> u8 {
    match severity {
        "critical" => 4,
        "high" => 3,
        "medium" => 2,
        "low" => 1,
        _ => 0,
    }
}
