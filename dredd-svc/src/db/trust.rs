//! Agent trust records
//!
//! Keyed by (agent_id, category, severity); writes upsert on that key.

use dredd_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// A stored trust record for one agent/category/severity combination.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TrustRecord {
    pub id: Uuid,
    pub agent_id: String,
    pub category: String,
    pub severity: String,
    pub trust_score: f64,
    pub total_decisions: i32,
    pub correct_decisions: i32,
    pub critical_failures: i32,
}

/// Fetches the trust record for an agent/category/severity combination.
pub async fn get_trust(
    pool: &PgPool,
    agent_id: &str,
    category: &str,
    severity: &str,
) -> Result<Option<TrustRecord>> {
    let rec = sqlx::query_as::<_, TrustRecord>(
        r#"
        SELECT id, agent_id, category, severity, trust_score, total_decisions, correct_decisions, critical_failures
        FROM agent_trust
        WHERE agent_id = $1 AND category = $2 AND severity = $3
        "#,
    )
    .bind(agent_id)
    .bind(category)
    .bind(severity)
    .fetch_optional(pool)
    .await?;
    Ok(rec)
}

/// Creates or updates a trust record.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_trust(
    pool: &PgPool,
    agent_id: &str,
    category: &str,
    severity: &str,
    score: f64,
    total: i32,
    correct: i32,
    failures: i32,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO agent_trust (id, agent_id, category, severity, trust_score, total_decisions, correct_decisions, critical_failures, last_signal_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now(), now())
        ON CONFLICT (agent_id, category, severity)
        DO UPDATE SET
            trust_score = $5,
            total_decisions = $6,
            correct_decisions = $7,
            critical_failures = $8,
            last_signal_at = now(),
            updated_at = now()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(agent_id)
    .bind(category)
    .bind(severity)
    .bind(score)
    .bind(total)
    .bind(correct)
    .bind(failures)
    .execute(pool)
    .await?;
    Ok(())
}
