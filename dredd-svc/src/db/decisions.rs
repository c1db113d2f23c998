//! Decision episode persistence
//!
//! A decision episode spans five relations; the write is a single
//! transaction so a partial episode is never visible.

use crate::models::DecisionEpisode;
use dredd_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Writes a full decision episode across the decision tables.
/// Tables: decisions, decision_context, decision_options, decision_reasoning,
/// decision_tags.
pub async fn write_decision_episode(
    pool: &PgPool,
    owner_uuid: Uuid,
    session_ref: &str,
    source: &str,
    ep: &DecisionEpisode,
    embedding: Option<&[f32]>,
) -> Result<Uuid> {
    let mut tx = pool.begin().await?;

    let decision_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO decisions (id, domain, category, severity, source, source_channel, decided_by, summary, session_ref, embedding, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::vector, now())
        "#,
    )
    .bind(decision_id)
    .bind(&ep.domain)
    .bind(&ep.category)
    .bind(&ep.severity)
    .bind(source)
    .bind(source)
    .bind(owner_uuid.to_string())
    .bind(&ep.summary)
    .bind(session_ref)
    .bind(embedding.map(super::pg_vector))
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO decision_context (id, decision_id, situation_text)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(decision_id)
    .bind(&ep.situation_text)
    .execute(&mut *tx)
    .await?;

    for opt in &ep.options {
        sqlx::query(
            r#"
            INSERT INTO decision_options (id, decision_id, option_key, option_label, pro_signals, con_signals, was_chosen)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(decision_id)
        .bind(&opt.option_key)
        .bind(&opt.option_key)
        .bind(serde_json::json!(opt.pro_signals))
        .bind(serde_json::json!(opt.con_signals))
        .bind(opt.was_chosen)
        .execute(&mut *tx)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO decision_reasoning (id, decision_id, factors, tradeoffs, reasoning_text)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(decision_id)
    .bind(serde_json::json!(ep.reasoning.factors))
    .bind(serde_json::json!(ep.reasoning.tradeoffs))
    .bind(&ep.reasoning.reasoning_text)
    .execute(&mut *tx)
    .await?;

    // Composite PK on (decision_id, tag); re-inserting a tag is a no-op.
    for tag in &ep.tags {
        sqlx::query(
            r#"
            INSERT INTO decision_tags (decision_id, tag, added_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (decision_id, tag) DO NOTHING
            "#,
        )
        .bind(decision_id)
        .bind(tag)
        .bind(source)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    Ok(decision_id)
}

/// Updates the review status of a decision.
pub async fn update_decision_review_status(
    pool: &PgPool,
    decision_id: Uuid,
    status: &str,
    note: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE decisions SET review_status = $1, review_note = $2, reviewed_at = now()
        WHERE id = $3
        "#,
    )
    .bind(status)
    .bind(note)
    .bind(decision_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Finds the most recent gate decision captured for a backlog item.
pub async fn find_gate_decision(pool: &PgPool, session_ref: &str) -> Result<Option<Uuid>> {
    let id = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT id FROM decisions
        WHERE session_ref = $1 AND domain = 'gate'
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(session_ref)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

/// Adds a tag to an existing decision (idempotent).
pub async fn add_decision_tag(
    pool: &PgPool,
    decision_id: Uuid,
    tag: &str,
    added_by: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO decision_tags (decision_id, tag, added_by)
        VALUES ($1, $2, $3)
        ON CONFLICT (decision_id, tag) DO NOTHING
        "#,
    )
    .bind(decision_id)
    .bind(tag)
    .bind(added_by)
    .execute(pool)
    .await?;
    Ok(())
}
