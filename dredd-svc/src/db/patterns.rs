//! Reasoning pattern persistence

use crate::models::ReasoningPattern;
use dredd_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// A stored reasoning pattern row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PatternRow {
    pub id: Uuid,
    pub owner_uuid: Uuid,
    pub session_ref: String,
    pub pattern_type: String,
    pub summary: String,
    pub conversation_arc: String,
    pub tags: Vec<String>,
    pub dredd_confidence: f64,
    pub review_status: String,
}

/// Inserts a reasoning pattern extraction. Review status starts 'pending'.
pub async fn write_reasoning_pattern(
    pool: &PgPool,
    owner_uuid: Uuid,
    session_ref: &str,
    p: &ReasoningPattern,
    embedding: Option<&[f32]>,
) -> Result<Uuid> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO reasoning_patterns (id, owner_uuid, session_ref, pattern_type, summary, conversation_arc, tags, dredd_confidence, arc_embedding, review_status)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9::vector, 'pending')
        "#,
    )
    .bind(id)
    .bind(owner_uuid)
    .bind(session_ref)
    .bind(&p.pattern_type)
    .bind(&p.summary)
    .bind(&p.conversation_arc)
    .bind(&p.tags)
    .bind(p.confidence)
    .bind(embedding.map(super::pg_vector))
    .execute(pool)
    .await?;
    Ok(id)
}

/// Updates the review status of a reasoning pattern.
pub async fn update_pattern_review_status(
    pool: &PgPool,
    pattern_id: Uuid,
    status: &str,
    note: &str,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE reasoning_patterns SET review_status = $1, review_note = $2, reviewed_at = now()
        WHERE id = $3
        "#,
    )
    .bind(status)
    .bind(note)
    .bind(pattern_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetches a reasoning pattern by id.
pub async fn get_pattern(pool: &PgPool, id: Uuid) -> Result<PatternRow> {
    let row = sqlx::query_as::<_, PatternRow>(
        r#"
        SELECT id, owner_uuid, session_ref, pattern_type, summary, conversation_arc, tags, dredd_confidence, review_status
        FROM reasoning_patterns WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}
