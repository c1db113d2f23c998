//! Writing style persistence

use crate::models::WritingStyle;
use dredd_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Persists a writing style extraction. List fields are stored as JSONB.
pub async fn write_style(
    pool: &PgPool,
    owner_uuid: Uuid,
    session_ref: &str,
    source: &str,
    style: &WritingStyle,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO writing_styles (owner_id, session_ref, source, speaker, context, samples, traits, vocabulary, patterns, avoids, emoji_style, confidence)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(owner_uuid)
    .bind(session_ref)
    .bind(source)
    .bind(&style.speaker)
    .bind(&style.context)
    .bind(serde_json::json!(style.samples))
    .bind(serde_json::json!(style.traits))
    .bind(serde_json::json!(style.vocabulary))
    .bind(serde_json::json!(style.patterns))
    .bind(serde_json::json!(style.avoids))
    .bind(&style.emoji_style)
    .bind(style.confidence)
    .execute(pool)
    .await?;
    Ok(())
}
