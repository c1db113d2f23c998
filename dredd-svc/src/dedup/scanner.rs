//! Duplicate pair scanning
//!
//! Self-join on the target table using pgvector cosine distance. Tombstoned
//! rows (`deduped_at` set) and rows without embeddings never appear.

use super::DuplicatePair;
use dredd_common::Result;
use sqlx::PgPool;
use uuid::Uuid;

/// Finds duplicate reasoning patterns above the similarity threshold.
pub async fn find_pattern_duplicates(
    pool: &PgPool,
    threshold: f64,
) -> Result<Vec<DuplicatePair>> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, f64)>(
        r#"
        SELECT a.id, b.id, 1 - (a.arc_embedding <=> b.arc_embedding) AS similarity
        FROM reasoning_patterns a, reasoning_patterns b
        WHERE a.id < b.id
          AND a.arc_embedding IS NOT NULL AND b.arc_embedding IS NOT NULL
          AND a.deduped_at IS NULL AND b.deduped_at IS NULL
          AND 1 - (a.arc_embedding <=> b.arc_embedding) > $1
        ORDER BY similarity DESC
        "#,
    )
    .bind(threshold)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(DuplicatePair::from).collect())
}

/// Finds duplicate decisions above the similarity threshold.
pub async fn find_decision_duplicates(
    pool: &PgPool,
    threshold: f64,
) -> Result<Vec<DuplicatePair>> {
    let rows = sqlx::query_as::<_, (Uuid, Uuid, f64)>(
        r#"
        SELECT a.id, b.id, 1 - (a.embedding <=> b.embedding) AS similarity
        FROM decisions a, decisions b
        WHERE a.id < b.id
          AND a.embedding IS NOT NULL AND b.embedding IS NOT NULL
          AND a.deduped_at IS NULL AND b.deduped_at IS NULL
          AND 1 - (a.embedding <=> b.embedding) > $1
        ORDER BY similarity DESC
        "#,
    )
    .bind(threshold)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(DuplicatePair::from).collect())
}

impl From<(Uuid, Uuid, f64)> for DuplicatePair {
    fn from((id_a, id_b, similarity): (Uuid, Uuid, f64)) -> Self {
        Self {
            id_a,
            id_b,
            similarity,
        }
    }
}
