//! Database access for Dredd
//!
//! Postgres via a shared connection pool. The decision-episode write spans
//! five relations inside one transaction; everything else is single-statement.
//! Embeddings are stored in pgvector columns and bound as vector literals.

pub mod decisions;
pub mod patterns;
pub mod styles;
pub mod trust;

use dredd_common::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Connect to Postgres and make sure the schema exists.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await?;

    init_schema(&pool).await?;
    tracing::debug!("database schema initialized");

    Ok(pool)
}

/// Idempotent schema bootstrap.
///
/// The embedding columns require the pgvector extension; creating it needs a
/// role with the right privileges, so deployments usually pre-install it.
async fn init_schema(pool: &PgPool) -> Result<()> {
    let ddl = [
        "CREATE EXTENSION IF NOT EXISTS vector",
        r#"
        CREATE TABLE IF NOT EXISTS decisions (
            id UUID PRIMARY KEY,
            domain TEXT NOT NULL,
            category TEXT NOT NULL,
            severity TEXT NOT NULL,
            source TEXT NOT NULL,
            source_channel TEXT NOT NULL,
            decided_by TEXT NOT NULL,
            summary TEXT NOT NULL,
            session_ref TEXT NOT NULL,
            embedding vector(1536),
            review_status TEXT NOT NULL DEFAULT 'pending',
            review_note TEXT NOT NULL DEFAULT '',
            reviewed_at TIMESTAMPTZ,
            deduped_at TIMESTAMPTZ,
            dedup_survivor_id UUID,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS decision_context (
            id UUID PRIMARY KEY,
            decision_id UUID NOT NULL REFERENCES decisions(id) ON DELETE CASCADE,
            situation_text TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS decision_options (
            id UUID PRIMARY KEY,
            decision_id UUID NOT NULL REFERENCES decisions(id) ON DELETE CASCADE,
            option_key TEXT NOT NULL,
            option_label TEXT NOT NULL,
            pro_signals JSONB NOT NULL,
            con_signals JSONB NOT NULL,
            was_chosen BOOLEAN NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS decision_reasoning (
            id UUID PRIMARY KEY,
            decision_id UUID NOT NULL REFERENCES decisions(id) ON DELETE CASCADE,
            factors JSONB NOT NULL,
            tradeoffs JSONB NOT NULL,
            reasoning_text TEXT NOT NULL
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS decision_tags (
            decision_id UUID NOT NULL REFERENCES decisions(id) ON DELETE CASCADE,
            tag TEXT NOT NULL,
            added_by TEXT NOT NULL,
            PRIMARY KEY (decision_id, tag)
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS reasoning_patterns (
            id UUID PRIMARY KEY,
            owner_uuid UUID NOT NULL,
            session_ref TEXT NOT NULL,
            pattern_type TEXT NOT NULL,
            summary TEXT NOT NULL,
            conversation_arc TEXT NOT NULL,
            tags TEXT[] NOT NULL DEFAULT '{}',
            dredd_confidence DOUBLE PRECISION NOT NULL,
            arc_embedding vector(1536),
            review_status TEXT NOT NULL DEFAULT 'pending',
            review_note TEXT NOT NULL DEFAULT '',
            reviewed_at TIMESTAMPTZ,
            deduped_at TIMESTAMPTZ,
            dedup_survivor_id UUID,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS writing_styles (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            owner_id UUID NOT NULL,
            session_ref TEXT NOT NULL,
            source TEXT NOT NULL,
            speaker TEXT NOT NULL,
            context TEXT NOT NULL,
            samples JSONB NOT NULL,
            traits JSONB NOT NULL,
            vocabulary JSONB NOT NULL,
            patterns JSONB NOT NULL,
            avoids JSONB NOT NULL,
            emoji_style TEXT NOT NULL,
            confidence DOUBLE PRECISION NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
        r#"
        CREATE TABLE IF NOT EXISTS agent_trust (
            id UUID PRIMARY KEY,
            agent_id TEXT NOT NULL,
            category TEXT NOT NULL,
            severity TEXT NOT NULL,
            trust_score DOUBLE PRECISION NOT NULL,
            total_decisions INTEGER NOT NULL,
            correct_decisions INTEGER NOT NULL,
            critical_failures INTEGER NOT NULL,
            last_signal_at TIMESTAMPTZ,
            updated_at TIMESTAMPTZ,
            UNIQUE (agent_id, category, severity)
        )
        "#,
    ];

    for stmt in ddl {
        sqlx::query(stmt).execute(pool).await?;
    }

    Ok(())
}

/// Formats a float slice as a pgvector literal, e.g. `[0.1,0.2,0.3]`,
/// suitable for a parameterized query with a `::vector` cast.
pub fn pg_vector(v: &[f32]) -> String {
    let mut out = String::with_capacity(v.len() * 8 + 2);
    out.push('[');
    for (i, f) in v.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&f.to_string());
    }
    out.push(']');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pg_vector_literal() {
        assert_eq!(pg_vector(&[0.1, 0.25, -3.0]), "[0.1,0.25,-3]");
        assert_eq!(pg_vector(&[]), "[]");
    }

    #[test]
    fn pg_vector_round_trips_floats() {
        let v = [0.123456789_f32, 1e-7, 42.0];
        let lit = pg_vector(&v);
        let inner = lit.trim_start_matches('[').trim_end_matches(']');
        for (part, orig) in inner.split(',').zip(v.iter()) {
            let parsed: f32 = part.parse().unwrap();
            assert_eq!(parsed, *orig);
        }
    }
}
