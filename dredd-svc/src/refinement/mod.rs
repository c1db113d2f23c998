//! Pattern refinement detection
//!
//! Finds confirmed high-confidence reasoning patterns of the corrective
//! types, clusters them by embedding similarity within each type, and maps
//! each cluster to the soul section it should refine.

pub mod mapper;
pub mod publisher;

use chrono::{DateTime, Utc};
use dredd_common::Result;
use serde::Serialize;
use sqlx::PgPool;

/// Default cosine similarity threshold for grouping patterns.
pub const DEFAULT_THRESHOLD: f64 = 0.85;

/// A group of similar confirmed patterns proposing one refinement.
#[derive(Debug, Clone, Serialize)]
pub struct PatternCluster {
    pub pattern_type: String,
    pub count: usize,
    pub summary: String,
    pub soul_section: String,
    pub patterns: Vec<ClusterPattern>,
}

/// One pattern within a cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterPattern {
    pub id: String,
    pub summary: String,
    pub confidence: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct PatternRecord {
    id: String,
    pattern_type: String,
    summary: String,
    confidence: f64,
    created_at: DateTime<Utc>,
    embedding: Vec<f64>,
}

/// Finds confirmed patterns and groups them by embedding similarity.
/// A threshold outside (0,1] falls back to the default.
pub async fn find_clusters(
    pool: &PgPool,
    since: Option<DateTime<Utc>>,
    threshold: f64,
) -> Result<Vec<PatternCluster>> {
    let threshold = if threshold <= 0.0 || threshold > 1.0 {
        DEFAULT_THRESHOLD
    } else {
        threshold
    };

    let mut query = String::from(
        r#"
        SELECT id::text, pattern_type, summary, dredd_confidence, created_at,
               COALESCE(arc_embedding::text, '') AS embedding
        FROM reasoning_patterns
        WHERE pattern_type IN ('correction', 'pushback', 'reframing')
          AND review_status = 'confirmed'
          AND dredd_confidence > 0.8
        "#,
    );
    if since.is_some() {
        query.push_str(" AND created_at >= $1");
    }
    query.push_str(" ORDER BY created_at DESC");

    let mut q = sqlx::query_as::<_, (String, String, String, f64, DateTime<Utc>, String)>(&query);
    if let Some(since) = since {
        q = q.bind(since);
    }
    let rows = q.fetch_all(pool).await?;

    let mut records = Vec::with_capacity(rows.len());
    for (id, pattern_type, summary, confidence, created_at, embedding_text) in rows {
        // Patterns with missing or unparseable embeddings are skipped.
        let embedding = match parse_pg_vector(&embedding_text) {
            Ok(v) if !v.is_empty() => v,
            _ => continue,
        };
        records.push(PatternRecord {
            id,
            pattern_type,
            summary,
            confidence,
            created_at,
            embedding,
        });
    }

    let mut clusters = cluster_records(&records, threshold);

    for cluster in &mut clusters {
        let sections = mapper::map_pattern_to_sections(&cluster.pattern_type);
        if let Some(first) = sections.first() {
            cluster.soul_section = first.to_string();
        }
    }
    // Unknown types have no target section and propose nothing.
    clusters.retain(|c| !c.soul_section.is_empty());

    Ok(clusters)
}

/// Groups records by pattern type, then greedy single-link clusters each
/// group: every unused record seeds a cluster and absorbs all remaining
/// records whose similarity to the seed meets the threshold.
fn cluster_records(records: &[PatternRecord], threshold: f64) -> Vec<PatternCluster> {
    let mut clusters = Vec::new();
    let mut used = vec![false; records.len()];

    for i in 0..records.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let seed = &records[i];
        let mut members = vec![seed];

        for j in (i + 1)..records.len() {
            if used[j] || records[j].pattern_type != seed.pattern_type {
                continue;
            }
            if cosine_similarity(&seed.embedding, &records[j].embedding) >= threshold {
                used[j] = true;
                members.push(&records[j]);
            }
        }

        clusters.push(PatternCluster {
            pattern_type: seed.pattern_type.clone(),
            count: members.len(),
            // Records are ordered newest first; the seed's summary stands
            // for the cluster.
            summary: seed.summary.clone(),
            soul_section: String::new(),
            patterns: members
                .iter()
                .map(|r| ClusterPattern {
                    id: r.id.clone(),
                    summary: r.summary.clone(),
                    confidence: r.confidence,
                    created_at: r.created_at,
                })
                .collect(),
        });
    }

    clusters
}

/// Parses a pgvector text literal like `[0.1,0.2,0.3]`.
fn parse_pg_vector(s: &str) -> std::result::Result<Vec<f64>, String> {
    let inner = s
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(|| "invalid vector format".to_string())?;

    if inner.is_empty() {
        return Ok(Vec::new());
    }

    inner
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<f64>()
                .map_err(|e| format!("parse float {part:?}: {e}"))
        })
        .collect()
}

/// Cosine similarity between two vectors; 0.0 when shapes differ or either
/// vector is all-zero.
fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, pattern_type: &str, embedding: Vec<f64>) -> PatternRecord {
        PatternRecord {
            id: id.to_string(),
            pattern_type: pattern_type.to_string(),
            summary: format!("summary-{id}"),
            confidence: 0.9,
            created_at: Utc.with_ymd_and_hms(2026, 2, 11, 10, 0, 0).unwrap(),
            embedding,
        }
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.2, 0.1];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_guards_shape_and_zero_norm() {
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn parses_vector_literal() {
        assert_eq!(parse_pg_vector("[0.1,0.2,0.3]").unwrap(), vec![0.1, 0.2, 0.3]);
        assert_eq!(parse_pg_vector("[]").unwrap(), Vec::<f64>::new());
        assert!(parse_pg_vector("0.1,0.2").is_err());
        assert!(parse_pg_vector("[a,b]").is_err());
    }

    #[test]
    fn similar_records_of_same_type_cluster_together() {
        let records = vec![
            record("a", "correction", vec![1.0, 0.0]),
            record("b", "correction", vec![0.99, 0.05]),
            record("c", "correction", vec![0.0, 1.0]),
        ];
        let clusters = cluster_records(&records, 0.85);
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].count, 2);
        assert_eq!(clusters[1].count, 1);
    }

    #[test]
    fn different_types_never_share_a_cluster() {
        let records = vec![
            record("a", "correction", vec![1.0, 0.0]),
            record("b", "pushback", vec![1.0, 0.0]),
        ];
        let clusters = cluster_records(&records, 0.85);
        assert_eq!(clusters.len(), 2);
    }

    #[test]
    fn cluster_summary_comes_from_seed() {
        let records = vec![
            record("seed", "reframing", vec![1.0, 0.0]),
            record("other", "reframing", vec![1.0, 0.01]),
        ];
        let clusters = cluster_records(&records, 0.85);
        assert_eq!(clusters[0].summary, "summary-seed");
    }
}
