//! Embedding-similarity deduplication
//!
//! Three stages: scan duplicate pairs with pgvector, cluster them with
//! union-find, pick one survivor per cluster. Execute mode tombstones the
//! losers (`deduped_at` + `dedup_survivor_id`); dry-run only reports.

mod cluster;
mod ranker;
mod scanner;

pub use cluster::cluster_pairs;

use dredd_common::Result;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

/// Default cosine similarity threshold for the sweep.
pub const DEFAULT_THRESHOLD: f64 = 0.92;

/// Which table a sweep runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupTable {
    Patterns,
    Decisions,
}

impl DedupTable {
    fn name(self) -> &'static str {
        match self {
            DedupTable::Patterns => "reasoning_patterns",
            DedupTable::Decisions => "decisions",
        }
    }
}

/// Two potentially duplicate records.
#[derive(Debug, Clone)]
pub struct DuplicatePair {
    pub id_a: Uuid,
    pub id_b: Uuid,
    pub similarity: f64,
}

/// One collapsed duplicate cluster.
#[derive(Debug, Clone, Serialize)]
pub struct ClusterDetail {
    pub survivor_id: Uuid,
    pub deduped_ids: Vec<Uuid>,
    pub size: usize,
}

/// Result of one deduplication sweep.
#[derive(Debug, Clone, Serialize)]
pub struct DedupReport {
    pub table: String,
    pub threshold: f64,
    pub execute: bool,
    pub clusters: usize,
    pub total_items: usize,
    pub deduped: usize,
    pub survivors: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ClusterDetail>,
}

impl DedupReport {
    fn empty(table: DedupTable, threshold: f64, execute: bool) -> Self {
        Self {
            table: table.name().to_string(),
            threshold,
            execute,
            clusters: 0,
            total_items: 0,
            deduped: 0,
            survivors: 0,
            details: Vec::new(),
        }
    }
}

/// Runs a deduplication sweep over one table.
pub async fn deduplicate(
    pool: &PgPool,
    table: DedupTable,
    threshold: f64,
    execute: bool,
) -> Result<DedupReport> {
    tracing::info!(table = table.name(), threshold, execute, "starting deduplication");

    let pairs = match table {
        DedupTable::Patterns => scanner::find_pattern_duplicates(pool, threshold).await?,
        DedupTable::Decisions => scanner::find_decision_duplicates(pool, threshold).await?,
    };
    tracing::info!(count = pairs.len(), "found duplicate pairs");

    if pairs.is_empty() {
        return Ok(DedupReport::empty(table, threshold, execute));
    }

    let clusters = cluster_pairs(&pairs);
    tracing::info!(clusters = clusters.len(), "clustered duplicates");

    let mut report = DedupReport::empty(table, threshold, execute);
    report.clusters = clusters.len();

    for cluster in &clusters {
        report.total_items += cluster.len();

        let survivor_id = match table {
            DedupTable::Patterns => ranker::rank_patterns(pool, cluster).await,
            DedupTable::Decisions => ranker::rank_decisions(pool, cluster).await,
        };
        let survivor_id = match survivor_id {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(error = %e, ?cluster, "failed to rank cluster");
                continue;
            }
        };

        let deduped_ids: Vec<Uuid> = cluster
            .iter()
            .copied()
            .filter(|id| *id != survivor_id)
            .collect();

        if execute {
            if let Err(e) = mark_deduped(pool, table, &deduped_ids, survivor_id).await {
                tracing::error!(
                    error = %e,
                    survivor = %survivor_id,
                    "failed to mark items as deduped"
                );
                continue;
            }
        }

        report.survivors += 1;
        report.deduped += deduped_ids.len();
        report.details.push(ClusterDetail {
            survivor_id,
            size: cluster.len(),
            deduped_ids,
        });
    }

    tracing::info!(
        survivors = report.survivors,
        deduped = report.deduped,
        "deduplication completed"
    );
    Ok(report)
}

/// Tombstones the losing rows of one cluster.
async fn mark_deduped(
    pool: &PgPool,
    table: DedupTable,
    deduped_ids: &[Uuid],
    survivor_id: Uuid,
) -> Result<()> {
    if deduped_ids.is_empty() {
        return Ok(());
    }

    let query = match table {
        DedupTable::Patterns => {
            r#"
            UPDATE reasoning_patterns
            SET deduped_at = now(), dedup_survivor_id = $1
            WHERE id = ANY($2)
            "#
        }
        DedupTable::Decisions => {
            r#"
            UPDATE decisions
            SET deduped_at = now(), dedup_survivor_id = $1
            WHERE id = ANY($2)
            "#
        }
    };

    sqlx::query(query)
        .bind(survivor_id)
        .bind(deduped_ids)
        .execute(pool)
        .await?;

    Ok(())
}
