//! Refinement proposal publishing

use super::PatternCluster;
use crate::bus::Bus;
use chrono::Utc;
use dredd_common::events::{PatternProposal, RefinementProposed, SUBJECT_REFINEMENT_PROPOSED};
use dredd_common::Result;

/// Publishes one refinement proposal for a clustered group of patterns.
pub async fn publish_refinement_proposal(
    bus: &Bus,
    cluster: &PatternCluster,
    target_soul_slug: &str,
) -> Result<()> {
    let proposals = cluster
        .patterns
        .iter()
        .map(|p| PatternProposal {
            id: p.id.clone(),
            summary: p.summary.clone(),
            pattern_type: cluster.pattern_type.clone(),
            confidence: p.confidence,
        })
        .collect();

    let event = RefinementProposed {
        patterns: proposals,
        target_soul_slug: target_soul_slug.to_string(),
        target_section: cluster.soul_section.clone(),
        proposed_change: proposed_change(cluster),
        cluster_size: cluster.count,
        timestamp: Utc::now(),
    };

    bus.publish_json(SUBJECT_REFINEMENT_PROPOSED, &event).await
}

/// Human-readable description of what the cluster suggests changing.
fn proposed_change(cluster: &PatternCluster) -> String {
    let section = &cluster.soul_section;
    let count = cluster.count;
    let summary = &cluster.summary;

    match cluster.pattern_type.as_str() {
        "correction" => format!("Update {section} based on {count} correction patterns: {summary}"),
        "pushback" => format!(
            "Review {section} for potential overreach based on {count} pushback patterns: {summary}"
        ),
        "reframing" => {
            format!("Enhance {section} with reframing insights from {count} patterns: {summary}")
        }
        "philosophy" => {
            format!("Refine philosophical stance in {section} based on {count} patterns: {summary}")
        }
        "direction" => format!(
            "Adjust interaction modes in {section} based on {count} directional patterns: {summary}"
        ),
        other => format!("Refine {section} based on {count} {other} patterns: {summary}"),
    }
}
