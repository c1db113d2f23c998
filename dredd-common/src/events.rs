//! Bus contract for Dredd
//!
//! Subject constants and payload definitions shared between the service and
//! anything that consumes its signals. Payloads are plain serde structs; the
//! wire format is JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Subscriptions
pub const SUBJECT_TRANSCRIPT_STORED: &str = "swarm.chronicle.transcript.stored";
pub const SUBJECT_SLACK_REACTION: &str = "swarm.slack.reaction";
pub const SUBJECT_SLACK_INTERACTION: &str = "swarm.slack.interaction";
pub const SUBJECT_GATE_EVIDENCE: &str = "swarm.dispatch.*.gate.evidence";
pub const SUBJECT_TASK_PICKED: &str = "swarm.slack.task.picked";
pub const SUBJECT_TASK_REGENERATED: &str = "swarm.slack.task.regenerated";

// Publications
pub const SUBJECT_REGISTERED: &str = "swarm.agent.dredd.registered";
pub const SUBJECT_TRUST_SIGNAL: &str = "swarm.dredd.trust.signal";
pub const SUBJECT_ASSIGNMENT_SIGNAL: &str = "swarm.dredd.assignment.signal";
pub const SUBJECT_PATTERN_CONFIRMED: &str = "swarm.dredd.pattern.confirmed";
pub const SUBJECT_EXTRACTION_REJECTED: &str = "swarm.dredd.extraction.rejected";
pub const SUBJECT_CORRECTION: &str = "swarm.dredd.correction";
pub const SUBJECT_REFINEMENT_PROPOSED: &str = "pattern.refinement.proposed";

/// Startup announcement payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registration {
    pub timestamp: DateTime<Utc>,
    pub port: u16,
    pub mode: String,
}

/// Per-agent competence signal emitted when a reviewed decision resolves.
///
/// Consumers feed this into assignment and oversight policies; Dredd itself
/// only emits (shadow mode).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustSignal {
    pub agent_id: String,
    pub category: String,
    /// "correct" or "incorrect"
    pub outcome: String,
    pub severity: String,
    pub session_ref: String,
}

/// Emitted for decisions that classified as a reassignment, budget
/// correction, or similar operator intervention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentSignal {
    pub signal_type: String,
    pub agent_id: String,
    pub category: String,
    pub severity: String,
    pub session_ref: String,
}

/// Emitted once per reasoning pattern confirmed by a reviewer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternConfirmed {
    pub pattern_type: String,
    pub summary: String,
    pub tags: Vec<String>,
    pub owner_uuid: Uuid,
    pub session_ref: String,
}

/// Emitted when a reviewer rejects an extracted decision. Downstream
/// self-training loops treat these as negative examples.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionRejected {
    pub session_ref: String,
    pub decision: String,
    pub category: String,
}

/// Emitted on every decision review resolution, confirmed or rejected.
/// Feeds the prompt-optimisation loop with model attribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrectionSignal {
    pub session_ref: String,
    pub decision_id: String,
    pub agent_id: String,
    pub model_id: String,
    pub model_tier: String,
    /// "confirmed" or "rejected"
    pub correction_type: String,
    pub category: String,
    pub severity: String,
}

/// One pattern inside a refinement proposal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternProposal {
    pub id: String,
    pub summary: String,
    pub pattern_type: String,
    pub confidence: f64,
}

/// A clustered refinement proposal targeting one section of a soul document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefinementProposed {
    pub patterns: Vec<PatternProposal>,
    pub target_soul_slug: String,
    pub target_section: String,
    pub proposed_change: String,
    pub cluster_size: usize,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trust_signal_wire_format() {
        let sig = TrustSignal {
            agent_id: "forge".into(),
            category: "pr_review".into(),
            outcome: "correct".into(),
            severity: "routine".into(),
            session_ref: "s-42".into(),
        };
        let json = serde_json::to_value(&sig).unwrap();
        assert_eq!(json["agent_id"], "forge");
        assert_eq!(json["outcome"], "correct");
        assert_eq!(json["session_ref"], "s-42");
    }

    #[test]
    fn correction_signal_round_trips() {
        let sig = CorrectionSignal {
            session_ref: "s-1".into(),
            decision_id: "d-1".into(),
            agent_id: String::new(),
            model_id: "m".into(),
            model_tier: "standard".into(),
            correction_type: "rejected".into(),
            category: "gate_approval".into(),
            severity: "critical".into(),
        };
        let json = serde_json::to_string(&sig).unwrap();
        let back: CorrectionSignal = serde_json::from_str(&json).unwrap();
        assert_eq!(back.correction_type, "rejected");
        assert_eq!(back.severity, "critical");
    }
}
