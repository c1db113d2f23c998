//! Extraction result types
//!
//! The LLM returns these three shapes as JSON arrays. Fields the model may
//! omit carry serde defaults so a sparse-but-valid response still parses.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// All extractions from a single transcript chunk.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub session_ref: String,
    pub owner_uuid: Uuid,
    pub decisions: Vec<DecisionEpisode>,
    pub patterns: Vec<ReasoningPattern>,
    pub styles: Vec<WritingStyle>,
}

/// Type 1 extraction: a directive decision with structured reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionEpisode {
    pub domain: String,
    pub category: String,
    /// routine | significant | critical
    pub severity: String,
    pub summary: String,
    #[serde(default)]
    pub situation_text: String,
    #[serde(default)]
    pub options: Vec<DecisionOption>,
    #[serde(default)]
    pub reasoning: DecisionReasoning,
    #[serde(default)]
    pub tags: Vec<String>,
    pub confidence: f64,
    /// if the decision was about a specific agent's action
    #[serde(default)]
    pub agent_id: String,
    /// reassignment, budget_correction, etc.
    #[serde(default)]
    pub signal_type: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub model_tier: String,
}

/// An alternative that was considered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionOption {
    pub option_key: String,
    #[serde(default)]
    pub pro_signals: Vec<String>,
    #[serde(default)]
    pub con_signals: Vec<String>,
    #[serde(default)]
    pub was_chosen: bool,
}

/// Why a decision was made.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionReasoning {
    #[serde(default)]
    pub factors: Vec<String>,
    #[serde(default)]
    pub tradeoffs: Vec<String>,
    #[serde(default)]
    pub reasoning_text: String,
}

/// Type 2 extraction: a recurring thinking pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningPattern {
    /// reframing | correction | philosophy | direction | pushback
    pub pattern_type: String,
    pub summary: String,
    #[serde(default)]
    pub conversation_arc: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub confidence: f64,
}

/// Type 3 extraction: a writing voice fingerprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritingStyle {
    /// who wrote this (human, agent name)
    pub speaker: String,
    /// whatsapp, slack, pr_review, technical, casual
    #[serde(default)]
    pub context: String,
    /// 2-5 verbatim quotes that exemplify the style
    #[serde(default)]
    pub samples: Vec<String>,
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default)]
    pub vocabulary: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub avoids: Vec<String>,
    /// "none", "sparing", "frequent", or a description
    #[serde(default)]
    pub emoji_style: String,
    pub confidence: f64,
}
