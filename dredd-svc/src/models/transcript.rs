//! Transcript event payload from Chronicle

use serde::{Deserialize, Serialize};

/// Bus event announcing that a conversation transcript was recorded.
///
/// The transcript text is preferred inline; when absent the processor fetches
/// it from Chronicle by `session_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptEvent {
    pub session_id: String,
    pub owner_uuid: String,
    pub session_ref: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration: String,
    /// e.g. "cc", "slack", "web"
    #[serde(default)]
    pub surface: String,
    /// full transcript text (preferred delivery method)
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub model_tier: String,
}
