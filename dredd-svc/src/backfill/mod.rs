//! Historical transcript backfill
//!
//! Replays recorded conversations through the same extractor as the live
//! path: discover JSONL files from both recorders, drop cross-source
//! duplicates, chunk on time gaps, extract, persist. Progress is saved to
//! disk after every file so an interrupted run resumes where it stopped.

mod cc_parser;
mod chunker;
mod dedup;
mod gateway_parser;
mod runner;
mod state;

pub use cc_parser::parse_claude_file;
pub use chunker::{chunk_conversation, format_transcript};
pub use dedup::{build_fingerprint, find_duplicates, FileFingerprint};
pub use gateway_parser::parse_gateway_file;
pub use runner::{Runner, RunnerConfig};
pub use state::BackfillState;

use chrono::{DateTime, Utc};

/// A single turn in a conversation, shared across parsers.
#[derive(Debug, Clone)]
pub struct ConversationMessage {
    /// "user" or "assistant"
    pub role: String,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A segment of conversation suitable for LLM extraction.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub messages: Vec<ConversationMessage>,
    /// source file ref plus chunk index
    pub session_ref: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

/// Which recorder produced a conversation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSource {
    /// Claude Code project transcripts (preferred on conflict)
    Claude,
    /// Gateway session logs
    Gateway,
}

impl FileSource {
    pub fn as_str(self) -> &'static str {
        match self {
            FileSource::Claude => "cc",
            FileSource::Gateway => "gateway",
        }
    }
}
