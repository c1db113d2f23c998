//! Domain models for Dredd
//!
//! Wire-facing serde structs: the transcript event consumed from the bus and
//! the three extraction types produced by the LLM.

mod extraction;
mod transcript;

pub use extraction::{
    DecisionEpisode, DecisionOption, DecisionReasoning, ExtractionResult, ReasoningPattern,
    WritingStyle,
};
pub use transcript::TranscriptEvent;
