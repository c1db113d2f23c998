//! Service layer for Dredd
//!
//! External clients (Anthropic, Slack, Chronicle), the LLM extractor, and the
//! processor that orchestrates the live extraction-review pipeline.

pub mod anthropic;
pub mod chronicle;
pub mod extractor;
pub mod gates;
pub mod processor;
pub mod slack;

pub use anthropic::AnthropicClient;
pub use chronicle::ChronicleClient;
pub use extractor::Extractor;
pub use processor::Processor;
pub use slack::Poster;
