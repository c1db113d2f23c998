//! Transcript extraction
//!
//! Turns a transcript string into structured decisions, patterns, and styles
//! via one schema-bound LLM call per chunk. The model is a stateless oracle:
//! a response that is not the expected JSON object fails the chunk, with no
//! parse retry.

use crate::models::{DecisionEpisode, ExtractionResult, ReasoningPattern, WritingStyle};
use crate::services::anthropic::{AnthropicClient, LlmError, Message};
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

const MAX_TOKENS: u32 = 8192;

/// Extraction errors
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("llm extraction: {0}")]
    Llm(#[from] LlmError),

    #[error("parse extraction: {0}")]
    Parse(String),
}

const SYSTEM_PROMPT: &str = r#"You are Dredd, a judge agent that extracts structured knowledge from conversation transcripts.

You identify two types of knowledge:

## Type 1: Decision Episodes
Moments where the owner made a directive decision:
- Approved or rejected something
- Chose between options
- Corrected an agent's approach
- Set a priority or direction
- Said "no, do it this way"

For each decision, extract:
- domain: the area (architecture, security, infrastructure, ui, etc.)
- category: specific type (gate_approval, pr_review, reassignment, model_correction, budget_correction, etc.)
- severity: routine | significant | critical
- summary: one-line description of the decision
- situation_text: what was happening when the decision was made
- options: what alternatives existed (option_key, pro/con signals, was_chosen)
- reasoning: factors, tradeoffs, and full reasoning text
- tags: flexible labels (architecture, correction, anti-pattern, direction, etc.)
- confidence: 0.0-1.0 how certain you are this was a real directive decision
- agent_id: if the decision involved a specific agent, which one
- signal_type: if this was a reassignment, budget_correction, oversight_override, or model_correction

## Type 2: Reasoning Patterns
Conversation arcs that represent thinking, not decisions:
- Problem reframings ("you're asking the wrong question")
- Pushback on shortcuts ("stop with the quick fix mentality")
- Philosophical directions ("the conversation IS the training data")
- Mental model shifts
- Corrections of approach or thinking

For each pattern, extract:
- pattern_type: reframing | correction | philosophy | direction | pushback
- summary: one-line description of the pattern
- conversation_arc: the relevant portion of transcript (verbatim or close paraphrase)
- tags: for retrieval (reframing, correction, architecture, philosophy, etc.)
- confidence: 0.0-1.0 how certain you are this is a meaningful pattern

## Confidence Scoring
- High (>0.85): Clear directive, explicit reasoning in transcript
- Medium (0.5-0.85): Implicit decision, reasoning inferred from context
- Low (<0.5): Uncertain — still extract it, low-confidence items are where you learn boundaries

## Rules
- Extract ALL decisions and patterns, even low-confidence ones
- Include the owner's exact words where possible
- Don't fabricate — if reasoning isn't stated, mark confidence lower
- A single conversation turn can contain multiple decisions or patterns
- Some items are both a decision AND a pattern — extract both"#;

fn user_prompt(session_ref: &str, owner_uuid: Uuid, transcript: &str) -> String {
    format!(
        r#"Analyze this transcript and extract all decision episodes (Type 1) and reasoning patterns (Type 2).

Session: {session_ref}
Owner: {owner_uuid}

Transcript:
---
{transcript}
---

Respond with valid JSON matching this schema:
{{
  "decisions": [
    {{
      "domain": "string",
      "category": "string",
      "severity": "routine|significant|critical",
      "summary": "string",
      "situation_text": "string",
      "options": [
        {{
          "option_key": "string",
          "pro_signals": ["string"],
          "con_signals": ["string"],
          "was_chosen": true|false
        }}
      ],
      "reasoning": {{
        "factors": ["string"],
        "tradeoffs": ["string"],
        "reasoning_text": "string"
      }},
      "tags": ["string"],
      "confidence": 0.0-1.0,
      "agent_id": "string or empty",
      "signal_type": "string or empty"
    }}
  ],
  "patterns": [
    {{
      "pattern_type": "reframing|correction|philosophy|direction|pushback",
      "summary": "string",
      "conversation_arc": "string",
      "tags": ["string"],
      "confidence": 0.0-1.0
    }}
  ]
}}

Return ONLY the JSON object, no markdown fences or other text."#
    )
}

#[derive(Deserialize)]
struct LlmResponse {
    #[serde(default)]
    decisions: Vec<DecisionEpisode>,
    #[serde(default)]
    patterns: Vec<ReasoningPattern>,
    #[serde(default)]
    styles: Vec<WritingStyle>,
}

/// Parses the raw LLM response into extraction lists.
fn parse_response(raw: &str) -> Result<LlmResponse, ExtractError> {
    serde_json::from_str(raw).map_err(|e| ExtractError::Parse(e.to_string()))
}

/// LLM-backed extractor.
pub struct Extractor {
    llm: AnthropicClient,
}

impl Extractor {
    pub fn new(llm: AnthropicClient) -> Self {
        Self { llm }
    }

    /// Processes a transcript and returns structured extractions.
    pub async fn extract(
        &self,
        session_ref: &str,
        owner_uuid: Uuid,
        transcript: &str,
    ) -> Result<ExtractionResult, ExtractError> {
        let messages = [Message {
            role: "user".to_string(),
            content: user_prompt(session_ref, owner_uuid, transcript),
        }];

        tracing::info!(
            session_ref,
            owner = %owner_uuid,
            transcript_len = transcript.len(),
            "extracting from transcript"
        );

        let raw = self.llm.complete(SYSTEM_PROMPT, &messages, MAX_TOKENS).await?;

        let resp = parse_response(&raw).inspect_err(|e| {
            tracing::error!(error = %e, raw, "failed to parse extraction response");
        })?;

        tracing::info!(
            session_ref,
            decisions = resp.decisions.len(),
            patterns = resp.patterns.len(),
            styles = resp.styles.len(),
            "extraction complete"
        );

        Ok(ExtractionResult {
            session_ref: session_ref.to_string(),
            owner_uuid,
            decisions: resp.decisions,
            patterns: resp.patterns,
            styles: resp.styles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_response() {
        let raw = r#"{
            "decisions": [{
                "domain": "architecture",
                "category": "pr_review",
                "severity": "significant",
                "summary": "Use pgx instead of gorm",
                "situation_text": "Discussing DB layer",
                "options": [
                    {"option_key": "pgx", "pro_signals": ["fast"], "con_signals": [], "was_chosen": true},
                    {"option_key": "gorm", "pro_signals": [], "con_signals": ["magic"], "was_chosen": false}
                ],
                "reasoning": {"factors": ["performance"], "tradeoffs": ["verbosity"], "reasoning_text": "Explicit SQL wins"},
                "tags": ["database"],
                "confidence": 0.92,
                "agent_id": "forge",
                "signal_type": ""
            }],
            "patterns": [{
                "pattern_type": "pushback",
                "summary": "Rejected quick fix",
                "conversation_arc": "stop with the quick fix mentality",
                "tags": ["anti-pattern"],
                "confidence": 0.88
            }],
            "styles": []
        }"#;

        let resp = parse_response(raw).unwrap();
        assert_eq!(resp.decisions.len(), 1);
        assert_eq!(resp.patterns.len(), 1);
        assert!(resp.styles.is_empty());

        let d = &resp.decisions[0];
        assert_eq!(d.severity, "significant");
        assert_eq!(d.options.len(), 2);
        assert!(d.options[0].was_chosen);
        assert_eq!(d.agent_id, "forge");
    }

    #[test]
    fn missing_arrays_default_empty() {
        let resp = parse_response(r#"{"decisions": []}"#).unwrap();
        assert!(resp.decisions.is_empty());
        assert!(resp.patterns.is_empty());
        assert!(resp.styles.is_empty());
    }

    #[test]
    fn fenced_output_is_a_parse_error() {
        let raw = "```json\n{\"decisions\": []}\n```";
        assert!(matches!(parse_response(raw), Err(ExtractError::Parse(_))));
    }

    #[test]
    fn prose_output_is_a_parse_error() {
        let raw = "Here are the extractions: {\"decisions\": []}";
        assert!(parse_response(raw).is_err());
    }

    #[test]
    fn user_prompt_carries_session_and_fencing() {
        let owner = Uuid::new_v4();
        let p = user_prompt("sess-1#chunk-0", owner, "Human: hi");
        assert!(p.contains("Session: sess-1#chunk-0"));
        assert!(p.contains(&owner.to_string()));
        assert!(p.contains("---\nHuman: hi\n---"));
    }
}
