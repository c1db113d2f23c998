//! Slack review surface
//!
//! Posts extraction reviews as a header message plus one threaded reply per
//! item, and maps reaction emoji back to review verdicts. Reactions arrive
//! through the bus (forwarded by slack-gateway), not through Slack directly.

use crate::models::{DecisionEpisode, ExtractionResult, ReasoningPattern};
use serde::Deserialize;
use serde_json::json;
use std::fmt::Write as _;
use std::time::Duration;
use thiserror::Error;

const POST_MESSAGE_URL: &str = "https://slack.com/api/chat.postMessage";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Slack poster errors
#[derive(Debug, Error)]
pub enum SlackError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Slack error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

/// What kind of extraction a review item refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Decision,
    Pattern,
}

/// One per-item thread reply within a review.
#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub kind: ItemKind,
    /// index into the extraction result's decision or pattern list
    pub idx: usize,
    /// Slack message timestamp of the reply
    pub ts: String,
}

/// A posted review: the header message plus all item replies.
#[derive(Debug, Clone)]
pub struct ReviewThread {
    pub header_ts: String,
    pub items: Vec<ReviewItem>,
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    ts: String,
    #[serde(default)]
    error: String,
}

/// Posts review messages to a Slack channel.
pub struct Poster {
    token: String,
    channel: String,
    client: reqwest::Client,
    api_url: String,
}

impl Poster {
    pub fn new(token: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            channel: channel.into(),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            api_url: POST_MESSAGE_URL.to_string(),
        }
    }

    /// Overrides the API endpoint; used by tests standing in for Slack.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Posts a review as a header message plus one threaded reply per
    /// decision and per pattern. Returns the header timestamp and every
    /// item's reply timestamp for reaction tracking.
    pub async fn post_review_thread(
        &self,
        result: &ExtractionResult,
        session_title: &str,
        surface: &str,
        duration: &str,
    ) -> Result<ReviewThread, SlackError> {
        let header = format_review_message(result, session_title, surface, duration);

        let payload = json!({
            "channel": self.channel,
            "text": header,
            "blocks": [
                {
                    "type": "section",
                    "text": {"type": "mrkdwn", "text": header},
                },
                {
                    "type": "context",
                    "elements": [
                        {"type": "mrkdwn", "text": "React: :+1: correct | :-1: wrong | :shrug: skip"},
                    ],
                },
            ],
        });
        let header_ts = self.post(payload).await?;

        let mut items = Vec::with_capacity(result.decisions.len() + result.patterns.len());

        for (idx, decision) in result.decisions.iter().enumerate() {
            let text = format_decision_item(idx + 1, decision);
            let ts = self.post_reply(&header_ts, &text).await?;
            items.push(ReviewItem {
                kind: ItemKind::Decision,
                idx,
                ts,
            });
        }

        for (idx, pattern) in result.patterns.iter().enumerate() {
            let text = format_pattern_item(idx + 1, pattern);
            let ts = self.post_reply(&header_ts, &text).await?;
            items.push(ReviewItem {
                kind: ItemKind::Pattern,
                idx,
                ts,
            });
        }

        tracing::info!(
            header_ts = %header_ts,
            items = items.len(),
            session_ref = %result.session_ref,
            "posted review thread to slack"
        );

        Ok(ReviewThread { header_ts, items })
    }

    /// Posts a threaded reply; an empty `thread_ts` posts a standalone
    /// channel message (used for backfill batch summaries).
    pub async fn post_thread(&self, thread_ts: &str, text: &str) -> Result<(), SlackError> {
        let mut payload = json!({
            "channel": self.channel,
            "text": text,
        });
        if !thread_ts.is_empty() {
            payload["thread_ts"] = json!(thread_ts);
        }
        self.post(payload).await?;
        Ok(())
    }

    async fn post_reply(&self, thread_ts: &str, text: &str) -> Result<String, SlackError> {
        let payload = json!({
            "channel": self.channel,
            "thread_ts": thread_ts,
            "text": text,
        });
        self.post(payload).await
    }

    async fn post(&self, payload: serde_json::Value) -> Result<String, SlackError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| SlackError::Network(e.to_string()))?;

        let resp: PostMessageResponse = response
            .json()
            .await
            .map_err(|e| SlackError::Parse(e.to_string()))?;

        if !resp.ok {
            return Err(SlackError::Api(resp.error));
        }
        Ok(resp.ts)
    }
}

fn format_review_message(
    result: &ExtractionResult,
    title: &str,
    surface: &str,
    duration: &str,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "*Session:* {title} ({surface}, {duration})");
    let _ = writeln!(out, "*Owner:* {}\n", result.owner_uuid);

    if !result.decisions.is_empty() {
        let _ = writeln!(out, "*Decisions found: {}*", result.decisions.len());
    }
    if !result.patterns.is_empty() {
        let _ = writeln!(out, "*Patterns found: {}*", result.patterns.len());
    }
    if result.decisions.is_empty() && result.patterns.is_empty() {
        out.push_str("_No decisions or patterns extracted from this session._");
    }

    out
}

fn format_decision_item(n: usize, d: &DecisionEpisode) -> String {
    format!(
        "*Decision {n}:* {}\n   Tags: {} | Severity: {} | Confidence: {:.2}",
        d.summary,
        d.tags.join(", "),
        d.severity,
        d.confidence
    )
}

fn format_pattern_item(n: usize, p: &ReasoningPattern) -> String {
    format!(
        "*Pattern {n}:* [{}] {}\n   Confidence: {:.2}",
        p.pattern_type, p.summary, p.confidence
    )
}

// ---------------------------------------------------------------------------
// Reactions
// ---------------------------------------------------------------------------

/// A review verdict derived from a Slack reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Confirmed,
    Rejected,
    Skipped,
    Unknown,
}

impl Verdict {
    /// The review_status string stored in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Confirmed => "confirmed",
            Verdict::Rejected => "rejected",
            Verdict::Skipped => "skipped",
            Verdict::Unknown => "unknown",
        }
    }
}

/// Converts a Slack reaction emoji name to a review verdict.
pub fn parse_reaction(reaction: &str) -> Verdict {
    match reaction {
        "+1" | "thumbsup" => Verdict::Confirmed,
        "-1" | "thumbsdown" => Verdict::Rejected,
        "shrug" => Verdict::Skipped,
        _ => Verdict::Unknown,
    }
}

/// A reaction event forwarded over the bus by slack-gateway.
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    pub reaction: String,
    pub user_id: String,
    pub channel: String,
    pub message_ts: String,
}

#[derive(Deserialize)]
struct ReactionWrapper {
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

/// Parses a forwarded reaction payload. The gateway wraps the fields in a
/// `metadata` map; the emoji name may arrive colon-wrapped.
pub fn parse_reaction_event(data: &[u8]) -> Result<ReactionEvent, SlackError> {
    let wrapper: ReactionWrapper =
        serde_json::from_slice(data).map_err(|e| SlackError::Parse(e.to_string()))?;

    let mut reaction = wrapper.metadata.get("text").cloned().unwrap_or_default();
    if reaction.len() > 2 && reaction.starts_with(':') && reaction.ends_with(':') {
        reaction = reaction[1..reaction.len() - 1].to_string();
    }

    Ok(ReactionEvent {
        reaction,
        user_id: wrapper.metadata.get("user_id").cloned().unwrap_or_default(),
        channel: wrapper
            .metadata
            .get("channel_id")
            .cloned()
            .unwrap_or_default(),
        message_ts: wrapper
            .metadata
            .get("message_ts")
            .cloned()
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_result() -> ExtractionResult {
        ExtractionResult {
            session_ref: "test".into(),
            owner_uuid: Uuid::new_v4(),
            decisions: vec![DecisionEpisode {
                domain: "architecture".into(),
                category: "pr_review".into(),
                severity: "significant".into(),
                summary: "Use pgx instead of gorm".into(),
                situation_text: String::new(),
                options: vec![],
                reasoning: Default::default(),
                tags: vec!["architecture".into(), "database".into()],
                confidence: 0.92,
                agent_id: String::new(),
                signal_type: String::new(),
                model_id: String::new(),
                model_tier: String::new(),
            }],
            patterns: vec![ReasoningPattern {
                pattern_type: "pushback".into(),
                summary: "Rejected the quick fix".into(),
                conversation_arc: String::new(),
                tags: vec![],
                confidence: 0.95,
            }],
            styles: vec![],
        }
    }

    #[test]
    fn reaction_verdict_mapping() {
        assert_eq!(parse_reaction("+1"), Verdict::Confirmed);
        assert_eq!(parse_reaction("thumbsup"), Verdict::Confirmed);
        assert_eq!(parse_reaction("-1"), Verdict::Rejected);
        assert_eq!(parse_reaction("thumbsdown"), Verdict::Rejected);
        assert_eq!(parse_reaction("shrug"), Verdict::Skipped);
        assert_eq!(parse_reaction("tada"), Verdict::Unknown);
        assert_eq!(parse_reaction(""), Verdict::Unknown);
    }

    #[test]
    fn reaction_event_strips_colons() {
        let data = br#"{"metadata":{"text":":+1:","user_id":"U1","channel_id":"C1","message_ts":"123.456"}}"#;
        let evt = parse_reaction_event(data).unwrap();
        assert_eq!(evt.reaction, "+1");
        assert_eq!(evt.message_ts, "123.456");
        assert_eq!(evt.channel, "C1");
    }

    #[test]
    fn reaction_event_missing_fields_default_empty() {
        let evt = parse_reaction_event(br#"{"metadata":{}}"#).unwrap();
        assert!(evt.reaction.is_empty());
        assert!(evt.message_ts.is_empty());
    }

    #[test]
    fn reaction_event_malformed_payload_errors() {
        assert!(parse_reaction_event(b"not json").is_err());
    }

    #[test]
    fn review_message_lists_counts() {
        let result = sample_result();
        let text = format_review_message(&result, "Test Session", "cc", "1m");
        assert!(text.contains("*Session:* Test Session (cc, 1m)"));
        assert!(text.contains("Decisions found: 1"));
        assert!(text.contains("Patterns found: 1"));
    }

    #[test]
    fn review_message_empty_extraction() {
        let mut result = sample_result();
        result.decisions.clear();
        result.patterns.clear();
        let text = format_review_message(&result, "T", "cc", "1m");
        assert!(text.contains("_No decisions or patterns extracted"));
    }

    #[test]
    fn decision_item_format() {
        let result = sample_result();
        let text = format_decision_item(1, &result.decisions[0]);
        assert!(text.contains("Decision 1"));
        assert!(text.contains("Use pgx instead of gorm"));
        assert!(text.contains("architecture, database"));
        assert!(text.contains("0.92"));
    }

    #[test]
    fn pattern_item_format() {
        let result = sample_result();
        let text = format_pattern_item(2, &result.patterns[0]);
        assert!(text.contains("Pattern 2"));
        assert!(text.contains("[pushback]"));
    }
}
