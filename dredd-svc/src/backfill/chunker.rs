//! Conversation chunking
//!
//! Splits a conversation on inactivity gaps and message-count boundaries.
//! Gateway sessions tolerate longer silences than Claude Code sessions, so
//! the gap threshold is source-specific. Messages without timestamps never
//! force a split.

use super::{Chunk, ConversationMessage, FileSource};
use chrono::Duration;
use std::fmt::Write as _;

const MAX_CHUNK_MESSAGES: usize = 20;

fn time_gap(source: FileSource) -> Duration {
    match source {
        FileSource::Claude => Duration::minutes(5),
        FileSource::Gateway => Duration::minutes(10),
    }
}

/// Splits a conversation into extraction-sized chunks.
pub fn chunk_conversation(
    msgs: &[ConversationMessage],
    session_ref: &str,
    source: FileSource,
) -> Vec<Chunk> {
    if msgs.is_empty() {
        return Vec::new();
    }

    let gap = time_gap(source);

    let mut chunks = Vec::new();
    let mut current: Vec<ConversationMessage> = Vec::new();
    let mut chunk_idx = 0;

    for msg in msgs {
        if let (Some(last), Some(ts)) = (current.last().and_then(|m| m.timestamp), msg.timestamp) {
            if ts - last > gap {
                chunks.push(build_chunk(std::mem::take(&mut current), session_ref, chunk_idx));
                chunk_idx += 1;
            }
        }

        if current.len() >= MAX_CHUNK_MESSAGES {
            chunks.push(build_chunk(std::mem::take(&mut current), session_ref, chunk_idx));
            chunk_idx += 1;
        }

        current.push(msg.clone());
    }

    if !current.is_empty() {
        chunks.push(build_chunk(current, session_ref, chunk_idx));
    }

    chunks
}

fn build_chunk(msgs: Vec<ConversationMessage>, session_ref: &str, idx: usize) -> Chunk {
    let start_time = msgs.first().and_then(|m| m.timestamp);
    let end_time = msgs.last().and_then(|m| m.timestamp);
    Chunk {
        session_ref: format!("{session_ref}#chunk-{idx}"),
        start_time,
        end_time,
        messages: msgs,
    }
}

/// Renders a chunk as a `Human:` / `Assistant:` transcript string for the
/// extractor.
pub fn format_transcript(chunk: &Chunk) -> String {
    let mut out = String::new();
    for msg in &chunk.messages {
        let speaker = match msg.role.as_str() {
            "user" => "Human",
            "assistant" => "Assistant",
            other => other,
        };
        let _ = write!(out, "{speaker}: {}\n\n", msg.text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 11, 10, 0, 0).unwrap()
    }

    fn make_messages(n: usize, gap_secs: i64) -> Vec<ConversationMessage> {
        (0..n)
            .map(|i| ConversationMessage {
                role: if i % 2 == 0 { "user" } else { "assistant" }.to_string(),
                text: "message".to_string(),
                timestamp: Some(base() + Duration::seconds(i as i64 * gap_secs)),
            })
            .collect()
    }

    #[test]
    fn under_limit_is_one_chunk() {
        let chunks = chunk_conversation(&make_messages(5, 1), "test.jsonl", FileSource::Claude);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].messages.len(), 5);
        assert_eq!(chunks[0].session_ref, "test.jsonl#chunk-0");
    }

    #[test]
    fn splits_on_message_count() {
        let chunks = chunk_conversation(&make_messages(45, 1), "test.jsonl", FileSource::Claude);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].messages.len(), 20);
        assert_eq!(chunks[1].messages.len(), 20);
        assert_eq!(chunks[2].messages.len(), 5);
    }

    #[test]
    fn chunk_refs_are_contiguous() {
        let chunks = chunk_conversation(&make_messages(45, 1), "s", FileSource::Claude);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.session_ref, format!("s#chunk-{i}"));
        }
    }

    #[test]
    fn splits_on_time_gap_claude() {
        let msgs = vec![
            ConversationMessage {
                role: "user".into(),
                text: "Hello".into(),
                timestamp: Some(base()),
            },
            ConversationMessage {
                role: "assistant".into(),
                text: "Hi".into(),
                timestamp: Some(base() + Duration::seconds(1)),
            },
            // 10 minute gap, over the 5 minute claude threshold
            ConversationMessage {
                role: "user".into(),
                text: "New topic".into(),
                timestamp: Some(base() + Duration::minutes(10)),
            },
            ConversationMessage {
                role: "assistant".into(),
                text: "Sure".into(),
                timestamp: Some(base() + Duration::minutes(10) + Duration::seconds(1)),
            },
        ];

        let chunks = chunk_conversation(&msgs, "test.jsonl", FileSource::Claude);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].messages.len(), 2);
        assert_eq!(chunks[1].messages.len(), 2);
    }

    #[test]
    fn no_split_on_small_gap_gateway() {
        let msgs = vec![
            ConversationMessage {
                role: "user".into(),
                text: "Hello".into(),
                timestamp: Some(base()),
            },
            ConversationMessage {
                role: "assistant".into(),
                text: "Hi".into(),
                timestamp: Some(base() + Duration::seconds(1)),
            },
            // 7 minutes is under the 10 minute gateway threshold
            ConversationMessage {
                role: "user".into(),
                text: "Continue".into(),
                timestamp: Some(base() + Duration::minutes(7)),
            },
            ConversationMessage {
                role: "assistant".into(),
                text: "OK".into(),
                timestamp: Some(base() + Duration::minutes(7) + Duration::seconds(1)),
            },
        ];

        let chunks = chunk_conversation(&msgs, "test.jsonl", FileSource::Gateway);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn splits_on_large_gap_gateway() {
        let msgs = vec![
            ConversationMessage {
                role: "user".into(),
                text: "Hello".into(),
                timestamp: Some(base()),
            },
            ConversationMessage {
                role: "assistant".into(),
                text: "Hi".into(),
                timestamp: Some(base() + Duration::seconds(1)),
            },
            ConversationMessage {
                role: "user".into(),
                text: "New topic".into(),
                timestamp: Some(base() + Duration::minutes(15)),
            },
        ];

        let chunks = chunk_conversation(&msgs, "test.jsonl", FileSource::Gateway);
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn missing_timestamps_never_split() {
        let msgs: Vec<ConversationMessage> = (0..6)
            .map(|i| ConversationMessage {
                role: "user".into(),
                text: format!("m{i}"),
                timestamp: None,
            })
            .collect();
        let chunks = chunk_conversation(&msgs, "s", FileSource::Claude);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_conversation(&[], "s", FileSource::Claude).is_empty());
    }

    #[test]
    fn chunk_timestamps_recorded() {
        let msgs = make_messages(3, 5);
        let chunks = chunk_conversation(&msgs, "s", FileSource::Claude);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].start_time, Some(base()));
        assert_eq!(chunks[0].end_time, Some(base() + Duration::seconds(10)));
    }

    #[test]
    fn transcript_renders_role_names() {
        let chunk = Chunk {
            messages: vec![
                ConversationMessage {
                    role: "user".into(),
                    text: "Deploy auth service".into(),
                    timestamp: None,
                },
                ConversationMessage {
                    role: "assistant".into(),
                    text: "Deploying now.".into(),
                    timestamp: None,
                },
                ConversationMessage {
                    role: "user".into(),
                    text: "Thanks".into(),
                    timestamp: None,
                },
            ],
            session_ref: "s#chunk-0".into(),
            start_time: None,
            end_time: None,
        };

        let text = format_transcript(&chunk);
        assert!(text.contains("Human: Deploy auth service"));
        assert!(text.contains("Assistant: Deploying now."));
        assert!(text.contains("Human: Thanks"));
    }
}
