//! Gateway session parser
//!
//! Gateway sessions are flat JSONL event logs. Only `message` events matter;
//! everything else (lifecycle, tool traffic) is skipped. Output is ordered
//! strictly by timestamp.

use super::ConversationMessage;
use chrono::{DateTime, Utc};
use dredd_common::Result;
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct GwLine {
    #[serde(rename = "type", default)]
    line_type: String,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    message: GwMessage,
}

#[derive(Debug, Default, Deserialize)]
struct GwMessage {
    #[serde(default)]
    role: String,
    #[serde(default)]
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GwContentBlock {
    #[serde(rename = "type", default)]
    block_type: String,
    #[serde(default)]
    text: String,
}

/// Parses a Gateway session JSONL file into a timestamp-ordered
/// conversation. Malformed lines are skipped.
pub fn parse_gateway_file(path: &Path) -> Result<Vec<ConversationMessage>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    let mut msgs: Vec<ConversationMessage> = Vec::new();

    for line in reader.lines() {
        let Ok(line) = line else { continue };
        let Ok(parsed) = serde_json::from_str::<GwLine>(&line) else {
            continue;
        };

        if parsed.line_type != "message" {
            continue;
        }
        // Tool results carry a dedicated role here.
        if parsed.message.role == "toolResult" {
            continue;
        }
        if parsed.message.role != "user" && parsed.message.role != "assistant" {
            continue;
        }

        let text = extract_text(&parsed.message.content);
        if text.is_empty() {
            continue;
        }

        msgs.push(ConversationMessage {
            role: parsed.message.role,
            text,
            timestamp: parse_timestamp(&parsed.timestamp),
        });
    }

    msgs.sort_by_key(|m| m.timestamp);

    Ok(msgs)
}

/// Text blocks only; thinking and toolCall blocks are dropped. Plain string
/// content is permitted.
fn extract_text(content: &serde_json::Value) -> String {
    if let Some(text) = content.as_str() {
        return text.to_string();
    }

    let Ok(blocks) = serde_json::from_value::<Vec<GwContentBlock>>(content.clone()) else {
        return String::new();
    };

    blocks
        .iter()
        .filter(|b| b.block_type == "text" && !b.text.is_empty())
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_jsonl(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        f
    }

    #[test]
    fn keeps_only_message_events() {
        let f = write_jsonl(&[
            r#"{"type":"session_start","id":"s1","timestamp":"2026-02-11T10:00:00Z"}"#,
            r#"{"type":"message","timestamp":"2026-02-11T10:00:01Z","message":{"role":"user","content":"hello"}}"#,
            r#"{"type":"message","timestamp":"2026-02-11T10:00:02Z","message":{"role":"toolResult","content":"ignored"}}"#,
            r#"{"type":"message","timestamp":"2026-02-11T10:00:03Z","message":{"role":"assistant","content":[{"type":"text","text":"hi"}]}}"#,
        ]);

        let msgs = parse_gateway_file(f.path()).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].text, "hello");
        assert_eq!(msgs[1].text, "hi");
    }

    #[test]
    fn orders_by_timestamp() {
        let f = write_jsonl(&[
            r#"{"type":"message","timestamp":"2026-02-11T10:00:10Z","message":{"role":"assistant","content":"second"}}"#,
            r#"{"type":"message","timestamp":"2026-02-11T10:00:01Z","message":{"role":"user","content":"first"}}"#,
        ]);

        let msgs = parse_gateway_file(f.path()).unwrap();
        assert_eq!(msgs[0].text, "first");
        assert_eq!(msgs[1].text, "second");
    }

    #[test]
    fn skips_thinking_and_tool_call_blocks() {
        let f = write_jsonl(&[
            r#"{"type":"message","timestamp":"2026-02-11T10:00:00Z","message":{"role":"assistant","content":[{"type":"thinking","text":"..."},{"type":"toolCall","text":"ls"},{"type":"text","text":"answer"}]}}"#,
        ]);

        let msgs = parse_gateway_file(f.path()).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].text, "answer");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let f = write_jsonl(&[
            "{broken",
            r#"{"type":"message","timestamp":"2026-02-11T10:00:00Z","message":{"role":"user","content":"ok"}}"#,
        ]);

        let msgs = parse_gateway_file(f.path()).unwrap();
        assert_eq!(msgs.len(), 1);
    }
}
