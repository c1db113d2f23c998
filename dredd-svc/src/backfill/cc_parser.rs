//! Claude Code transcript parser
//!
//! Claude Code stores a session as JSONL where each line is a node in a
//! conversation tree linked by `parentUuid`. The parser walks the chain from
//! the roots, appends any orphans in file order, and keeps only the plain
//! text of user and assistant turns. Tool traffic and thinking blocks are
//! not conversation.

use super::ConversationMessage;
use chrono::{DateTime, Utc};
use dredd_common::Result;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct CcLine {
    #[serde(rename = "type", default)]
    line_type: String,
    #[serde(default)]
    uuid: String,
    #[serde(rename = "parentUuid", default)]
    parent_uuid: Option<String>,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    message: CcMessage,
}

#[derive(Debug, Default, Deserialize)]
struct CcMessage {
    #[serde(default)]
    content: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CcContentBlock {
    #[serde(rename = "type", default)]
    block_type: String,
    #[serde(default)]
    text: String,
}

/// Parses a Claude Code JSONL file into an ordered conversation.
/// Malformed lines are skipped; a missing file is an error.
pub fn parse_claude_file(path: &Path) -> Result<Vec<ConversationMessage>> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    // First pass: collect user/assistant lines keyed by uuid, track the
    // parent chain and the original file order.
    let mut by_uuid: HashMap<String, CcLine> = HashMap::new();
    let mut file_order: Vec<String> = Vec::new();
    let mut roots: Vec<String> = Vec::new();
    let mut children: HashMap<String, String> = HashMap::new();

    for line in reader.lines() {
        let Ok(line) = line else { continue };
        let Ok(parsed) = serde_json::from_str::<CcLine>(&line) else {
            continue; // skip malformed lines
        };

        if parsed.line_type != "user" && parsed.line_type != "assistant" {
            continue;
        }

        match parsed.parent_uuid.as_deref() {
            None | Some("") => roots.push(parsed.uuid.clone()),
            Some(parent) => {
                children.insert(parent.to_string(), parsed.uuid.clone());
            }
        }
        file_order.push(parsed.uuid.clone());
        by_uuid.insert(parsed.uuid.clone(), parsed);
    }

    if by_uuid.is_empty() {
        return Ok(Vec::new());
    }

    // Walk each chain from its root following parentUuid links.
    let mut ordered: Vec<&CcLine> = Vec::new();
    let mut visited: HashMap<&str, ()> = HashMap::new();
    for root in &roots {
        let mut current = root.as_str();
        while let Some(line) = by_uuid.get(current) {
            if visited.insert(&line.uuid, ()).is_some() {
                break; // cycle guard
            }
            ordered.push(line);
            match children.get(current) {
                Some(next) => current = next.as_str(),
                None => break,
            }
        }
    }

    // Orphans the chain walk missed are appended in file order.
    if visited.len() < by_uuid.len() {
        for uuid in &file_order {
            if !visited.contains_key(uuid.as_str()) {
                if let Some(line) = by_uuid.get(uuid) {
                    ordered.push(line);
                }
            }
        }
    }

    let mut msgs = Vec::new();
    for line in ordered {
        let (text, is_tool_result) = extract_text(&line.message.content);
        if is_tool_result || text.is_empty() {
            continue;
        }

        msgs.push(ConversationMessage {
            role: line.line_type.clone(),
            text,
            timestamp: parse_timestamp(&line.timestamp),
        });
    }

    Ok(msgs)
}

/// Extracts the text content of a message. Returns the text and whether the
/// message was a tool result (skipped entirely).
fn extract_text(content: &serde_json::Value) -> (String, bool) {
    // Plain string content (some user messages).
    if let Some(text) = content.as_str() {
        return (text.to_string(), false);
    }

    let Ok(blocks) = serde_json::from_value::<Vec<CcContentBlock>>(content.clone()) else {
        return (String::new(), false);
    };

    if blocks.iter().any(|b| b.block_type == "tool_result") {
        return (String::new(), true);
    }

    // Text blocks only; tool_use and thinking blocks are dropped.
    let text = blocks
        .iter()
        .filter(|b| b.block_type == "text" && !b.text.is_empty())
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    (text, false)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
