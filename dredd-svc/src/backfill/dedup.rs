//! Cross-source duplicate detection
//!
//! Both recorders can capture the same conversation. Message timestamps are
//! the fingerprint: when most of a gateway file's timestamps line up with a
//! Claude file's within one second, it is the same session recorded twice
//! and the Claude copy wins.

use super::{ConversationMessage, FileSource};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Tolerance for matching timestamps across recorders.
const DEDUP_WINDOW_SECS: i64 = 1;

/// Fraction of timestamps that must match to call two files duplicates.
const OVERLAP_THRESHOLD: f64 = 0.8;

/// Timing and content fingerprint of one parsed file.
#[derive(Debug, Clone)]
pub struct FileFingerprint {
    pub path: PathBuf,
    pub source: FileSource,
    pub timestamps: Vec<DateTime<Utc>>,
    /// first three message texts, trimmed to 100 chars
    pub previews: Vec<String>,
}

/// Builds a fingerprint from parsed conversation messages.
pub fn build_fingerprint(
    path: &Path,
    source: FileSource,
    msgs: &[ConversationMessage],
) -> FileFingerprint {
    FileFingerprint {
        path: path.to_path_buf(),
        source,
        timestamps: msgs.iter().filter_map(|m| m.timestamp).collect(),
        previews: msgs
            .iter()
            .take(3)
            .map(|m| m.text.chars().take(100).collect())
            .collect(),
    }
}

/// Returns the gateway file paths that overlap with some Claude file.
/// Claude is the preferred source; its files are never dropped.
pub fn find_duplicates(
    claude_fps: &[FileFingerprint],
    gateway_fps: &[FileFingerprint],
) -> HashSet<PathBuf> {
    let mut duplicates = HashSet::new();

    for gw in gateway_fps {
        if gw.timestamps.is_empty() {
            continue;
        }
        if claude_fps.iter().any(|cc| is_overlapping(cc, gw)) {
            duplicates.insert(gw.path.clone());
        }
    }

    duplicates
}

/// True when at least 80% of `b`'s timestamps appear in `a` within the
/// matching window.
fn is_overlapping(a: &FileFingerprint, b: &FileFingerprint) -> bool {
    if b.timestamps.is_empty() {
        return false;
    }

    let window = Duration::seconds(DEDUP_WINDOW_SECS);
    let matches = b
        .timestamps
        .iter()
        .filter(|bt| {
            a.timestamps
                .iter()
                .any(|at| (**bt - *at).abs() <= window)
        })
        .count();

    matches as f64 / b.timestamps.len() as f64 >= OVERLAP_THRESHOLD
}
