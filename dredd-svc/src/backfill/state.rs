//! Resumable backfill state
//!
//! Progress is a pretty-printed JSON file under the operator's workspace.
//! Saves go through a temp file and rename so an interrupt never leaves a
//! half-written state behind.

use chrono::{DateTime, Utc};
use dredd_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_STATE_FILE: &str = ".openclaw/workspace/dredd-backfill-state.json";

/// Progress tracking for resumable backfill runs.
#[derive(Debug, Serialize, Deserialize)]
pub struct BackfillState {
    pub started_at: DateTime<Utc>,
    pub last_processed_at: DateTime<Utc>,
    pub files_processed: Vec<String>,
    pub files_remaining: usize,
    pub chunks_processed: usize,
    pub decisions_found: usize,
    pub patterns_found: usize,
    pub errors: Vec<String>,

    #[serde(skip)]
    path: PathBuf,
}

impl BackfillState {
    /// The default on-disk location, under the operator's home directory.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(DEFAULT_STATE_FILE)
    }

    /// Loads state from the default path, or starts fresh.
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Loads state from an explicit path, or starts fresh when the file does
    /// not exist yet.
    pub fn load_from(path: PathBuf) -> Result<Self> {
        match std::fs::read(&path) {
            Ok(data) => {
                let mut state: BackfillState = serde_json::from_slice(&data)
                    .map_err(|e| Error::InvalidInput(format!("parse state: {e}")))?;
                state.path = path;
                Ok(state)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::fresh(path)),
            Err(e) => Err(e.into()),
        }
    }

    fn fresh(path: PathBuf) -> Self {
        Self {
            started_at: Utc::now(),
            last_processed_at: Utc::now(),
            files_processed: Vec::new(),
            files_remaining: 0,
            chunks_processed: 0,
            decisions_found: 0,
            patterns_found: 0,
            errors: Vec::new(),
            path,
        }
    }

    /// Persists the state atomically (write temp, then rename).
    pub fn save(&mut self) -> Result<()> {
        self.last_processed_at = Utc::now();

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec_pretty(self)
            .map_err(|e| Error::Internal(format!("marshal state: {e}")))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Whether a file was already processed in a previous run.
    pub fn is_processed(&self, path: &Path) -> bool {
        let path = path.to_string_lossy();
        self.files_processed.iter().any(|p| *p == path)
    }

    /// Records a file as processed.
    pub fn mark_processed(&mut self, path: &Path) {
        self.files_processed
            .push(path.to_string_lossy().into_owned());
    }

    /// Records a processing error.
    pub fn add_error(&mut self, msg: String) {
        self.errors.push(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let state = BackfillState::load_from(dir.path().join("state.json")).unwrap();
        assert!(state.files_processed.is_empty());
        assert_eq!(state.chunks_processed, 0);
    }

    #[test]
    fn save_and_reload_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = BackfillState::load_from(path.clone()).unwrap();
        state.mark_processed(Path::new("/tmp/a.jsonl"));
        state.chunks_processed = 7;
        state.decisions_found = 3;
        state.add_error("extract failed".to_string());
        state.save().unwrap();

        let reloaded = BackfillState::load_from(path).unwrap();
        assert!(reloaded.is_processed(Path::new("/tmp/a.jsonl")));
        assert!(!reloaded.is_processed(Path::new("/tmp/b.jsonl")));
        assert_eq!(reloaded.chunks_processed, 7);
        assert_eq!(reloaded.decisions_found, 3);
        assert_eq!(reloaded.errors.len(), 1);
    }

    #[test]
    fn save_is_atomic_replace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let mut state = BackfillState::load_from(path.clone()).unwrap();
        state.save().unwrap();
        state.chunks_processed = 1;
        state.save().unwrap();

        // No temp file left behind, and the final state is the last save.
        assert!(!path.with_extension("json.tmp").exists());
        let reloaded = BackfillState::load_from(path).unwrap();
        assert_eq!(reloaded.chunks_processed, 1);
    }

    #[test]
    fn files_processed_is_append_only() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = BackfillState::load_from(dir.path().join("s.json")).unwrap();

        state.mark_processed(Path::new("a"));
        state.mark_processed(Path::new("b"));
        assert_eq!(state.files_processed, vec!["a", "b"]);
    }

    #[test]
    fn corrupt_state_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(BackfillState::load_from(path).is_err());
    }
}
