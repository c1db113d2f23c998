//! Backfill driver
//!
//! Single-threaded by design: extraction is LLM-bound and rate limits are
//! the real constraint. State is saved at every file boundary and before
//! every pause, so an interrupt finishes the current chunk and resumes
//! cleanly next run.

use super::{
    build_fingerprint, chunk_conversation, format_transcript, parse_claude_file,
    parse_gateway_file, BackfillState, ConversationMessage, FileFingerprint, FileSource,
};
use crate::db;
use crate::services::extractor::Extractor;
use crate::services::slack::Poster;
use chrono::{DateTime, Utc};
use dredd_common::Result;
use sqlx::PgPool;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const BATCH_PAUSE: Duration = Duration::from_secs(30);

/// Backfill run configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Claude Code transcript directory
    pub cc_dir: PathBuf,
    /// Gateway session directory
    pub gateway_dir: PathBuf,
    /// Only process conversations with messages at or after this time
    pub since: Option<DateTime<Utc>>,
    /// Only process conversations with messages at or before this time
    pub until: Option<DateTime<Utc>>,
    /// Parse and extract but skip DB writes
    pub dry_run: bool,
    /// Chunks per batch before the pacing pause
    pub batch_size: usize,
    /// Minimum messages per conversation
    pub min_messages: usize,
    /// Owner attributed to extracted records
    pub owner_uuid: Uuid,
    /// Process a single file instead of the directories
    pub single_file: Option<PathBuf>,
    /// Source label for persisted records
    pub source: String,
    /// Skip conversations with no human messages
    pub skip_subagents: bool,
    /// Override the state file location (tests)
    pub state_path: Option<PathBuf>,
}

/// Per-file result summary for batch reports.
#[derive(Debug, Clone, Default)]
pub struct FileSummary {
    pub path: PathBuf,
    pub source: &'static str,
    pub date: String,
    pub chunks: usize,
    pub decisions: usize,
    pub patterns: usize,
    pub errors: usize,
}

struct ParsedFile {
    path: PathBuf,
    source: FileSource,
    msgs: Vec<ConversationMessage>,
    fingerprint: FileFingerprint,
}

/// Orchestrates the backfill process.
pub struct Runner {
    cfg: RunnerConfig,
    pool: Option<PgPool>,
    extractor: Extractor,
    slack: Option<Poster>,
}

impl Runner {
    /// `pool` may be `None` only for dry runs.
    pub fn new(
        cfg: RunnerConfig,
        pool: Option<PgPool>,
        extractor: Extractor,
        slack: Option<Poster>,
    ) -> Self {
        Self {
            cfg,
            pool,
            extractor,
            slack,
        }
    }

    fn source_label(&self) -> &str {
        if self.cfg.source.is_empty() {
            "backfill"
        } else {
            &self.cfg.source
        }
    }

    /// Executes the backfill. Cancellation finishes the current chunk, saves
    /// state, and returns cleanly.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let mut state = match &self.cfg.state_path {
            Some(path) => BackfillState::load_from(path.clone())?,
            None => BackfillState::load()?,
        };

        let (cc_files, gw_files) = self.discover_files()?;
        tracing::info!(
            cc_files = cc_files.len(),
            gateway_files = gw_files.len(),
            "files discovered"
        );

        let cc_parsed = self.parse_pool(&cc_files, FileSource::Claude, &mut state);
        let gw_parsed = self.parse_pool(&gw_files, FileSource::Gateway, &mut state);

        // Cross-source dedup: the Claude recording wins on conflict.
        let cc_fps: Vec<FileFingerprint> =
            cc_parsed.iter().map(|p| p.fingerprint.clone()).collect();
        let gw_fps: Vec<FileFingerprint> =
            gw_parsed.iter().map(|p| p.fingerprint.clone()).collect();
        let duplicates = super::find_duplicates(&cc_fps, &gw_fps);

        let mut all_files = cc_parsed;
        let mut gateway_skipped = 0;
        for gw in gw_parsed {
            if duplicates.contains(&gw.path) {
                tracing::info!(path = %gw.path.display(), "skipping duplicate gateway file");
                gateway_skipped += 1;
                continue;
            }
            all_files.push(gw);
        }

        state.files_remaining = all_files.len();
        tracing::info!(
            total = all_files.len(),
            gateway_skipped,
            "files to process"
        );

        let mut total_decisions = 0usize;
        let mut total_patterns = 0usize;
        let mut total_chunks = 0usize;
        let mut chunks_in_batch = 0usize;
        let mut file_summaries: Vec<FileSummary> = Vec::new();

        for parsed in &all_files {
            if cancel.is_cancelled() {
                tracing::info!("backfill interrupted, saving state");
                state.save()?;
                self.post_batch_summary(&file_summaries).await;
                return Ok(());
            }

            tracing::info!(
                path = %parsed.path.display(),
                messages = parsed.msgs.len(),
                source = parsed.source.as_str(),
                "processing file"
            );

            let mut summary = FileSummary {
                path: parsed.path.clone(),
                source: parsed.source.as_str(),
                date: parsed
                    .msgs
                    .first()
                    .and_then(|m| m.timestamp)
                    .map(|ts| ts.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
                ..Default::default()
            };

            let session_ref = parsed.path.to_string_lossy();
            let chunks = chunk_conversation(&parsed.msgs, &session_ref, parsed.source);
            if chunks.is_empty() {
                state.mark_processed(&parsed.path);
                continue;
            }

            for chunk in &chunks {
                if cancel.is_cancelled() {
                    state.save()?;
                    self.post_batch_summary(&file_summaries).await;
                    return Ok(());
                }

                let transcript = format_transcript(chunk);
                if transcript.trim().is_empty() {
                    continue;
                }

                tracing::info!(
                    session_ref = %chunk.session_ref,
                    messages = chunk.messages.len(),
                    "extracting chunk"
                );

                let result = match self
                    .extractor
                    .extract(&chunk.session_ref, self.cfg.owner_uuid, &transcript)
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::error!(session_ref = %chunk.session_ref, error = %e, "extraction failed");
                        state.add_error(format!("extract {}: {e}", chunk.session_ref));
                        summary.errors += 1;
                        continue;
                    }
                };

                let decisions = result.decisions.len();
                let patterns = result.patterns.len();

                if !self.cfg.dry_run {
                    if let Err(e) = self.persist(&result).await {
                        tracing::error!(session_ref = %chunk.session_ref, error = %e, "persist failed");
                        state.add_error(format!("persist {}: {e}", chunk.session_ref));
                        summary.errors += 1;
                        continue;
                    }
                }

                total_decisions += decisions;
                total_patterns += patterns;
                total_chunks += 1;
                chunks_in_batch += 1;
                summary.decisions += decisions;
                summary.patterns += patterns;
                summary.chunks += 1;

                tracing::info!(
                    session_ref = %chunk.session_ref,
                    decisions,
                    patterns,
                    dry_run = self.cfg.dry_run,
                    "chunk processed"
                );

                state.chunks_processed += 1;
                state.decisions_found += decisions;
                state.patterns_found += patterns;

                // Pacing: pause after each batch to respect LLM rate limits.
                if chunks_in_batch >= self.cfg.batch_size {
                    tracing::info!(
                        chunks_in_batch,
                        total_chunks,
                        "batch complete, saving state and pausing"
                    );
                    state.save()?;
                    chunks_in_batch = 0;

                    self.post_batch_summary(&file_summaries).await;
                    file_summaries.clear();

                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(BATCH_PAUSE) => {}
                    }
                }
            }

            file_summaries.push(summary);
            state.mark_processed(&parsed.path);
            state.files_remaining = state.files_remaining.saturating_sub(1);
            state.save()?;
        }

        state.save()?;
        self.post_batch_summary(&file_summaries).await;

        tracing::info!(
            files_processed = all_files.len(),
            chunks_processed = total_chunks,
            decisions_found = total_decisions,
            patterns_found = total_patterns,
            dry_run = self.cfg.dry_run,
            "backfill complete"
        );

        println!("\n=== Backfill Summary ===");
        println!("Files processed: {}", all_files.len());
        println!("Chunks processed: {total_chunks}");
        println!("Decisions found: {total_decisions}");
        println!("Patterns found: {total_patterns}");
        println!("Errors: {}", state.errors.len());
        if self.cfg.dry_run {
            println!("Mode: DRY RUN (no DB writes)");
        }

        Ok(())
    }

    /// Parses every unprocessed candidate file of one source and applies the
    /// message-count, subagent, and date filters.
    fn parse_pool(
        &self,
        files: &[PathBuf],
        source: FileSource,
        state: &mut BackfillState,
    ) -> Vec<ParsedFile> {
        let mut parsed = Vec::new();

        for path in files {
            if state.is_processed(path) {
                continue;
            }

            let result = match source {
                FileSource::Claude => parse_claude_file(path),
                FileSource::Gateway => parse_gateway_file(path),
            };
            let msgs = match result {
                Ok(msgs) => msgs,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse file");
                    state.add_error(format!("parse {}: {e}", path.display()));
                    continue;
                }
            };

            if msgs.len() < self.cfg.min_messages {
                continue;
            }
            if self.cfg.skip_subagents && !has_human_messages(&msgs) {
                continue;
            }
            if !self.in_date_range(&msgs) {
                continue;
            }

            let fingerprint = build_fingerprint(path, source, &msgs);
            parsed.push(ParsedFile {
                path: path.clone(),
                source,
                msgs,
                fingerprint,
            });
        }

        parsed
    }

    async fn persist(&self, result: &crate::models::ExtractionResult) -> Result<()> {
        let Some(pool) = &self.pool else {
            return Err(dredd_common::Error::Config(
                "no database configured for persist".to_string(),
            ));
        };
        let source = self.source_label();

        for decision in &result.decisions {
            db::decisions::write_decision_episode(
                pool,
                result.owner_uuid,
                &result.session_ref,
                source,
                decision,
                None,
            )
            .await?;
        }
        for pattern in &result.patterns {
            db::patterns::write_reasoning_pattern(
                pool,
                result.owner_uuid,
                &result.session_ref,
                pattern,
                None,
            )
            .await?;
        }
        for style in &result.styles {
            db::styles::write_style(pool, result.owner_uuid, &result.session_ref, source, style)
                .await?;
        }
        Ok(())
    }

    /// Posts a batch summary to Slack when configured, logs it otherwise.
    async fn post_batch_summary(&self, summaries: &[FileSummary]) {
        if summaries.is_empty() {
            return;
        }

        let text = format_daily_summary(summaries);

        let Some(poster) = &self.slack else {
            tracing::info!(summary = %text, "backfill batch summary (no slack configured)");
            return;
        };

        if let Err(e) = poster.post_thread("", &text).await {
            tracing::warn!(error = %e, summary = %text, "failed to post batch summary, logging instead");
        }
    }

    fn discover_files(&self) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        if let Some(single) = &self.cfg.single_file {
            let path = expand_home(single);
            if !path.exists() {
                return Err(dredd_common::Error::NotFound(format!(
                    "single file not found: {}",
                    path.display()
                )));
            }
            // Infer the source from the recorder's directory layout.
            if path.to_string_lossy().contains(".openclaw") {
                return Ok((Vec::new(), vec![path]));
            }
            return Ok((vec![path], Vec::new()));
        }

        let cc_files = collect_jsonl(&expand_home(&self.cfg.cc_dir));
        let gw_files = collect_jsonl(&expand_home(&self.cfg.gateway_dir));
        Ok((cc_files, gw_files))
    }

    fn in_date_range(&self, msgs: &[ConversationMessage]) -> bool {
        if self.cfg.since.is_none() && self.cfg.until.is_none() {
            return true;
        }

        msgs.iter().filter_map(|m| m.timestamp).any(|ts| {
            if let Some(since) = self.cfg.since {
                if ts < since {
                    return false;
                }
            }
            if let Some(until) = self.cfg.until {
                if ts > until {
                    return false;
                }
            }
            true
        })
    }
}

/// At least one user message not injected by a scheduler.
fn has_human_messages(msgs: &[ConversationMessage]) -> bool {
    msgs.iter()
        .any(|m| m.role == "user" && !m.text.starts_with("[cron:"))
}

/// Formats file summaries grouped by date.
pub fn format_daily_summary(summaries: &[FileSummary]) -> String {
    let mut by_date: BTreeMap<&str, Vec<&FileSummary>> = BTreeMap::new();
    for s in summaries {
        let date = if s.date.is_empty() { "unknown" } else { &s.date };
        by_date.entry(date).or_default().push(s);
    }

    let mut out = String::from("*Backfill Batch Summary*\n");

    for (date, files) in by_date {
        let total_dec: usize = files.iter().map(|f| f.decisions).sum();
        let total_pat: usize = files.iter().map(|f| f.patterns).sum();
        let _ = write!(
            out,
            "\n*{date}* ({} files, {total_dec} decisions, {total_pat} patterns)\n",
            files.len()
        );
        for f in files {
            let name = f
                .path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let _ = write!(
                out,
                "  - {name} [{}]: {} dec, {} pat",
                f.source, f.decisions, f.patterns
            );
            if f.errors > 0 {
                let _ = write!(out, " ({} errors)", f.errors);
            }
            out.push('\n');
        }
    }

    out
}

fn expand_home(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn collect_jsonl(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    collect_jsonl_into(dir, &mut files);
    files.sort();
    files
}

fn collect_jsonl_into(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return; // missing or unreadable directories are skipped
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_jsonl_into(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "jsonl") {
            out.push(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn human_message_detection() {
        let human = vec![ConversationMessage {
            role: "user".into(),
            text: "please fix".into(),
            timestamp: None,
        }];
        assert!(has_human_messages(&human));

        let cron_only = vec![ConversationMessage {
            role: "user".into(),
            text: "[cron: nightly] run checks".into(),
            timestamp: None,
        }];
        assert!(!has_human_messages(&cron_only));

        let assistant_only = vec![ConversationMessage {
            role: "assistant".into(),
            text: "hello".into(),
            timestamp: None,
        }];
        assert!(!has_human_messages(&assistant_only));
    }

    #[test]
    fn daily_summary_groups_by_date() {
        let summaries = vec![
            FileSummary {
                path: PathBuf::from("/x/a.jsonl"),
                source: "cc",
                date: "2026-02-11".into(),
                chunks: 2,
                decisions: 3,
                patterns: 1,
                errors: 0,
            },
            FileSummary {
                path: PathBuf::from("/x/b.jsonl"),
                source: "gateway",
                date: "2026-02-10".into(),
                chunks: 1,
                decisions: 1,
                patterns: 0,
                errors: 2,
            },
        ];

        let text = format_daily_summary(&summaries);
        assert!(text.contains("*Backfill Batch Summary*"));
        assert!(text.contains("*2026-02-10* (1 files, 1 decisions, 0 patterns)"));
        assert!(text.contains("*2026-02-11* (1 files, 3 decisions, 1 patterns)"));
        assert!(text.contains("a.jsonl [cc]: 3 dec, 1 pat"));
        assert!(text.contains("b.jsonl [gateway]: 1 dec, 0 pat (2 errors)"));
        // Dates come out sorted.
        let pos10 = text.find("2026-02-10").unwrap();
        let pos11 = text.find("2026-02-11").unwrap();
        assert!(pos10 < pos11);
    }

    #[test]
    fn collect_jsonl_walks_recursively() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("proj/sessions");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(dir.path().join("top.jsonl"), "").unwrap();
        std::fs::write(nested.join("deep.jsonl"), "").unwrap();
        std::fs::write(nested.join("notes.txt"), "").unwrap();

        let files = collect_jsonl(dir.path());
        assert_eq!(files.len(), 2);
        assert!(files.iter().all(|f| f.extension().unwrap() == "jsonl"));
    }

    #[test]
    fn expand_home_passthrough_for_absolute_paths() {
        let p = PathBuf::from("/var/data/x.jsonl");
        assert_eq!(expand_home(&p), p);
    }
}
