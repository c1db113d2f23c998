//! dredd - knowledge-extraction judge for the agent swarm
//!
//! Three entry points: `serve` (default) runs the always-on service driven
//! by the bus; `backfill` replays historical transcripts through the same
//! extractor; `dedup` collapses near-duplicate records by embedding
//! similarity.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use dredd_common::config::Config;
use dredd_common::events::{self, Registration};
use dredd_svc::api::{build_router, AppState};
use dredd_svc::backfill::{Runner, RunnerConfig};
use dredd_svc::bus::Bus;
use dredd_svc::dedup::{self, DedupTable};
use dredd_svc::services::{
    AnthropicClient, ChronicleClient, Extractor, Poster, Processor,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Default owner attributed to backfilled records.
const DEFAULT_BACKFILL_OWNER: &str = "9f6ed519-5763-4e30-9c2f-5580e0c57703";

#[derive(Parser, Debug)]
#[command(name = "dredd", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the always-on extraction service (default)
    Serve,

    /// Reprocess historical transcripts through the extractor
    Backfill {
        /// Claude Code transcript directory
        #[arg(long, default_value = "~/.claude/projects")]
        cc_dir: PathBuf,

        /// Gateway session directory
        #[arg(long, default_value = "~/.openclaw/agents/main/sessions")]
        gateway_dir: PathBuf,

        /// Only process files with messages after this date (YYYY-MM-DD)
        #[arg(long)]
        since: Option<String>,

        /// Only process files with messages before this date (YYYY-MM-DD)
        #[arg(long)]
        until: Option<String>,

        /// Parse and extract but don't write to the database
        #[arg(long)]
        dry_run: bool,

        /// Number of chunks to process before pausing
        #[arg(long, default_value_t = 10)]
        batch_size: usize,

        /// Minimum messages per conversation to process
        #[arg(long, default_value_t = 5)]
        min_messages: usize,

        /// Owner UUID for extracted records
        #[arg(long, default_value = DEFAULT_BACKFILL_OWNER)]
        owner: String,

        /// Process a single file instead of the directories
        #[arg(long)]
        file: Option<PathBuf>,

        /// Source label for persisted records
        #[arg(long, default_value = "backfill")]
        source: String,

        /// Skip conversations with no human messages
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        skip_subagents: bool,
    },

    /// Collapse near-duplicate records by embedding similarity
    Dedup {
        /// Similarity threshold in (0.0, 1.0]
        #[arg(long, default_value_t = dedup::DEFAULT_THRESHOLD)]
        threshold: f64,

        /// Execute deduplication (default is dry-run)
        #[arg(long)]
        execute: bool,

        /// Table to deduplicate: patterns, decisions, or all
        #[arg(long, default_value = "all")]
        table: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load();

    init_tracing(&cfg.log_level);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => run_serve(cfg).await,
        Command::Backfill {
            cc_dir,
            gateway_dir,
            since,
            until,
            dry_run,
            batch_size,
            min_messages,
            owner,
            file,
            source,
            skip_subagents,
        } => {
            let runner_cfg = RunnerConfig {
                cc_dir,
                gateway_dir,
                since: since.as_deref().map(parse_day_start).transpose()?,
                until: until.as_deref().map(parse_day_end).transpose()?,
                dry_run,
                batch_size,
                min_messages,
                owner_uuid: Uuid::parse_str(&owner).context("invalid owner UUID")?,
                single_file: file,
                source,
                skip_subagents,
                state_path: None,
            };
            run_backfill(cfg, runner_cfg).await
        }
        Command::Dedup {
            threshold,
            execute,
            table,
        } => run_dedup(cfg, threshold, execute, table).await,
    }
}

fn init_tracing(log_level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("dredd_svc={log_level},dredd_common={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_serve(cfg: Config) -> Result<()> {
    info!(port = cfg.port, "dredd starting");

    cfg.require_database()?;
    cfg.require_anthropic()?;

    let db = dredd_svc::db::connect(&cfg.database_url).await?;
    info!("database connected");

    let llm = AnthropicClient::new(&cfg.anthropic_api_key, &cfg.anthropic_model)?;
    info!(model = %cfg.anthropic_model, "anthropic client ready");
    let extractor = Extractor::new(llm);

    let bus = Bus::connect(&cfg.nats_url, &cfg.nats_token).await?;
    info!(url = %cfg.nats_url, "bus connected");

    // Slack is optional: without it Dredd extracts and persists, but the
    // review loop stays dark.
    let slack = if cfg.slack_configured() {
        info!(channel = %cfg.slack_channel, "slack poster ready");
        Some(Poster::new(&cfg.slack_bot_token, &cfg.slack_channel))
    } else {
        warn!("slack not configured, running without review loop");
        None
    };

    let chronicle = ChronicleClient::new(&cfg.chronicle_url);

    let processor = Arc::new(Processor::new(
        db.clone(),
        extractor,
        bus.clone(),
        slack,
        chronicle,
    ));

    subscribe_all(&bus, &processor).await?;

    // HTTP API
    let state = AppState::new(db, Some(bus.clone()), cfg.api_token.clone());
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", cfg.port))
        .await
        .with_context(|| format!("bind port {}", cfg.port))?;
    info!(port = cfg.port, "HTTP API listening");

    let shutdown = CancellationToken::new();
    let http_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move { http_shutdown.cancelled().await })
            .await;
        if let Err(e) = result {
            error!(error = %e, "HTTP server error");
        }
    });

    // Announce registration; a failed announcement is not fatal.
    let registration = Registration {
        timestamp: Utc::now(),
        port: cfg.port,
        mode: "shadow".to_string(),
    };
    if let Err(e) = bus.publish_json(events::SUBJECT_REGISTERED, &registration).await {
        warn!(error = %e, "failed to publish registration");
    }

    info!(port = cfg.port, "dredd ready, shadow mode");

    wait_for_shutdown_signal().await;
    info!("shutting down");

    shutdown.cancel();
    // Give in-flight HTTP requests up to 5 seconds to complete.
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), server).await;

    info!("dredd stopped");
    Ok(())
}

async fn subscribe_all(bus: &Bus, processor: &Arc<Processor>) -> Result<()> {
    let p = processor.clone();
    bus.subscribe(events::SUBJECT_TRANSCRIPT_STORED, move |_subject, data| {
        let p = p.clone();
        async move { p.handle_transcript_stored(&data).await }
    })
    .await?;

    let p = processor.clone();
    bus.subscribe(events::SUBJECT_SLACK_REACTION, move |_subject, data| {
        let p = p.clone();
        async move { p.handle_reaction(&data).await }
    })
    .await?;

    let p = processor.clone();
    bus.subscribe(events::SUBJECT_SLACK_INTERACTION, move |_subject, data| {
        let p = p.clone();
        async move { p.handle_gate_decision(&data).await }
    })
    .await?;

    let p = processor.clone();
    bus.subscribe(events::SUBJECT_GATE_EVIDENCE, move |_subject, data| {
        let p = p.clone();
        async move { p.handle_gate_evidence(&data).await }
    })
    .await?;

    let p = processor.clone();
    bus.subscribe(events::SUBJECT_TASK_PICKED, move |_subject, data| {
        let p = p.clone();
        async move { p.handle_task_picked(&data).await }
    })
    .await?;

    let p = processor.clone();
    bus.subscribe(events::SUBJECT_TASK_REGENERATED, move |_subject, data| {
        let p = p.clone();
        async move { p.handle_task_regenerated(&data).await }
    })
    .await?;

    Ok(())
}

async fn run_backfill(cfg: Config, runner_cfg: RunnerConfig) -> Result<()> {
    cfg.require_anthropic()?;

    let llm = AnthropicClient::new(&cfg.anthropic_api_key, &cfg.anthropic_model)?;
    let extractor = Extractor::new(llm);

    let pool = if runner_cfg.dry_run {
        None
    } else {
        if cfg.database_url.is_empty() {
            bail!("DATABASE_URL is required (use --dry-run to skip DB)");
        }
        Some(dredd_svc::db::connect(&cfg.database_url).await?)
    };

    let slack = if cfg.slack_configured() {
        Some(Poster::new(&cfg.slack_bot_token, &cfg.slack_channel))
    } else {
        None
    };

    info!(
        cc_dir = %runner_cfg.cc_dir.display(),
        gateway_dir = %runner_cfg.gateway_dir.display(),
        dry_run = runner_cfg.dry_run,
        batch_size = runner_cfg.batch_size,
        min_messages = runner_cfg.min_messages,
        owner = %runner_cfg.owner_uuid,
        source = %runner_cfg.source,
        skip_subagents = runner_cfg.skip_subagents,
        "backfill starting"
    );

    // Finish the current chunk on interrupt, then save and exit cleanly.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, finishing current chunk");
            signal_cancel.cancel();
        }
    });

    let runner = Runner::new(runner_cfg, pool, extractor, slack);
    runner.run(&cancel).await?;
    Ok(())
}

async fn run_dedup(cfg: Config, threshold: f64, execute: bool, table: String) -> Result<()> {
    cfg.require_database()?;

    if threshold <= 0.0 || threshold > 1.0 {
        bail!("threshold must be in (0.0, 1.0]");
    }
    if !matches!(table.as_str(), "patterns" | "decisions" | "all") {
        bail!("table must be 'patterns', 'decisions', or 'all'");
    }

    let db = dredd_svc::db::connect(&cfg.database_url).await?;
    info!(threshold, execute, table = %table, "dedup starting");

    if table == "patterns" || table == "all" {
        let report = dedup::deduplicate(&db, DedupTable::Patterns, threshold, execute).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    if table == "decisions" || table == "all" {
        let report = dedup::deduplicate(&db, DedupTable::Decisions, threshold, execute).await?;
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    info!("dedup completed");
    Ok(())
}

fn parse_day_start(raw: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date: {raw}"))?;
    Ok(date
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always valid")
        .and_utc())
}

fn parse_day_end(raw: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("invalid date: {raw}"))?;
    // Inclusive end of day.
    Ok(date
        .and_hms_milli_opt(23, 59, 59, 999)
        .expect("end of day is always valid")
        .and_utc())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
