//! Review pipeline processor
//!
//! Owns the live path: transcript event in, extraction out, review thread
//! posted, pending reactions tracked, verdicts fanned out as signals.
//!
//! The two pending maps are the only shared mutable state in the service.
//! Entries are consumed on the first non-unknown reaction, which makes every
//! review item single-shot; a second reaction finds nothing and is dropped.

use crate::bus::Bus;
use crate::db;
use crate::models::{DecisionEpisode, ExtractionResult, ReasoningPattern, TranscriptEvent};
use crate::services::chronicle::ChronicleClient;
use crate::services::extractor::Extractor;
use crate::services::slack::{self, ItemKind, Poster, Verdict};
use crate::trust;
use dredd_common::events::{
    self, AssignmentSignal, CorrectionSignal, ExtractionRejected, PatternConfirmed, TrustSignal,
};
use parking_lot::Mutex;
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

/// Payload of a single pending review item.
#[derive(Debug, Clone)]
pub(crate) enum PendingPayload {
    Decision(DecisionEpisode),
    Pattern(ReasoningPattern),
}

/// Maps one Slack thread-reply timestamp to its stored extraction.
#[derive(Debug, Clone)]
pub(crate) struct PendingItem {
    pub session_ref: String,
    pub owner_uuid: Uuid,
    pub stored_id: Uuid,
    pub payload: PendingPayload,
}

/// Tracks the header timestamp and everything posted under it, for reviewers
/// who react to the summary instead of a specific item.
#[derive(Debug, Clone)]
pub(crate) struct PendingReview {
    pub session_ref: String,
    pub owner_uuid: Uuid,
    pub decision_ids: Vec<Uuid>,
    pub pattern_ids: Vec<Uuid>,
    pub decisions: Vec<DecisionEpisode>,
    pub patterns: Vec<ReasoningPattern>,
}

/// In-memory pending-review state. One mutex guards both maps; lock
/// sections cover map access only, never IO.
#[derive(Default)]
pub(crate) struct PendingMaps {
    inner: Mutex<PendingInner>,
}

#[derive(Default)]
struct PendingInner {
    items: HashMap<String, PendingItem>,
    reviews: HashMap<String, PendingReview>,
}

impl PendingMaps {
    pub fn insert_item(&self, ts: String, item: PendingItem) {
        self.inner.lock().items.insert(ts, item);
    }

    pub fn insert_review(&self, ts: String, review: PendingReview) {
        self.inner.lock().reviews.insert(ts, review);
    }

    /// Consumes the per-item entry for a timestamp, if present.
    pub fn take_item(&self, ts: &str) -> Option<PendingItem> {
        self.inner.lock().items.remove(ts)
    }

    /// Consumes the header-level entry for a timestamp, if present.
    pub fn take_review(&self, ts: &str) -> Option<PendingReview> {
        self.inner.lock().reviews.remove(ts)
    }
}

/// Orchestrates Dredd's transcript processing pipeline.
pub struct Processor {
    pool: PgPool,
    extractor: Extractor,
    bus: Bus,
    slack: Option<Poster>,
    chronicle: ChronicleClient,
    pending: PendingMaps,
}

impl Processor {
    pub fn new(
        pool: PgPool,
        extractor: Extractor,
        bus: Bus,
        slack: Option<Poster>,
        chronicle: ChronicleClient,
    ) -> Self {
        Self {
            pool,
            extractor,
            bus,
            slack,
            chronicle,
            pending: PendingMaps::default(),
        }
    }

    /// Handler for `swarm.chronicle.transcript.stored`.
    pub async fn handle_transcript_stored(&self, data: &[u8]) {
        let evt: TranscriptEvent = match serde_json::from_slice(data) {
            Ok(evt) => evt,
            Err(e) => {
                tracing::error!(error = %e, "failed to parse transcript event");
                return;
            }
        };

        let owner_uuid = match Uuid::parse_str(&evt.owner_uuid) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(owner_uuid = %evt.owner_uuid, error = %e, "invalid owner uuid");
                return;
            }
        };

        tracing::info!(
            session_id = %evt.session_id,
            session_ref = %evt.session_ref,
            owner = %evt.owner_uuid,
            "processing transcript"
        );

        let transcript = match self.fetch_transcript(&evt).await {
            Ok(t) => t,
            Err(e) => {
                tracing::error!(session_id = %evt.session_id, error = %e, "failed to fetch transcript");
                return;
            }
        };

        let mut result = match self
            .extractor
            .extract(&evt.session_ref, owner_uuid, &transcript)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(session_ref = %evt.session_ref, error = %e, "extraction failed");
                return;
            }
        };

        // Carry model attribution from the event into each decision.
        for decision in &mut result.decisions {
            decision.model_id = evt.model_id.clone();
            decision.model_tier = evt.model_tier.clone();
        }

        let (decision_ids, pattern_ids) = match self.persist(&result).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(session_ref = %evt.session_ref, error = %e, "persistence failed");
                return;
            }
        };

        if let Some(poster) = &self.slack {
            match poster
                .post_review_thread(&result, &evt.title, &evt.surface, &evt.duration)
                .await
            {
                Ok(thread) => {
                    self.record_pending(&evt, owner_uuid, &result, &decision_ids, &pattern_ids, &thread)
                }
                Err(e) => tracing::error!(error = %e, "slack post failed"),
            }
        }

        tracing::info!(
            session_ref = %evt.session_ref,
            decisions = decision_ids.len(),
            patterns = pattern_ids.len(),
            "transcript processed"
        );
    }

    fn record_pending(
        &self,
        evt: &TranscriptEvent,
        owner_uuid: Uuid,
        result: &ExtractionResult,
        decision_ids: &[Uuid],
        pattern_ids: &[Uuid],
        thread: &slack::ReviewThread,
    ) {
        self.pending.insert_review(
            thread.header_ts.clone(),
            PendingReview {
                session_ref: evt.session_ref.clone(),
                owner_uuid,
                decision_ids: decision_ids.to_vec(),
                pattern_ids: pattern_ids.to_vec(),
                decisions: result.decisions.clone(),
                patterns: result.patterns.clone(),
            },
        );

        for item in &thread.items {
            let (stored_id, payload) = match item.kind {
                ItemKind::Decision => {
                    let Some(id) = decision_ids.get(item.idx) else {
                        continue;
                    };
                    let Some(d) = result.decisions.get(item.idx) else {
                        continue;
                    };
                    (*id, PendingPayload::Decision(d.clone()))
                }
                ItemKind::Pattern => {
                    let Some(id) = pattern_ids.get(item.idx) else {
                        continue;
                    };
                    let Some(p) = result.patterns.get(item.idx) else {
                        continue;
                    };
                    (*id, PendingPayload::Pattern(p.clone()))
                }
            };
            self.pending.insert_item(
                item.ts.clone(),
                PendingItem {
                    session_ref: evt.session_ref.clone(),
                    owner_uuid,
                    stored_id,
                    payload,
                },
            );
        }
    }

    /// Handler for `swarm.slack.reaction`: review resolution.
    ///
    /// Per-item timestamps are tried first; a miss falls back to the header
    /// map (one reaction resolves the whole review); a second miss means the
    /// reaction is not ours and is dropped silently.
    pub async fn handle_reaction(&self, data: &[u8]) {
        let evt = match slack::parse_reaction_event(data) {
            Ok(evt) => evt,
            Err(e) => {
                tracing::error!(error = %e, "failed to parse reaction");
                return;
            }
        };

        let verdict = slack::parse_reaction(&evt.reaction);
        if verdict == Verdict::Unknown {
            return; // not a review reaction
        }

        if let Some(item) = self.pending.take_item(&evt.message_ts) {
            self.handle_item_reaction(item, verdict, &evt.message_ts).await;
            return;
        }

        let Some(review) = self.pending.take_review(&evt.message_ts) else {
            return; // not a message we're tracking
        };

        tracing::info!(
            reaction = %evt.reaction,
            verdict = verdict.as_str(),
            session_ref = %review.session_ref,
            "processing header-level review reaction"
        );

        for (idx, id) in review.decision_ids.iter().enumerate() {
            if let Err(e) =
                db::decisions::update_decision_review_status(&self.pool, *id, verdict.as_str(), "")
                    .await
            {
                tracing::error!(decision_id = %id, error = %e, "failed to update decision review");
            }
            if matches!(verdict, Verdict::Confirmed | Verdict::Rejected) {
                if let Some(decision) = review.decisions.get(idx) {
                    self.emit_decision_signals(&review.session_ref, decision, *id, verdict)
                        .await;
                }
            }
        }

        for id in &review.pattern_ids {
            if let Err(e) =
                db::patterns::update_pattern_review_status(&self.pool, *id, verdict.as_str(), "")
                    .await
            {
                tracing::error!(pattern_id = %id, error = %e, "failed to update pattern review");
            }
        }

        if verdict == Verdict::Confirmed {
            for pattern in &review.patterns {
                self.publish_pattern_confirmed(pattern, review.owner_uuid, &review.session_ref)
                    .await;
            }
        }

        if verdict == Verdict::Rejected {
            self.post_correction_prompt(
                &evt.message_ts,
                "What did I get wrong? Your correction is the highest-value training signal.",
            )
            .await;
        }
    }

    /// Processes a reaction on a single per-item thread reply.
    async fn handle_item_reaction(&self, item: PendingItem, verdict: Verdict, message_ts: &str) {
        tracing::info!(
            verdict = verdict.as_str(),
            stored_id = %item.stored_id,
            session_ref = %item.session_ref,
            "processing per-item review reaction"
        );

        match &item.payload {
            PendingPayload::Decision(decision) => {
                if let Err(e) = db::decisions::update_decision_review_status(
                    &self.pool,
                    item.stored_id,
                    verdict.as_str(),
                    "",
                )
                .await
                {
                    tracing::error!(decision_id = %item.stored_id, error = %e, "failed to update decision review");
                }

                if matches!(verdict, Verdict::Confirmed | Verdict::Rejected) {
                    self.emit_decision_signals(&item.session_ref, decision, item.stored_id, verdict)
                        .await;
                }

                if verdict == Verdict::Rejected {
                    self.post_correction_prompt(
                        message_ts,
                        "What did I get wrong? Your correction is the highest-value training signal.",
                    )
                    .await;
                }
            }
            PendingPayload::Pattern(pattern) => {
                if let Err(e) = db::patterns::update_pattern_review_status(
                    &self.pool,
                    item.stored_id,
                    verdict.as_str(),
                    "",
                )
                .await
                {
                    tracing::error!(pattern_id = %item.stored_id, error = %e, "failed to update pattern review");
                }

                if verdict == Verdict::Confirmed {
                    self.publish_pattern_confirmed(pattern, item.owner_uuid, &item.session_ref)
                        .await;
                }

                if verdict == Verdict::Rejected {
                    self.post_correction_prompt(message_ts, "What did I get wrong about this pattern?")
                        .await;
                }
            }
        }
    }

    /// Fans out the consequences of a resolved decision review, in order:
    /// trust signal + score update, assignment signal, rejection signal,
    /// correction record. Each step logs and continues on failure.
    async fn emit_decision_signals(
        &self,
        session_ref: &str,
        decision: &DecisionEpisode,
        stored_id: Uuid,
        verdict: Verdict,
    ) {
        let correct = verdict == Verdict::Confirmed;

        if !decision.agent_id.is_empty() {
            let signal = TrustSignal {
                agent_id: decision.agent_id.clone(),
                category: decision.category.clone(),
                outcome: if correct { "correct" } else { "incorrect" }.to_string(),
                severity: decision.severity.clone(),
                session_ref: session_ref.to_string(),
            };
            if let Err(e) = self
                .bus
                .publish_json(events::SUBJECT_TRUST_SIGNAL, &signal)
                .await
            {
                tracing::error!(error = %e, "failed to publish trust signal");
            }

            self.apply_trust_update(decision, correct).await;
        }

        if !decision.signal_type.is_empty() {
            let signal = AssignmentSignal {
                signal_type: decision.signal_type.clone(),
                agent_id: decision.agent_id.clone(),
                category: decision.category.clone(),
                severity: decision.severity.clone(),
                session_ref: session_ref.to_string(),
            };
            if let Err(e) = self
                .bus
                .publish_json(events::SUBJECT_ASSIGNMENT_SIGNAL, &signal)
                .await
            {
                tracing::error!(error = %e, "failed to publish assignment signal");
            }
        }

        if !correct {
            let signal = ExtractionRejected {
                session_ref: session_ref.to_string(),
                decision: decision.summary.clone(),
                category: decision.category.clone(),
            };
            if let Err(e) = self
                .bus
                .publish_json(events::SUBJECT_EXTRACTION_REJECTED, &signal)
                .await
            {
                tracing::error!(error = %e, "failed to publish extraction rejected");
            }
        }

        // Correction record for the prompt-optimisation loop, both verdicts.
        let correction = CorrectionSignal {
            session_ref: session_ref.to_string(),
            decision_id: stored_id.to_string(),
            agent_id: decision.agent_id.clone(),
            model_id: decision.model_id.clone(),
            model_tier: decision.model_tier.clone(),
            correction_type: verdict.as_str().to_string(),
            category: decision.category.clone(),
            severity: decision.severity.clone(),
        };
        if let Err(e) = self
            .bus
            .publish_json(events::SUBJECT_CORRECTION, &correction)
            .await
        {
            tracing::error!(error = %e, "failed to publish correction signal");
        }
    }

    /// Read-modify-write of the agent trust record for a resolved decision.
    /// Sentiment defaults to empty (modifier 1.0) until sentiment detection
    /// is wired in.
    async fn apply_trust_update(&self, decision: &DecisionEpisode, correct: bool) {
        let existing = match db::trust::get_trust(
            &self.pool,
            &decision.agent_id,
            &decision.category,
            &decision.severity,
        )
        .await
        {
            Ok(rec) => rec,
            Err(e) => {
                tracing::error!(error = %e, "failed to read trust record");
                return;
            }
        };

        let (score, total, correct_count, failures) = match existing {
            Some(rec) => (
                trust::update_score(rec.trust_score, &decision.severity, correct, ""),
                rec.total_decisions + 1,
                rec.correct_decisions + i32::from(correct),
                rec.critical_failures,
            ),
            None => (
                trust::update_score(0.0, &decision.severity, correct, ""),
                1,
                i32::from(correct),
                0,
            ),
        };

        if let Err(e) = db::trust::upsert_trust(
            &self.pool,
            &decision.agent_id,
            &decision.category,
            &decision.severity,
            score,
            total,
            correct_count,
            failures,
        )
        .await
        {
            tracing::error!(error = %e, "failed to upsert trust record");
        }
    }

    async fn publish_pattern_confirmed(
        &self,
        pattern: &ReasoningPattern,
        owner_uuid: Uuid,
        session_ref: &str,
    ) {
        let signal = PatternConfirmed {
            pattern_type: pattern.pattern_type.clone(),
            summary: pattern.summary.clone(),
            tags: pattern.tags.clone(),
            owner_uuid,
            session_ref: session_ref.to_string(),
        };
        if let Err(e) = self
            .bus
            .publish_json(events::SUBJECT_PATTERN_CONFIRMED, &signal)
            .await
        {
            tracing::error!(error = %e, "failed to publish pattern confirmed");
        }
    }

    async fn post_correction_prompt(&self, thread_ts: &str, text: &str) {
        if let Some(poster) = &self.slack {
            if let Err(e) = poster.post_thread(thread_ts, text).await {
                tracing::error!(error = %e, "failed to post correction thread");
            }
        }
    }

    async fn persist(&self, result: &ExtractionResult) -> dredd_common::Result<(Vec<Uuid>, Vec<Uuid>)> {
        let mut decision_ids = Vec::with_capacity(result.decisions.len());
        for decision in &result.decisions {
            let id = db::decisions::write_decision_episode(
                &self.pool,
                result.owner_uuid,
                &result.session_ref,
                "dredd",
                decision,
                None,
            )
            .await?;
            decision_ids.push(id);
        }

        let mut pattern_ids = Vec::with_capacity(result.patterns.len());
        for pattern in &result.patterns {
            let id = db::patterns::write_reasoning_pattern(
                &self.pool,
                result.owner_uuid,
                &result.session_ref,
                pattern,
                None,
            )
            .await?;
            pattern_ids.push(id);
        }

        for style in &result.styles {
            db::styles::write_style(
                &self.pool,
                result.owner_uuid,
                &result.session_ref,
                "dredd",
                style,
            )
            .await?;
        }

        Ok((decision_ids, pattern_ids))
    }

    /// Inline transcript wins; otherwise fetch from Chronicle. An event with
    /// neither fails here and nothing downstream runs.
    async fn fetch_transcript(&self, evt: &TranscriptEvent) -> Result<String, String> {
        if !evt.transcript.is_empty() {
            return Ok(evt.transcript.clone());
        }

        self.chronicle
            .fetch_transcript(&evt.session_id)
            .await
            .map_err(|e| e.to_string())
    }

    /// Test and capture-handler access to the pool.
    pub(crate) fn pool(&self) -> &PgPool {
        &self.pool
    }
}
