//! Gate and task-picker capture
//!
//! These handlers turn structured Slack interactions into decision episodes
//! directly: a human pressing a gate button is a directive decision with full
//! confidence, no LLM required.

use crate::db;
use crate::models::{DecisionEpisode, DecisionOption, DecisionReasoning};
use crate::services::processor::Processor;
use serde::Deserialize;
use uuid::Uuid;

/// Interaction event forwarded by slack-gateway.
#[derive(Debug, Deserialize)]
pub struct InteractionEvent {
    #[serde(default)]
    pub action_id: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub channel_id: String,
    #[serde(default)]
    pub message_ts: String,
    #[serde(default)]
    pub trigger_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct GateMetadata {
    #[serde(default)]
    item_id: String,
    #[serde(default)]
    stage: String,
}

/// Evidence event from the dispatcher (`swarm.dispatch.*.gate.evidence`).
#[derive(Debug, Deserialize)]
struct GateEvidenceEvent {
    #[serde(default)]
    item_id: String,
    #[serde(default)]
    stage: String,
}

/// Task-picker event (`swarm.slack.task.picked` / `task.regenerated`).
#[derive(Debug, Deserialize)]
struct TaskEvent {
    #[serde(default)]
    task_id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    user_name: String,
}

impl Processor {
    /// Handler for `swarm.slack.interaction`: gate approval/rejection buttons.
    pub async fn handle_gate_decision(&self, data: &[u8]) {
        let evt: InteractionEvent = match serde_json::from_slice(data) {
            Ok(evt) => evt,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse interaction event");
                return;
            }
        };

        let (decision_type, item_id) = match evt.action_id.split_once(':') {
            Some(("gate_approve", id)) => ("approved", id.to_string()),
            Some(("gate_changes", id)) => ("changes_requested", id.to_string()),
            Some(("gate_block", id)) => ("blocked", id.to_string()),
            _ => return, // not a gate action, ignore
        };

        let meta: GateMetadata = serde_json::from_str(&evt.value).unwrap_or_else(|e| {
            tracing::warn!(error = %e, value = %evt.value, "failed to parse gate metadata");
            GateMetadata {
                item_id: item_id.clone(),
                stage: "unknown".to_string(),
            }
        });

        let severity = match decision_type {
            "changes_requested" => "significant",
            "blocked" => "critical",
            _ => "routine",
        };

        let short_id: String = item_id.chars().take(8).collect();
        let mut summary = format!("Gate {decision_type}: item {short_id} stage {}", meta.stage);
        if !evt.user_name.is_empty() {
            summary.push_str(&format!(" by {}", evt.user_name));
        }

        let episode = DecisionEpisode {
            domain: "gate".to_string(),
            category: meta.stage.clone(),
            severity: severity.to_string(),
            summary,
            situation_text: format!(
                "Gate review for backlog item {} at stage {}",
                meta.item_id, meta.stage
            ),
            options: vec![
                DecisionOption {
                    option_key: "approve".to_string(),
                    pro_signals: vec!["evidence meets criteria".to_string()],
                    con_signals: vec![],
                    was_chosen: decision_type == "approved",
                },
                DecisionOption {
                    option_key: "request_changes".to_string(),
                    pro_signals: vec!["evidence insufficient or incorrect".to_string()],
                    con_signals: vec![],
                    was_chosen: decision_type == "changes_requested",
                },
            ],
            reasoning: DecisionReasoning {
                factors: vec![decision_type.to_string()],
                tradeoffs: vec![],
                reasoning_text: format!(
                    "Human reviewer {} decided: {decision_type}",
                    evt.user_name
                ),
            },
            tags: vec![
                "gate".to_string(),
                meta.stage.clone(),
                decision_type.to_string(),
            ],
            // Human decision carries full confidence.
            confidence: 1.0,
            agent_id: String::new(),
            signal_type: format!("gate_{decision_type}"),
            model_id: String::new(),
            model_tier: String::new(),
        };

        // System-level decision, no owner.
        match db::decisions::write_decision_episode(
            self.pool(),
            Uuid::nil(),
            &meta.item_id,
            "slack-gateway",
            &episode,
            None,
        )
        .await
        {
            Ok(id) => tracing::info!(
                decision_id = %id,
                item_id = %short_id,
                stage = %meta.stage,
                decision_type,
                user = %evt.user_name,
                "gate decision captured"
            ),
            Err(e) => tracing::error!(
                error = %e,
                item_id = %item_id,
                stage = %meta.stage,
                decision_type,
                "failed to store gate decision"
            ),
        }
    }

    /// Handler for `swarm.dispatch.*.gate.evidence`: tags the captured gate
    /// decision with the evidence stage so reviews can trace attribution.
    pub async fn handle_gate_evidence(&self, data: &[u8]) {
        let evt: GateEvidenceEvent = match serde_json::from_slice(data) {
            Ok(evt) => evt,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse gate evidence event");
                return;
            }
        };
        if evt.item_id.is_empty() {
            return;
        }

        let decision_id =
            match db::decisions::find_gate_decision(self.pool(), &evt.item_id).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    tracing::debug!(item_id = %evt.item_id, "no gate decision for evidence");
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, item_id = %evt.item_id, "gate decision lookup failed");
                    return;
                }
            };

        let tag = format!("evidence:{}", evt.stage);
        if let Err(e) =
            db::decisions::add_decision_tag(self.pool(), decision_id, &tag, "dispatch").await
        {
            tracing::error!(error = %e, decision_id = %decision_id, "failed to tag gate evidence");
        }
    }

    /// Handler for `swarm.slack.task.picked`.
    pub async fn handle_task_picked(&self, data: &[u8]) {
        self.capture_task_event(data, "task_pick", "picked").await;
    }

    /// Handler for `swarm.slack.task.regenerated`.
    pub async fn handle_task_regenerated(&self, data: &[u8]) {
        self.capture_task_event(data, "task_regenerate", "regenerated")
            .await;
    }

    async fn capture_task_event(&self, data: &[u8], signal_type: &str, verb: &str) {
        let evt: TaskEvent = match serde_json::from_slice(data) {
            Ok(evt) => evt,
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse task event");
                return;
            }
        };
        if evt.task_id.is_empty() {
            return;
        }

        let mut summary = format!("Task {verb}: {}", evt.title);
        if !evt.user_name.is_empty() {
            summary.push_str(&format!(" by {}", evt.user_name));
        }

        let episode = DecisionEpisode {
            domain: "task_picker".to_string(),
            category: signal_type.to_string(),
            severity: "routine".to_string(),
            summary,
            situation_text: format!("Task picker surfaced task {}", evt.task_id),
            options: vec![
                DecisionOption {
                    option_key: "pick".to_string(),
                    pro_signals: vec![],
                    con_signals: vec![],
                    was_chosen: verb == "picked",
                },
                DecisionOption {
                    option_key: "regenerate".to_string(),
                    pro_signals: vec![],
                    con_signals: vec![],
                    was_chosen: verb == "regenerated",
                },
            ],
            reasoning: DecisionReasoning {
                factors: vec![verb.to_string()],
                tradeoffs: vec![],
                reasoning_text: String::new(),
            },
            tags: vec!["task_picker".to_string(), signal_type.to_string()],
            confidence: 1.0,
            agent_id: String::new(),
            signal_type: signal_type.to_string(),
            model_id: String::new(),
            model_tier: String::new(),
        };

        match db::decisions::write_decision_episode(
            self.pool(),
            Uuid::nil(),
            &evt.task_id,
            "slack-gateway",
            &episode,
            None,
        )
        .await
        {
            Ok(id) => tracing::info!(decision_id = %id, task_id = %evt.task_id, verb, "task decision captured"),
            Err(e) => tracing::error!(error = %e, task_id = %evt.task_id, "failed to store task decision"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interaction_event_parses() {
        let data = br#"{"action_id":"gate_approve:abc123","value":"{\"item_id\":\"abc123\",\"stage\":\"review\"}","user_name":"mike"}"#;
        let evt: InteractionEvent = serde_json::from_slice(data).unwrap();
        assert_eq!(evt.action_id, "gate_approve:abc123");
        assert_eq!(evt.user_name, "mike");

        let meta: GateMetadata = serde_json::from_str(&evt.value).unwrap();
        assert_eq!(meta.item_id, "abc123");
        assert_eq!(meta.stage, "review");
    }

    #[test]
    fn non_gate_actions_do_not_match() {
        let action = "open_modal:xyz";
        let matched = matches!(
            action.split_once(':'),
            Some(("gate_approve", _)) | Some(("gate_changes", _)) | Some(("gate_block", _))
        );
        assert!(!matched);
    }
}
