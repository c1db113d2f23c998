//! Integration tests for the Slack review poster
//!
//! A local axum server stands in for chat.postMessage and records every
//! payload, so the header/reply structure of a review thread is pinned
//! without touching Slack.

use axum::{extract::State, routing::post, Json, Router};
use dredd_svc::models::{DecisionEpisode, ExtractionResult, ReasoningPattern};
use dredd_svc::services::slack::{ItemKind, Poster};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Clone, Default)]
struct Recorded {
    calls: Arc<Mutex<Vec<Value>>>,
}

async fn record_post(State(state): State<Recorded>, Json(payload): Json<Value>) -> Json<Value> {
    let mut calls = state.calls.lock().unwrap();
    calls.push(payload);
    let ts = format!("ts-{}", calls.len());
    Json(json!({"ok": true, "ts": ts}))
}

/// Starts the stand-in server and returns its URL plus the recorded calls.
async fn spawn_slack_stub() -> (String, Arc<Mutex<Vec<Value>>>) {
    let recorded = Recorded::default();
    let calls = recorded.calls.clone();

    let app = Router::new()
        .route("/", post(record_post))
        .with_state(recorded);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/"), calls)
}

fn sample_result() -> ExtractionResult {
    ExtractionResult {
        session_ref: "test".into(),
        owner_uuid: Uuid::new_v4(),
        decisions: vec![
            DecisionEpisode {
                domain: "infra".into(),
                category: "deploy".into(),
                severity: "routine".into(),
                summary: "dec1".into(),
                situation_text: String::new(),
                options: vec![],
                reasoning: Default::default(),
                tags: vec!["a".into()],
                confidence: 0.9,
                agent_id: String::new(),
                signal_type: String::new(),
                model_id: String::new(),
                model_tier: String::new(),
            },
            DecisionEpisode {
                domain: "infra".into(),
                category: "deploy".into(),
                severity: "critical".into(),
                summary: "dec2".into(),
                situation_text: String::new(),
                options: vec![],
                reasoning: Default::default(),
                tags: vec!["b".into()],
                confidence: 0.8,
                agent_id: String::new(),
                signal_type: String::new(),
                model_id: String::new(),
                model_tier: String::new(),
            },
        ],
        patterns: vec![ReasoningPattern {
            pattern_type: "pushback".into(),
            summary: "pat1".into(),
            conversation_arc: String::new(),
            tags: vec![],
            confidence: 0.95,
        }],
        styles: vec![],
    }
}

#[tokio::test]
async fn review_thread_posts_header_and_per_item_replies() {
    let (url, calls) = spawn_slack_stub().await;
    let poster = Poster::new("xoxb-test", "C123").with_api_url(url);

    let thread = poster
        .post_review_thread(&sample_result(), "Test Session", "cc", "1m")
        .await
        .unwrap();

    // 1 header + 2 decisions + 1 pattern.
    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 4);

    // Header is a channel message, not a reply.
    assert!(calls[0].get("thread_ts").is_none());
    assert_eq!(calls[0]["channel"], "C123");
    assert!(calls[0]["blocks"].is_array());

    // Every reply threads under the header.
    for call in &calls[1..] {
        assert_eq!(call["thread_ts"], "ts-1");
    }

    assert_eq!(thread.header_ts, "ts-1");
    assert_eq!(thread.items.len(), 3);
    assert_eq!(thread.items[0].kind, ItemKind::Decision);
    assert_eq!(thread.items[0].idx, 0);
    assert_eq!(thread.items[1].kind, ItemKind::Decision);
    assert_eq!(thread.items[1].idx, 1);
    assert_eq!(thread.items[2].kind, ItemKind::Pattern);
    assert_eq!(thread.items[2].idx, 0);

    // Replies got distinct timestamps for reaction tracking.
    assert_eq!(thread.items[0].ts, "ts-2");
    assert_eq!(thread.items[1].ts, "ts-3");
    assert_eq!(thread.items[2].ts, "ts-4");
}

#[tokio::test]
async fn standalone_thread_post_omits_thread_ts() {
    let (url, calls) = spawn_slack_stub().await;
    let poster = Poster::new("xoxb-test", "C123").with_api_url(url);

    poster.post_thread("", "batch summary").await.unwrap();

    let calls = calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].get("thread_ts").is_none());
    assert_eq!(calls[0]["text"], "batch summary");
}

#[tokio::test]
async fn slack_error_response_fails_the_call() {
    let app = Router::new().route(
        "/",
        post(|| async { Json(json!({"ok": false, "error": "channel_not_found"})) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let poster = Poster::new("xoxb-test", "bad").with_api_url(format!("http://{addr}/"));
    let err = poster.post_thread("", "hello").await.unwrap_err();
    assert!(err.to_string().contains("channel_not_found"));
}
