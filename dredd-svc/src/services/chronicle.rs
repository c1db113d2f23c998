//! Chronicle transcript fetch
//!
//! Fallback path for transcript events that arrive without an inline
//! transcript. Chronicle serves the raw event log for a trace; the extractor
//! consumes it as-is.

use serde::Deserialize;
use thiserror::Error;

/// Chronicle client errors
#[derive(Debug, Error)]
pub enum ChronicleError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Chronicle returned {0} for session {1}")]
    Status(u16, String),

    #[error("No events found in chronicle for session {0}")]
    Empty(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Deserialize)]
struct ChronicleEvent {
    #[serde(default)]
    #[allow(dead_code)]
    metadata: serde_json::Value,
}

/// Fetches stored transcripts from the Chronicle HTTP API.
pub struct ChronicleClient {
    base_url: String,
    client: reqwest::Client,
}

impl ChronicleClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Fetches the raw event log for a session. Fails on non-200 responses
    /// and on an empty event list; the caller must not extract from nothing.
    pub async fn fetch_transcript(&self, session_id: &str) -> Result<String, ChronicleError> {
        let url = format!("{}/api/v1/events?trace_id={}", self.base_url, session_id);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ChronicleError::Network(e.to_string()))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ChronicleError::Status(
                status.as_u16(),
                session_id.to_string(),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ChronicleError::Network(e.to_string()))?;

        let events: Vec<ChronicleEvent> =
            serde_json::from_str(&body).map_err(|e| ChronicleError::Parse(e.to_string()))?;

        if events.is_empty() {
            return Err(ChronicleError::Empty(session_id.to_string()));
        }

        // The raw events JSON doubles as the transcript input for extraction.
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_array_parses() {
        let body = r#"[{"metadata":{"text":"hi"}},{"metadata":{}}]"#;
        let events: Vec<ChronicleEvent> = serde_json::from_str(body).unwrap();
        assert_eq!(events.len(), 2);
    }
}
