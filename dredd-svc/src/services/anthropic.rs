//! Anthropic Messages API client
//!
//! Minimal completion client for the extraction path. One call per transcript
//! chunk, two-minute deadline, no streaming.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Anthropic client errors
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {0}: {1}")]
    Api(u16, String),

    #[error("Empty response content")]
    EmptyResponse,

    #[error("Parse error: {0}")]
    Parse(String),
}

/// A single chat message in the request.
#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct CompletionResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

/// Anthropic Messages API client
pub struct AnthropicClient {
    api_key: String,
    model: String,
    http_client: reqwest::Client,
    api_url: String,
}

impl AnthropicClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| LlmError::Network(e.to_string()))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            http_client,
            api_url: API_URL.to_string(),
        })
    }

    /// The configured model id.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Overrides the API endpoint; used by tests standing in for the API.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Sends a completion request and returns the first text block.
    pub async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        max_tokens: u32,
    ) -> Result<String, LlmError> {
        let req = CompletionRequest {
            model: &self.model,
            max_tokens,
            system,
            messages,
        };

        let response = self
            .http_client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&req)
            .send()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| LlmError::Network(e.to_string()))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_slice::<ErrorResponse>(&body) {
                return Err(LlmError::Api(
                    status.as_u16(),
                    format!("{}: {}", err.error.error_type, err.error.message),
                ));
            }
            return Err(LlmError::Api(
                status.as_u16(),
                String::from_utf8_lossy(&body).into_owned(),
            ));
        }

        let resp: CompletionResponse =
            serde_json::from_slice(&body).map_err(|e| LlmError::Parse(e.to_string()))?;

        match resp.content.first() {
            Some(block) if !block.text.is_empty() => Ok(block.text.clone()),
            _ => Err(LlmError::EmptyResponse),
        }
    }
}
