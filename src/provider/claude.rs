//! Anthropic Claude backend.
//!
//! Calls the Messages API. The response shape (content blocks plus a stop
//! reason) is shared with the Vertex backend, which serves the same models
//! behind Google's endpoint.

use crate::config::{ClaudeSettings, ENV_ANTHROPIC_API_KEY};
use crate::error::{GenError, Result};
use crate::provider::retry::{run_with_retry, AttemptError};
use crate::provider::snippet;
use crate::ui::Spinner;
use futures::FutureExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct ClaudeProvider {
    api_key: String,
    model: String,
    client: Client,
}

impl ClaudeProvider {
    pub fn new(settings: &ClaudeSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            client: Client::new(),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(GenError::Configuration(format!(
                "Anthropic API key is not set. Export {} or add claude.apiKey to the settings file.",
                ENV_ANTHROPIC_API_KEY
            )));
        }
        Ok(())
    }

    pub async fn generate(&self, prompt: &str, silent: bool, verbose: bool) -> Result<String> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: 200,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| GenError::Unknown(format!("Failed to encode request: {}", e)))?;

        if verbose {
            super::print_verbose_preamble("claude", &self.model, &self.api_key, &body);
        }
        let spinner = Spinner::start("Generating command...", !silent);
        let body = body.as_str();
        let result =
            run_with_retry(verbose, move || self.attempt(body).boxed_local(), || false).await;
        spinner.stop();
        result
    }

    async fn attempt(&self, body: &str) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| {
                AttemptError::Other(format!("Failed to reach the Anthropic API: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            AttemptError::Other(format!("Failed to parse Anthropic response: {}", e))
        })?;
        extract_messages_text(&parsed)
    }
}

/// Map Anthropic HTTP failures onto the shared attempt vocabulary. The error
/// body carries a typed `error.message`; fall back to the raw body when it
/// does not parse.
fn classify_error(status: StatusCode, body: &str) -> AttemptError {
    let message = error_message(body);
    let lower = message.to_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS || lower.contains("rate limit") {
        return AttemptError::RateLimited(message);
    }
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || lower.contains("authentication_error")
        || lower.contains("permission_error")
    {
        return AttemptError::Auth(message);
    }
    AttemptError::Other(format!("Anthropic API error {}: {}", status, message))
}

/// Extract `error.message` from an Anthropic error body.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiError>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| snippet(body))
}

/// Join the text blocks in order. An empty result surfaces the stop reason:
/// anything other than `end_turn` means generation was cut short.
pub(crate) fn extract_messages_text(
    response: &MessagesResponse,
) -> std::result::Result<String, AttemptError> {
    let text = response
        .content
        .iter()
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string();
    if !text.is_empty() {
        return Ok(text);
    }
    match response.stop_reason.as_deref() {
        Some(reason) if reason != "end_turn" => Err(AttemptError::Blocked(format!(
            "generation stopped ({})",
            reason
        ))),
        _ => Err(AttemptError::Empty("the model returned no text".to_string())),
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessagesResponse {
    #[serde(default)]
    pub(crate) content: Vec<ContentBlock>,
    pub(crate) stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlock {
    pub(crate) text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}
