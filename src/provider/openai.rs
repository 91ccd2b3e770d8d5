//! OpenAI backend.
//!
//! Calls the chat completions API. The request/response DTOs are shared with
//! the Azure backend, which speaks the same wire shape behind a different
//! host and auth scheme.

use crate::config::{OpenAiSettings, ENV_OPENAI_API_KEY};
use crate::error::{GenError, Result};
use crate::provider::retry::{run_with_retry, AttemptError};
use crate::provider::snippet;
use crate::ui::Spinner;
use futures::FutureExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub struct OpenAiProvider {
    api_key: String,
    model: String,
    organization: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(settings: &OpenAiSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            organization: settings.organization.clone(),
            client: Client::new(),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(GenError::Configuration(format!(
                "OpenAI API key is not set. Export {} or add openai.apiKey to the settings file.",
                ENV_OPENAI_API_KEY
            )));
        }
        Ok(())
    }

    pub async fn generate(&self, prompt: &str, silent: bool, verbose: bool) -> Result<String> {
        let body = encode_chat_request(&self.model, prompt)?;

        if verbose {
            super::print_verbose_preamble("openai", &self.model, &self.api_key, &body);
        }
        let spinner = Spinner::start("Generating command...", !silent);
        let body = body.as_str();
        let result =
            run_with_retry(verbose, move || self.attempt(body).boxed_local(), || false).await;
        spinner.stop();
        result
    }

    async fn attempt(&self, body: &str) -> std::result::Result<String, AttemptError> {
        let mut request = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if !self.organization.is_empty() {
            request = request.header("OpenAI-Organization", &self.organization);
        }
        let response = request
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| AttemptError::Other(format!("Failed to reach the OpenAI API: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Other(format!("Failed to parse OpenAI response: {}", e)))?;
        extract_chat_text(&parsed)
    }
}

/// Build the chat completions request body, serialized once per call.
pub(crate) fn encode_chat_request(model: &str, prompt: &str) -> Result<String> {
    let request = ChatRequest {
        model: model.to_string(),
        messages: vec![ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        }],
        max_tokens: 200,
        temperature: 0.1,
    };
    serde_json::to_string(&request)
        .map_err(|e| GenError::Unknown(format!("Failed to encode request: {}", e)))
}

/// Map OpenAI-shaped HTTP failures onto the shared attempt vocabulary.
fn classify_error(status: StatusCode, body: &str) -> AttemptError {
    let lower = body.to_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS
        || lower.contains("rate limit")
        || lower.contains("insufficient_quota")
    {
        return AttemptError::RateLimited(snippet(body));
    }
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || lower.contains("incorrect api key")
    {
        return AttemptError::Auth(snippet(body));
    }
    AttemptError::Other(format!("OpenAI API error {}: {}", status, snippet(body)))
}

/// Take the first choice's text. An empty result surfaces the finish reason:
/// `content_filter` means the output was blocked, anything else is plain
/// empty.
pub(crate) fn extract_chat_text(
    response: &ChatResponse,
) -> std::result::Result<String, AttemptError> {
    let choice = response.choices.first();
    let text = choice
        .and_then(|c| c.message.content.as_deref())
        .unwrap_or("")
        .trim()
        .to_string();
    if !text.is_empty() {
        return Ok(text);
    }
    if let Some(reason) = choice.and_then(|c| c.finish_reason.as_deref()) {
        if reason == "content_filter" {
            return Err(AttemptError::Blocked(
                "output removed by the content filter".to_string(),
            ));
        }
    }
    Err(AttemptError::Empty("the model returned no text".to_string()))
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub(crate) choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatChoice {
    pub(crate) message: ChatResponseMessage,
    pub(crate) finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponseMessage {
    pub(crate) content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(api_key: &str) -> OpenAiProvider {
        OpenAiProvider::new(&OpenAiSettings {
            api_key: api_key.to_string(),
            model: "gpt-4o-mini".to_string(),
            organization: String::new(),
        })
    }

    #[test]
    fn test_validate_requires_api_key() {
        assert!(matches!(
            provider("").validate_config(),
            Err(GenError::Configuration(_))
        ));
        assert!(provider("sk-test").validate_config().is_ok());
    }

    #[test]
    fn test_request_encoding_is_deterministic() {
        let a = encode_chat_request("gpt-4o-mini", "list files").unwrap();
        let b = encode_chat_request("gpt-4o-mini", "list files").unwrap();
        assert_eq!(a, b);
        assert!(a.contains("\"model\":\"gpt-4o-mini\""));
        assert!(a.contains("list files"));
    }

    #[test]
    fn test_classify_rate_limit_and_auth() {
        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, "{}"),
            AttemptError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::OK, "You exceeded your quota: insufficient_quota"),
            AttemptError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::UNAUTHORIZED, "{}"),
            AttemptError::Auth(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_REQUEST, "Incorrect API key provided"),
            AttemptError::Auth(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::BAD_GATEWAY, "upstream"),
            AttemptError::Other(_)
        ));
    }

    #[test]
    fn test_extract_trims_content() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "  git log --oneline \n"}, "finish_reason": "stop"}]}"#,
        )
        .unwrap();
        assert_eq!(extract_chat_text(&response).unwrap(), "git log --oneline");
    }

    #[test]
    fn test_extract_content_filter_is_blocked() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": ""}, "finish_reason": "content_filter"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            extract_chat_text(&response).unwrap_err(),
            AttemptError::Blocked(_)
        ));
    }

    #[test]
    fn test_extract_whitespace_with_normal_finish_is_empty() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "   "}, "finish_reason": "stop"}]}"#,
        )
        .unwrap();
        assert!(matches!(
            extract_chat_text(&response).unwrap_err(),
            AttemptError::Empty(_)
        ));
    }
}
