//! Gemini backend.
//!
//! Calls the Generative Language API `generateContent` endpoint. This is the
//! default backend.

use crate::config::{GeminiSettings, ENV_GOOGLE_API_KEY};
use crate::error::{GenError, Result};
use crate::provider::retry::{run_with_retry, AttemptError};
use crate::provider::snippet;
use crate::ui::Spinner;
use futures::FutureExt;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub struct GeminiProvider {
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiProvider {
    pub fn new(settings: &GeminiSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            client: Client::new(),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(GenError::Configuration(format!(
                "Gemini API key is not set. Export {} or add gemini.apiKey to the settings file.",
                ENV_GOOGLE_API_KEY
            )));
        }
        Ok(())
    }

    pub async fn generate(&self, prompt: &str, silent: bool, verbose: bool) -> Result<String> {
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };
        // Serialized once so every retry sends identical bytes.
        let body = serde_json::to_string(&request)
            .map_err(|e| GenError::Unknown(format!("Failed to encode request: {}", e)))?;
        let url = format!("{}/{}:generateContent", GEMINI_API_BASE, self.model);

        if verbose {
            super::print_verbose_preamble("gemini", &self.model, &self.api_key, &body);
        }
        let spinner = Spinner::start("Generating command...", !silent);
        let url = url.as_str();
        let body = body.as_str();
        let result =
            run_with_retry(verbose, move || self.attempt(url, body).boxed_local(), || false).await;
        spinner.stop();
        result
    }

    async fn attempt(&self, url: &str, body: &str) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| AttemptError::Other(format!("Failed to reach the Gemini API: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Other(format!("Failed to parse Gemini response: {}", e)))?;
        extract_text(&parsed)
    }
}

/// Map Gemini HTTP failures onto the shared attempt vocabulary. Google APIs
/// signal quota exhaustion as 429 / RESOURCE_EXHAUSTED and bad keys as 400
/// "API key not valid" in addition to the usual 401/403.
fn classify_error(status: StatusCode, body: &str) -> AttemptError {
    let lower = body.to_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS
        || lower.contains("rate limit")
        || lower.contains("resource_exhausted")
        || lower.contains("quota")
    {
        return AttemptError::RateLimited(snippet(body));
    }
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || lower.contains("api key not valid")
    {
        return AttemptError::Auth(snippet(body));
    }
    AttemptError::Other(format!("Gemini API error {}: {}", status, snippet(body)))
}

/// Concatenate the textual parts of the response in order. An empty result
/// surfaces the vendor's block or finish signal so the user sees why nothing
/// was generated.
fn extract_text(response: &GenerateContentResponse) -> std::result::Result<String, AttemptError> {
    let text = response
        .candidates
        .iter()
        .flat_map(|c| c.content.parts.iter())
        .filter_map(|p| p.text.as_deref())
        .collect::<Vec<_>>()
        .join("")
        .trim()
        .to_string();
    if !text.is_empty() {
        return Ok(text);
    }
    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.as_deref())
    {
        return Err(AttemptError::Blocked(format!("prompt blocked ({})", reason)));
    }
    if let Some(reason) = response
        .candidates
        .first()
        .and_then(|c| c.finish_reason.as_deref())
    {
        if reason != "STOP" {
            return Err(AttemptError::Blocked(format!(
                "generation stopped ({})",
                reason
            )));
        }
    }
    Err(AttemptError::Empty("the model returned no text".to_string()))
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(api_key: &str) -> GeminiProvider {
        GeminiProvider::new(&GeminiSettings {
            api_key: api_key.to_string(),
            model: "gemini-2.5-flash".to_string(),
        })
    }

    #[test]
    fn test_validate_requires_api_key() {
        assert!(matches!(
            provider("").validate_config(),
            Err(GenError::Configuration(_))
        ));
        assert!(provider("AIzaSyTest").validate_config().is_ok());
    }

    #[test]
    fn test_classify_rate_limit() {
        let err = classify_error(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, AttemptError::RateLimited(_)));

        let err = classify_error(
            StatusCode::BAD_REQUEST,
            r#"{"error": {"status": "RESOURCE_EXHAUSTED"}}"#,
        );
        assert!(matches!(err, AttemptError::RateLimited(_)));
    }

    #[test]
    fn test_classify_auth() {
        let err = classify_error(StatusCode::FORBIDDEN, "permission denied");
        assert!(matches!(err, AttemptError::Auth(_)));

        let err = classify_error(StatusCode::BAD_REQUEST, "API key not valid");
        assert!(matches!(err, AttemptError::Auth(_)));
    }

    #[test]
    fn test_classify_other() {
        let err = classify_error(StatusCode::INTERNAL_SERVER_ERROR, "boom");
        assert!(matches!(err, AttemptError::Other(_)));
    }

    #[test]
    fn test_extract_joins_parts_in_order() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"parts": [{"text": "du -sh "}, {"text": "*"}]},
                    "finishReason": "STOP"
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(extract_text(&response).unwrap(), "du -sh *");
    }

    #[test]
    fn test_extract_block_reason_wins_over_empty() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [], "promptFeedback": {"blockReason": "SAFETY"}}"#,
        )
        .unwrap();
        let err = extract_text(&response).unwrap_err();
        assert!(matches!(err, AttemptError::Blocked(ref m) if m.contains("SAFETY")));
    }

    #[test]
    fn test_extract_abnormal_finish_is_blocked() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": []}, "finishReason": "MAX_TOKENS"}]}"#,
        )
        .unwrap();
        let err = extract_text(&response).unwrap_err();
        assert!(matches!(err, AttemptError::Blocked(ref m) if m.contains("MAX_TOKENS")));
    }

    #[test]
    fn test_extract_whitespace_with_normal_finish_is_empty() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "   \n  "}]}, "finishReason": "STOP"}]}"#,
        )
        .unwrap();
        let err = extract_text(&response).unwrap_err();
        assert!(matches!(err, AttemptError::Empty(_)));
    }
}
