//! Vertex-hosted Claude backend.
//!
//! Serves Anthropic models through Google's `rawPredict` endpoint. The model
//! identifier must carry a dated `@YYYYMMDD` suffix, and a model missing from
//! the configured region triggers one automatic retry against the `global`
//! region.

use crate::config::{
    expand_vertex_alias, VertexSettings, ENV_VERTEX_ACCESS_TOKEN, ENV_VERTEX_PROJECT_ID,
};
use crate::error::{GenError, Result};
use crate::provider::claude::{error_message, extract_messages_text, MessagesResponse};
use crate::provider::retry::{run_with_retry, AttemptError};
use crate::ui::Spinner;
use colored::Colorize;
use futures::FutureExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::cell::RefCell;

const VERTEX_ANTHROPIC_VERSION: &str = "vertex-2023-10-16";
const FALLBACK_REGION: &str = "global";

pub struct VertexProvider {
    access_token: String,
    project_id: String,
    location: String,
    model: String,
    client: Client,
}

impl VertexProvider {
    pub fn new(settings: &VertexSettings) -> Self {
        Self {
            access_token: settings.access_token.clone(),
            project_id: settings.project_id.clone(),
            location: settings.location.clone(),
            model: settings.model.clone(),
            client: Client::new(),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(GenError::Configuration(format!(
                "Vertex access token is not set. Export {} (e.g. from `gcloud auth print-access-token`) or add vertex-claude.accessToken to the settings file.",
                ENV_VERTEX_ACCESS_TOKEN
            )));
        }
        if self.project_id.is_empty() {
            return Err(GenError::Configuration(format!(
                "Vertex project ID is not set. Export {} or add vertex-claude.projectId to the settings file.",
                ENV_VERTEX_PROJECT_ID
            )));
        }
        if expand_vertex_alias(&self.model).is_none() {
            return Err(GenError::Configuration(format!(
                "Vertex model '{}' has no dated identifier. Use a short alias (e.g. sonnet-4-5) or the full form model@YYYYMMDD.",
                self.model
            )));
        }
        Ok(())
    }

    pub async fn generate(&self, prompt: &str, silent: bool, verbose: bool) -> Result<String> {
        let model = expand_vertex_alias(&self.model).unwrap_or_else(|| self.model.clone());
        let request = RawPredictRequest {
            anthropic_version: VERTEX_ANTHROPIC_VERSION.to_string(),
            max_tokens: 200,
            messages: vec![RequestMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| GenError::Unknown(format!("Failed to encode request: {}", e)))?;

        if verbose {
            super::print_verbose_preamble("vertex-claude", &model, &self.access_token, &body);
        }
        let spinner = Spinner::start("Generating command...", !silent);
        // Mutable only within this call: the region flips to "global" at most
        // once, on a not-found response.
        let region = RefCell::new(self.location.clone());
        let region = &region;
        let model = model.as_str();
        let body = body.as_str();
        let result = run_with_retry(
            verbose,
            move || {
                let url = endpoint(&region.borrow(), &self.project_id, model);
                self.attempt(url, body).boxed_local()
            },
            move || {
                if region.borrow().as_str() == FALLBACK_REGION {
                    return false;
                }
                if verbose {
                    eprintln!(
                        "{}",
                        format!(
                            "[askcmd] model not found in {}, retrying in {}",
                            region.borrow(),
                            FALLBACK_REGION
                        )
                        .dimmed()
                    );
                }
                *region.borrow_mut() = FALLBACK_REGION.to_string();
                true
            },
        )
        .await;
        spinner.stop();
        result
    }

    async fn attempt(&self, url: String, body: &str) -> std::result::Result<String, AttemptError> {
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| AttemptError::Other(format!("Failed to reach the Vertex API: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| AttemptError::Other(format!("Failed to parse Vertex response: {}", e)))?;
        extract_messages_text(&parsed)
    }
}

/// Regional endpoint for the publisher model. The global region drops the
/// host prefix.
fn endpoint(location: &str, project_id: &str, model: &str) -> String {
    let host = if location == FALLBACK_REGION {
        "aiplatform.googleapis.com".to_string()
    } else {
        format!("{}-aiplatform.googleapis.com", location)
    };
    format!(
        "https://{}/v1/projects/{}/locations/{}/publishers/anthropic/models/{}:rawPredict",
        host, project_id, location, model
    )
}

/// Map Vertex HTTP failures onto the shared attempt vocabulary. This is the
/// only backend that emits `NotFound`: a 404 here usually means the model is
/// not served in the configured region, which the call engine answers with
/// the global-region fallback.
fn classify_error(status: StatusCode, body: &str) -> AttemptError {
    let message = error_message(body);
    let lower = message.to_lowercase();
    if status == StatusCode::NOT_FOUND || lower.contains("not found") {
        return AttemptError::NotFound(message);
    }
    if status == StatusCode::TOO_MANY_REQUESTS
        || lower.contains("rate limit")
        || lower.contains("resource_exhausted")
    {
        return AttemptError::RateLimited(message);
    }
    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || lower.contains("unauthenticated")
        || lower.contains("permission")
    {
        return AttemptError::Auth(message);
    }
    AttemptError::Other(format!("Vertex API error {}: {}", status, message))
}

#[derive(Debug, Serialize)]
struct RawPredictRequest {
    anthropic_version: String,
    max_tokens: u32,
    messages: Vec<RequestMessage>,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: String,
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> VertexSettings {
        VertexSettings {
            access_token: "ya29.test-token-abcdef".to_string(),
            project_id: "my-project".to_string(),
            location: "us-east5".to_string(),
            model: "claude-haiku-4-5@20251001".to_string(),
        }
    }

    #[test]
    fn test_validate_requires_token_and_project() {
        let mut s = settings();
        s.access_token = String::new();
        let err = VertexProvider::new(&s).validate_config().unwrap_err();
        assert!(err.to_string().contains(ENV_VERTEX_ACCESS_TOKEN));

        let mut s = settings();
        s.project_id = String::new();
        let err = VertexProvider::new(&s).validate_config().unwrap_err();
        assert!(err.to_string().contains(ENV_VERTEX_PROJECT_ID));

        assert!(VertexProvider::new(&settings()).validate_config().is_ok());
    }

    #[test]
    fn test_validate_expands_short_model_names() {
        let mut s = settings();
        s.model = "haiku-4-5".to_string();
        assert!(VertexProvider::new(&s).validate_config().is_ok());
    }

    #[test]
    fn test_validate_rejects_undated_unknown_model() {
        let mut s = settings();
        s.model = "claude-nonexistent".to_string();
        let err = VertexProvider::new(&s).validate_config().unwrap_err();
        assert!(matches!(err, GenError::Configuration(_)));
        assert!(err.to_string().contains("claude-nonexistent"));
    }

    #[test]
    fn test_endpoint_regional_and_global_hosts() {
        let url = endpoint("us-east5", "my-project", "claude-haiku-4-5@20251001");
        assert!(url.starts_with("https://us-east5-aiplatform.googleapis.com/"));
        assert!(url.contains("/locations/us-east5/"));
        assert!(url.ends_with("claude-haiku-4-5@20251001:rawPredict"));

        let url = endpoint("global", "my-project", "claude-haiku-4-5@20251001");
        assert!(url.starts_with("https://aiplatform.googleapis.com/"));
        assert!(url.contains("/locations/global/"));
    }

    #[test]
    fn test_classify_not_found() {
        let body = r#"{"error": {"code": 404, "message": "Publisher Model was not found", "status": "NOT_FOUND"}}"#;
        let err = classify_error(StatusCode::NOT_FOUND, body);
        assert!(matches!(err, AttemptError::NotFound(_)));
    }

    #[test]
    fn test_classify_rate_limit_auth_and_other() {
        assert!(matches!(
            classify_error(StatusCode::TOO_MANY_REQUESTS, "{}"),
            AttemptError::RateLimited(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::FORBIDDEN, "{}"),
            AttemptError::Auth(_)
        ));
        assert!(matches!(
            classify_error(StatusCode::INTERNAL_SERVER_ERROR, "{}"),
            AttemptError::Other(_)
        ));
    }
}
