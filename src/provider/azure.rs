//! Azure OpenAI backend.
//!
//! Same chat completions wire shape as OpenAI, but addressed per deployment
//! under a resource endpoint and authenticated with an `api-key` header.

use crate::config::{
    AzureSettings, ENV_AZURE_API_KEY, ENV_AZURE_DEPLOYMENT, ENV_AZURE_ENDPOINT,
};
use crate::error::{GenError, Result};
use crate::provider::openai::{encode_chat_request, extract_chat_text, ChatResponse};
use crate::provider::retry::{run_with_retry, AttemptError};
use crate::provider::snippet;
use crate::ui::Spinner;
use futures::FutureExt;
use reqwest::{Client, StatusCode};

pub struct AzureProvider {
    api_key: String,
    endpoint: String,
    deployment: String,
    api_version: String,
    client: Client,
}

impl AzureProvider {
    pub fn new(settings: &AzureSettings) -> Self {
        Self {
            api_key: settings.api_key.clone(),
            endpoint: settings.endpoint.clone(),
            deployment: settings.deployment.clone(),
            api_version: settings.api_version.clone(),
            client: Client::new(),
        }
    }

    pub fn validate_config(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(GenError::Configuration(format!(
                "Azure OpenAI API key is not set. Export {} or add azure-openai.apiKey to the settings file.",
                ENV_AZURE_API_KEY
            )));
        }
        if self.endpoint.is_empty() {
            return Err(GenError::Configuration(format!(
                "Azure OpenAI endpoint is not set. Export {} or add azure-openai.endpoint to the settings file.",
                ENV_AZURE_ENDPOINT
            )));
        }
        if self.deployment.is_empty() {
            return Err(GenError::Configuration(format!(
                "Azure OpenAI deployment is not set. Export {} or add azure-openai.deployment to the settings file.",
                ENV_AZURE_DEPLOYMENT
            )));
        }
        Ok(())
    }

    pub async fn generate(&self, prompt: &str, silent: bool, verbose: bool) -> Result<String> {
        // The deployment name stands in for the model in Azure's scheme.
        let body = encode_chat_request(&self.deployment, prompt)?;
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        );

        if verbose {
            super::print_verbose_preamble("azure-openai", &self.deployment, &self.api_key, &body);
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
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .body(body.to_string())
            .send()
            .await
            .map_err(|e| {
                AttemptError::Other(format!("Failed to reach the Azure OpenAI API: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_error(status, &text));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            AttemptError::Other(format!("Failed to parse Azure OpenAI response: {}", e))
        })?;
        extract_chat_text(&parsed)
    }
}

/// Map Azure OpenAI HTTP failures onto the shared attempt vocabulary. Azure
/// rejects filtered prompts with a 400 naming its content management policy,
/// which is a block rather than a generic error.
fn classify_error(status: StatusCode, body: &str) -> AttemptError {
    let lower = body.to_lowercase();
    if status == StatusCode::TOO_MANY_REQUESTS || lower.contains("rate limit") {
        return AttemptError::RateLimited(snippet(body));
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return AttemptError::Auth(snippet(body));
    }
    if lower.contains("content management policy") {
        return AttemptError::Blocked(snippet(body));
    }
    AttemptError::Other(format!(
        "Azure OpenAI API error {}: {}",
        status,
        snippet(body)
    ))
}
