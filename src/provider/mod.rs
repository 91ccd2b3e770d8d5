//! Provider backends.
//!
//! One implementation per supported vendor API. Dispatch is enum-based: the
//! set of backends is closed, so the factory stays a total match and a new
//! provider cannot be added without the compiler pointing at every seam.

pub mod azure;
pub mod claude;
pub mod gemini;
pub mod openai;
pub mod retry;
pub mod vertex;

use crate::config::{ProviderKind, ResolvedConfig};
use crate::error::Result;
use colored::Colorize;

/// The active backend for one invocation, bound to its settings block.
pub enum Provider {
    Gemini(gemini::GeminiProvider),
    OpenAi(openai::OpenAiProvider),
    AzureOpenAi(azure::AzureProvider),
    Claude(claude::ClaudeProvider),
    VertexClaude(vertex::VertexProvider),
}

impl Provider {
    /// Construct the backend selected by the resolved configuration.
    pub fn create(config: &ResolvedConfig) -> Self {
        match config.provider {
            ProviderKind::Gemini => Provider::Gemini(gemini::GeminiProvider::new(&config.gemini)),
            ProviderKind::OpenAi => Provider::OpenAi(openai::OpenAiProvider::new(&config.openai)),
            ProviderKind::AzureOpenAi => {
                Provider::AzureOpenAi(azure::AzureProvider::new(&config.azure))
            }
            ProviderKind::Claude => Provider::Claude(claude::ClaudeProvider::new(&config.claude)),
            ProviderKind::VertexClaude => {
                Provider::VertexClaude(vertex::VertexProvider::new(&config.vertex))
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini(_) => "gemini",
            Provider::OpenAi(_) => "openai",
            Provider::AzureOpenAi(_) => "azure-openai",
            Provider::Claude(_) => "claude",
            Provider::VertexClaude(_) => "vertex-claude",
        }
    }

    /// Check the active settings block for required fields. Inactive blocks
    /// are never inspected.
    pub fn validate_config(&self) -> Result<()> {
        match self {
            Provider::Gemini(p) => p.validate_config(),
            Provider::OpenAi(p) => p.validate_config(),
            Provider::AzureOpenAi(p) => p.validate_config(),
            Provider::Claude(p) => p.validate_config(),
            Provider::VertexClaude(p) => p.validate_config(),
        }
    }

    /// Send the rendered prompt to the backend and return the generated text.
    pub async fn generate(&self, prompt: &str, silent: bool, verbose: bool) -> Result<String> {
        match self {
            Provider::Gemini(p) => p.generate(prompt, silent, verbose).await,
            Provider::OpenAi(p) => p.generate(prompt, silent, verbose).await,
            Provider::AzureOpenAi(p) => p.generate(prompt, silent, verbose).await,
            Provider::Claude(p) => p.generate(prompt, silent, verbose).await,
            Provider::VertexClaude(p) => p.generate(prompt, silent, verbose).await,
        }
    }
}

/// Mask a credential for verbose display: first 10 and last 4 characters
/// visible, middle elided. Keys too short to elide are masked entirely.
pub fn mask_credential(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 14 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..10].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// First non-empty line of a vendor error body, truncated for display.
pub(crate) fn snippet(body: &str) -> String {
    let line = body
        .lines()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("")
        .trim();
    let mut out: String = line.chars().take(200).collect();
    if line.chars().count() > 200 {
        out.push_str("...");
    }
    out
}

/// Verbose preamble printed once before the first attempt.
pub(crate) fn print_verbose_preamble(provider: &str, model: &str, credential: &str, body: &str) {
    eprintln!(
        "{}",
        format!(
            "[askcmd] provider={} model={} key={}",
            provider,
            model,
            mask_credential(credential)
        )
        .dimmed()
    );
    eprintln!("{}", format!("[askcmd] request body: {}", body).dimmed());
}
