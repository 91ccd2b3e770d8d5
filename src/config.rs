//! Configuration resolution for askcmd.
//!
//! Four layered sources are merged into one immutable snapshot, highest
//! precedence first: explicit CLI argument, environment variable, the JSON
//! settings file at `~/.config/askcmd/settings.json`, built-in default.
//! Credentials are never defaulted; a missing key is caught later by
//! provider validation, not here.

use crate::error::{GenError, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-10-21";
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-5";
pub const DEFAULT_VERTEX_MODEL: &str = "claude-sonnet-4-5@20250929";
pub const DEFAULT_VERTEX_LOCATION: &str = "us-east5";

pub const ENV_PROVIDER: &str = "ASKCMD_PROVIDER";
pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_GEMINI_MODEL: &str = "GEMINI_MODEL";
pub const ENV_LEGACY_MODEL: &str = "ASKCMD_MODEL";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_OPENAI_MODEL: &str = "OPENAI_MODEL";
pub const ENV_OPENAI_ORGANIZATION: &str = "OPENAI_ORGANIZATION";
pub const ENV_AZURE_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_AZURE_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_AZURE_DEPLOYMENT: &str = "AZURE_OPENAI_DEPLOYMENT";
pub const ENV_AZURE_API_VERSION: &str = "AZURE_OPENAI_API_VERSION";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_ANTHROPIC_MODEL: &str = "ANTHROPIC_MODEL";
pub const ENV_VERTEX_ACCESS_TOKEN: &str = "VERTEX_ACCESS_TOKEN";
pub const ENV_VERTEX_PROJECT_ID: &str = "VERTEX_PROJECT_ID";
pub const ENV_VERTEX_LOCATION: &str = "VERTEX_LOCATION";
pub const ENV_VERTEX_MODEL: &str = "VERTEX_MODEL";

/// Short aliases → (Claude canonical, Vertex canonical with dated suffix).
/// Vertex requires the `@YYYYMMDD` marker, so its column carries a known-good
/// release date per model.
const CLAUDE_ALIASES: &[(&str, &str, &str)] = &[
    ("sonnet-4-5", "claude-sonnet-4-5", "claude-sonnet-4-5@20250929"),
    ("haiku-4-5", "claude-haiku-4-5", "claude-haiku-4-5@20251001"),
    ("opus-4-1", "claude-opus-4-1", "claude-opus-4-1@20250805"),
];

/// The closed set of supported backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Gemini,
    OpenAi,
    AzureOpenAi,
    Claude,
    VertexClaude,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Gemini => "gemini",
            ProviderKind::OpenAi => "openai",
            ProviderKind::AzureOpenAi => "azure-openai",
            ProviderKind::Claude => "claude",
            ProviderKind::VertexClaude => "vertex-claude",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = GenError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gemini" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAi),
            "azure-openai" => Ok(ProviderKind::AzureOpenAi),
            "claude" => Ok(ProviderKind::Claude),
            "vertex-claude" => Ok(ProviderKind::VertexClaude),
            other => Err(GenError::Configuration(format!(
                "Unknown provider '{}'. Supported: gemini, openai, azure-openai, claude, vertex-claude",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GeminiSettings {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct OpenAiSettings {
    pub api_key: String,
    pub model: String,
    pub organization: String,
}

#[derive(Debug, Clone, Default)]
pub struct AzureSettings {
    pub api_key: String,
    pub endpoint: String,
    pub deployment: String,
    pub api_version: String,
}

#[derive(Debug, Clone, Default)]
pub struct ClaudeSettings {
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone, Default)]
pub struct VertexSettings {
    pub access_token: String,
    pub project_id: String,
    pub location: String,
    pub model: String,
}

/// Fully merged settings for one invocation. Built once, read-only after.
/// Only the active provider's block is ever validated; the rest may be
/// partially empty.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub provider: ProviderKind,
    pub gemini: GeminiSettings,
    pub openai: OpenAiSettings,
    pub azure: AzureSettings,
    pub claude: ClaudeSettings,
    pub vertex: VertexSettings,
}

/// Explicit call-site overrides from the CLI surface.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub region: Option<String>,
    pub settings_path: Option<PathBuf>,
}

// ── JSON settings file ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct SettingsFile {
    provider: Option<String>,
    gemini: Option<GeminiBlock>,
    openai: Option<OpenAiBlock>,
    #[serde(rename = "azure-openai", alias = "azureOpenai")]
    azure_openai: Option<AzureBlock>,
    claude: Option<ClaudeBlock>,
    #[serde(rename = "vertex-claude", alias = "vertexClaude")]
    vertex_claude: Option<VertexBlock>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct GeminiBlock {
    api_key: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct OpenAiBlock {
    api_key: Option<String>,
    model: Option<String>,
    organization: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct AzureBlock {
    api_key: Option<String>,
    endpoint: Option<String>,
    deployment: Option<String>,
    api_version: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct ClaudeBlock {
    api_key: Option<String>,
    model: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
struct VertexBlock {
    access_token: Option<String>,
    project_id: Option<String>,
    location: Option<String>,
    model: Option<String>,
}

/// Default settings file location.
pub fn default_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("askcmd").join("settings.json"))
}

/// Read the settings file if present. Read or parse failure is non-fatal:
/// the file is treated as absent and a warning is logged.
fn load_settings_file(path: Option<&Path>) -> SettingsFile {
    let path = match path.map(PathBuf::from).or_else(default_settings_path) {
        Some(p) => p,
        None => return SettingsFile::default(),
    };
    if !path.exists() {
        return SettingsFile::default();
    }
    let contents = match std::fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read settings file {}: {}", path.display(), e);
            return SettingsFile::default();
        }
    };
    match serde_json::from_str(&contents) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("Failed to parse settings file {}: {}", path.display(), e);
            SettingsFile::default()
        }
    }
}

// ── Model alias expansion ───────────────────────────────────────────────────

/// Expand a Claude short alias to its canonical ID. Strings already carrying
/// the `claude-` marker pass through unchanged, as do unrecognized strings
/// (the API reports those itself).
pub fn expand_claude_alias(model: &str) -> String {
    if model.starts_with("claude-") {
        return model.to_string();
    }
    for (alias, canonical, _) in CLAUDE_ALIASES {
        if model == *alias {
            return (*canonical).to_string();
        }
    }
    model.to_string()
}

/// Expand a Vertex model name to its dated canonical form. Strings already
/// containing `@` pass through. Both the short alias and the undated
/// canonical are accepted; anything else has no known release date and
/// returns `None` (a configuration error at validation time).
pub fn expand_vertex_alias(model: &str) -> Option<String> {
    if model.contains('@') {
        return Some(model.to_string());
    }
    CLAUDE_ALIASES
        .iter()
        .find(|(alias, canonical, _)| model == *alias || model == *canonical)
        .map(|(_, _, dated)| (*dated).to_string())
}

// ── Resolution ──────────────────────────────────────────────────────────────

fn pick(
    explicit: Option<&str>,
    env_val: Option<String>,
    file_val: Option<&str>,
    default: &str,
) -> String {
    if let Some(v) = explicit {
        return v.to_string();
    }
    if let Some(v) = env_val {
        return v;
    }
    if let Some(v) = file_val {
        return v.to_string();
    }
    default.to_string()
}

/// Resolve the configuration for this invocation.
pub fn resolve(overrides: &Overrides) -> Result<ResolvedConfig> {
    let file = load_settings_file(overrides.settings_path.as_deref());
    resolve_with(overrides, &file, |name| std::env::var(name).ok())
}

/// Resolution core, parameterized over the environment lookup so precedence
/// is testable without mutating process-global state.
fn resolve_with(
    overrides: &Overrides,
    file: &SettingsFile,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    let provider_name = pick(
        overrides.provider.as_deref(),
        env(ENV_PROVIDER),
        file.provider.as_deref(),
        "gemini",
    );
    let provider = ProviderKind::from_str(&provider_name)?;

    let g = file.gemini.as_ref();
    let gemini = GeminiSettings {
        api_key: pick(
            None,
            env(ENV_GOOGLE_API_KEY),
            g.and_then(|b| b.api_key.as_deref()),
            "",
        ),
        model: pick(
            None,
            env(ENV_GEMINI_MODEL).or_else(|| env(ENV_LEGACY_MODEL)),
            g.and_then(|b| b.model.as_deref()),
            DEFAULT_GEMINI_MODEL,
        ),
    };

    let o = file.openai.as_ref();
    let openai = OpenAiSettings {
        api_key: pick(
            None,
            env(ENV_OPENAI_API_KEY),
            o.and_then(|b| b.api_key.as_deref()),
            "",
        ),
        model: pick(
            None,
            env(ENV_OPENAI_MODEL),
            o.and_then(|b| b.model.as_deref()),
            DEFAULT_OPENAI_MODEL,
        ),
        organization: pick(
            None,
            env(ENV_OPENAI_ORGANIZATION),
            o.and_then(|b| b.organization.as_deref()),
            "",
        ),
    };

    let a = file.azure_openai.as_ref();
    let azure = AzureSettings {
        api_key: pick(
            None,
            env(ENV_AZURE_API_KEY),
            a.and_then(|b| b.api_key.as_deref()),
            "",
        ),
        endpoint: pick(
            None,
            env(ENV_AZURE_ENDPOINT),
            a.and_then(|b| b.endpoint.as_deref()),
            "",
        ),
        deployment: pick(
            None,
            env(ENV_AZURE_DEPLOYMENT),
            a.and_then(|b| b.deployment.as_deref()),
            "",
        ),
        api_version: pick(
            None,
            env(ENV_AZURE_API_VERSION),
            a.and_then(|b| b.api_version.as_deref()),
            DEFAULT_AZURE_API_VERSION,
        ),
    };

    let c = file.claude.as_ref();
    let claude = ClaudeSettings {
        api_key: pick(
            None,
            env(ENV_ANTHROPIC_API_KEY),
            c.and_then(|b| b.api_key.as_deref()),
            "",
        ),
        model: pick(
            None,
            env(ENV_ANTHROPIC_MODEL),
            c.and_then(|b| b.model.as_deref()),
            DEFAULT_CLAUDE_MODEL,
        ),
    };

    let v = file.vertex_claude.as_ref();
    let vertex = VertexSettings {
        access_token: pick(
            None,
            env(ENV_VERTEX_ACCESS_TOKEN),
            v.and_then(|b| b.access_token.as_deref()),
            "",
        ),
        project_id: pick(
            None,
            env(ENV_VERTEX_PROJECT_ID),
            v.and_then(|b| b.project_id.as_deref()),
            "",
        ),
        location: pick(
            None,
            env(ENV_VERTEX_LOCATION),
            v.and_then(|b| b.location.as_deref()),
            DEFAULT_VERTEX_LOCATION,
        ),
        model: pick(
            None,
            env(ENV_VERTEX_MODEL),
            v.and_then(|b| b.model.as_deref()),
            DEFAULT_VERTEX_MODEL,
        ),
    };

    let mut config = ResolvedConfig {
        provider,
        gemini,
        openai,
        azure,
        claude,
        vertex,
    };

    // Explicit --model / --region target the active provider's block only.
    if let Some(model) = overrides.model.as_deref() {
        match provider {
            ProviderKind::Gemini => config.gemini.model = model.to_string(),
            ProviderKind::OpenAi => config.openai.model = model.to_string(),
            ProviderKind::AzureOpenAi => config.azure.deployment = model.to_string(),
            ProviderKind::Claude => config.claude.model = model.to_string(),
            ProviderKind::VertexClaude => config.vertex.model = model.to_string(),
        }
    }
    if let Some(region) = overrides.region.as_deref() {
        config.vertex.location = region.to_string();
    }

    // Alias normalization for the Claude-family providers. An unknown undated
    // Vertex model keeps its raw value; validate_config rejects it with the
    // full explanation.
    config.claude.model = expand_claude_alias(&config.claude.model);
    if let Some(expanded) = expand_vertex_alias(&config.vertex.model) {
        config.vertex.model = expanded;
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_provider_names_round_trip() {
        for name in ["gemini", "openai", "azure-openai", "claude", "vertex-claude"] {
            let kind = ProviderKind::from_str(name).unwrap();
            assert_eq!(kind.as_str(), name);
        }
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = ProviderKind::from_str("bedrock").unwrap_err();
        assert!(matches!(err, GenError::Configuration(_)));
    }

    #[test]
    fn test_defaults_when_nothing_set() {
        let config =
            resolve_with(&Overrides::default(), &SettingsFile::default(), no_env).unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.gemini.api_key, "");
        assert_eq!(config.azure.api_version, DEFAULT_AZURE_API_VERSION);
        assert_eq!(config.vertex.location, DEFAULT_VERTEX_LOCATION);
    }

    #[test]
    fn test_precedence_explicit_over_env_over_file() {
        let file: SettingsFile = serde_json::from_str(
            r#"{"provider": "claude", "claude": {"model": "opus-4-1"}}"#,
        )
        .unwrap();
        let env = |name: &str| match name {
            ENV_PROVIDER => Some("openai".to_string()),
            _ => None,
        };

        // Env beats file.
        let config = resolve_with(&Overrides::default(), &file, env).unwrap();
        assert_eq!(config.provider, ProviderKind::OpenAi);

        // Explicit beats env.
        let overrides = Overrides {
            provider: Some("claude".to_string()),
            ..Default::default()
        };
        let config = resolve_with(&overrides, &file, env).unwrap();
        assert_eq!(config.provider, ProviderKind::Claude);
        // File value survives below the explicit layer, alias-expanded.
        assert_eq!(config.claude.model, "claude-opus-4-1");
    }

    #[test]
    fn test_model_override_targets_active_provider_only() {
        let overrides = Overrides {
            provider: Some("openai".to_string()),
            model: Some("gpt-4.1".to_string()),
            ..Default::default()
        };
        let config = resolve_with(&overrides, &SettingsFile::default(), no_env).unwrap();
        assert_eq!(config.openai.model, "gpt-4.1");
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.claude.model, DEFAULT_CLAUDE_MODEL);
    }

    #[test]
    fn test_legacy_model_variable_for_default_provider() {
        let env = |name: &str| match name {
            ENV_LEGACY_MODEL => Some("gemini-2.0-flash".to_string()),
            _ => None,
        };
        let config = resolve_with(&Overrides::default(), &SettingsFile::default(), env).unwrap();
        assert_eq!(config.gemini.model, "gemini-2.0-flash");

        // The dedicated variable wins over the legacy alias.
        let env = |name: &str| match name {
            ENV_GEMINI_MODEL => Some("gemini-2.5-pro".to_string()),
            ENV_LEGACY_MODEL => Some("gemini-2.0-flash".to_string()),
            _ => None,
        };
        let config = resolve_with(&Overrides::default(), &SettingsFile::default(), env).unwrap();
        assert_eq!(config.gemini.model, "gemini-2.5-pro");
    }

    #[test]
    fn test_scenario_key_only_resolves_to_gemini() {
        let env = |name: &str| match name {
            ENV_GOOGLE_API_KEY => Some("AIzaSyTest1234567890".to_string()),
            _ => None,
        };
        let config = resolve_with(&Overrides::default(), &SettingsFile::default(), env).unwrap();
        assert_eq!(config.provider, ProviderKind::Gemini);
        assert_eq!(config.gemini.model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.gemini.api_key, "AIzaSyTest1234567890");
    }

    #[test]
    fn test_scenario_vertex_alias_and_default_region() {
        let overrides = Overrides {
            provider: Some("vertex-claude".to_string()),
            model: Some("haiku-4-5".to_string()),
            ..Default::default()
        };
        let config = resolve_with(&overrides, &SettingsFile::default(), no_env).unwrap();
        assert_eq!(config.vertex.model, "claude-haiku-4-5@20251001");
        assert_eq!(config.vertex.location, DEFAULT_VERTEX_LOCATION);
    }

    #[test]
    fn test_claude_alias_expansion_idempotent() {
        let once = expand_claude_alias("sonnet-4-5");
        let twice = expand_claude_alias(&once);
        assert_eq!(once, "claude-sonnet-4-5");
        assert_eq!(once, twice);

        // Canonical strings pass through unchanged.
        assert_eq!(
            expand_claude_alias("claude-opus-4-1-20250805"),
            "claude-opus-4-1-20250805"
        );
    }

    #[test]
    fn test_vertex_alias_expansion_idempotent() {
        let once = expand_vertex_alias("haiku-4-5").unwrap();
        let twice = expand_vertex_alias(&once).unwrap();
        assert_eq!(once, "claude-haiku-4-5@20251001");
        assert_eq!(once, twice);

        // Dated strings pass through, unknown undated strings do not expand.
        assert_eq!(
            expand_vertex_alias("claude-sonnet-4-5@20250929").as_deref(),
            Some("claude-sonnet-4-5@20250929")
        );
        assert!(expand_vertex_alias("gemini-2.5-flash").is_none());
    }

    #[test]
    fn test_vertex_undated_canonical_gets_known_date() {
        assert_eq!(
            expand_vertex_alias("claude-opus-4-1").as_deref(),
            Some("claude-opus-4-1@20250805")
        );
    }

    #[test]
    fn test_settings_file_parse_failure_is_nonfatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();
        let file = load_settings_file(Some(&path));
        assert!(file.provider.is_none());
    }

    #[test]
    fn test_settings_file_blocks_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{
                "provider": "azure-openai",
                "azure-openai": {
                    "apiKey": "azkey",
                    "endpoint": "https://example.openai.azure.com",
                    "deployment": "gpt-4o-mini-prod"
                }
            }"#,
        )
        .unwrap();
        let file = load_settings_file(Some(&path));
        let config = resolve_with(&Overrides::default(), &file, no_env).unwrap();
        assert_eq!(config.provider, ProviderKind::AzureOpenAi);
        assert_eq!(config.azure.api_key, "azkey");
        assert_eq!(config.azure.endpoint, "https://example.openai.azure.com");
        assert_eq!(config.azure.deployment, "gpt-4o-mini-prod");
        assert_eq!(config.azure.api_version, DEFAULT_AZURE_API_VERSION);
    }
}
