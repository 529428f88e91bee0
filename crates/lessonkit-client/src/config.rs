//! Client configuration and factories.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::ApiClient;
use crate::token::{FileTokenStore, StaticToken, TokenStore};

/// Backend connection settings.
///
/// Note: Custom Debug impl masks the token to keep it out of logs.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Inline bearer token. Takes precedence over `token_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Where `lessonkit token set` stores the token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("token_file", &self.token_file)
            .finish()
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            token: None,
            token_file: None,
        }
    }
}

/// Endpoint paths, relative to `base_url`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_free_text")]
    pub free_text: String,
    #[serde(default = "default_translation")]
    pub translation: String,
    #[serde(default = "default_voice_answer")]
    pub voice_answer: String,
    /// Lesson path; `{id}` is replaced by the lesson id.
    #[serde(default = "default_lesson")]
    pub lesson: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            free_text: default_free_text(),
            translation: default_translation(),
            voice_answer: default_voice_answer(),
            lesson: default_lesson(),
        }
    }
}

/// Top-level lessonkit configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LessonkitConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub endpoints: EndpointsConfig,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_free_text() -> String {
    "/api/ai/validate-answer/free-text".to_string()
}
fn default_translation() -> String {
    "/api/ai/validate-answer/translation".to_string()
}
fn default_voice_answer() -> String {
    "/api/ai/validate-answer/voice-answer".to_string()
}
fn default_lesson() -> String {
    "/api/lessons/{id}".to_string()
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("${") {
        let Some(end) = rest[start..].find('}') else {
            break;
        };
        let var_name = &rest[start + 2..start + end];
        result.push_str(&rest[..start]);
        result.push_str(&std::env::var(var_name).unwrap_or_default());
        rest = &rest[start + end + 1..];
    }
    result.push_str(rest);
    result
}

/// Expand a leading `~/` to `$HOME`.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var("HOME")) {
        (Ok(rest), Ok(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

impl LessonkitConfig {
    /// Resolve `${VAR}` references and normalise empty values.
    fn resolve(mut self) -> Self {
        self.backend.base_url = resolve_env_vars(&self.backend.base_url)
            .trim_end_matches('/')
            .to_string();
        self.backend.token = self
            .backend
            .token
            .as_deref()
            .map(resolve_env_vars)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());
        self.backend.token_file = self
            .backend
            .token_file
            .as_deref()
            .map(|p| resolve_env_vars(&p.to_string_lossy()))
            .filter(|p| !p.is_empty())
            .map(|p| expand_home(Path::new(&p)));
        self
    }

    /// The token file in effect: configured, else `~/.config/lessonkit/token`.
    pub fn token_file(&self) -> Option<PathBuf> {
        self.backend
            .token_file
            .clone()
            .or_else(|| config_dir().map(|d| d.join("token")))
    }

    /// Render as TOML (used by `lessonkit init`).
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config")
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `lessonkit.toml` in the current directory
/// 2. `~/.config/lessonkit/config.toml`
///
/// Environment variable overrides: `LESSONKIT_BASE_URL`, `LESSONKIT_TOKEN`.
pub fn load_config() -> Result<LessonkitConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<LessonkitConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("lessonkit.toml");
            if local.exists() {
                Some(local)
            } else {
                config_dir()
                    .map(|d| d.join("config.toml"))
                    .filter(|p| p.exists())
            }
        }
    };

    let mut config = match &config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            parse_config(
                &std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config: {}", path.display()))?,
            )
            .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => LessonkitConfig::default(),
    };

    if let Ok(url) = std::env::var("LESSONKIT_BASE_URL") {
        config.backend.base_url = url;
    }
    if let Ok(token) = std::env::var("LESSONKIT_TOKEN") {
        config.backend.token = Some(token);
    }

    Ok(config.resolve())
}

/// Parse config TOML without applying environment overrides.
pub fn parse_config(content: &str) -> Result<LessonkitConfig> {
    Ok(toml::from_str(content)?)
}

/// `~/.config/lessonkit`.
pub fn config_dir() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("lessonkit"))
}

/// The token store the config selects: the inline token if present, else
/// the token file.
pub fn create_token_store(config: &LessonkitConfig) -> Result<Arc<dyn TokenStore>> {
    if let Some(token) = &config.backend.token {
        return Ok(Arc::new(StaticToken::new(token)));
    }
    let path = config
        .token_file()
        .context("cannot locate a token file: HOME is not set")?;
    Ok(Arc::new(FileTokenStore::new(path)))
}

/// Build the shared API client from configuration.
pub fn create_api_client(config: &LessonkitConfig) -> Result<ApiClient> {
    let tokens = create_token_store(config)?;
    ApiClient::new(&config.backend, &config.endpoints, tokens)
}
