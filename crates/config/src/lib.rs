//! Configuration loading, validation, and management for Talkback.
//!
//! Loads configuration from `~/.talkback/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Providers served locally that do not check the API key.
pub const KEYLESS_PROVIDERS: &[&str] = &["ollama", "vllm", "llamacpp", "llama.cpp"];

/// The root configuration structure.
///
/// Maps directly to `~/.talkback/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Default LLM provider
    #[serde(default = "default_provider")]
    pub default_provider: String,

    /// Default model
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Models a session may select; anything else is rejected before a call
    #[serde(default = "default_models")]
    pub models: Vec<String>,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per LLM response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Upper bound on one provider call, including the whole stream
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Optional instructions prepended to every request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Display settings
    #[serde(default)]
    pub display: DisplayConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Attachment extraction backends
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Reply translation side channel
    #[serde(default)]
    pub translation: TranslationConfig,
}

fn default_provider() -> String {
    "groq".into()
}
fn default_model() -> String {
    "llama3-8b-8192".into()
}
fn default_models() -> Vec<String> {
    vec![
        "llama3-8b-8192".into(),
        "llama3-70b-8192".into(),
        "mixtral-8x7b-32768".into(),
    ]
}
fn default_temperature() -> f32 {
    0.7
}
fn default_request_timeout_secs() -> u64 {
    120
}
fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("default_provider", &self.default_provider)
            .field("default_model", &self.default_model)
            .field("models", &self.models)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("system_prompt", &self.system_prompt)
            .field("display", &self.display)
            .field("providers", &self.providers)
            .field("extraction", &self.extraction)
            .field("translation", &self.translation)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

/// Page title and the avatar tags stamped on each turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default = "default_user_avatar")]
    pub user_avatar: String,

    #[serde(default = "default_assistant_avatar")]
    pub assistant_avatar: String,
}

fn default_title() -> String {
    "Talkback".into()
}
fn default_user_avatar() -> String {
    "👦".into()
}
fn default_assistant_avatar() -> String {
    "🤖".into()
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
            user_avatar: default_user_avatar(),
            assistant_avatar: default_assistant_avatar(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// External binaries used by the attachment extractors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Path or name of the `tesseract` OCR binary
    #[serde(default = "default_tesseract")]
    pub tesseract_bin: String,

    /// Tesseract language code(s), e.g. "eng" or "spa+eng"
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,

    /// Path or name of the `ffprobe` binary
    #[serde(default = "default_ffprobe")]
    pub ffprobe_bin: String,

    /// Attachments larger than this are rejected before extraction
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,
}

fn default_tesseract() -> String {
    "tesseract".into()
}
fn default_ocr_language() -> String {
    "eng".into()
}
fn default_ffprobe() -> String {
    "ffprobe".into()
}
fn default_max_attachment_bytes() -> u64 {
    20 * 1024 * 1024
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tesseract_bin: default_tesseract(),
            ocr_language: default_ocr_language(),
            ffprobe_bin: default_ffprobe(),
            max_attachment_bytes: default_max_attachment_bytes(),
        }
    }
}

/// Translation of finished replies into another language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Target language code, e.g. "es" or "fr"
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Model used for translation; falls back to the chat model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

fn default_target_language() -> String {
    "es".into()
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_language: default_target_language(),
            model: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.talkback/config.toml).
    ///
    /// Also checks environment variables:
    /// - `TALKBACK_API_KEY` (highest priority), `GROQ_API_KEY`, `OPENAI_API_KEY`
    /// - `TALKBACK_PROVIDER`, `TALKBACK_MODEL`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("TALKBACK_API_KEY")
            .or_else(|| self.api_key.clone())
            .or_else(|| lookup("GROQ_API_KEY"))
            .or_else(|| lookup("OPENAI_API_KEY"))
        {
            self.api_key = Some(key);
        }

        if let Some(provider) = lookup("TALKBACK_PROVIDER") {
            self.default_provider = provider;
        }

        if let Some(model) = lookup("TALKBACK_MODEL") {
            self.default_model = model;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".talkback")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.models.is_empty() {
            return Err(ConfigError::ValidationError(
                "models allow-list must not be empty".into(),
            ));
        }

        if !self.is_model_allowed(&self.default_model) {
            return Err(ConfigError::ValidationError(format!(
                "default_model '{}' is not in the models allow-list",
                self.default_model
            )));
        }

        if let Some(model) = &self.translation.model {
            if !self.is_model_allowed(model) {
                return Err(ConfigError::ValidationError(format!(
                    "translation.model '{model}' is not in the models allow-list"
                )));
            }
        }

        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "request_timeout_secs must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Whether a model identifier is in the allow-list.
    pub fn is_model_allowed(&self, model: &str) -> bool {
        self.models.iter().any(|m| m == model)
    }

    /// The API key, or the startup-fatal `ConfigurationMissing` error.
    ///
    /// Local servers (see [`KEYLESS_PROVIDERS`]) accept any key, so for them
    /// a missing key yields an empty string.
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        let provider_key = self
            .providers
            .get(&self.default_provider)
            .and_then(|p| p.api_key.as_deref());

        match provider_key
            .or(self.api_key.as_deref())
            .filter(|k| !k.trim().is_empty())
        {
            Some(key) => Ok(key),
            None if KEYLESS_PROVIDERS.contains(&self.default_provider.as_str()) => Ok(""),
            None => Err(ConfigError::ConfigurationMissing("api_key".into())),
        }
    }

    /// The request timeout as a `Duration`.
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_provider: default_provider(),
            default_model: default_model(),
            models: default_models(),
            temperature: default_temperature(),
            max_tokens: None,
            request_timeout_secs: default_request_timeout_secs(),
            system_prompt: None,
            display: DisplayConfig::default(),
            providers: HashMap::new(),
            extraction: ExtractionConfig::default(),
            translation: TranslationConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Required configuration missing: {0}")]
    ConfigurationMissing(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert_eq!(config.default_provider, "groq");
        assert_eq!(config.models.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.default_provider, config.default_provider);
        assert_eq!(parsed.models, config.models);
        assert_eq!(parsed.display.user_avatar, "👦");
    }

    #[test]
    fn invalid_temperature_rejected() {
        let config = AppConfig {
            temperature: 5.0,
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn default_model_must_be_allowed() {
        let config = AppConfig {
            default_model: "gpt-9".into(),
            ..AppConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("gpt-9"));
    }

    #[test]
    fn translation_model_must_be_allowed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[translation]
enabled = true
model = "gpt-99"
"#
        )
        .unwrap();

        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("gpt-99")));

        let config = AppConfig {
            translation: TranslationConfig {
                model: Some("llama3-70b-8192".into()),
                ..TranslationConfig::default()
            },
            ..AppConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.default_provider, "groq");
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
api_key = "gsk-test"
default_model = "mixtral-8x7b-32768"
request_timeout_secs = 30

[display]
title = "Bagash AI"
assistant_avatar = "🐼"

[translation]
enabled = true
target_language = "fr"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_model, "mixtral-8x7b-32768");
        assert_eq!(config.display.title, "Bagash AI");
        assert_eq!(config.display.user_avatar, "👦");
        assert_eq!(config.display.assistant_avatar, "🐼");
        assert!(config.translation.enabled);
        assert_eq!(config.translation.target_language, "fr");
        assert_eq!(config.request_timeout().as_secs(), 30);
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "models = 42").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn env_overrides_take_priority() {
        let mut config = AppConfig {
            api_key: Some("from-file".into()),
            ..AppConfig::default()
        };
        config.apply_env_overrides(|key| match key {
            "TALKBACK_API_KEY" => Some("from-env".into()),
            "TALKBACK_MODEL" => Some("llama3-70b-8192".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.default_model, "llama3-70b-8192");
        assert_eq!(config.default_provider, "groq");
    }

    #[test]
    fn provider_env_key_fills_missing_key() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| (key == "GROQ_API_KEY").then(|| "gsk-env".to_string()));
        assert_eq!(config.api_key.as_deref(), Some("gsk-env"));
    }

    #[test]
    fn missing_api_key_is_configuration_missing() {
        let config = AppConfig::default();
        assert!(matches!(
            config.require_api_key(),
            Err(ConfigError::ConfigurationMissing(_))
        ));

        let blank = AppConfig {
            api_key: Some("   ".into()),
            ..AppConfig::default()
        };
        assert!(blank.require_api_key().is_err());
    }

    #[test]
    fn local_providers_need_no_key() {
        let config = AppConfig {
            default_provider: "ollama".into(),
            ..AppConfig::default()
        };
        assert_eq!(config.require_api_key().unwrap(), "");

        let remote = AppConfig {
            default_provider: "openai".into(),
            ..AppConfig::default()
        };
        assert!(remote.require_api_key().is_err());
    }

    #[test]
    fn provider_specific_key_wins() {
        let mut config = AppConfig {
            api_key: Some("global".into()),
            ..AppConfig::default()
        };
        config.providers.insert(
            "groq".into(),
            ProviderConfig {
                api_key: Some("groq-only".into()),
                api_url: None,
            },
        );
        assert_eq!(config.require_api_key().unwrap(), "groq-only");
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = AppConfig {
            api_key: Some("gsk-secret".into()),
            ..AppConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("gsk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("groq"));
        assert!(toml_str.contains("llama3-70b-8192"));
    }
}
