use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Default source language code
pub const DEFAULT_SOURCE_LANG: &str = "de";
/// Default target language code
pub const DEFAULT_TARGET_LANG: &str = "en";
/// Default OpenAI-compatible endpoint (a local Ollama server)
pub const DEFAULT_API_BASE: &str = "http://localhost:11434/v1";
/// Default model served by the local endpoint
pub const DEFAULT_MODEL: &str = "gemma3:12b";
/// Cache directory, relative to the working directory
pub const DEFAULT_CACHE_DIR: &str = ".cached";

/// Language codes following ISO 639-1 with regional variants
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lang(pub String);

impl Lang {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_auto(&self) -> bool {
        self.0 == "auto"
    }
}

fn default_source_lang() -> Lang {
    Lang::new(DEFAULT_SOURCE_LANG)
}

fn default_target_lang() -> Lang {
    Lang::new(DEFAULT_TARGET_LANG)
}

impl std::fmt::Display for Lang {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Lang {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Lang {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Text color for translation overlay
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl TextColor {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub const fn dark_red() -> Self {
        Self::new(0.8, 0.0, 0.0)
    }

    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    pub const fn blue() -> Self {
        Self::new(0.0, 0.0, 0.8)
    }

    pub const fn dark_green() -> Self {
        Self::new(0.0, 0.5, 0.0)
    }

    pub const fn purple() -> Self {
        Self::new(0.5, 0.0, 0.5)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "darkred" | "dark_red" | "dark-red" => Some(Self::dark_red()),
            "black" => Some(Self::black()),
            "blue" => Some(Self::blue()),
            "darkgreen" | "dark_green" | "dark-green" => Some(Self::dark_green()),
            "purple" => Some(Self::purple()),
            _ => None,
        }
    }

    /// Components clamped to the 0.0-1.0 range PDF color operators expect
    pub fn clamped(self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
        }
    }
}

impl Default for TextColor {
    fn default() -> Self {
        Self::dark_red()
    }
}

/// Which named translator variant to use.
///
/// Both talk to an OpenAI-style chat completions endpoint; they differ in
/// whether an API key is mandatory. The serialized name doubles as the
/// translator label in cache keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatorKind {
    /// Any OpenAI-compatible server (Ollama, llama.cpp, vLLM, ...); key optional
    #[default]
    #[serde(alias = "openai-compatible")]
    OpenAi,
    /// The hosted ChatGPT API; key required
    ChatGpt,
}

impl TranslatorKind {
    /// Stable label used in cache keys and logs
    pub const fn label(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::ChatGpt => "chatgpt",
        }
    }

    pub const fn requires_api_key(self) -> bool {
        matches!(self, Self::ChatGpt)
    }
}

impl std::fmt::Display for TranslatorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for TranslatorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(Self::OpenAi),
            "chatgpt" => Ok(Self::ChatGpt),
            other => Err(Error::ConfigInvalid {
                field: "translator".to_string(),
                reason: format!("unknown translator '{other}' (expected openai or chatgpt)"),
            }),
        }
    }
}

/// Translator backend configuration for OpenAI-compatible APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslatorConfig {
    #[serde(default)]
    pub kind: TranslatorKind,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl TranslatorConfig {
    /// Create a new translator config. An empty key is treated as no key.
    pub fn new(
        kind: TranslatorKind,
        api_base: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            api_base: api_base.into(),
            api_key: normalize_key(api_key),
            model: model.into(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// The configured key, ignoring blank strings
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Check settings that must hold before any page work starts.
    pub fn validate(&self) -> Result<()> {
        if self.kind.requires_api_key() && self.api_key().is_none() {
            return Err(Error::TranslationMissingApiKey {
                translator: self.kind.label(),
            });
        }
        if self.api_base.trim().is_empty() {
            return Err(Error::ConfigInvalid {
                field: "api_base".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.retry_count == 0 {
            return Err(Error::ConfigInvalid {
                field: "retry_count".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }
        Ok(())
    }
}

fn normalize_key(key: Option<String>) -> Option<String> {
    key.map(|k| k.trim().to_string()).filter(|k| !k.is_empty())
}

fn default_api_base() -> String {
    DEFAULT_API_BASE.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

const fn default_retry_count() -> u32 {
    3
}

const fn default_retry_delay_ms() -> u64 {
    1000
}

const fn default_timeout_secs() -> u64 {
    60
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self::new(TranslatorKind::OpenAi, DEFAULT_API_BASE, None, DEFAULT_MODEL)
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable memory cache
    #[serde(default = "default_true")]
    pub memory_enabled: bool,

    /// Memory cache budget in megabytes
    #[serde(default = "default_memory_max_mb")]
    pub memory_max_mb: u64,

    /// Memory cache TTL in seconds (0 = no expiry)
    #[serde(default)]
    pub memory_ttl_seconds: u64,

    /// Enable the durable page cache
    #[serde(default = "default_true")]
    pub disk_enabled: bool,

    /// Page cache directory (defaults to ./.cached)
    pub disk_path: Option<PathBuf>,
}

impl CacheConfig {
    pub fn disk_dir(&self) -> PathBuf {
        self.disk_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR))
    }

    /// Both layers off
    pub fn disabled() -> Self {
        Self {
            memory_enabled: false,
            disk_enabled: false,
            ..Self::default()
        }
    }
}

const fn default_true() -> bool {
    true
}

const fn default_memory_max_mb() -> u64 {
    256
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            memory_max_mb: default_memory_max_mb(),
            memory_ttl_seconds: 0,
            disk_enabled: true,
            disk_path: None,
        }
    }
}

/// Application configuration, built once at startup and handed to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source language
    #[serde(default = "default_source_lang")]
    pub source_lang: Lang,

    /// Target language
    #[serde(default = "default_target_lang")]
    pub target_lang: Lang,

    /// Translation text color
    #[serde(default)]
    pub text_color: TextColor,

    /// Translator backend configuration
    #[serde(default)]
    pub translator: TranslatorConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Page rasterization scale factor for previews
    #[serde(default = "default_render_scale")]
    pub render_scale: f32,

    /// TrueType/OpenType font for overlay text; common system fonts are
    /// searched when unset
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

const fn default_render_scale() -> f32 {
    2.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            source_lang: default_source_lang(),
            target_lang: default_target_lang(),
            text_color: TextColor::default(),
            translator: TranslatorConfig::default(),
            cache: CacheConfig::default(),
            render_scale: default_render_scale(),
            font_path: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::ConfigLoad(format!(
                "Failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(content)
            .map_err(|e| Error::ConfigLoad(format!("Failed to parse config: {e}")))?;
        config.translator.api_key = normalize_key(config.translator.api_key.take());
        Ok(config)
    }

    /// Load from default locations (~/.config/pagetrans/config.toml, ./config.toml)
    pub fn load() -> Self {
        if let Some(config_dir) = crate::util::config_dir() {
            let user_config = config_dir.join("pagetrans").join("config.toml");
            if user_config.exists() {
                match Self::from_file(&user_config) {
                    Ok(config) => {
                        tracing::debug!("Loaded config from {}", user_config.display());
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            match Self::from_file(&local_config) {
                Ok(config) => {
                    tracing::debug!("Loaded config from ./config.toml");
                    return config;
                }
                Err(e) => {
                    tracing::warn!("Failed to load ./config.toml: {}", e);
                }
            }
        }

        tracing::debug!("No config file found, using defaults");
        Self::default()
    }
}
