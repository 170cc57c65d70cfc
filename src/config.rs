use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, TaskRelayError};

/// Image sizes the hosted generation endpoints accept.
pub const ALLOWED_IMAGE_SIZES: [&str; 5] = [
    "256x256",
    "512x512",
    "1024x1024",
    "1792x1024",
    "1024x1792",
];

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub image: ImageConfig,
}

// -- Server --------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address the API listens on.
    #[serde(default = "default_bind")]
    pub bind: String,
}

// -- LLM -----------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL (default: OpenRouter).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Primary chat model for Q&A and content generation.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Alternative chat model tried when the primary fails.
    #[serde(default = "default_chat_model_alternative")]
    pub chat_model_alternative: String,

    /// Sampling temperature for Q&A completions (0.0–2.0).
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,

    /// Max completion tokens for Q&A.
    #[serde(default = "default_chat_max_tokens")]
    pub chat_max_tokens: usize,

    /// Per-call timeout for text generation, in seconds.
    #[serde(default = "default_chat_timeout_secs")]
    pub timeout_secs: u64,

    /// Site URL sent as HTTP-Referer for OpenRouter analytics.
    #[serde(default)]
    pub site_url: String,

    /// App name sent as X-Title for the OpenRouter dashboard.
    #[serde(default)]
    pub app_name: String,
}

// -- Content generation --------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ContentConfig {
    /// Sampling temperature for social content (0.0–2.0).
    #[serde(default = "default_content_temperature")]
    pub temperature: f32,

    /// Max completion tokens for social content.
    #[serde(default = "default_content_max_tokens")]
    pub max_tokens: usize,

    /// Minimum trimmed length a generated text must reach to pass the
    /// quality gate. Product heuristic, not an invariant.
    #[serde(default = "default_min_chars")]
    pub min_chars: usize,

    /// Number of variant sections ("**Tweet 1:**", …) a content response
    /// must contain to pass the quality gate.
    #[serde(default = "default_expected_variants")]
    pub expected_variants: usize,
}

// -- Image generation ----------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Primary image model.
    #[serde(default = "default_image_model")]
    pub model: String,

    /// Alternative image model tried when the primary fails.
    #[serde(default = "default_image_model_alternative")]
    pub model_alternative: String,

    /// Generated image size, e.g. "512x512". Must be one of
    /// [`ALLOWED_IMAGE_SIZES`]. The offline placeholder uses the same
    /// dimensions.
    #[serde(default = "default_image_size")]
    pub size: String,

    /// Per-call timeout for image generation, in seconds.
    #[serde(default = "default_image_timeout_secs")]
    pub timeout_secs: u64,
}

impl ImageConfig {
    /// Parse `size` into (width, height).
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        let (w, h) = self
            .size
            .split_once('x')
            .ok_or_else(|| TaskRelayError::Config(format!("invalid image size: {}", self.size)))?;
        let width = w
            .parse::<u32>()
            .map_err(|_| TaskRelayError::Config(format!("invalid image width: {w}")))?;
        let height = h
            .parse::<u32>()
            .map_err(|_| TaskRelayError::Config(format!("invalid image height: {h}")))?;
        Ok((width, height))
    }
}

// -- Defaults ------------------------------------------------------------

fn default_bind() -> String {
    "127.0.0.1:8001".to_string()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}
fn default_chat_model() -> String {
    "deepseek/deepseek-chat".to_string()
}
fn default_chat_model_alternative() -> String {
    "openai/gpt-4o-mini".to_string()
}
fn default_chat_temperature() -> f32 {
    0.7
}
fn default_chat_max_tokens() -> usize {
    1024
}
fn default_chat_timeout_secs() -> u64 {
    30
}
fn default_content_temperature() -> f32 {
    0.9
}
fn default_content_max_tokens() -> usize {
    2048
}
fn default_min_chars() -> usize {
    50
}
fn default_expected_variants() -> usize {
    3
}
fn default_image_model() -> String {
    "openai/dall-e-3".to_string()
}
fn default_image_model_alternative() -> String {
    "stabilityai/stable-diffusion-xl-base-1.0".to_string()
}
fn default_image_size() -> String {
    "512x512".to_string()
}
fn default_image_timeout_secs() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            chat_model_alternative: default_chat_model_alternative(),
            chat_temperature: default_chat_temperature(),
            chat_max_tokens: default_chat_max_tokens(),
            timeout_secs: default_chat_timeout_secs(),
            site_url: String::new(),
            app_name: String::new(),
        }
    }
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            temperature: default_content_temperature(),
            max_tokens: default_content_max_tokens(),
            min_chars: default_min_chars(),
            expected_variants: default_expected_variants(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: default_image_model(),
            model_alternative: default_image_model_alternative(),
            size: default_image_size(),
            timeout_secs: default_image_timeout_secs(),
        }
    }
}

// -- Config impl ---------------------------------------------------------

impl Config {
    /// Load config from the given path, or the default XDG config location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path(),
        };

        let config = if config_path.exists() {
            info!("loading config from {}", config_path.display());
            let contents = std::fs::read_to_string(&config_path).map_err(TaskRelayError::Io)?;
            toml::from_str(&contents)
                .map_err(|e| TaskRelayError::Config(format!("parse error: {e}")))?
        } else {
            info!("no config file found, using defaults");
            Config::default()
        };

        Ok(config)
    }

    /// Validate ranges and enumerations. Called once at startup so bad
    /// settings fail the process instead of individual requests.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.llm.chat_temperature) {
            return Err(TaskRelayError::Config(format!(
                "chat temperature {} outside 0.0–2.0",
                self.llm.chat_temperature
            )));
        }
        if !(0.0..=2.0).contains(&self.content.temperature) {
            return Err(TaskRelayError::Config(format!(
                "content temperature {} outside 0.0–2.0",
                self.content.temperature
            )));
        }
        if !ALLOWED_IMAGE_SIZES.contains(&self.image.size.as_str()) {
            return Err(TaskRelayError::Config(format!(
                "image size {} not supported — allowed: [{}]",
                self.image.size,
                ALLOWED_IMAGE_SIZES.join(", ")
            )));
        }
        self.image.dimensions()?;

        if self.llm.chat_model == self.llm.chat_model_alternative {
            warn!(model = %self.llm.chat_model, "primary and alternative chat models are the same");
        }
        if self.image.model == self.image.model_alternative {
            warn!(model = %self.image.model, "primary and alternative image models are the same");
        }

        Ok(())
    }

    /// Returns the default config file path: `$XDG_CONFIG_HOME/taskrelay/config.toml`
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("taskrelay")
            .join("config.toml")
    }

    /// Returns the data directory: `$XDG_DATA_HOME/taskrelay/`
    pub fn data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join("taskrelay")
    }

    /// API key for the hosted model endpoint. Env-only, never in the
    /// config file.
    pub fn openrouter_api_key() -> Result<String> {
        std::env::var("OPENROUTER_API_KEY")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                TaskRelayError::Config("OPENROUTER_API_KEY environment variable not set".into())
            })
    }

    /// Password checked by the `/token` endpoint.
    pub fn api_password() -> Result<String> {
        std::env::var("API_PASSWORD")
            .ok()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                TaskRelayError::Config("API_PASSWORD environment variable not set".into())
            })
    }

    /// Secret bytes used to sign/verify HS256 JWTs.
    pub fn jwt_secret() -> Result<Vec<u8>> {
        std::env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .map(String::into_bytes)
            .ok_or_else(|| {
                TaskRelayError::Config("JWT_SECRET environment variable not set".into())
            })
    }

    /// Generate the default config file contents.
    pub fn default_config_contents() -> &'static str {
        include_str!("../config.example.toml")
    }
}
