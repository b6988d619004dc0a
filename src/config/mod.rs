//! Configuration management for lifelens

use crate::llm::gemini::{DEFAULT_API_KEY_ENV, GEMINI_API_BASE};
use crate::llm::prompt::MODEL_NAME;
use crate::llm::{Backoff, RetryOn, RetryPolicy};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub llm: LlmConfig,
    pub retry: RetryConfig,
    pub attachments: AttachmentsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: f32,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: MODEL_NAME.to_string(),
            temperature: 0.4,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            base_url: GEMINI_API_BASE.to_string(),
            max_output_tokens: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub delay_ms: u64,
    pub backoff: Backoff,
    pub retry_on: RetryOn,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            delay_ms: 1000,
            backoff: Backoff::Fixed,
            retry_on: RetryOn::Transient,
        }
    }
}

impl RetryConfig {
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            delay: Duration::from_millis(self.delay_ms),
            backoff: self.backoff,
            retry_on: self.retry_on,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentsConfig {
    pub max_files: usize,
    pub max_file_size_bytes: u64,
}

impl Default for AttachmentsConfig {
    fn default() -> Self {
        Self {
            max_files: 5,
            max_file_size_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Config {
    /// Load configuration from default location or fall back to defaults
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Get the configuration file path
    pub fn config_path() -> Result<PathBuf> {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "lifelens") {
            Ok(proj_dirs.config_dir().join("config.toml"))
        } else {
            Ok(PathBuf::from("config.toml"))
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
