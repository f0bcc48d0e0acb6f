//! Configuration for the deposition indexer.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::end_detect::EndDetectOptions;
use crate::error::{DepoIndexError, Result};
use crate::labeler::LabelStyle;
use crate::position::PositionOptions;
use crate::segment::SegmentOptions;
use crate::topic::DedupeOptions;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// LLM configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL for the LLM API (e.g., "http://localhost:11434")
    pub api_base: String,

    /// API key for authentication
    pub api_key: String,

    /// Model name (e.g., "gemma3", "gpt-4o-mini")
    pub model: String,

    /// Maximum tokens for response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    64
}

fn default_temperature() -> f32 {
    0.2
}

fn default_request_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: String::new(),
            api_key: String::new(),
            model: "gemma3".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Labeler fan-out and prompt shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelingConfig {
    /// Labeler calls in flight at once.
    pub concurrency: usize,
    /// Per-call timeout in seconds.
    pub timeout_secs: u64,
    /// Characters of segment text sent to the labeler.
    pub excerpt_chars: usize,
    /// Upper bound on words requested per label.
    pub max_label_words: usize,
}

impl Default for LabelingConfig {
    fn default() -> Self {
        let style = LabelStyle::default();
        Self {
            concurrency: 4,
            timeout_secs: 60,
            excerpt_chars: style.excerpt_chars,
            max_label_words: style.max_words,
        }
    }
}

impl LabelingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn label_style(&self) -> LabelStyle {
        LabelStyle {
            max_words: self.max_label_words,
            excerpt_chars: self.excerpt_chars,
        }
    }
}

/// Settings for every pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PipelineConfig {
    pub positions: PositionOptions,
    pub segmentation: SegmentOptions,
    pub end_detection: EndDetectOptions,
    pub dedupe: DedupeOptions,
    pub labeling: LabelingConfig,
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// LLM settings
    pub llm: LlmConfig,

    /// Pipeline settings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Configuration file structure (YAML format).
#[derive(Debug, Deserialize)]
struct ConfigFile {
    llm: Option<LlmFileSection>,
    pipeline: Option<PipelineConfig>,
}

#[derive(Debug, Deserialize)]
struct LlmFileSection {
    api_base: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    request_timeout_secs: Option<u64>,
}

impl Config {
    /// Load configuration from environment variables and optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_API_BASE, LLM_API_KEY, LLM_MODEL, DEPO_*)
    /// 2. Config file (~/.config/depo-indexer/config.yaml)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_with(None)
    }

    /// Like [`Config::load`], reading `path` instead of the default config file.
    pub fn load_with(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                if !path.exists() {
                    return Err(DepoIndexError::Config(format!(
                        "Config file '{}' does not exist",
                        path.display()
                    )));
                }
                Self::load_from_file(path)?
            }
            None => match Self::config_file_path() {
                Some(default_path) if default_path.exists() => {
                    Self::load_from_file(&default_path)?
                }
                _ => Config::default(),
            },
        };

        config.apply_env(|key| env::var(key).ok());
        Ok(config)
    }

    /// Override fields from the environment, as seen through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(api_base) = lookup("LLM_API_BASE") {
            self.llm.api_base = api_base;
        }

        if let Some(api_key) = lookup("LLM_API_KEY") {
            self.llm.api_key = api_key;
        }

        if let Some(model) = lookup("LLM_MODEL") {
            self.llm.model = model;
        }

        if let Some(tokens) = lookup("LLM_MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.llm.max_tokens = tokens;
        }

        if let Some(temp) = lookup("LLM_TEMPERATURE").and_then(|v| v.parse().ok()) {
            self.llm.temperature = temp;
        }

        if let Some(concurrency) = lookup("DEPO_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.pipeline.labeling.concurrency = concurrency;
        }

        if let Some(secs) = lookup("DEPO_LABEL_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.pipeline.labeling.timeout_secs = secs;
        }

        if let Some(words) = lookup("DEPO_MAX_WORDS").and_then(|v| v.parse().ok()) {
            self.pipeline.segmentation.max_words = words;
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DepoIndexError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: ConfigFile = serde_yaml::from_str(content)
            .map_err(|e| DepoIndexError::Config(format!("Failed to parse config file: {}", e)))?;

        let mut config = Config::default();

        if let Some(llm) = file_config.llm {
            if let Some(api_base) = llm.api_base {
                config.llm.api_base = api_base;
            }
            if let Some(api_key) = llm.api_key {
                config.llm.api_key = api_key;
            }
            if let Some(model) = llm.model {
                config.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                config.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                config.llm.temperature = temperature;
            }
            if let Some(secs) = llm.request_timeout_secs {
                config.llm.request_timeout_secs = secs;
            }
        }

        if let Some(pipeline) = file_config.pipeline {
            config.pipeline = pipeline;
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "depo-indexer")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that required configuration is present.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_base.is_empty() {
            return Err(DepoIndexError::Config(
                "LLM API base URL is required. Set LLM_API_BASE environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.api_key.is_empty() {
            return Err(DepoIndexError::Config(
                "LLM API key is required. Set LLM_API_KEY environment variable or add to config file.".to_string()
            ));
        }

        if self.llm.model.is_empty() {
            return Err(DepoIndexError::Config(
                "LLM model is required. Set LLM_MODEL environment variable or add to config file."
                    .to_string(),
            ));
        }

        self.pipeline.validate()
    }

    /// Create a config from explicit values (useful for testing).
    pub fn with_llm(
        api_base: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            llm: LlmConfig {
                api_base: api_base.into(),
                api_key: api_key.into(),
                model: model.into(),
                ..Default::default()
            },
            pipeline: PipelineConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Numeric sanity checks. Independent of any LLM settings.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.dedupe.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(DepoIndexError::Config(format!(
                "dedupe.similarity_threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        if self.labeling.concurrency == 0 {
            return Err(DepoIndexError::Config(
                "labeling.concurrency must be at least 1".to_string(),
            ));
        }
        if self.labeling.timeout_secs == 0 {
            return Err(DepoIndexError::Config(
                "labeling.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.segmentation.max_words == 0 {
            return Err(DepoIndexError::Config(
                "segmentation.max_words must be at least 1".to_string(),
            ));
        }
        if self.positions.lines_per_page == 0 {
            return Err(DepoIndexError::Config(
                "positions.lines_per_page must be at least 1".to_string(),
            ));
        }
        if self.end_detection.warmup_divisor == 0 {
            return Err(DepoIndexError::Config(
                "end_detection.warmup_divisor must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
