//! Configuration loading, validation, and management for Conductor.
//!
//! Loads configuration from `~/.conductor/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.conductor/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// API key for the model service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model service connection and sampling settings
    #[serde(default)]
    pub model: ModelConfig,

    /// Agent loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Pipeline step and request settings
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Auto-trigger policy for the tool detector
    #[serde(default)]
    pub auto_trigger: AutoTriggerConfig,

    /// Response sanitizer thresholds
    #[serde(default)]
    pub sanitizer: SanitizerConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("agent", &self.agent)
            .field("pipeline", &self.pipeline)
            .field("auto_trigger", &self.auto_trigger)
            .field("sanitizer", &self.sanitizer)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Display name of the service
    #[serde(default = "default_provider")]
    pub provider: String,

    /// OpenAI-compatible base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Primary model
    #[serde(default = "default_model")]
    pub primary: String,

    /// Model retried once when the first call of a request fails
    #[serde(default = "default_fallback_model")]
    pub fallback: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// HTTP timeout for a single model call
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_fallback_model() -> String {
    "gpt-3.5-turbo".into()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_temperature() -> f32 {
    0.7
}
fn default_top_p() -> f32 {
    0.9
}
fn default_http_timeout() -> u64 {
    60
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            base_url: default_base_url(),
            primary: default_model(),
            fallback: default_fallback_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            http_timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum model calls per request
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
        }
    }
}

/// Attempt budget for each pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepAttempts {
    #[serde(default = "one")]
    pub validate_input: u32,
    #[serde(default = "two")]
    pub prepare_context: u32,
    #[serde(default = "three")]
    pub run_agent_loop: u32,
    #[serde(default = "two")]
    pub process_response: u32,
    #[serde(default = "one")]
    pub finalize_state: u32,
}

fn one() -> u32 {
    1
}
fn two() -> u32 {
    2
}
fn three() -> u32 {
    3
}

impl Default for StepAttempts {
    fn default() -> Self {
        Self {
            validate_input: 1,
            prepare_context: 2,
            run_agent_loop: 3,
            process_response: 2,
            finalize_state: 1,
        }
    }
}

impl StepAttempts {
    fn all(&self) -> [u32; 5] {
        [
            self.validate_input,
            self.prepare_context,
            self.run_agent_loop,
            self.process_response,
            self.finalize_state,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub attempts: StepAttempts,

    /// Backoff before retry `n` is `backoff_base_secs * 2^n`
    #[serde(default = "default_backoff_base")]
    pub backoff_base_secs: u64,

    /// Wall-clock deadline for a whole request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    #[serde(default = "default_max_response_chars")]
    pub max_response_chars: usize,

    /// Prior dialogue turns carried into a request
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

fn default_backoff_base() -> u64 {
    1
}
fn default_request_timeout() -> u64 {
    120
}
fn default_max_message_chars() -> usize {
    4000
}
fn default_max_response_chars() -> usize {
    8000
}
fn default_history_window() -> usize {
    20
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            attempts: StepAttempts::default(),
            backoff_base_secs: default_backoff_base(),
            request_timeout_secs: default_request_timeout(),
            max_message_chars: default_max_message_chars(),
            max_response_chars: default_max_response_chars(),
            history_window: default_history_window(),
        }
    }
}

/// Auto-trigger overrides synthesize a tool call straight from the user's
/// message and discard whatever the model decided on that turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoTriggerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_true")]
    pub weather: bool,

    #[serde(default = "default_true")]
    pub search: bool,

    /// Location used when a weather question names none
    #[serde(default = "default_location")]
    pub default_location: String,
}

fn default_true() -> bool {
    true
}
fn default_location() -> String {
    "New York".into()
}

impl Default for AutoTriggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            weather: true,
            search: true,
            default_location: default_location(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanitizerConfig {
    /// Below this many chars the unsanitized text is returned instead
    #[serde(default = "default_min_length")]
    pub min_length: usize,

    #[serde(default = "default_max_passes")]
    pub max_passes: usize,

    /// Noise-marker hits that condemn the whole answer
    #[serde(default = "default_noise_threshold")]
    pub noise_threshold: usize,

    /// Identical-character run length that condemns the whole answer
    #[serde(default = "default_max_char_run")]
    pub max_char_run: usize,
}

fn default_min_length() -> usize {
    20
}
fn default_max_passes() -> usize {
    5
}
fn default_noise_threshold() -> usize {
    3
}
fn default_max_char_run() -> usize {
    20
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            max_passes: default_max_passes(),
            noise_threshold: default_noise_threshold(),
            max_char_run: default_max_char_run(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from the default location, applying env var
    /// overrides on top.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
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

    /// Apply environment overrides through `lookup`.
    ///
    /// The API key falls back across `CONDUCTOR_API_KEY`, `OPENAI_API_KEY`
    /// and `OPENROUTER_API_KEY`, in that order.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = ["CONDUCTOR_API_KEY", "OPENAI_API_KEY", "OPENROUTER_API_KEY"]
            .iter()
            .find_map(|k| lookup(k).filter(|v| !v.is_empty()))
        {
            self.api_key = Some(key);
        }
        if let Some(model) = lookup("CONDUCTOR_MODEL") {
            self.model.primary = model;
        }
        if let Some(model) = lookup("CONDUCTOR_FALLBACK_MODEL") {
            self.model.fallback = model;
        }
        if let Some(url) = lookup("CONDUCTOR_BASE_URL") {
            self.model.base_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".conductor")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::ValidationError(
                "model.temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.model.top_p) {
            return Err(ConfigError::ValidationError(
                "model.top_p must be between 0.0 and 1.0".into(),
            ));
        }
        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }
        if self.pipeline.attempts.all().contains(&0) {
            return Err(ConfigError::ValidationError(
                "every pipeline step needs at least 1 attempt".into(),
            ));
        }
        if self.pipeline.max_message_chars == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_message_chars must be > 0".into(),
            ));
        }
        if self.pipeline.max_response_chars == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_response_chars must be > 0".into(),
            ));
        }
        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: ModelConfig::default(),
            agent: AgentConfig::default(),
            pipeline: PipelineConfig::default(),
            auto_trigger: AutoTriggerConfig::default(),
            sanitizer: SanitizerConfig::default(),
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
}
