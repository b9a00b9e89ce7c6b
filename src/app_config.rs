use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

use crate::subtitle_merger::MergeConfig;

/// Everything read from `conf.json`; every field has a default
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Target locale (single language, ISO code with optional region)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Backend selection and connection settings
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Caption merge thresholds
    #[serde(default)]
    pub merge: MergeConfig,

    /// Batch scheduling
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    /// Durable session cache
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub log_level: LogLevel,
}

/// Backend family a translation request is sent to
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    #[default]
    Ollama,
    OpenAI,
    Anthropic,
    /// OpenAI-compatible local server
    LMStudio,
}

impl TranslationProvider {
    pub const ALL: [TranslationProvider; 4] = [Self::Ollama, Self::OpenAI, Self::Anthropic, Self::LMStudio];

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
        }
    }

    /// Identifier used in config files and on the command line
    pub fn id(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::LMStudio => "lmstudio",
        }
    }

    /// Whether the provider is a hosted API that needs a key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }

    /// Out-of-the-box settings for this provider
    pub fn defaults(&self) -> ProviderConfig {
        let (model, endpoint, timeout_secs, rate_limit) = match self {
            Self::Ollama => ("llama3", "http://localhost:11434", 30, None),
            Self::OpenAI => ("gpt-4o-mini", "https://api.openai.com/v1", 30, Some(60)),
            // Standard tier allows 50 requests per minute
            Self::Anthropic => ("claude-3-haiku-20240307", "https://api.anthropic.com", 60, Some(45)),
            // Placeholder model; LM Studio answers with whatever is loaded
            Self::LMStudio => ("local-model", "http://localhost:1234/v1", 30, None),
        };

        ProviderConfig {
            provider_type: *self,
            model: model.to_string(),
            api_key: String::new(),
            endpoint: endpoint.to_string(),
            timeout_secs,
            rate_limit,
        }
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|p| p.id() == wanted)
            .ok_or_else(|| anyhow!("Unknown provider '{}'", s))
    }
}

/// Per-provider connection settings; empty strings fall back to the defaults
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: TranslationProvider,

    #[serde(default)]
    pub model: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub endpoint: String,

    /// HTTP timeout per request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Requests per minute, unlimited when absent
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

/// Which backend to use and how to reach each one
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    #[serde(default)]
    pub provider: TranslationProvider,

    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Common translation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Retry count for failed HTTP requests inside a provider
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Backoff multiplier for retries (in milliseconds)
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            temperature: default_temperature(),
        }
    }
}

/// Batch scheduling settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SchedulerSettings {
    /// Groups per provider call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Total attempts per batch before the run is aborted
    #[serde(default = "default_max_batch_retries")]
    pub max_batch_retries: u32,

    /// Base delay between attempts, multiplied by the attempt number
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Pause between consecutive batches
    #[serde(default = "default_batch_interval_ms")]
    pub batch_interval_ms: u64,

    /// Whether a run waits for an explicit resume before the first batch
    #[serde(default = "default_true")]
    pub start_paused: bool,

    /// Whether retry prompts mention the attempt number
    #[serde(default = "default_true")]
    pub annotate_retries: bool,

    /// Buffered events per subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            max_batch_retries: default_max_batch_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            batch_interval_ms: default_batch_interval_ms(),
            start_paused: true,
            annotate_retries: true,
            event_capacity: default_event_capacity(),
        }
    }
}

/// Durable cache settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct StorageConfig {
    /// SQLite file; `None` means the per-user data directory
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Namespace prepended to every session id
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// Disable to keep translations in memory only
    #[serde(default)]
    pub disabled: bool,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` filter
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_target_language() -> String {
    "zh".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000
}

fn default_temperature() -> f32 {
    0.3
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    8
}

fn default_max_batch_retries() -> u32 {
    10
}

fn default_retry_base_delay_ms() -> u64 {
    1000
}

fn default_batch_interval_ms() -> u64 {
    2000
}

fn default_event_capacity() -> usize {
    256
}

fn default_key_prefix() -> String {
    crate::translation::cache::DEFAULT_KEY_PREFIX.to_string()
}

impl Config {
    /// Load configuration from a JSON file, writing defaults if it is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Self::default();
            config.save(path)?;
            log::info!("Created default configuration at {}", path.display());
            return Ok(config);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::validate_language_code(&self.target_language)?;

        if self.translation.provider.requires_api_key() && self.translation.active_provider().api_key.is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                self.translation.provider.display_name()
            ));
        }

        let scheduler = &self.scheduler;
        if scheduler.batch_size == 0 {
            return Err(anyhow!("scheduler.batch_size must be at least 1"));
        }
        if !(5..=10).contains(&scheduler.batch_size) {
            log::warn!(
                "scheduler.batch_size {} is outside the recommended range 5-10",
                scheduler.batch_size
            );
        }
        if scheduler.max_batch_retries == 0 {
            return Err(anyhow!("scheduler.max_batch_retries must be at least 1"));
        }
        if scheduler.event_capacity == 0 {
            return Err(anyhow!("scheduler.event_capacity must be at least 1"));
        }

        let merge = &self.merge;
        if merge.max_text_length == 0 || merge.max_group_duration_ms == 0 {
            return Err(anyhow!("merge limits must be positive"));
        }

        Ok(())
    }

    /// Resolved SQLite location
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database_path {
            Some(path) => Ok(path.clone()),
            None => Ok(crate::database::DatabaseConnection::default_database_path()?),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            merge: MergeConfig::default(),
            scheduler: SchedulerSettings::default(),
            storage: StorageConfig {
                key_prefix: default_key_prefix(),
                ..StorageConfig::default()
            },
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Settings of the active provider, file values layered over its defaults
    pub fn active_provider(&self) -> ProviderConfig {
        let mut resolved = self.provider.defaults();
        let Some(entry) = self.available_providers.iter().find(|p| p.provider_type == self.provider) else {
            return resolved;
        };

        if !entry.model.is_empty() {
            resolved.model = entry.model.clone();
        }
        if !entry.endpoint.is_empty() {
            resolved.endpoint = entry.endpoint.clone();
        }
        resolved.api_key = entry.api_key.clone();
        resolved.timeout_secs = entry.timeout_secs;
        resolved.rate_limit = entry.rate_limit;
        resolved
    }

    /// Mutable entry of the active provider, added with defaults if missing
    pub fn active_provider_mut(&mut self) -> &mut ProviderConfig {
        let provider = self.provider;
        let index = match self.available_providers.iter().position(|p| p.provider_type == provider) {
            Some(index) => index,
            None => {
                self.available_providers.push(provider.defaults());
                self.available_providers.len() - 1
            }
        };
        &mut self.available_providers[index]
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: TranslationProvider::ALL.iter().map(|p| p.defaults()).collect(),
            common: TranslationCommonConfig::default(),
        }
    }
}
