/*!
 * Provider implementations for different translation services.
 *
 * This module contains client implementations for various LLM providers:
 * - Ollama: Local LLM server
 * - OpenAI: OpenAI API and OpenAI-compatible servers such as LM Studio
 * - Anthropic: Anthropic API integration
 * - Mock: scripted behaviours for tests and demos
 *
 * Every backend is used through the `TranslationClient` capability trait and
 * is chosen once, at construction, from configuration.
 */

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

use crate::app_config::{TranslationConfig, TranslationProvider};
use crate::errors::ProviderError;

pub mod anthropic;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod retry;

pub use anthropic::Anthropic;
pub use mock::{MockBehavior, MockClient};
pub use ollama::Ollama;
pub use openai::OpenAI;
pub use retry::RequestPolicy;

/// Prompt-completion service used by the batch scheduler
///
/// Implementations must tolerate being called again with an identical prompt.
#[async_trait]
pub trait TranslationClient: Send + Sync + Debug {
    /// Complete `prompt`, returning `None` when the backend answered with no text
    async fn translate(&self, prompt: &str) -> Result<Option<String>, ProviderError>;

    /// Short identifier used in logs
    fn name(&self) -> &str;
}

/// Everything a concrete client needs, resolved from configuration
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Which backend to talk to
    pub provider: TranslationProvider,
    /// Model name
    pub model: String,
    /// API key, empty for local servers
    pub api_key: String,
    /// Base URL
    pub endpoint: String,
    /// HTTP timeout per request
    pub timeout_secs: u64,
    /// Requests per minute, if limited
    pub rate_limit: Option<u32>,
    /// Retries after the first HTTP attempt
    pub max_retries: u32,
    /// Base for exponential backoff between HTTP attempts
    pub backoff_base_ms: u64,
    /// Sampling temperature
    pub temperature: f32,
}

impl ClientSettings {
    /// Resolve the active provider's settings
    pub fn from_config(config: &TranslationConfig) -> Self {
        let active = config.active_provider();
        Self {
            provider: config.provider,
            model: active.model,
            api_key: active.api_key,
            endpoint: active.endpoint,
            timeout_secs: active.timeout_secs,
            rate_limit: active.rate_limit,
            max_retries: config.common.retry_count,
            backoff_base_ms: config.common.retry_backoff_ms,
            temperature: config.common.temperature,
        }
    }

    pub(crate) fn policy(&self) -> RequestPolicy {
        RequestPolicy::new(self.max_retries, self.backoff_base_ms, self.rate_limit)
    }

    pub(crate) fn http_client(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(self.timeout_secs.max(1)))
            .pool_idle_timeout(std::time::Duration::from_secs(90))
            .build()
            .unwrap_or_default()
    }
}

/// Build the client for the configured provider
pub fn create_client(config: &TranslationConfig) -> Result<Arc<dyn TranslationClient>, ProviderError> {
    let settings = ClientSettings::from_config(config);

    if settings.provider.requires_api_key() && settings.api_key.is_empty() {
        return Err(ProviderError::AuthenticationError(format!(
            "{} requires an API key",
            settings.provider.display_name()
        )));
    }

    log::info!(
        "Using {} provider with model '{}' at {}",
        settings.provider.display_name(),
        settings.model,
        settings.endpoint
    );

    let client: Arc<dyn TranslationClient> = match settings.provider {
        TranslationProvider::Ollama => Arc::new(Ollama::with_settings(&settings)),
        TranslationProvider::OpenAI | TranslationProvider::LMStudio => Arc::new(OpenAI::with_settings(&settings)),
        TranslationProvider::Anthropic => Arc::new(Anthropic::with_settings(&settings)),
    };

    Ok(client)
}

/// Map a transport failure onto the provider error variants
pub(crate) fn request_error(provider: &str, e: reqwest::Error) -> ProviderError {
    if e.is_connect() {
        ProviderError::ConnectionError(format!("Failed to connect to {}: {}", provider, e))
    } else if e.is_timeout() {
        ProviderError::RequestFailed(format!("{} request timed out: {}", provider, e))
    } else {
        ProviderError::RequestFailed(format!("Failed to send request to {}: {}", provider, e))
    }
}

/// Turn a non-success HTTP response into an error
pub(crate) async fn check_status(
    provider: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to get error response text".to_string());
    log::error!("{} API error ({}): {}", provider, status, error_text);

    Err(ProviderError::from_status(status.as_u16(), error_text))
}

/// Normalise a configured endpoint into a base URL without trailing slash
pub(crate) fn normalize_endpoint(endpoint: &str, fallback: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return fallback.trim_end_matches('/').to_string();
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    match url::Url::parse(&candidate) {
        Ok(url) => url.as_str().trim_end_matches('/').to_string(),
        Err(e) => {
            log::warn!("Invalid endpoint '{}' ({}), using {}", endpoint, e, fallback);
            fallback.trim_end_matches('/').to_string()
        }
    }
}
