use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, normalize_endpoint, request_error, ClientSettings, RequestPolicy, TranslationClient};
use crate::app_config::TranslationProvider;
use crate::errors::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Client for the OpenAI chat completions API and compatible local servers
#[derive(Debug)]
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key, empty for servers without authentication
    api_key: String,
    /// Base URL including the `/v1` prefix
    base_url: String,
    /// Model to complete with
    model: String,
    /// Sampling temperature
    temperature: f32,
    /// Retry and pacing policy
    policy: RequestPolicy,
    /// Log name ("openai" or "lmstudio")
    label: &'static str,
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<ChatMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

/// Chat message format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    #[serde(default)]
    pub content: Option<String>,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    /// Generated alternatives, normally one
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

/// One generated alternative
#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    /// The assistant message
    pub message: ChatMessage,

    /// Why generation stopped
    #[serde(default)]
    pub finish_reason: Option<String>,
}

impl ChatCompletionRequest {
    /// Create a single-turn request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: Some(prompt.into()),
            }],
            temperature: None,
        }
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

impl ChatCompletionResponse {
    /// Text of the first choice, if any
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

impl OpenAI {
    /// Create a new client from resolved settings
    pub fn with_settings(settings: &ClientSettings) -> Self {
        let label = match settings.provider {
            TranslationProvider::LMStudio => "lmstudio",
            _ => "openai",
        };

        Self {
            client: settings.http_client(),
            api_key: settings.api_key.clone(),
            base_url: normalize_endpoint(&settings.endpoint, DEFAULT_BASE_URL),
            model: settings.model.clone(),
            temperature: settings.temperature,
            policy: settings.policy(),
            label,
        }
    }

    /// Complete a chat request with retry logic
    pub async fn complete(&self, request: &ChatCompletionRequest) -> Result<ChatCompletionResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let url = url.as_str();

        self.policy
            .run(self.label, move || async move {
                let mut builder = self.client.post(url).json(request);
                if !self.api_key.is_empty() {
                    builder = builder.bearer_auth(&self.api_key);
                }

                let response = builder.send().await.map_err(|e| request_error(self.label, e))?;
                let response = check_status(self.label, response).await?;

                response.json::<ChatCompletionResponse>().await.map_err(|e| {
                    ProviderError::ParseError(format!("Failed to parse {} response: {}", self.label, e))
                })
            })
            .await
    }
}

#[async_trait]
impl TranslationClient for OpenAI {
    async fn translate(&self, prompt: &str) -> Result<Option<String>, ProviderError> {
        let request = ChatCompletionRequest::new(&self.model, prompt).temperature(self.temperature);
        let response = self.complete(&request).await?;

        if let Some(reason) = response.choices.first().and_then(|c| c.finish_reason.as_deref()) {
            debug!("{} finished with reason '{}'", self.label, reason);
        }

        Ok(response
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string))
    }

    fn name(&self) -> &str {
        self.label
    }
}
