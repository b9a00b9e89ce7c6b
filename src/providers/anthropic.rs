use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, normalize_endpoint, request_error, ClientSettings, RequestPolicy, TranslationClient};
use crate::errors::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Anthropic client for interacting with Anthropic API
#[derive(Debug)]
pub struct Anthropic {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// API endpoint URL
    endpoint: String,
    /// Model to complete with
    model: String,
    /// Sampling temperature
    temperature: f32,
    /// Retry and pacing policy
    policy: RequestPolicy,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: [Message<'a>; 1],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

/// Body of a `/v1/messages` answer; only text blocks are kept
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

impl MessagesResponse {
    fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect()
    }
}

const SYSTEM_PROMPT: &str = "You translate subtitles and answer with JSON only.";

impl Anthropic {
    /// Create a new Anthropic client from resolved settings
    pub fn with_settings(settings: &ClientSettings) -> Self {
        Self {
            client: settings.http_client(),
            api_key: settings.api_key.clone(),
            endpoint: normalize_endpoint(&settings.endpoint, DEFAULT_BASE_URL),
            model: settings.model.clone(),
            temperature: settings.temperature,
            policy: settings.policy(),
        }
    }

    async fn complete(&self, prompt: &str) -> Result<MessagesResponse, ProviderError> {
        let url = format!("{}/v1/messages", self.endpoint);
        let body = MessagesRequest {
            model: &self.model,
            system: SYSTEM_PROMPT,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: DEFAULT_MAX_TOKENS,
        };
        let (url, body) = (url.as_str(), &body);

        self.policy
            .run("Anthropic", move || async move {
                let response = self
                    .client
                    .post(url)
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", API_VERSION)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| request_error("Anthropic", e))?;

                check_status("Anthropic", response)
                    .await?
                    .json::<MessagesResponse>()
                    .await
                    .map_err(|e| ProviderError::ParseError(format!("Unreadable Anthropic answer: {}", e)))
            })
            .await
    }
}

#[async_trait]
impl TranslationClient for Anthropic {
    async fn translate(&self, prompt: &str) -> Result<Option<String>, ProviderError> {
        let response = self.complete(prompt).await?;
        debug!(
            "Anthropic usage: {} in / {} out tokens",
            response.usage.input_tokens, response.usage.output_tokens
        );

        let text = response.text();
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}
