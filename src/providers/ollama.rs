use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{check_status, normalize_endpoint, request_error, ClientSettings, RequestPolicy, TranslationClient};
use crate::errors::ProviderError;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Ollama client for interacting with Ollama API
#[derive(Debug)]
pub struct Ollama {
    /// Base URL of the Ollama API
    base_url: String,
    /// Model to generate with
    model: String,
    /// Sampling temperature
    temperature: f32,
    /// HTTP client for making requests
    client: Client,
    /// Retry and pacing policy
    policy: RequestPolicy,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
}

/// One `/api/generate` object; a streamed answer is several of them
#[derive(Debug, Default, Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Join the text of a generate answer, streamed as JSON lines or not
fn parse_generate_body(body: &str) -> Result<GenerateChunk, ProviderError> {
    if let Ok(chunk) = serde_json::from_str::<GenerateChunk>(body) {
        return Ok(chunk);
    }

    let chunks: Vec<GenerateChunk> = body
        .lines()
        .filter_map(|line| serde_json::from_str(line.trim()).ok())
        .collect();

    let Some(last) = chunks.last() else {
        let preview: String = body.chars().take(200).collect();
        error!("Unreadable Ollama answer: {}", preview);
        return Err(ProviderError::ParseError("Ollama answer is not JSON".to_string()));
    };

    Ok(GenerateChunk {
        response: chunks.iter().map(|c| c.response.as_str()).collect(),
        done: last.done,
        eval_count: last.eval_count,
    })
}

impl Ollama {
    /// Create a new Ollama client with default retry settings
    pub fn new(endpoint: impl AsRef<str>, model: impl Into<String>) -> Self {
        let settings = ClientSettings {
            provider: crate::app_config::TranslationProvider::Ollama,
            model: model.into(),
            api_key: String::new(),
            endpoint: endpoint.as_ref().to_string(),
            timeout_secs: 120,
            rate_limit: None,
            max_retries: 3,
            backoff_base_ms: 1000,
            temperature: 0.3,
        };
        Self::with_settings(&settings)
    }

    /// Create a new Ollama client from resolved settings
    pub fn with_settings(settings: &ClientSettings) -> Self {
        Self {
            base_url: normalize_endpoint(&settings.endpoint, DEFAULT_BASE_URL),
            model: settings.model.clone(),
            temperature: settings.temperature,
            client: settings.http_client(),
            policy: settings.policy(),
        }
    }

    /// Base URL requests go to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn generate(&self, prompt: &str) -> Result<GenerateChunk, ProviderError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };
        let (url, body) = (url.as_str(), &body);

        self.policy
            .run("Ollama", move || async move {
                let response = self
                    .client
                    .post(url)
                    .json(body)
                    .send()
                    .await
                    .map_err(|e| request_error("Ollama", e))?;

                let text = check_status("Ollama", response)
                    .await?
                    .text()
                    .await
                    .map_err(|e| ProviderError::ParseError(format!("Failed to read Ollama answer: {}", e)))?;

                parse_generate_body(&text)
            })
            .await
    }
}

#[async_trait]
impl TranslationClient for Ollama {
    async fn translate(&self, prompt: &str) -> Result<Option<String>, ProviderError> {
        let answer = self.generate(prompt).await?;
        debug!(
            "Ollama answered {} chars (done: {}, eval_count: {:?})",
            answer.response.len(),
            answer.done,
            answer.eval_count
        );

        let text = answer.response.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
