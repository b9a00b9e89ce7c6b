/*!
 * Mock translation client for testing.
 *
 * This module provides a mock client that simulates different behaviours:
 * - `MockClient::working()` - Always answers with a well-formed JSON array
 * - `MockClient::fail_times(n)` - Fails the first `n` calls, then works
 * - `MockClient::failing()` - Always fails with an error
 * - `MockClient::empty()` - Answers with no text
 * - `MockClient::slow(ms)` - Works after a delay
 *
 * Working answers echo every subtitle embedded in the prompt, so the number
 * of items always matches the batch.
 */

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::errors::ProviderError;
use crate::providers::TranslationClient;
use crate::translation::models::TranslationRecord;
use crate::translation::prompts::PromptEntry;

/// Behavior mode for the mock client
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockBehavior {
    /// Always succeeds with a proper translation
    Working,
    /// Fails the first `count` calls, then succeeds
    FailTimes { count: usize },
    /// Always fails with an error
    Failing,
    /// Returns no text
    Empty,
    /// Returns prose without a JSON array
    Malformed,
    /// Returns one item fewer than requested
    Short,
    /// Simulates slow response
    Slow { delay_ms: u64 },
}

type Responder = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Mock client for testing translation behavior
#[derive(Clone)]
pub struct MockClient {
    /// Behavior mode
    behavior: MockBehavior,
    /// Call counter, shared between clones
    call_count: Arc<AtomicUsize>,
    /// Every prompt received, in order
    prompts: Arc<Mutex<Vec<String>>>,
    /// Custom response generator (optional)
    custom_response: Option<Responder>,
}

impl std::fmt::Debug for MockClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockClient")
            .field("behavior", &self.behavior)
            .field("call_count", &self.calls())
            .finish()
    }
}

impl MockClient {
    /// Create a new mock client with the specified behavior
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            call_count: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
            custom_response: None,
        }
    }

    /// Create a working mock client that always succeeds
    pub fn working() -> Self {
        Self::new(MockBehavior::Working)
    }

    /// Create a client whose first `count` calls fail
    pub fn fail_times(count: usize) -> Self {
        Self::new(MockBehavior::FailTimes { count })
    }

    /// Create a failing mock client that always errors
    pub fn failing() -> Self {
        Self::new(MockBehavior::Failing)
    }

    /// Create a mock that returns empty responses
    pub fn empty() -> Self {
        Self::new(MockBehavior::Empty)
    }

    /// Create a mock that answers with prose only
    pub fn malformed() -> Self {
        Self::new(MockBehavior::Malformed)
    }

    /// Create a mock that drops the last item of every answer
    pub fn short() -> Self {
        Self::new(MockBehavior::Short)
    }

    /// Create a mock that waits `delay_ms` before answering
    pub fn slow(delay_ms: u64) -> Self {
        Self::new(MockBehavior::Slow { delay_ms })
    }

    /// Set a custom response generator used for successful calls
    pub fn with_custom_response<F>(mut self, generator: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.custom_response = Some(Arc::new(generator));
        self
    }

    /// Number of `translate` calls so far
    pub fn calls(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Copy of every prompt received
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }

    /// Subtitles embedded in a batch prompt
    pub fn prompt_entries(prompt: &str) -> Vec<PromptEntry> {
        const MARKER: &str = "## Subtitles\n";
        prompt
            .find(MARKER)
            .and_then(|at| serde_json::from_str(&prompt[at + MARKER.len()..]).ok())
            .unwrap_or_default()
    }

    /// Record the mock would return for `text`
    pub fn record_for(text: &str) -> TranslationRecord {
        TranslationRecord::new(text, format!("[译] {}", text))
    }

    /// Generate a well-formed answer for a batch prompt
    pub fn generate_batch_response(prompt: &str, drop_last: bool) -> String {
        let mut records: Vec<TranslationRecord> = Self::prompt_entries(prompt)
            .iter()
            .map(|e| Self::record_for(&e.text))
            .collect();
        if drop_last {
            records.pop();
        }

        let array = serde_json::to_string_pretty(&records).unwrap_or_else(|_| "[]".to_string());
        format!("```json\n{}\n```", array)
    }

    fn succeed(&self, prompt: &str) -> Option<String> {
        match &self.custom_response {
            Some(generator) => generator(prompt),
            None => Some(Self::generate_batch_response(prompt, false)),
        }
    }
}

#[async_trait]
impl TranslationClient for MockClient {
    async fn translate(&self, prompt: &str) -> Result<Option<String>, ProviderError> {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().push(prompt.to_string());

        match self.behavior {
            MockBehavior::Working => Ok(self.succeed(prompt)),

            MockBehavior::FailTimes { count: failures } => {
                if count < failures {
                    Err(ProviderError::ApiError {
                        message: format!("Simulated failure (request #{})", count + 1),
                        status_code: 503,
                    })
                } else {
                    Ok(self.succeed(prompt))
                }
            }

            MockBehavior::Failing => Err(ProviderError::ApiError {
                message: "Simulated provider failure".to_string(),
                status_code: 500,
            }),

            MockBehavior::Empty => Ok(None),

            MockBehavior::Malformed => Ok(Some("Sorry, I can only translate one line at a time.".to_string())),

            MockBehavior::Short => Ok(Some(Self::generate_batch_response(prompt, true))),

            MockBehavior::Slow { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                Ok(self.succeed(prompt))
            }
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
