/*!
 * Scripted translation client for testing
 *
 * Replies are consumed in order, one per call. Once the script runs out the
 * client keeps failing, which makes unexpected extra calls visible.
 */

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use dualsub::errors::ProviderError;
use dualsub::providers::{MockClient, TranslationClient};

/// One scripted answer
#[derive(Debug, Clone)]
pub enum Reply {
    /// Answer with this text verbatim
    Text(String),
    /// Answer with a well-formed array for the prompt's subtitles
    Echo,
    /// Answer with no text
    Nothing,
    /// Fail with an HTTP status
    Status(u16),
}

/// Tracks calls made against the scripted client
#[derive(Debug, Default)]
pub struct CallTracker {
    /// Every prompt received
    pub prompts: Vec<String>,
}

/// Client that plays back a fixed list of replies
#[derive(Debug, Clone)]
pub struct ScriptedClient {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    tracker: Arc<Mutex<CallTracker>>,
}

impl ScriptedClient {
    /// Create a client that answers with `replies`, in order
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            tracker: Arc::new(Mutex::new(CallTracker::default())),
        }
    }

    /// Number of calls so far
    pub fn calls(&self) -> usize {
        self.tracker.lock().unwrap().prompts.len()
    }

    /// Copy of the prompts received
    pub fn prompts(&self) -> Vec<String> {
        self.tracker.lock().unwrap().prompts.clone()
    }
}

#[async_trait]
impl TranslationClient for ScriptedClient {
    async fn translate(&self, prompt: &str) -> Result<Option<String>, ProviderError> {
        self.tracker.lock().unwrap().prompts.push(prompt.to_string());
        let reply = self.replies.lock().unwrap().pop_front();

        match reply {
            Some(Reply::Text(text)) => Ok(Some(text)),
            Some(Reply::Echo) => Ok(Some(MockClient::generate_batch_response(prompt, false))),
            Some(Reply::Nothing) => Ok(None),
            Some(Reply::Status(status_code)) => Err(ProviderError::from_status(
                status_code,
                format!("scripted status {}", status_code),
            )),
            None => Err(ProviderError::RequestFailed("script exhausted".to_string())),
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
