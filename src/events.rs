/*!
 * Publish/subscribe surface between the pipeline and whatever renders it.
 *
 * Events are broadcast to every live subscriber. Emitting never blocks and
 * never fails: with no subscribers the event is dropped, and a subscriber
 * that falls more than `capacity` events behind skips the oldest ones.
 */

use log::trace;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::subtitle_merger::SubtitleGroup;
use crate::translation::models::{ProcessingStatus, TranslationRecord};

/// Default number of events buffered per subscriber
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Everything the pipeline reports to its consumers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum PipelineEvent {
    /// Progress counters changed
    ProcessingStatusUpdated(ProcessingStatus),

    /// One subtitle text has a translation
    #[serde(rename_all = "camelCase")]
    TranslationCompleted {
        /// Source text the record is keyed by
        original_text: String,
        /// The record itself
        translated_data: TranslationRecord,
    },

    /// A new merged subtitle list is available
    SubtitlesUpdated(Vec<SubtitleGroup>),

    /// The run stopped on a fatal error
    ProcessingFailed {
        /// Last error, for display
        message: String,
    },
}

impl PipelineEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            Self::ProcessingStatusUpdated(_) => "processingStatusUpdated",
            Self::TranslationCompleted { .. } => "translationCompleted",
            Self::SubtitlesUpdated(_) => "subtitlesUpdated",
            Self::ProcessingFailed { .. } => "processingFailed",
        }
    }

    /// Payload as a JSON value
    pub fn payload(&self) -> Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut v| v.get_mut("payload").map(Value::take))
            .unwrap_or(Value::Null)
    }
}

/// Broadcast bus for `PipelineEvent`s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event to every current subscriber
    pub fn emit(&self, event: PipelineEvent) {
        trace!("emit {}", event.name());
        let _ = self.sender.send(event);
    }

    /// Receive every event published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
