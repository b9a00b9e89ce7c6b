/*!
 * # dualsub - bilingual subtitles through resilient batch translation
 *
 * Turns a raw timed-caption stream into readable subtitle groups and drives
 * them through an LLM translation backend in ordered, retryable, cacheable
 * batches, with live progress and pause/resume control.
 *
 * ## Architecture
 *
 * - `subtitle_merger`: raw caption cues to merged subtitle groups
 * - `translation`: cache, prompts, response parsing and the batch scheduler
 * - `providers`: translation backends (Ollama, OpenAI-compatible, Anthropic, mock)
 * - `database`: durable key/value storage for session snapshots
 * - `events`: publish/subscribe surface for renderers
 * - `session`: per-video state and stable video identifiers
 * - `orchestrator`: owns the collaborators and the current session
 * - `app_config`: configuration management
 * - `language_utils`: ISO language code utilities
 * - `errors`: error types
 */

// Global lints configuration
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

pub mod app_config;
pub mod database;
pub mod errors;
pub mod events;
pub mod language_utils;
pub mod orchestrator;
pub mod providers;
pub mod session;
pub mod subtitle_merger;
pub mod translation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, ProviderError, StorageError, SubtitleError, TranslationError};
pub use events::{EventBus, PipelineEvent};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use orchestrator::Orchestrator;
pub use providers::{MockClient, TranslationClient};
pub use session::SessionContext;
pub use subtitle_merger::{merge, RawCue, SubtitleGroup, SubtitleMerger};
pub use translation::{BatchScheduler, RunOutcome, SchedulerHandle, SchedulerState, TranslationCache};
