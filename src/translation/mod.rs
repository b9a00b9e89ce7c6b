/*!
 * Batch translation of merged subtitles.
 *
 * - `models`: translation records and progress counters
 * - `cache`: content-addressed translations with session persistence
 * - `prompts`: batch prompt construction
 * - `response`: extraction of the JSON array from model output
 * - `scheduler`: ordered, retryable, pausable batch runs
 */

pub use self::cache::{SessionMapping, TranslationCache};
pub use self::models::{ProcessingStatus, TranslationRecord, VocabItem};
pub use self::prompts::{BatchPromptBuilder, PromptEntry, PromptTemplate};
pub use self::response::{extract_json_array, parse_batch_response};
pub use self::scheduler::{BatchScheduler, RunOutcome, SchedulerConfig, SchedulerHandle, SchedulerState};

pub mod cache;
pub mod models;
pub mod prompts;
pub mod response;
pub mod scheduler;
