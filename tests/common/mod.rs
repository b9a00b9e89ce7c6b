/*!
 * Common test utilities for the dualsub test suite
 */

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

use dualsub::app_config::Config;
use dualsub::database::{KeyValueStore, MemoryStore};
use dualsub::providers::TranslationClient;
use dualsub::subtitle_merger::RawCue;
use dualsub::{Orchestrator, PipelineEvent};

// Re-export the scripted client module
pub mod mock_providers;

// Store double for storage failures
pub mod failing_store;

/// Route library logs to the test harness
pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// A short lecture: three sentences close together, then a long pause
pub fn sample_cues() -> Vec<RawCue> {
    vec![
        RawCue::new(0, 2000, "so today we are"),
        RawCue::new(2100, 1800, "going to talk about"),
        RawCue::new(4000, 2500, "ownership in Rust"),
        RawCue::new(20_000, 3000, "first, the stack"),
        RawCue::new(23_500, 2000, "and then the heap"),
        RawCue::new(40_000, 1500, "any questions?"),
    ]
}

/// `n` cues each far enough apart to become their own group
pub fn spaced_cues(n: usize) -> Vec<RawCue> {
    (0..n)
        .map(|i| RawCue::new(i as u64 * 20_000, 2000, format!("sentence number {}", i)))
        .collect()
}

/// Config whose scheduler never waits long
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.scheduler.start_paused = false;
    config.scheduler.batch_size = 5;
    config.scheduler.batch_interval_ms = 1;
    config.scheduler.retry_base_delay_ms = 1;
    config
}

/// Orchestrator over the given client and an in-memory store
pub fn orchestrator_with(config: Config, client: Arc<dyn TranslationClient>) -> (Orchestrator, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Orchestrator::with_parts(config, client, store.clone() as Arc<dyn KeyValueStore>);
    (orchestrator, store)
}

/// Everything already queued on a subscription
pub fn drain_events(rx: &mut broadcast::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Source texts of the `translationCompleted` events, in order
pub fn completed_texts(events: &[PipelineEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            PipelineEvent::TranslationCompleted { original_text, .. } => Some(original_text.clone()),
            _ => None,
        })
        .collect()
}

/// Poll `condition` until it holds, failing the test after a few seconds
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    for _ in 0..600 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
