/*!
 * Batch scheduling of subtitle translation.
 *
 * A run splits the merged subtitle groups into fixed-size batches and drives
 * them strictly in order through a `TranslationClient`. Each batch is retried
 * with a linearly growing delay until it succeeds or the attempt budget runs
 * out, which aborts the whole run; batches are never skipped.
 *
 * Pause, resume and abort are signalled through a `watch` channel and take
 * effect at batch boundaries: an in-flight call is never interrupted. A run
 * starts paused unless configured otherwise.
 */

use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use super::cache::{truncate_text, TranslationCache};
use super::models::{ProcessingStatus, TranslationRecord};
use super::prompts::BatchPromptBuilder;
use super::response::parse_batch_response;
use crate::app_config::SchedulerSettings;
use crate::errors::TranslationError;
use crate::events::{EventBus, PipelineEvent};
use crate::providers::TranslationClient;
use crate::subtitle_merger::SubtitleGroup;

/// Tuning of a scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Groups per batch
    pub batch_size: usize,
    /// Total attempts per batch
    pub max_batch_retries: u32,
    /// Delay before attempt `n + 1` is `retry_base_delay * n`
    pub retry_base_delay: Duration,
    /// Pause between batches
    pub batch_interval: Duration,
    /// Whether runs wait for `resume` before the first batch
    pub start_paused: bool,
    /// Whether retry prompts mention the attempt number
    pub annotate_retries: bool,
    /// Target language as named in prompts
    pub target_language: String,
}

impl SchedulerConfig {
    /// Build from the configuration file section
    pub fn from_settings(settings: &SchedulerSettings, target_language: impl Into<String>) -> Self {
        Self {
            batch_size: settings.batch_size.max(1),
            max_batch_retries: settings.max_batch_retries.max(1),
            retry_base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            batch_interval: Duration::from_millis(settings.batch_interval_ms),
            start_paused: settings.start_paused,
            annotate_retries: settings.annotate_retries,
            target_language: target_language.into(),
        }
    }

    /// Delay after the failed attempt with zero-based index `attempt`
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay.saturating_mul(attempt.saturating_add(1))
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from_settings(&SchedulerSettings::default(), "Chinese")
    }
}

/// Lifecycle of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No run has started
    Idle,
    /// A run is set up and waiting for its first resume
    Scheduled,
    /// Batches are being processed
    Running,
    /// Held at the next batch boundary
    Paused,
    /// The last run finished every batch
    Completed,
    /// The last run was aborted or failed
    Aborted,
}

/// How a run ended without a fatal error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every batch was translated
    Completed,
    /// The persisted session answered everything, no calls were made
    CacheHit,
    /// `abort` stopped the run
    Aborted,
}

#[derive(Debug, Clone, Copy, Default)]
struct Control {
    paused: bool,
    aborted: bool,
}

#[derive(Debug)]
struct Shared {
    control: watch::Sender<Control>,
    status: Mutex<ProcessingStatus>,
    state: Mutex<SchedulerState>,
    running: AtomicBool,
    events: EventBus,
}

impl Shared {
    fn update_status<F: FnOnce(&mut ProcessingStatus)>(&self, f: F) {
        let snapshot = {
            let mut status = self.status.lock();
            f(&mut status);
            *status
        };
        self.events.emit(PipelineEvent::ProcessingStatusUpdated(snapshot));
    }

    fn set_state(&self, state: SchedulerState) {
        *self.state.lock() = state;
    }
}

/// Resets the single-run guard even if the run future is dropped
struct RunGuard<'a> {
    shared: &'a Shared,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        let interrupted = self.shared.status.lock().is_processing;
        if interrupted {
            self.shared.set_state(SchedulerState::Aborted);
            self.shared.update_status(|s| {
                s.is_processing = false;
                s.is_paused = false;
            });
        }
        self.shared.running.store(false, Ordering::SeqCst);
    }
}

/// Cloneable remote control for a scheduler
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    shared: Arc<Shared>,
}

impl SchedulerHandle {
    /// Hold the run at the next batch boundary
    pub fn pause(&self) -> bool {
        if !self.is_running() || self.shared.control.borrow().aborted {
            return false;
        }

        self.shared.control.send_modify(|c| c.paused = true);
        {
            let mut state = self.shared.state.lock();
            if *state == SchedulerState::Running {
                *state = SchedulerState::Paused;
            }
        }
        self.shared.update_status(|s| s.is_paused = true);
        info!("Translation paused");
        true
    }

    /// Let a paused or scheduled run continue
    pub fn resume(&self) -> bool {
        if !self.is_running() || self.shared.control.borrow().aborted {
            return false;
        }

        self.shared.control.send_modify(|c| c.paused = false);
        {
            let mut state = self.shared.state.lock();
            if matches!(*state, SchedulerState::Paused | SchedulerState::Scheduled) {
                *state = SchedulerState::Running;
            }
        }
        self.shared.update_status(|s| s.is_paused = false);
        info!("Translation resumed");
        true
    }

    /// Stop the run at the next suspension point
    pub fn abort(&self) -> bool {
        if !self.is_running() {
            return false;
        }

        self.shared.control.send_modify(|c| c.aborted = true);
        info!("Translation abort requested");
        true
    }

    /// Current progress counters
    pub fn status(&self) -> ProcessingStatus {
        *self.shared.status.lock()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SchedulerState {
        *self.shared.state.lock()
    }

    /// Whether a run is active
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }
}

enum BatchOutcome {
    Done,
    Aborted,
}

/// Drives subtitle groups through a translation client in ordered batches
pub struct BatchScheduler {
    client: Arc<dyn TranslationClient>,
    cache: TranslationCache,
    config: SchedulerConfig,
    shared: Arc<Shared>,
}

impl BatchScheduler {
    /// Create a scheduler
    pub fn new(
        client: Arc<dyn TranslationClient>,
        cache: TranslationCache,
        events: EventBus,
        config: SchedulerConfig,
    ) -> Self {
        let (control, _) = watch::channel(Control::default());

        Self {
            client,
            cache,
            config,
            shared: Arc::new(Shared {
                control,
                status: Mutex::new(ProcessingStatus::default()),
                state: Mutex::new(SchedulerState::Idle),
                running: AtomicBool::new(false),
                events,
            }),
        }
    }

    /// Remote control usable while `start` is awaited elsewhere
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            shared: self.shared.clone(),
        }
    }

    /// The cache this scheduler writes to
    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Scheduler tuning
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// See [`SchedulerHandle::pause`]
    pub fn pause(&self) -> bool {
        self.handle().pause()
    }

    /// See [`SchedulerHandle::resume`]
    pub fn resume(&self) -> bool {
        self.handle().resume()
    }

    /// See [`SchedulerHandle::abort`]
    pub fn abort(&self) -> bool {
        self.handle().abort()
    }

    /// Current progress counters
    pub fn status(&self) -> ProcessingStatus {
        self.handle().status()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SchedulerState {
        self.handle().state()
    }

    /// Translate `groups`, persisting the result under `session_id`.
    pub async fn start(&self, groups: &[SubtitleGroup], session_id: &str) -> Result<RunOutcome, TranslationError> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Err(TranslationError::AlreadyRunning);
        }
        let _guard = RunGuard { shared: &self.shared };

        self.shared.control.send_modify(|c| {
            c.paused = false;
            c.aborted = false;
        });

        if let Some(mapping) = self.cache.load_session(session_id).await {
            info!("Session '{}' found in cache with {} translations", session_id, mapping.len());
            self.cache.extend(&mapping);
            self.emit_cached_session(groups, mapping);

            let total = groups.len();
            self.shared.set_state(SchedulerState::Completed);
            self.shared.update_status(|s| {
                *s = ProcessingStatus {
                    total,
                    processed: total,
                    is_processing: false,
                    is_paused: false,
                };
            });
            return Ok(RunOutcome::CacheHit);
        }

        let total = groups.len();
        let paused = self.config.start_paused && total > 0;
        self.shared.control.send_modify(|c| c.paused = paused);
        self.shared.set_state(if paused {
            SchedulerState::Scheduled
        } else {
            SchedulerState::Running
        });
        self.shared.update_status(|s| {
            *s = ProcessingStatus {
                total,
                processed: 0,
                is_processing: true,
                is_paused: paused,
            };
        });

        let batches: Vec<&[SubtitleGroup]> = groups.chunks(self.config.batch_size.max(1)).collect();
        info!(
            "Scheduled {} subtitles in {} batches for session '{}'",
            total,
            batches.len(),
            session_id
        );

        let mut control = self.shared.control.subscribe();

        for (index, batch) in batches.iter().enumerate() {
            if !wait_while_paused(&mut control).await {
                return Ok(self.finish_aborted());
            }
            self.shared.set_state(SchedulerState::Running);

            debug!("Starting batch {}/{}", index + 1, batches.len());
            match self.run_batch(index, batch, &mut control).await {
                Ok(BatchOutcome::Done) => {
                    self.count_processed(batch.len());
                    info!("Batch {}/{} completed", index + 1, batches.len());
                }
                Ok(BatchOutcome::Aborted) => return Ok(self.finish_aborted()),
                Err(e) => {
                    self.count_processed(batch.len());
                    error!("Translation run failed: {}", e);
                    self.shared.events.emit(PipelineEvent::ProcessingFailed {
                        message: e.to_string(),
                    });
                    self.shared.set_state(SchedulerState::Aborted);
                    self.shared.update_status(|s| {
                        s.is_processing = false;
                        s.is_paused = false;
                    });
                    return Err(e);
                }
            }

            let is_last = index + 1 == batches.len();
            if !is_last && sleep_or_abort(&mut control, self.config.batch_interval).await {
                return Ok(self.finish_aborted());
            }
        }

        // An abort accepted while the last call was in flight still counts
        if control.borrow().aborted {
            return Ok(self.finish_aborted());
        }

        if total > 0 {
            self.cache.save_session(session_id, &self.cache.snapshot()).await;
        }

        self.shared.set_state(SchedulerState::Completed);
        self.shared.update_status(|s| {
            s.is_processing = false;
            s.is_paused = false;
        });
        info!("Translation of session '{}' completed", session_id);

        Ok(RunOutcome::Completed)
    }

    /// Emit one completion per cached entry, in subtitle order first
    fn emit_cached_session(&self, groups: &[SubtitleGroup], mut mapping: super::cache::SessionMapping) {
        for group in groups {
            if let Some(record) = mapping.remove(&group.text) {
                self.emit_completed(&group.text, record);
            }
        }
        for (text, record) in mapping {
            self.emit_completed(&text, record);
        }
    }

    fn emit_completed(&self, text: &str, record: TranslationRecord) {
        self.shared.events.emit(PipelineEvent::TranslationCompleted {
            original_text: text.to_string(),
            translated_data: record,
        });
    }

    fn count_processed(&self, len: usize) {
        self.shared.update_status(|s| s.processed = (s.processed + len).min(s.total));
    }

    fn finish_aborted(&self) -> RunOutcome {
        self.shared.set_state(SchedulerState::Aborted);
        self.shared.update_status(|s| {
            s.is_processing = false;
            s.is_paused = false;
        });
        warn!("Translation run aborted");
        RunOutcome::Aborted
    }

    async fn run_batch(
        &self,
        index: usize,
        batch: &[SubtitleGroup],
        control: &mut watch::Receiver<Control>,
    ) -> Result<BatchOutcome, TranslationError> {
        // Distinct texts in temporal order, minus those already translated
        let mut seen = HashSet::new();
        let distinct: Vec<&SubtitleGroup> = batch.iter().filter(|g| seen.insert(g.text.as_str())).collect();
        let pending: Vec<&SubtitleGroup> = distinct
            .iter()
            .copied()
            .filter(|g| !self.cache.contains(&g.text))
            .collect();

        if pending.is_empty() {
            debug!("Batch {} fully cached, skipping call", index + 1);
            self.emit_batch(&distinct, HashMap::new());
            return Ok(BatchOutcome::Done);
        }

        let builder = BatchPromptBuilder::new(&self.config.target_language).with_groups(pending.iter().copied());
        let max_attempts = self.config.max_batch_retries.max(1);
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            if control.borrow().aborted {
                return Ok(BatchOutcome::Aborted);
            }

            let prompt = if self.config.annotate_retries {
                builder.clone().with_retry_attempt(attempt).build()
            } else {
                builder.build()
            };

            let result = match self.client.translate(&prompt).await {
                Ok(Some(response)) => parse_batch_response(&response, pending.len()),
                Ok(None) => Err(TranslationError::EmptyResponse),
                Err(e) => Err(TranslationError::from(e)),
            };

            match result {
                Ok(records) => {
                    let mut fresh = HashMap::with_capacity(records.len());
                    for (group, record) in pending.iter().zip(records) {
                        self.cache.set(&group.text, record.clone());
                        fresh.insert(group.text.as_str(), record);
                    }
                    self.emit_batch(&distinct, fresh);
                    return Ok(BatchOutcome::Done);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!(
                        "Batch {} attempt {}/{} via {} failed: {}",
                        index + 1,
                        attempt + 1,
                        max_attempts,
                        self.client.name(),
                        e
                    );

                    if attempt + 1 < max_attempts
                        && sleep_or_abort(control, self.config.retry_delay(attempt)).await
                    {
                        return Ok(BatchOutcome::Aborted);
                    }
                }
            }
        }

        Err(TranslationError::RetriesExhausted {
            batch: index,
            attempts: max_attempts,
            last_error,
        })
    }

    /// One completion per distinct text of the batch, in order
    fn emit_batch(&self, distinct: &[&SubtitleGroup], mut fresh: HashMap<&str, TranslationRecord>) {
        for group in distinct {
            let record = fresh.remove(group.text.as_str()).or_else(|| self.cache.get(&group.text));
            match record {
                Some(record) => self.emit_completed(&group.text, record),
                None => warn!("No translation for '{}'", truncate_text(&group.text, 30)),
            }
        }
    }
}

impl std::fmt::Debug for BatchScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScheduler")
            .field("client", &self.client.name())
            .field("config", &self.config)
            .field("state", &self.state())
            .finish()
    }
}

/// Wait until the run is not paused; `false` if it was aborted meanwhile
async fn wait_while_paused(control: &mut watch::Receiver<Control>) -> bool {
    loop {
        let current = *control.borrow_and_update();
        if current.aborted {
            return false;
        }
        if !current.paused {
            return true;
        }
        if control.changed().await.is_err() {
            return false;
        }
    }
}

/// Sleep for `duration`, waking early on abort; `true` if aborted
async fn sleep_or_abort(control: &mut watch::Receiver<Control>, duration: Duration) -> bool {
    let sleep = tokio::time::sleep(duration);
    tokio::pin!(sleep);

    loop {
        if control.borrow_and_update().aborted {
            return true;
        }

        tokio::select! {
            _ = &mut sleep => return control.borrow().aborted,
            changed = control.changed() => {
                if changed.is_err() {
                    (&mut sleep).await;
                    return false;
                }
            }
        }
    }
}
