/*!
 * Top-level owner of the pipeline.
 *
 * The orchestrator holds everything that outlives a single video (config,
 * translation client, durable store, event bus) and the `SessionContext` of
 * the video currently loaded. Loading a new video or navigating away drops
 * the previous session; a run still in flight for it is aborted.
 */

use anyhow::{anyhow, Context, Result};
use log::{info, warn};
use std::sync::Arc;

use crate::app_config::Config;
use crate::database::{KeyValueStore, MemoryStore, SqliteStore};
use crate::events::{EventBus, PipelineEvent};
use crate::language_utils::Locale;
use crate::providers::{create_client, TranslationClient};
use crate::session::{derive_video_id, SessionContext, TranslatedSubtitle};
use crate::subtitle_merger::{RawCue, SubtitleMerger};
use crate::translation::{BatchScheduler, RunOutcome, SchedulerConfig, SchedulerHandle, TranslationCache};

/// Drives subtitle sessions from video load to translated output
pub struct Orchestrator {
    config: Config,
    client: Arc<dyn TranslationClient>,
    store: Arc<dyn KeyValueStore>,
    events: EventBus,
    merger: SubtitleMerger,
    session: Option<SessionContext>,
    scheduler: Option<Arc<BatchScheduler>>,
}

impl Orchestrator {
    /// Build the client and the store the configuration names
    pub fn from_config(config: Config) -> Result<Self> {
        let client = create_client(&config.translation).context("Failed to create translation client")?;
        let store = Self::open_store(&config)?;

        Ok(Self::with_parts(config, client, store))
    }

    /// The durable store the configuration names
    pub fn open_store(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
        if config.storage.disabled {
            info!("Durable cache disabled, translations are kept in memory");
            return Ok(Arc::new(MemoryStore::new()));
        }

        let path = config.database_path()?;
        let store = SqliteStore::open(&path)
            .with_context(|| format!("Failed to open session database: {}", path.display()))?;
        Ok(Arc::new(store))
    }

    /// Assemble from ready-made collaborators
    pub fn with_parts(config: Config, client: Arc<dyn TranslationClient>, store: Arc<dyn KeyValueStore>) -> Self {
        let events = EventBus::new(config.scheduler.event_capacity);
        let merger = SubtitleMerger::new(config.merge.clone());

        Self {
            config,
            client,
            store,
            events,
            merger,
            session: None,
            scheduler: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Current session, if a video is loaded
    pub fn session(&self) -> Option<&SessionContext> {
        self.session.as_ref()
    }

    /// Control handle of the current session's scheduler
    pub fn handle(&self) -> Option<SchedulerHandle> {
        self.scheduler.as_ref().map(|s| s.handle())
    }

    /// Open a session for a video and publish its merged subtitles
    pub fn load_video(&mut self, input: &str, cues: &[RawCue]) -> &SessionContext {
        self.close_session();

        let groups = self.merger.merge(cues);
        let cache = self.new_cache();
        let session = SessionContext::for_video(input, cache.clone()).with_groups(groups);

        info!(
            "[{}] Loaded video '{}' with {} cues merged into {} subtitles",
            session.short_run_id(),
            session.video_id(),
            cues.len(),
            session.groups().len()
        );

        let scheduler = BatchScheduler::new(
            self.client.clone(),
            cache,
            self.events.clone(),
            SchedulerConfig::from_settings(&self.config.scheduler, self.target_language_name()),
        );

        self.events
            .emit(PipelineEvent::SubtitlesUpdated(session.groups().to_vec()));
        self.scheduler = Some(Arc::new(scheduler));
        self.session.insert(session)
    }

    /// Translate the current session's subtitles
    pub async fn translate(&self) -> Result<RunOutcome> {
        let (Some(session), Some(scheduler)) = (self.session.as_ref(), self.scheduler.as_ref()) else {
            return Err(anyhow!("No video loaded"));
        };

        info!(
            "[{}] Translating {} subtitles of '{}' to {}",
            session.short_run_id(),
            session.groups().len(),
            session.video_id(),
            self.config.target_language
        );

        let outcome = scheduler.start(session.groups(), session.video_id()).await?;
        info!("[{}] Run finished: {:?}", session.short_run_id(), outcome);
        Ok(outcome)
    }

    /// Drop the current session, aborting any run still in progress
    pub fn close_session(&mut self) {
        if let Some(scheduler) = self.scheduler.take() {
            if scheduler.abort() {
                warn!("Aborting translation of the closed session");
            }
        }
        if let Some(session) = self.session.take() {
            info!("[{}] Closed session for '{}'", session.short_run_id(), session.video_id());
        }
    }

    /// Remove the durable snapshot of the current session
    pub async fn clear_cached_session(&self) -> Result<bool> {
        let session = self.session.as_ref().ok_or_else(|| anyhow!("No video loaded"))?;
        session.cache().clear();
        Ok(session.cache().clear_session(session.video_id()).await)
    }

    /// Remove the durable snapshot of any video
    pub async fn clear_cached_video(&self, input: &str) -> bool {
        let video_id = derive_video_id(input);
        let removed = self.new_cache().clear_session(&video_id).await;
        info!("Cached translations for '{}' {}", video_id, if removed { "removed" } else { "not found" });
        removed
    }

    /// Current subtitles paired with their translations
    pub fn translated_subtitles(&self) -> Vec<TranslatedSubtitle> {
        self.session
            .as_ref()
            .map(SessionContext::translated_subtitles)
            .unwrap_or_default()
    }

    fn new_cache(&self) -> TranslationCache {
        TranslationCache::with_store(self.store.clone(), self.config.storage.key_prefix.clone())
    }

    fn target_language_name(&self) -> String {
        Locale::parse(&self.config.target_language)
            .map(|locale| locale.display_name())
            .unwrap_or_else(|_| self.config.target_language.clone())
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("client", &self.client.name())
            .field("video_id", &self.session.as_ref().map(|s| s.video_id()))
            .finish()
    }
}
