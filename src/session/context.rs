use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::video_id::derive_video_id;
use crate::subtitle_merger::SubtitleGroup;
use crate::translation::cache::TranslationCache;
use crate::translation::models::TranslationRecord;

/// A merged subtitle paired with its translation, if one exists yet
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslatedSubtitle {
    #[serde(flatten)]
    pub group: SubtitleGroup,
    pub translation: Option<TranslationRecord>,
}

/// State of the video currently loaded
#[derive(Debug)]
pub struct SessionContext {
    /// Stable identifier, used as the durable session key
    video_id: String,
    /// URL or id the session was opened with
    source: String,
    /// Fresh per session, tags log lines
    run_id: Uuid,
    created_at: DateTime<Utc>,
    groups: Vec<SubtitleGroup>,
    cache: TranslationCache,
}

impl SessionContext {
    /// Open a session for a video URL or id
    pub fn for_video(input: &str, cache: TranslationCache) -> Self {
        Self {
            video_id: derive_video_id(input),
            source: input.trim().to_string(),
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            groups: Vec::new(),
            cache,
        }
    }

    /// Attach the merged subtitle list
    pub fn with_groups(mut self, groups: Vec<SubtitleGroup>) -> Self {
        self.groups = groups;
        self
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// First eight characters of the run id, for log lines
    pub fn short_run_id(&self) -> String {
        self.run_id.to_string()[..8].to_string()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn groups(&self) -> &[SubtitleGroup] {
        &self.groups
    }

    /// Replace the merged subtitle list
    pub fn set_groups(&mut self, groups: Vec<SubtitleGroup>) {
        self.groups = groups;
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    /// Every group with whatever translation the cache holds for its text
    pub fn translated_subtitles(&self) -> Vec<TranslatedSubtitle> {
        let snapshot = self.cache.snapshot();
        self.groups
            .iter()
            .map(|group| TranslatedSubtitle {
                group: group.clone(),
                translation: snapshot.get(&group.text).cloned(),
            })
            .collect()
    }

    /// Number of groups with a cached translation
    pub fn translated_count(&self) -> usize {
        self.groups.iter().filter(|g| self.cache.contains(&g.text)).count()
    }
}
