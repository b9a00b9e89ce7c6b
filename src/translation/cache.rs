/*!
 * Translation caching functionality.
 *
 * The cache maps the exact source text of a subtitle group to its
 * `TranslationRecord`. It lives in memory for the current session and can be
 * loaded from or saved to a `KeyValueStore` as a whole-session snapshot.
 * Storage failures never propagate: they are logged and treated as a miss or
 * a no-op, so the pipeline degrades to "no durable cache".
 */

use log::{debug, error, warn};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::database::KeyValueStore;
use super::models::TranslationRecord;

/// Default namespace for session snapshots in the key/value store
pub const DEFAULT_KEY_PREFIX: &str = "subtitle_translations_";

/// Text -> record mapping of one session, ordered for stable persistence
pub type SessionMapping = BTreeMap<String, TranslationRecord>;

/// Translation cache for storing and retrieving translations
pub struct TranslationCache {
    /// Internal cache storage
    entries: Arc<RwLock<HashMap<String, TranslationRecord>>>,

    /// Cache hit counter
    hits: Arc<AtomicUsize>,

    /// Cache miss counter
    misses: Arc<AtomicUsize>,

    /// Durable store for session snapshots
    store: Option<Arc<dyn KeyValueStore>>,

    /// Namespace prepended to session ids
    key_prefix: String,

    /// Whether caching is enabled
    enabled: bool,
}

impl TranslationCache {
    /// Create a new in-memory translation cache
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            hits: Arc::new(AtomicUsize::new(0)),
            misses: Arc::new(AtomicUsize::new(0)),
            store: None,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            enabled,
        }
    }

    /// Create a cache whose sessions persist to `store`
    pub fn with_store(store: Arc<dyn KeyValueStore>, key_prefix: impl Into<String>) -> Self {
        Self {
            store: Some(store),
            key_prefix: key_prefix.into(),
            ..Self::new(true)
        }
    }

    /// Get a record from the cache
    pub fn get(&self, source_text: &str) -> Option<TranslationRecord> {
        if !self.enabled {
            return None;
        }

        match self.entries.read().get(source_text) {
            Some(record) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for '{}'", truncate_text(source_text, 30));
                Some(record.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for '{}'", truncate_text(source_text, 30));
                None
            }
        }
    }

    /// Whether a record exists, without touching the statistics
    pub fn contains(&self, source_text: &str) -> bool {
        self.enabled && self.entries.read().contains_key(source_text)
    }

    /// Store a record, replacing any previous one for the same text
    pub fn set(&self, source_text: &str, record: TranslationRecord) {
        if !self.enabled {
            return;
        }

        self.entries.write().insert(source_text.to_string(), record);
        debug!("Cached translation for '{}'", truncate_text(source_text, 30));
    }

    /// Insert every record of a session mapping
    pub fn extend(&self, mapping: &SessionMapping) {
        if !self.enabled {
            return;
        }

        let mut entries = self.entries.write();
        for (text, record) in mapping {
            entries.insert(text.clone(), record.clone());
        }
    }

    /// Copy of all cached records
    pub fn snapshot(&self) -> SessionMapping {
        self.entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Store key used for `session_id`
    pub fn session_key(&self, session_id: &str) -> String {
        format!("{}{}", self.key_prefix, session_id)
    }

    /// Load a persisted session snapshot.
    ///
    /// Returns `None` when nothing (or an empty mapping) is stored, when no
    /// store is attached, or when the store fails.
    pub async fn load_session(&self, session_id: &str) -> Option<SessionMapping> {
        if !self.enabled {
            return None;
        }
        let store = self.store.as_ref()?;
        let key = self.session_key(session_id);

        let value = match store.get(&key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!("No persisted session under '{}'", key);
                return None;
            }
            Err(e) => {
                error!("Failed to read session '{}', treating as cache miss: {}", key, e);
                return None;
            }
        };

        match serde_json::from_value::<SessionMapping>(value) {
            Ok(mapping) if mapping.is_empty() => None,
            Ok(mapping) => {
                debug!("Loaded {} cached translations for session '{}'", mapping.len(), session_id);
                Some(mapping)
            }
            Err(e) => {
                warn!("Ignoring unreadable session snapshot '{}': {}", key, e);
                None
            }
        }
    }

    /// Persist a session snapshot, returning whether it was written
    pub async fn save_session(&self, session_id: &str, mapping: &SessionMapping) -> bool {
        if !self.enabled {
            return false;
        }
        let Some(store) = self.store.as_ref() else {
            return false;
        };
        let key = self.session_key(session_id);

        let value = match serde_json::to_value(mapping) {
            Ok(value) => value,
            Err(e) => {
                error!("Failed to serialize session '{}': {}", key, e);
                return false;
            }
        };

        match store.set(&key, value).await {
            Ok(()) => {
                debug!("Saved {} translations for session '{}'", mapping.len(), session_id);
                true
            }
            Err(e) => {
                error!("Failed to save session '{}', continuing without durable cache: {}", key, e);
                false
            }
        }
    }

    /// Remove a persisted session snapshot
    pub async fn clear_session(&self, session_id: &str) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };
        let key = self.session_key(session_id);

        match store.remove(&key).await {
            Ok(removed) => removed,
            Err(e) => {
                error!("Failed to clear session '{}': {}", key, e);
                false
            }
        }
    }

    /// Get cache statistics as (hits, misses, hit rate)
    pub fn stats(&self) -> (usize, usize, f64) {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        let hit_rate = if total > 0 {
            hits as f64 / total as f64
        } else {
            0.0
        };

        (hits, misses, hit_rate)
    }

    /// Clear the in-memory cache
    pub fn clear(&self) {
        self.entries.write().clear();
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);

        debug!("Translation cache cleared");
    }

    /// Get the number of entries in the cache
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Enable or disable the cache
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Check if the cache is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Clone for TranslationCache {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            hits: self.hits.clone(),
            misses: self.misses.clone(),
            store: self.store.clone(),
            key_prefix: self.key_prefix.clone(),
            enabled: self.enabled,
        }
    }
}

impl std::fmt::Debug for TranslationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationCache")
            .field("entries", &self.len())
            .field("persistent", &self.store.is_some())
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Truncate text to a maximum number of characters with ellipsis
pub(crate) fn truncate_text(text: &str, max_length: usize) -> String {
    if text.chars().count() <= max_length {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_length).collect::<String>())
    }
}
