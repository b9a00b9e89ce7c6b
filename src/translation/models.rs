/*!
 * Translation payloads shared by the cache, the scheduler and the event bus.
 */

use serde::{Deserialize, Serialize};

/// A difficult word or phrase picked out of a subtitle line
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabItem {
    /// The word or phrase as it appears in the source
    #[serde(default)]
    pub vocabulary: String,

    /// Category such as "word", "phrase" or "idiom"
    #[serde(default, rename = "type")]
    pub item_type: String,

    /// Part of speech
    #[serde(default)]
    pub part_of_speech: String,

    /// Phonetic transcription
    #[serde(default)]
    pub phonetic: String,

    /// Meaning in the target locale
    #[serde(default)]
    pub chinese_meaning: String,

    /// Bilingual example sentence
    #[serde(default)]
    pub chinese_english_sentence: String,
}

/// Enriched translation of one subtitle text.
///
/// Records are keyed by the exact source text they were produced for and are
/// replaced wholesale on re-translation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationRecord {
    /// Source text with recognition errors fixed
    #[serde(default, alias = "corrected_text")]
    pub corrected_text: String,

    /// Translation into the target locale
    #[serde(default)]
    pub translation: String,

    /// Vocabulary worth studying
    #[serde(default, alias = "difficult_vocabulary")]
    pub difficult_vocabulary: Vec<VocabItem>,
}

impl TranslationRecord {
    /// Create a record without vocabulary
    pub fn new(corrected_text: impl Into<String>, translation: impl Into<String>) -> Self {
        Self {
            corrected_text: corrected_text.into(),
            translation: translation.into(),
            difficult_vocabulary: Vec::new(),
        }
    }

    /// Attach vocabulary items
    pub fn with_vocabulary(mut self, vocabulary: Vec<VocabItem>) -> Self {
        self.difficult_vocabulary = vocabulary;
        self
    }
}

/// Live progress of a scheduler run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStatus {
    /// Number of subtitle groups in the run
    pub total: usize,

    /// Number of groups whose batch has finished
    pub processed: usize,

    /// Whether a run is active
    pub is_processing: bool,

    /// Whether the active run is held at a batch boundary
    pub is_paused: bool,
}

impl ProcessingStatus {
    /// Completion percentage in `0.0..=100.0`
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return if self.is_processing { 0.0 } else { 100.0 };
        }
        (self.processed.min(self.total) as f64 / self.total as f64) * 100.0
    }
}
