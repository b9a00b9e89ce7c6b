/*!
 * Caption cue merging.
 *
 * Caption sources hand back one short cue per recognized utterance, which is
 * too choppy to read as a subtitle. This module turns that raw stream into
 * readable subtitle groups:
 *
 * 1. Raw `{start, duration, text}` triples are validated and normalized into
 *    `Cue`s. Malformed triples are skipped, never fatal.
 * 2. Each cue ends no later than the next cue starts, so groups never overlap.
 * 3. Neighbouring cues are folded into one group while the gap, the resulting
 *    duration and the resulting text length stay within `MergeConfig`.
 *
 * Merging is pure and deterministic; nothing here performs I/O.
 */

use log::{debug, warn};
use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::SubtitleError;

/// Default maximum silence between two cues of the same group
pub const MAX_GAP_MS: u64 = 8_000;

/// Default maximum on-screen duration of a group
pub const MAX_GROUP_DURATION_MS: u64 = 15_000;

/// Default maximum number of characters in a group
pub const MAX_TEXT_LENGTH: usize = 150;

/// Raw caption triple as delivered by the caption source.
///
/// Times are milliseconds. Numbers may arrive as JSON numbers or numeric
/// strings; a missing or unparsable value becomes `None` and the cue is
/// skipped during normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawCue {
    /// Start offset in milliseconds
    #[serde(default, deserialize_with = "lenient_number")]
    pub start: Option<f64>,

    /// Duration in milliseconds
    #[serde(default, alias = "dur", deserialize_with = "lenient_number")]
    pub duration: Option<f64>,

    /// Caption text
    #[serde(default)]
    pub text: String,
}

impl RawCue {
    /// Create a raw cue from millisecond values
    pub fn new(start_ms: u64, duration_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start: Some(start_ms as f64),
            duration: Some(duration_ms as f64),
            text: text.into(),
        }
    }

    /// Rescale second-based times into milliseconds
    pub fn scaled(mut self, factor: f64) -> Self {
        self.start = self.start.map(|v| v * factor);
        self.duration = self.duration.map(|v| v * factor);
        self
    }
}

/// Accept `12`, `12.5`, `"12.5"` or `null` for a numeric field
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// A validated caption cue with a resolved end time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cue {
    /// Start time in ms
    pub start_time_ms: u64,

    /// End time in ms
    pub end_time_ms: u64,

    /// Normalized cue text
    pub text: String,
}

impl Cue {
    /// Create a new cue
    pub fn new(start_time_ms: u64, end_time_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_time_ms,
            end_time_ms,
            text: text.into(),
        }
    }
}

/// A readable subtitle line built from one or more cues
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleGroup {
    /// Start time in ms
    pub start_time_ms: u64,

    /// End time in ms
    pub end_time_ms: u64,

    /// Group text, cue texts joined by single spaces
    pub text: String,
}

impl SubtitleGroup {
    /// Create a new subtitle group
    pub fn new(start_time_ms: u64, end_time_ms: u64, text: impl Into<String>) -> Self {
        Self {
            start_time_ms,
            end_time_ms,
            text: text.into(),
        }
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> u64 {
        self.end_time_ms.saturating_sub(self.start_time_ms)
    }

    /// Text length in characters
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }

    fn absorb(&mut self, cue: Cue) {
        self.end_time_ms = cue.end_time_ms;
        self.text.push(' ');
        self.text.push_str(&cue.text);
    }
}

impl From<Cue> for SubtitleGroup {
    fn from(cue: Cue) -> Self {
        Self {
            start_time_ms: cue.start_time_ms,
            end_time_ms: cue.end_time_ms,
            text: cue.text,
        }
    }
}

/// Tunable merge thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Largest silence (ms) that still joins two cues
    #[serde(default = "default_max_gap_ms")]
    pub max_gap_ms: u64,

    /// Longest duration (ms) a group may span
    #[serde(default = "default_max_group_duration_ms")]
    pub max_group_duration_ms: u64,

    /// Longest text (characters) a group may hold
    #[serde(default = "default_max_text_length")]
    pub max_text_length: usize,
}

fn default_max_gap_ms() -> u64 {
    MAX_GAP_MS
}

fn default_max_group_duration_ms() -> u64 {
    MAX_GROUP_DURATION_MS
}

fn default_max_text_length() -> usize {
    MAX_TEXT_LENGTH
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            max_gap_ms: MAX_GAP_MS,
            max_group_duration_ms: MAX_GROUP_DURATION_MS,
            max_text_length: MAX_TEXT_LENGTH,
        }
    }
}

/// Merges caption cues into subtitle groups
#[derive(Debug, Clone, Default)]
pub struct SubtitleMerger {
    config: MergeConfig,
}

impl SubtitleMerger {
    /// Create a merger with the given thresholds
    pub fn new(config: MergeConfig) -> Self {
        Self { config }
    }

    /// Thresholds in use
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Validate raw cues and merge them into groups
    pub fn merge(&self, raw: &[RawCue]) -> Vec<SubtitleGroup> {
        let cues = normalize_cues(raw);
        self.merge_cues(&cues)
    }

    /// Merge already-normalized cues into groups
    pub fn merge_cues(&self, cues: &[Cue]) -> Vec<SubtitleGroup> {
        let mut groups = Vec::new();
        let mut current: Option<SubtitleGroup> = None;

        for cue in cues {
            for piece in self.fit_cue(cue) {
                let extend = current
                    .as_ref()
                    .is_some_and(|group| self.can_extend(group, &piece));

                if extend {
                    if let Some(group) = current.as_mut() {
                        group.absorb(piece);
                    }
                } else if let Some(done) = current.replace(piece.into()) {
                    groups.push(done);
                }
            }
        }

        if let Some(done) = current {
            groups.push(done);
        }

        debug!("Merged {} cues into {} subtitle groups", cues.len(), groups.len());
        groups
    }

    fn can_extend(&self, group: &SubtitleGroup, cue: &Cue) -> bool {
        let gap = cue.start_time_ms.saturating_sub(group.end_time_ms);
        let would_be_duration = cue.end_time_ms.saturating_sub(group.start_time_ms);
        let would_be_len = group.text_len() + 1 + cue.text.chars().count();

        gap <= self.config.max_gap_ms
            && would_be_duration <= self.config.max_group_duration_ms
            && would_be_len <= self.config.max_text_length
    }

    /// Make a single cue satisfy the group limits on its own.
    ///
    /// Over-long cues are clamped in time; over-long texts are split at word
    /// boundaries and the cue's time span is shared out by character count.
    fn fit_cue(&self, cue: &Cue) -> Vec<Cue> {
        let start = cue.start_time_ms;
        let end = cue
            .end_time_ms
            .min(start.saturating_add(self.config.max_group_duration_ms));

        if cue.text.chars().count() <= self.config.max_text_length {
            return vec![Cue::new(start, end, cue.text.clone())];
        }

        let chunks = split_text(&cue.text, self.config.max_text_length.max(1));
        let total_chars: u64 = chunks.iter().map(|c| c.chars().count() as u64).sum();
        let span = end - start;

        let mut pieces = Vec::with_capacity(chunks.len());
        let mut consumed = 0u64;
        let last = chunks.len().saturating_sub(1);
        for (idx, chunk) in chunks.into_iter().enumerate() {
            let piece_start = start + span * consumed / total_chars.max(1);
            consumed += chunk.chars().count() as u64;
            let piece_end = if idx == last {
                end
            } else {
                start + span * consumed / total_chars.max(1)
            };
            pieces.push(Cue::new(piece_start, piece_end, chunk));
        }

        debug!(
            "Split oversized cue at {}ms into {} pieces",
            cue.start_time_ms,
            pieces.len()
        );
        pieces
    }
}

/// Merge raw cues with the default thresholds
pub fn merge(raw: &[RawCue]) -> Vec<SubtitleGroup> {
    SubtitleMerger::default().merge(raw)
}

/// Check a raw cue and return its start, duration and normalized text
pub fn validate_cue(index: usize, raw: &RawCue) -> Result<(u64, u64, String), SubtitleError> {
    let malformed = |reason: &str| SubtitleError::MalformedCue {
        index,
        reason: reason.to_string(),
    };

    let start = raw.start.ok_or_else(|| malformed("missing start"))?;
    let duration = raw.duration.ok_or_else(|| malformed("missing duration"))?;

    if !start.is_finite() || start < 0.0 {
        return Err(malformed("start is not a non-negative number"));
    }
    if !duration.is_finite() || duration < 0.0 {
        return Err(malformed("duration is not a non-negative number"));
    }

    Ok((start.round() as u64, duration.round() as u64, normalize_text(&raw.text)))
}

/// Validate, sort and resolve end times of raw cues.
///
/// Each cue ends at `min(start + duration, next.start)` so that consecutive
/// cues never overlap.
pub fn normalize_cues(raw: &[RawCue]) -> Vec<Cue> {
    let mut valid: Vec<(u64, u64, String)> = Vec::with_capacity(raw.len());

    for (index, cue) in raw.iter().enumerate() {
        match validate_cue(index, cue) {
            Ok((_, _, text)) if text.is_empty() => {
                debug!("Skipping empty cue #{}", index);
            }
            Ok(parts) => valid.push(parts),
            Err(e) => warn!("{}, skipping", e),
        }
    }

    // Stable, so cues sharing a start keep their source order
    valid.sort_by_key(|(start, _, _)| *start);

    let next_starts: Vec<Option<u64>> = valid
        .iter()
        .skip(1)
        .map(|(start, _, _)| Some(*start))
        .chain(std::iter::once(None))
        .collect();

    valid
        .into_iter()
        .zip(next_starts)
        .map(|((start, duration, text), next_start)| {
            let natural_end = start.saturating_add(duration);
            let end = match next_start {
                Some(next) => natural_end.min(next),
                None => natural_end,
            };
            Cue::new(start, end, text)
        })
        .collect()
}

/// Collapse all whitespace runs (including newlines) into single spaces
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split text into chunks of at most `max_chars` characters, preferring word
/// boundaries and hard-splitting words that are longer than the limit.
fn split_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let chars: Vec<char> = word.chars().collect();
            for piece in chars.chunks(max_chars) {
                chunks.push(piece.iter().collect());
            }
            continue;
        }

        let needed = if current.is_empty() { word_len } else { current_len + 1 + word_len };
        if needed > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if !current.is_empty() {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}
