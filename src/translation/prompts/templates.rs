/*!
 * Prompt templates for batch subtitle translation.
 *
 * A batch prompt embeds the groups as a JSON array of
 * `{startTimeMs, endTimeMs, text}` triples and asks for a JSON array of
 * enriched translations back, one item per input item, in the same order.
 */

use serde::{Deserialize, Serialize};

use crate::subtitle_merger::SubtitleGroup;

/// Instruction template for subtitle translation.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    /// The template string with placeholders
    template: String,
}

impl PromptTemplate {
    /// The default instructions for a batch of subtitle groups.
    pub const SUBTITLE_TRANSLATOR: &'static str = r#"You are an expert subtitle translator and language tutor. Translate each subtitle below into {target_language}.

## Your Role
- Fix obvious speech-recognition mistakes in the original text first
- Translate the corrected text naturally and concisely
- Pick out up to three difficult words or phrases a learner would look up

## Input
A JSON array of {count} subtitle objects, each with startTimeMs, endTimeMs and text.

## Output Requirements
- Return ONLY a JSON array with exactly {count} objects, in the same order as the input
- Each object must have these fields in this order:
  1. "correctedText": the corrected original text
  2. "translation": the {target_language} translation
  3. "difficultVocabulary": an array of objects with the fields "vocabulary", "type", "part_of_speech", "phonetic", "chinese_meaning", "chinese_english_sentence"
- Use an empty array when there is no difficult vocabulary
- Do not wrap the array in Markdown code fences
- Do not add any text before or after the array
- Do not use trailing commas"#;

    /// Create a new prompt template.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }

    /// Create the default subtitle translator template.
    pub fn subtitle_translator() -> Self {
        Self::new(Self::SUBTITLE_TRANSLATOR)
    }

    /// Render the template with the given variables.
    pub fn render(&self, target_language: &str, count: usize) -> String {
        self.template
            .replace("{target_language}", target_language)
            .replace("{count}", &count.to_string())
    }
}

impl Default for PromptTemplate {
    fn default() -> Self {
        Self::subtitle_translator()
    }
}

/// One subtitle as it is shown to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptEntry {
    /// Start of the group in milliseconds
    pub start_time_ms: u64,

    /// End of the group in milliseconds
    pub end_time_ms: u64,

    /// Source text
    pub text: String,
}

impl From<&SubtitleGroup> for PromptEntry {
    fn from(group: &SubtitleGroup) -> Self {
        Self {
            start_time_ms: group.start_time_ms,
            end_time_ms: group.end_time_ms,
            text: group.text.clone(),
        }
    }
}

/// Builder for constructing batch translation prompts.
#[derive(Debug, Clone)]
pub struct BatchPromptBuilder {
    template: PromptTemplate,
    target_language: String,
    entries: Vec<PromptEntry>,
    retry_attempt: Option<u32>,
}

impl BatchPromptBuilder {
    /// Create a new prompt builder for `target_language` (display name)
    pub fn new(target_language: &str) -> Self {
        Self {
            template: PromptTemplate::default(),
            target_language: target_language.to_string(),
            entries: Vec::new(),
            retry_attempt: None,
        }
    }

    /// Use a custom instruction template
    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.template = template;
        self
    }

    /// Set the groups to translate.
    pub fn with_groups<'a, I>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = &'a SubtitleGroup>,
    {
        self.entries = groups.into_iter().map(PromptEntry::from).collect();
        self
    }

    /// Mark the prompt as the n-th retry of the same batch.
    pub fn with_retry_attempt(mut self, attempt: u32) -> Self {
        self.retry_attempt = (attempt > 0).then_some(attempt);
        self
    }

    /// Number of entries embedded in the prompt
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no entries were added
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the complete prompt.
    pub fn build(&self) -> String {
        let mut prompt = self.template.render(&self.target_language, self.entries.len());

        if let Some(attempt) = self.retry_attempt {
            prompt.push_str(&format!(
                "\n\nNote: this is retry attempt {}. The previous answer could not be used; follow the output requirements exactly.",
                attempt
            ));
        }

        let entries = serde_json::to_string_pretty(&self.entries).unwrap_or_else(|_| "[]".to_string());
        prompt.push_str("\n\n## Subtitles\n");
        prompt.push_str(&entries);

        prompt
    }
}
