/*!
 * Parsing of model output into translation records.
 *
 * Model output is untrusted free-form text. The array is located first
 * (code fences and surrounding prose are tolerated), then parsed; a trailing
 * comma repair is attempted only when the strict parse fails.
 */

use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::models::TranslationRecord;
use crate::errors::TranslationError;

static TRAILING_COMMA_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r",(\s*[\]}])").expect("Invalid trailing comma regex")
});

/// Extract the JSON array substring from a model response.
pub fn extract_json_array(response: &str) -> Result<&str, TranslationError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(TranslationError::EmptyResponse);
    }

    let body = strip_code_fence(trimmed).unwrap_or(trimmed);

    match (array_start(body), body.rfind(']')) {
        (Some(start), Some(end)) if end > start => Ok(&body[start..=end]),
        _ => Err(TranslationError::ResponseParse(format!(
            "no JSON array in response: {}",
            crate::translation::cache::truncate_text(trimmed, 80)
        ))),
    }
}

/// First `[` that opens an array of objects or strings (or an empty one).
///
/// Prose like "see note [1]" is skipped; falls back to the first `[`.
fn array_start(body: &str) -> Option<usize> {
    body.match_indices('[')
        .map(|(i, _)| i)
        .find(|&i| matches!(body[i + 1..].trim_start().chars().next(), Some('{' | '"' | ']')))
        .or_else(|| body.find('['))
}

/// Contents of the first Markdown code fence, if any
fn strip_code_fence(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    // Skip an info string such as `json`
    let content_start = after_open.find('\n').map(|i| i + 1).unwrap_or(0);
    let content = &after_open[content_start..];
    let close = content.find("```")?;
    Some(content[..close].trim())
}

/// Parse a batch response into exactly `expected` records.
///
/// Fewer items than expected is an error; extra items are dropped.
pub fn parse_batch_response(response: &str, expected: usize) -> Result<Vec<TranslationRecord>, TranslationError> {
    let array = extract_json_array(response)?;

    let items: Vec<Value> = match serde_json::from_str(array) {
        Ok(items) => items,
        Err(first_err) => {
            let repaired = TRAILING_COMMA_REGEX.replace_all(array, "$1");
            serde_json::from_str(&repaired)
                .map_err(|_| TranslationError::ResponseParse(first_err.to_string()))?
        }
    };

    if items.len() < expected {
        return Err(TranslationError::ResponseParse(format!(
            "expected {} items, got {}",
            expected,
            items.len()
        )));
    }
    if items.len() > expected {
        warn!("Response has {} items for {} subtitles, ignoring the extra ones", items.len(), expected);
    }

    items
        .into_iter()
        .take(expected)
        .enumerate()
        .map(|(i, item)| record_from_value(i, item))
        .collect()
}

fn record_from_value(index: usize, item: Value) -> Result<TranslationRecord, TranslationError> {
    match item {
        // Some models answer with bare strings when they skip the enrichment
        Value::String(translation) => Ok(TranslationRecord {
            translation,
            ..TranslationRecord::default()
        }),
        Value::Object(_) => serde_json::from_value(item)
            .map_err(|e| TranslationError::ResponseParse(format!("item {}: {}", index, e))),
        other => Err(TranslationError::ResponseParse(format!(
            "item {} is not an object: {}",
            index, other
        ))),
    }
}
