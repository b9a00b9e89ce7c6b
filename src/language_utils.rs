use anyhow::{Result, anyhow};
use isolang::Language;

/// Language utilities for the target locale
///
/// The pipeline translates into exactly one locale. Users write it the way
/// browsers and caption tracks do (`zh`, `zh-CN`, `pt_BR`, `chi`), so the
/// helpers here split off the region, map ISO 639-2/B codes onto 639-2/T and
/// resolve a display name for prompts.

/// ISO 639-2/B codes that differ from their 639-2/T counterpart
const BIBLIOGRAPHIC_CODES: &[(&str, &str)] = &[
    ("fre", "fra"),
    ("ger", "deu"),
    ("dut", "nld"),
    ("gre", "ell"),
    ("chi", "zho"),
    ("cze", "ces"),
    ("ice", "isl"),
    ("alb", "sqi"),
    ("arm", "hye"),
    ("baq", "eus"),
    ("bur", "mya"),
    ("per", "fas"),
    ("geo", "kat"),
    ("may", "msa"),
    ("mac", "mkd"),
    ("rum", "ron"),
    ("slo", "slk"),
    ("wel", "cym"),
];

/// A parsed locale such as `zh-CN`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    /// Resolved language
    pub language: Language,
    /// Optional region subtag, upper-cased
    pub region: Option<String>,
}

impl Locale {
    /// Parse `code` as `<language>[-_]<region>`
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        let mut parts = trimmed.splitn(2, ['-', '_']);
        let primary = parts.next().unwrap_or_default();
        let region = parts
            .next()
            .map(|r| r.trim().to_uppercase())
            .filter(|r| !r.is_empty());

        let language = resolve_language(primary)
            .ok_or_else(|| anyhow!("Invalid language code: {}", code))?;

        Ok(Self { language, region })
    }

    /// English display name, with the region appended when present
    pub fn display_name(&self) -> String {
        match &self.region {
            Some(region) => format!("{} ({})", self.language.to_name(), region),
            None => self.language.to_name().to_string(),
        }
    }

    /// Shortest ISO code for the language
    pub fn short_code(&self) -> String {
        self.language
            .to_639_1()
            .map(str::to_string)
            .unwrap_or_else(|| self.language.to_639_3().to_string())
    }
}

fn resolve_language(code: &str) -> Option<Language> {
    let normalized = code.trim().to_lowercase();

    match normalized.len() {
        2 => Language::from_639_1(&normalized),
        3 => {
            let part2t = BIBLIOGRAPHIC_CODES
                .iter()
                .find(|(b, _)| *b == normalized)
                .map(|(_, t)| *t)
                .unwrap_or(&normalized);
            Language::from_639_3(part2t)
        }
        _ => None,
    }
}

/// Validate a language code or locale
pub fn validate_language_code(code: &str) -> Result<()> {
    Locale::parse(code).map(|_| ())
}

/// Normalize a language code to ISO 639-2/T (3-letter) format
pub fn normalize_to_part2t(code: &str) -> Result<String> {
    Ok(Locale::parse(code)?.language.to_639_3().to_string())
}

/// Check if two language codes match (represent the same language)
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    match (Locale::parse(code1), Locale::parse(code2)) {
        (Ok(a), Ok(b)) => a.language == b.language,
        _ => false,
    }
}

/// Get the language name from a code
pub fn get_language_name(code: &str) -> Result<String> {
    Ok(Locale::parse(code)?.display_name())
}
