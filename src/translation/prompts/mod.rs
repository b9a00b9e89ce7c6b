/*!
 * Prompt engineering for subtitle translation.
 *
 * This module provides:
 * - The instruction template for batch translation
 * - Prompt construction from subtitle groups, with optional retry annotation
 */

pub mod templates;

// Re-export main types
pub use templates::{BatchPromptBuilder, PromptEntry, PromptTemplate};
