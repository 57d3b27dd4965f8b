//! Paragraph and sentence boundary detection.

use once_cell::sync::Lazy;
use regex::Regex;

/// A blank line (possibly containing other whitespace) separates paragraphs.
static PARAGRAPH_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Terminal punctuation followed by whitespace ends a sentence.
static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// Split text into trimmed, non-empty paragraphs.
pub fn split_into_paragraphs(text: &str) -> Vec<String> {
    PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split text after `.`, `!` or `?` when followed by whitespace.
///
/// The punctuation stays with the sentence it ends; the whitespace run is
/// dropped.
pub fn split_into_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;

    for m in SENTENCE_END.find_iter(text) {
        // Punctuation is a single ASCII byte
        let end = m.start() + 1;
        sentences.push(&text[start..end]);
        start = m.end();
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
