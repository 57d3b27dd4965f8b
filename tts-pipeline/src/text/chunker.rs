//! Text chunking for long-form TTS.
//!
//! Text is split on paragraph boundaries first, then on sentence boundaries for
//! paragraphs that do not fit, and finally on whitespace for single sentences
//! longer than the chunk size. Lengths are counted in characters.

use serde::Serialize;

use super::sentences::{split_into_paragraphs, split_into_sentences};
use super::TextChunk;
use crate::config::SynthesisConfig;
use crate::error::{PipelineError, Result};

/// Separator placed between paragraphs merged into one chunk.
const PARAGRAPH_JOINER: &str = "\n";

/// Split text into ordered, TTS-sized chunks.
///
/// Empty or whitespace-only text yields no chunks. Text that fits within
/// `max_chunk_size` is returned as a single trimmed chunk.
pub fn chunk_text(text: &str, config: &SynthesisConfig) -> Result<Vec<TextChunk>> {
    let max = config.max_chunk_size;
    if max == 0 {
        return Err(PipelineError::InvalidConfig(
            "max_chunk_size must be at least 1".to_string(),
        ));
    }

    let text = text.trim();
    if text.is_empty() {
        return Ok(Vec::new());
    }

    if char_len(text) <= max {
        return Ok(vec![TextChunk::new(0, text.to_string())]);
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in split_into_paragraphs(text) {
        let paragraph_len = char_len(&paragraph);

        if char_len(&current) + paragraph_len + 1 > max {
            flush(&mut chunks, &mut current);

            if paragraph_len > max {
                for piece in split_long_paragraph(&paragraph, max) {
                    accumulate(&mut chunks, &mut current, piece, " ", max);
                }
            } else {
                current = paragraph;
            }
        } else {
            if !current.is_empty() {
                current.push_str(PARAGRAPH_JOINER);
            }
            current.push_str(&paragraph);
        }
    }
    flush(&mut chunks, &mut current);

    if config.overlap_sentences > 0 && chunks.len() > 1 {
        return Ok(add_overlap(chunks, config.overlap_sentences));
    }

    Ok(chunks
        .into_iter()
        .enumerate()
        .map(|(index, text)| TextChunk::new(index, text))
        .collect())
}

/// Split an oversized paragraph into sentence-based pieces.
fn split_long_paragraph(paragraph: &str, max: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for sentence in split_into_sentences(paragraph) {
        if char_len(&sentence) > max {
            flush(&mut pieces, &mut current);

            let (fragments, rest) = force_split(&sentence, max);
            pieces.extend(fragments);
            current = rest;
        } else {
            accumulate(&mut pieces, &mut current, sentence, " ", max);
        }
    }
    flush(&mut pieces, &mut current);

    pieces
}

/// Break a sentence longer than `max` into fragments of at most `max`
/// characters, preferring the last whitespace at or before the limit.
///
/// Returns the full fragments and the trailing remainder, which may be empty.
fn force_split(sentence: &str, max: usize) -> (Vec<String>, String) {
    let mut fragments = Vec::new();
    let mut rest = sentence.trim();

    while char_len(rest) > max {
        // Byte offset of the character at position `max`
        let limit = rest
            .char_indices()
            .nth(max)
            .map(|(offset, _)| offset)
            .unwrap_or(rest.len());

        let cut = rest
            .char_indices()
            .take(max + 1)
            .filter(|(offset, c)| *offset > 0 && c.is_whitespace())
            .map(|(offset, _)| offset)
            .last()
            .unwrap_or(limit);

        fragments.push(rest[..cut].trim_end().to_string());
        rest = rest[cut..].trim_start();
    }

    (fragments, rest.to_string())
}

/// Greedily append `piece` to `current`, flushing first if it would overflow.
fn accumulate(
    chunks: &mut Vec<String>,
    current: &mut String,
    piece: String,
    joiner: &str,
    max: usize,
) {
    if char_len(current) + char_len(&piece) + 1 > max {
        flush(chunks, current);
        *current = piece;
    } else {
        if !current.is_empty() {
            current.push_str(joiner);
        }
        current.push_str(&piece);
    }
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
    current.clear();
}

/// Prefix every chunk after the first with the last `overlap` sentences of
/// the chunk before it.
///
/// When the previous chunk has `overlap` sentences or fewer, no overlap is
/// added to the current chunk.
fn add_overlap(chunks: Vec<String>, overlap: usize) -> Vec<TextChunk> {
    let mut result = Vec::with_capacity(chunks.len());

    for (index, chunk) in chunks.iter().enumerate() {
        if index == 0 {
            result.push(TextChunk::new(0, chunk.clone()));
            continue;
        }

        let previous = split_into_sentences(&chunks[index - 1]);
        if previous.len() <= overlap {
            result.push(TextChunk::new(index, chunk.clone()));
            continue;
        }

        let overlap_text = previous[previous.len() - overlap..].join(" ");
        result.push(TextChunk {
            index,
            text: format!("{} {}", overlap_text, chunk),
            overlap_chars: char_len(&overlap_text) + 1,
        });
    }

    result
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Summary statistics over a chunk sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChunkStats {
    pub total_chunks: usize,
    pub total_characters: usize,
    pub avg_chunk_size: f64,
    pub max_chunk_size: usize,
    pub min_chunk_size: usize,
}

/// Compute chunk statistics. All values are zero when there are no chunks.
pub fn chunk_stats(chunks: &[TextChunk]) -> ChunkStats {
    if chunks.is_empty() {
        return ChunkStats::default();
    }

    let lengths: Vec<usize> = chunks.iter().map(TextChunk::char_len).collect();
    let total_characters: usize = lengths.iter().sum();

    ChunkStats {
        total_chunks: chunks.len(),
        total_characters,
        avg_chunk_size: total_characters as f64 / chunks.len() as f64,
        max_chunk_size: lengths.iter().copied().max().unwrap_or(0),
        min_chunk_size: lengths.iter().copied().min().unwrap_or(0),
    }
}
