//! Text processing for long-form TTS: paragraph/sentence splitting and chunking.

pub mod chunker;
mod sentences;

pub use chunker::{chunk_stats, chunk_text, ChunkStats};
pub use sentences::{split_into_paragraphs, split_into_sentences};

/// A chunk of text ready for one synthesis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    /// Position of this chunk in the original text (0-based)
    pub index: usize,
    /// The text content, including any overlap prefix
    pub text: String,
    /// Number of leading characters duplicated from the previous chunk
    pub overlap_chars: usize,
}

impl TextChunk {
    /// Create a new text chunk without overlap.
    pub fn new(index: usize, text: String) -> Self {
        Self {
            index,
            text,
            overlap_chars: 0,
        }
    }

    /// The chunk content without the overlap prefix.
    pub fn base_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap_chars) {
            Some((offset, _)) => &self.text[offset..],
            None if self.overlap_chars == 0 => &self.text,
            None => "",
        }
    }

    /// Length in characters, including overlap.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_chunk_creation() {
        let chunk = TextChunk::new(1, "Hello world".to_string());
        assert_eq!(chunk.index, 1);
        assert_eq!(chunk.text, "Hello world");
        assert_eq!(chunk.base_text(), "Hello world");
        assert_eq!(chunk.char_len(), 11);
    }

    #[test]
    fn test_base_text_strips_overlap() {
        let chunk = TextChunk {
            index: 1,
            text: "Prev. Next sentence.".to_string(),
            overlap_chars: 6,
        };
        assert_eq!(chunk.base_text(), "Next sentence.");
    }
}
