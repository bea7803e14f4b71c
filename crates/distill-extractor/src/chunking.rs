//! Text chunking with overlap
//!
//! Sizes are counted in characters, not bytes, so multi-byte scripts chunk
//! the same way as ASCII. A chunk boundary prefers, in order: a paragraph
//! break, a line break, sentence-ending punctuation, then any whitespace.
//! Only the second half of the size window is searched, so chunks never
//! shrink below half the configured size except at the end of the text.

/// Sentence-ending punctuation, including CJK full-width forms
const SENTENCE_ENDS: &[char] = &['.', '!', '?', ';', '。', '！', '？', '；'];

/// Splits text into bounded, overlapping chunks
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl TextChunker {
    /// Create a chunker; a zero size is treated as one character
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            chunk_overlap: chunk_overlap.min(chunk_size - 1),
        }
    }

    /// Chunk the given text
    ///
    /// Blank input yields no chunks. Chunks are trimmed and never empty.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;

        while start < total {
            let hard_end = (start + self.chunk_size).min(total);
            let end = if hard_end == total {
                total
            } else {
                self.find_break(&chars, start, hard_end)
            };

            let piece: String = chars[start..end].iter().collect();
            let piece = piece.trim();
            if !piece.is_empty() {
                chunks.push(piece.to_string());
            }

            if end == total {
                break;
            }

            let next = end.saturating_sub(self.chunk_overlap);
            start = if next > start { next } else { end };
        }

        chunks
    }

    /// Best break position in `(start + size/2, hard_end]`
    fn find_break(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = start + self.chunk_size / 2;

        let is_paragraph = |i: usize| i >= 2 && chars[i - 1] == '\n' && chars[i - 2] == '\n';
        let is_line = |i: usize| chars[i - 1] == '\n';
        let is_sentence = |i: usize| SENTENCE_ENDS.contains(&chars[i - 1]);
        let is_space = |i: usize| chars[i - 1].is_whitespace();

        let preferences: [&dyn Fn(usize) -> bool; 4] =
            [&is_paragraph, &is_line, &is_sentence, &is_space];

        for accept in preferences {
            if let Some(pos) = (floor + 1..=hard_end).rev().find(|&i| accept(i)) {
                return pos;
            }
        }
        hard_end
    }
}
