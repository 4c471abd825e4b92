//! Greedy paragraph-then-sentence chunking.
//!
//! Paragraphs (separated by a blank line) are packed into chunks while the
//! result stays within the size limit. A paragraph that is too large on its
//! own is broken into sentences on `". "` and those are packed the same way.
//! A single sentence longer than the limit is emitted whole, so the limit is
//! soft for unbreakable text.
//!
//! All lengths are counted in characters, not bytes.

const PARAGRAPH_BREAK: &str = "\n\n";
const SENTENCE_BREAK: &str = ". ";
const SENTENCE_JOIN: &str = " ";

/// Split `text` into chunks of at most `max_chunk_size` characters.
///
/// Text that already fits is returned unchanged as the only chunk, including
/// the empty string. Longer text is split on paragraph and then sentence
/// boundaries; every emitted chunk is trimmed and never empty.
///
/// # Example
///
/// ```
/// use dojo_chunker::chunk_text;
///
/// let text = format!("{}\n\n{}", "a".repeat(8), "b".repeat(8));
/// assert_eq!(chunk_text(&text, 10), vec!["a".repeat(8), "b".repeat(8)]);
/// assert_eq!(chunk_text("short", 10), vec!["short"]);
/// ```
pub fn chunk_text(text: &str, max_chunk_size: usize) -> Vec<String> {
    if char_len(text) <= max_chunk_size {
        return vec![text.to_string()];
    }

    text.split(PARAGRAPH_BREAK)
        .filter(|paragraph| !paragraph.trim().is_empty())
        .fold(Accumulator::new(max_chunk_size), Accumulator::push_paragraph)
        .finish()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Fold state: finished chunks plus the chunk being filled.
struct Accumulator {
    max: usize,
    chunks: Vec<String>,
    buffer: String,
    buffer_len: usize,
}

impl Accumulator {
    fn new(max: usize) -> Self {
        Self {
            max,
            chunks: Vec::new(),
            buffer: String::new(),
            buffer_len: 0,
        }
    }

    fn push_paragraph(mut self, paragraph: &str) -> Self {
        if char_len(paragraph) <= self.max {
            self.push_piece(paragraph, PARAGRAPH_BREAK);
            return self;
        }

        self.flush();
        let sentences: Vec<&str> = paragraph.split(SENTENCE_BREAK).collect();
        let last = sentences.len().saturating_sub(1);
        for (i, sentence) in sentences.into_iter().enumerate() {
            let blank = sentence.trim().is_empty();
            if i < last {
                // split() consumed the terminator, blank pieces included
                let piece = if blank {
                    ".".to_string()
                } else {
                    format!("{sentence}.")
                };
                self.push_piece(&piece, SENTENCE_JOIN);
            } else if !blank {
                self.push_piece(sentence, SENTENCE_JOIN);
            }
        }
        self
    }

    fn push_piece(&mut self, piece: &str, separator: &str) {
        let piece_len = char_len(piece);

        if self.buffer.is_empty() {
            self.buffer.push_str(piece);
            self.buffer_len = piece_len;
            return;
        }

        let joined_len = self.buffer_len + separator.len() + piece_len;
        if joined_len <= self.max {
            self.buffer.push_str(separator);
            self.buffer.push_str(piece);
            self.buffer_len = joined_len;
        } else {
            self.flush();
            self.buffer.push_str(piece);
            self.buffer_len = piece_len;
        }
    }

    fn flush(&mut self) {
        let trimmed = self.buffer.trim();
        if !trimmed.is_empty() {
            self.chunks.push(trimmed.to_string());
        }
        self.buffer.clear();
        self.buffer_len = 0;
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.chunks
    }
}
