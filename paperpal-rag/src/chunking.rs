//! Page-aware sentence chunking of extracted paper text.
//!
//! [`SentenceChunker`] walks the text with a fixed-size character window,
//! pulls each window's right edge back to the nearest sentence break when one
//! is close, and tags every chunk with the page it starts on. Page numbers
//! come from the `--- Page N ---` markers the PDF extractor inserts.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::document::DocumentChunk;
use crate::error::{RagError, Result};

/// How far back from a window's edge to look for a sentence break, in chars.
const SENTENCE_LOOKBACK: usize = 100;

static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n--- Page (\d+) ---\n").expect("valid page marker pattern"));

/// Sentence breaks in priority order. The first pattern with any match in
/// the lookback region decides the boundary.
static SENTENCE_BREAKS: LazyLock<[Regex; 4]> = LazyLock::new(|| {
    [r"\.\s+", r"!\s+", r"\?\s+", r"\n\n"]
        .map(|pattern| Regex::new(pattern).expect("valid sentence break pattern"))
});

/// Splits extracted text into overlapping, page-tagged [`DocumentChunk`]s.
///
/// Sizes are measured in characters, not bytes, so CJK text is windowed the
/// same way as Latin text.
///
/// # Example
///
/// ```rust,ignore
/// use paperpal_rag::SentenceChunker;
///
/// let chunker = SentenceChunker::new(1000, 200);
/// let chunks = chunker.chunk(&extracted_text, "2401.12345")?;
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(1000, 200)
    }
}

impl SentenceChunker {
    /// Create a new `SentenceChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` — maximum number of characters per chunk
    /// * `chunk_overlap` — characters shared between consecutive windows; may
    ///   exceed `chunk_size`, the window still moves forward by at least one
    ///   character
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into chunks owned by `paper_id`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmptyInput`] if `text` is blank, or
    /// [`RagError::InvalidChunk`] if a page marker declares page 0.
    pub fn chunk(&self, text: &str, paper_id: &str) -> Result<Vec<DocumentChunk>> {
        self.chunk_with_progress(text, paper_id, |_| {})
    }

    /// Like [`chunk`](Self::chunk), calling `on_progress` with the fraction of
    /// the text consumed after each window.
    pub fn chunk_with_progress(
        &self,
        text: &str,
        paper_id: &str,
        mut on_progress: impl FnMut(f32),
    ) -> Result<Vec<DocumentChunk>> {
        if text.trim().is_empty() {
            return Err(RagError::EmptyInput);
        }

        let offsets = char_offsets(text);
        let total_chars = offsets.len() - 1;
        let markers = page_markers(text);
        let mut chunks = Vec::new();

        for window in self.windows(text, &offsets) {
            let content = text[offsets[window.start]..offsets[window.end]].trim();
            if !content.is_empty() {
                let page_number = page_at(&markers, offsets[window.start]);
                chunks.push(DocumentChunk::new(paper_id, chunks.len(), content, page_number)?);
            }
            on_progress(window.next_start as f32 / total_chars as f32);
        }

        debug!(paper_id, chunk_count = chunks.len(), "chunked text");
        Ok(chunks)
    }

    /// Compute every window over `text` as char ranges, including windows
    /// whose content trims to nothing.
    fn windows(&self, text: &str, offsets: &[usize]) -> Vec<Window> {
        let total_chars = offsets.len() - 1;
        let mut windows = Vec::new();
        let mut start = 0;

        while start < total_chars {
            let mut end = (start + self.chunk_size).min(total_chars);

            if end < total_chars {
                let search_start = start.max(end.saturating_sub(SENTENCE_LOOKBACK));
                let region = &text[offsets[search_start]..offsets[end]];
                if let Some(break_end) = last_sentence_break(region) {
                    let sentence_end = search_start + region[..break_end].chars().count();
                    if sentence_end > start {
                        end = sentence_end;
                    }
                }
            }

            // once a window reaches the end, later windows would only repeat its tail
            let next_start = if end >= total_chars {
                total_chars
            } else {
                (start + 1).max(end.saturating_sub(self.chunk_overlap))
            };
            windows.push(Window { start, end, next_start });
            start = next_start;
        }

        windows
    }
}

/// A window over the text, in char positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: usize,
    end: usize,
    next_start: usize,
}

/// Byte offset of every char, plus a trailing `text.len()` sentinel.
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

/// Byte end of the last match of the highest-priority sentence break present.
fn last_sentence_break(region: &str) -> Option<usize> {
    SENTENCE_BREAKS.iter().find_map(|pattern| pattern.find_iter(region).last().map(|m| m.end()))
}

/// `(byte_start, page_number)` for each page marker, in text order.
/// Markers whose number does not fit a `u32` are ignored.
fn page_markers(text: &str) -> Vec<(usize, u32)> {
    PAGE_MARKER
        .captures_iter(text)
        .filter_map(|caps| {
            let start = caps.get(0)?.start();
            let page = caps.get(1)?.as_str().parse().ok()?;
            Some((start, page))
        })
        .collect()
}

/// Page of the last marker starting at or before `byte_pos`, or 1.
fn page_at(markers: &[(usize, u32)], byte_pos: usize) -> u32 {
    markers
        .iter()
        .take_while(|(start, _)| *start <= byte_pos)
        .last()
        .map_or(1, |(_, page)| *page)
}
