//! Data types for paper chunks, search results, and per-paper retrieval state.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Durable shape of a [`DocumentChunk`].
///
/// This is exactly what lands in a paper's JSON record; embeddings are never
/// written out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkRecord {
    pub id: String,
    pub paper_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub page_number: u32,
}

/// A contiguous slice of a paper's extracted text.
///
/// Chunks are immutable once built. Both [`DocumentChunk::new`] and
/// deserialization reject blank content and page numbers below 1.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(try_from = "ChunkRecord", into = "ChunkRecord")]
pub struct DocumentChunk {
    id: String,
    paper_id: String,
    chunk_index: usize,
    content: String,
    page_number: u32,
    embedding: Option<Vec<f32>>,
}

impl DocumentChunk {
    /// Build a chunk with the id `{paper_id}_chunk_{chunk_index}`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidChunk`] if `content` is blank or
    /// `page_number` is 0.
    pub fn new(
        paper_id: impl Into<String>,
        chunk_index: usize,
        content: impl Into<String>,
        page_number: u32,
    ) -> Result<Self> {
        let paper_id = paper_id.into();
        let id = format!("{paper_id}_chunk_{chunk_index}");
        Self::from_parts(id, paper_id, chunk_index, content.into(), page_number)
    }

    fn from_parts(
        id: String,
        paper_id: String,
        chunk_index: usize,
        content: String,
        page_number: u32,
    ) -> Result<Self> {
        if content.trim().is_empty() {
            return Err(RagError::InvalidChunk(format!("chunk '{id}' has empty content")));
        }
        if page_number < 1 {
            return Err(RagError::InvalidChunk(format!(
                "chunk '{id}' has page number {page_number}, expected at least 1"
            )));
        }
        Ok(Self { id, paper_id, chunk_index, content, page_number, embedding: None })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn paper_id(&self) -> &str {
        &self.paper_id
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    /// Always `None`; retrieval is keyword based.
    pub fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }
}

impl TryFrom<ChunkRecord> for DocumentChunk {
    type Error = RagError;

    fn try_from(record: ChunkRecord) -> Result<Self> {
        Self::from_parts(
            record.id,
            record.paper_id,
            record.chunk_index,
            record.content,
            record.page_number,
        )
    }
}

impl From<DocumentChunk> for ChunkRecord {
    fn from(chunk: DocumentChunk) -> Self {
        Self {
            id: chunk.id,
            paper_id: chunk.paper_id,
            chunk_index: chunk.chunk_index,
            content: chunk.content,
            page_number: chunk.page_number,
        }
    }
}

/// A retrieved [`DocumentChunk`] paired with a relevance score in `[0.0, 1.0]`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: DocumentChunk,
    /// Presentation score, higher is more relevant.
    pub relevance_score: f32,
}

impl SearchResult {
    /// Pair a chunk with a score.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidScore`] if the score is NaN or outside
    /// `[0.0, 1.0]`.
    pub fn new(chunk: DocumentChunk, relevance_score: f32) -> Result<Self> {
        if !(0.0..=1.0).contains(&relevance_score) {
            return Err(RagError::InvalidScore(relevance_score));
        }
        Ok(Self { chunk, relevance_score })
    }

    /// Result at 0-based position `rank`, scored `max(0.1, 1.0 - 0.15 * rank)`.
    ///
    /// The score reflects rank only, not the scorer's raw value.
    pub fn ranked(chunk: DocumentChunk, rank: usize) -> Self {
        let relevance_score = (1.0 - rank as f32 * 0.15).max(0.1);
        Self { chunk, relevance_score }
    }

    /// Result replayed from the search cache, always scored 1.0.
    pub fn cached(chunk: DocumentChunk) -> Self {
        Self { chunk, relevance_score: 1.0 }
    }
}

/// Per-paper conversational retrieval state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetrievalContext {
    pub paper_id: String,
    pub paper_title: String,
    pub paper_abstract: String,
    pub pdf_url: String,
    /// True once the chunk index holds chunks for this paper.
    pub is_pdf_processed: bool,
    /// Chunks from the most recent successful search, in ranked order.
    pub retrieved_chunks: Vec<DocumentChunk>,
    pub last_query: Option<String>,
    pub last_search_time: Option<DateTime<Utc>>,
}

impl RetrievalContext {
    pub fn new(
        paper_id: impl Into<String>,
        paper_title: impl Into<String>,
        paper_abstract: impl Into<String>,
        pdf_url: impl Into<String>,
        is_pdf_processed: bool,
    ) -> Self {
        Self {
            paper_id: paper_id.into(),
            paper_title: paper_title.into(),
            paper_abstract: paper_abstract.into(),
            pdf_url: pdf_url.into(),
            is_pdf_processed,
            retrieved_chunks: Vec::new(),
            last_query: None,
            last_search_time: None,
        }
    }

    /// Whether the cached search for `query` is still younger than `ttl` at `now`.
    pub fn cache_hit(&self, query: &str, ttl: Duration, now: DateTime<Utc>) -> bool {
        let (Some(last_query), Some(searched_at)) = (&self.last_query, self.last_search_time)
        else {
            return false;
        };
        if last_query != query {
            return false;
        }
        match (now - searched_at).to_std() {
            Ok(age) => age < ttl,
            // searched_at lies in the future; treat as fresh
            Err(_) => true,
        }
    }

    /// Replace the search cache. The three cache fields always move together.
    pub fn record_search(
        &mut self,
        query: impl Into<String>,
        chunks: Vec<DocumentChunk>,
        searched_at: DateTime<Utc>,
    ) {
        self.retrieved_chunks = chunks;
        self.last_query = Some(query.into());
        self.last_search_time = Some(searched_at);
    }

    /// Drop cached search results.
    pub fn clear_search_cache(&mut self) {
        self.retrieved_chunks.clear();
        self.last_query = None;
        self.last_search_time = None;
    }

    /// Render this context for an LLM prompt. See [`crate::format::render_context`].
    pub fn render(&self, max_tokens: usize) -> String {
        crate::format::render_context(self, max_tokens)
    }
}
