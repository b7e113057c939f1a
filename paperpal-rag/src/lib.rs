//! Retrieval core for chatting with research papers.
//!
//! This crate turns a paper's extracted PDF text into overlapping chunks,
//! keeps them in a durable per-paper [`ChunkIndex`], ranks them against
//! bilingual (Chinese/English) queries, and assembles a token-budgeted context
//! string for an LLM prompt. Papers whose PDF cannot be processed fall back to
//! their title and abstract.
//!
//! - [`SentenceChunker`]: sentence-aware sliding windows with page tracking
//! - [`ChunkIndex`]: per-paper chunk storage persisted as JSON records
//! - [`scoring`]: CJK n-gram and English keyword relevance scoring
//! - [`RetrievalEngine`]: context lifecycle, PDF processing, and cached search
//! - [`format::render_context`]: prompt context assembly
//!
//! # Feature Flags
//!
//! - `http`: [`http::HttpPdfPipeline`], a `reqwest`-based PDF downloader

pub mod chunking;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod format;
pub mod index;
pub mod persistence;
pub mod pipeline;
pub mod scoring;
pub mod status;

#[cfg(feature = "http")]
pub mod http;

pub use chunking::SentenceChunker;
pub use config::{RetrievalConfig, RetrievalConfigBuilder};
pub use document::{DocumentChunk, RetrievalContext, SearchResult};
pub use engine::{EngineStats, PaperStatus, RetrievalEngine, RetrievalEngineBuilder};
pub use error::{PipelineFailure, RagError, Result};
pub use index::{ChunkIndex, IndexStats, ScoredChunk};
pub use pipeline::PdfPipeline;
pub use status::{ProcessingPhase, ProcessingStatus, StatusSink, StatusTracker};
