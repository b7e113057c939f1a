//! Error types for the `paperpal-rag` crate.

use thiserror::Error;

/// Failure reported by the PDF pipeline.
///
/// Download and extraction failures are kept apart so callers can tell a
/// network problem from an unreadable document.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineFailure {
    /// The PDF could not be fetched.
    #[error("Download failed: {0}")]
    Download(String),

    /// The PDF was fetched but no usable text came out of it.
    #[error("Text extraction failed: {0}")]
    Extraction(String),
}

/// Errors that can occur in retrieval operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Chunking was asked to split blank text.
    #[error("Text content is empty")]
    EmptyInput,

    /// A [`DocumentChunk`](crate::document::DocumentChunk) violated its invariants.
    #[error("Invalid chunk: {0}")]
    InvalidChunk(String),

    /// A relevance score fell outside `[0.0, 1.0]`.
    #[error("Relevance score must be between 0.0 and 1.0, got {0}")]
    InvalidScore(f32),

    /// Writing or deleting a paper's durable record failed.
    #[error("Persistence error for paper '{paper_id}': {source}")]
    PersistenceError {
        /// The paper whose record could not be written.
        paper_id: String,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The PDF pipeline failed.
    #[error(transparent)]
    PipelineError(#[from] PipelineFailure),

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// A convenience result type for retrieval operations.
pub type Result<T> = std::result::Result<T, RagError>;
