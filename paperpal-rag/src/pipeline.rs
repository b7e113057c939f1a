//! Boundary to the PDF download and text-extraction pipeline.
//!
//! The retrieval engine never parses PDFs itself. It asks a [`PdfPipeline`]
//! for plain text in which every page is introduced by a
//! `\n--- Page {n} ---\n` marker, and chunks that text.

use async_trait::async_trait;

use crate::error::PipelineFailure;
use crate::status::StatusSink;

/// Downloads a paper's PDF and extracts its text.
///
/// Implementations report download progress in `0.0..0.5` and extraction
/// progress in `0.5..0.8` through `sink`.
///
/// # Example
///
/// ```rust,ignore
/// use paperpal_rag::{PdfPipeline, PipelineFailure, StatusSink};
///
/// struct Fixture(String);
///
/// #[async_trait::async_trait]
/// impl PdfPipeline for Fixture {
///     async fn download_and_extract(
///         &self,
///         _url: &str,
///         _paper_id: &str,
///         _sink: &dyn StatusSink,
///     ) -> Result<String, PipelineFailure> {
///         Ok(self.0.clone())
///     }
/// }
/// ```
#[async_trait]
pub trait PdfPipeline: Send + Sync {
    /// Fetch the PDF at `url` and return its page-marked text.
    async fn download_and_extract(
        &self,
        url: &str,
        paper_id: &str,
        sink: &dyn StatusSink,
    ) -> Result<String, PipelineFailure>;
}

/// The marker that introduces 1-based page `page`.
pub fn page_marker(page: usize) -> String {
    format!("\n--- Page {page} ---\n")
}

/// Join per-page text into the marked format the chunker expects.
pub fn assemble_pages<S: AsRef<str>>(pages: &[S]) -> String {
    pages
        .iter()
        .enumerate()
        .map(|(i, page)| format!("{}{}", page_marker(i + 1), page.as_ref()))
        .collect()
}
