//! HTTP-backed [`PdfPipeline`] using `reqwest`.
//!
//! This module is only available when the `http` feature is enabled. Text
//! extraction itself is delegated to a caller-supplied [`TextExtractor`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, error, info, warn};

use crate::error::PipelineFailure;
use crate::pipeline::PdfPipeline;
use crate::status::{ProcessingPhase, ProcessingStatus, StatusSink, progress};

/// Request timeout for PDF downloads.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on the buffer reserved from a `Content-Length` header.
const MAX_PREALLOCATION: u64 = 64 * 1024 * 1024;

/// Turns raw PDF bytes into page-marked text.
///
/// Implementations should report extraction progress in `0.5..0.8` through
/// `sink` and produce text in the format of
/// [`assemble_pages`](crate::pipeline::assemble_pages).
pub trait TextExtractor: Send + Sync {
    fn extract(
        &self,
        pdf: &[u8],
        paper_id: &str,
        sink: &dyn StatusSink,
    ) -> Result<String, PipelineFailure>;
}

/// A [`PdfPipeline`] that downloads over HTTP(S) and hands the bytes to `E`.
///
/// # Example
///
/// ```rust,ignore
/// use paperpal_rag::http::HttpPdfPipeline;
///
/// let pipeline = HttpPdfPipeline::new(MyExtractor)?;
/// let engine = RetrievalEngine::builder()
///     .index(index)
///     .pipeline(Arc::new(pipeline))
///     .build()?;
/// ```
pub struct HttpPdfPipeline<E> {
    client: reqwest::Client,
    extractor: E,
}

impl<E: TextExtractor> HttpPdfPipeline<E> {
    /// Create a pipeline with a 30 second download timeout.
    pub fn new(extractor: E) -> Result<Self, PipelineFailure> {
        let client = reqwest::Client::builder()
            .timeout(DOWNLOAD_TIMEOUT)
            .build()
            .map_err(|e| PipelineFailure::Download(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, extractor })
    }

    /// Use a preconfigured client, e.g. one with a proxy or custom timeout.
    pub fn with_client(client: reqwest::Client, extractor: E) -> Self {
        Self { client, extractor }
    }

    async fn download(
        &self,
        url: Url,
        paper_id: &str,
        sink: &dyn StatusSink,
    ) -> Result<Vec<u8>, PipelineFailure> {
        info!(paper_id, %url, "downloading PDF");

        let mut response = self.client.get(url.clone()).send().await.map_err(|e| {
            error!(paper_id, error = %e, "PDF request failed");
            PipelineFailure::Download(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            error!(paper_id, %status, "PDF request returned an error status");
            return Err(PipelineFailure::Download(format!("server returned {status}")));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_lowercase();
        if !content_type.contains("application/pdf") && !url.path().ends_with(".pdf") {
            warn!(paper_id, content_type, "unexpected content type for PDF");
        }

        let total = response.content_length().unwrap_or(0);
        let mut body = Vec::with_capacity(total.min(MAX_PREALLOCATION) as usize);
        while let Some(bytes) = response
            .chunk()
            .await
            .map_err(|e| PipelineFailure::Download(e.to_string()))?
        {
            body.extend_from_slice(&bytes);
            if total > 0 {
                let fraction = body.len() as f32 / total as f32;
                sink.report(
                    paper_id,
                    ProcessingStatus::in_phase(
                        ProcessingPhase::Downloading,
                        (fraction * progress::DOWNLOAD_END).min(progress::DOWNLOAD_END),
                    ),
                );
            }
        }

        info!(paper_id, bytes = body.len(), "downloaded PDF");
        Ok(body)
    }
}

#[async_trait]
impl<E: TextExtractor> PdfPipeline for HttpPdfPipeline<E> {
    async fn download_and_extract(
        &self,
        url: &str,
        paper_id: &str,
        sink: &dyn StatusSink,
    ) -> Result<String, PipelineFailure> {
        let url = resolve_pdf_url(url)?;
        let pdf = self.download(url, paper_id, sink).await?;

        sink.report(
            paper_id,
            ProcessingStatus::in_phase(ProcessingPhase::Extracting, progress::DOWNLOAD_END),
        );
        let text = self.extractor.extract(&pdf, paper_id, sink)?;
        if text.trim().is_empty() {
            return Err(PipelineFailure::Extraction("no text content extracted from PDF".into()));
        }

        debug!(paper_id, text_len = text.len(), "extracted PDF text");
        Ok(text)
    }
}

/// Validate `url` and point arXiv abstract pages at their PDF.
///
/// `https://arxiv.org/abs/2401.12345` becomes
/// `https://arxiv.org/pdf/2401.12345.pdf`; other URLs pass through.
pub fn resolve_pdf_url(url: &str) -> Result<Url, PipelineFailure> {
    let invalid = || PipelineFailure::Download(format!("Invalid URL: {url}"));

    let mut parsed = Url::parse(url).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return Err(invalid());
    }

    let is_arxiv = parsed
        .host_str()
        .is_some_and(|host| host == "arxiv.org" || host.ends_with(".arxiv.org"));
    if is_arxiv {
        if let Some(id) = parsed.path().strip_prefix("/abs/") {
            let pdf_path = format!("/pdf/{id}.pdf");
            parsed.set_path(&pdf_path);
        }
    }
    Ok(parsed)
}
