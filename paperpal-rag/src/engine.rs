//! Retrieval engine: per-paper context lifecycle and search.
//!
//! The [`RetrievalEngine`] owns one [`RetrievalContext`] per paper and
//! coordinates PDF processing (pipeline → chunk → index) with cached
//! free-text search and uncached keyword search. Papers move through
//! no context → abstract only → PDF processed; a failed PDF leaves the paper
//! on its abstract, and only [`clear_context`](RetrievalEngine::clear_context)
//! goes back.
//!
//! # Example
//!
//! ```rust,ignore
//! use paperpal_rag::{ChunkIndex, RetrievalConfig, RetrievalEngine};
//!
//! let engine = RetrievalEngine::builder()
//!     .config(RetrievalConfig::default())
//!     .index(Arc::new(ChunkIndex::open("data/text_db").await?))
//!     .pipeline(Arc::new(my_pdf_pipeline))
//!     .build()?;
//!
//! engine.initialize_context("2401.12345", title, abstract_text, pdf_url).await;
//! engine.process_if_needed("2401.12345").await;
//! let results = engine.search_semantic("2401.12345", "方法", 5, true).await;
//! let prompt_context = engine.render_context("2401.12345", 3000).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::chunking::SentenceChunker;
use crate::config::RetrievalConfig;
use crate::document::{RetrievalContext, SearchResult};
use crate::error::{RagError, Result};
use crate::index::{ChunkIndex, IndexStats};
use crate::pipeline::PdfPipeline;
use crate::status::{ProcessingPhase, ProcessingStatus, StatusSink, StatusTracker, progress};

/// A paper's processing status merged with its retrieval state.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaperStatus {
    pub paper_id: String,
    pub phase: ProcessingPhase,
    pub progress: f32,
    pub error_message: Option<String>,
    pub total_chunks: usize,
    pub processed_chunks: usize,
    /// True while a download, extraction, or chunking step is running.
    pub is_processing: bool,
    pub pdf_processed: bool,
    pub has_context: bool,
}

/// Engine-wide counters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EngineStats {
    pub active_contexts: usize,
    pub index: IndexStats,
}

/// The retrieval service. Construct one via [`RetrievalEngine::builder()`]
/// and share it by reference or `Arc`.
pub struct RetrievalEngine {
    config: RetrievalConfig,
    chunker: SentenceChunker,
    index: Arc<ChunkIndex>,
    pipeline: Arc<dyn PdfPipeline>,
    status: Arc<StatusTracker>,
    contexts: RwLock<HashMap<String, RetrievalContext>>,
}

impl RetrievalEngine {
    /// Create a new [`RetrievalEngineBuilder`].
    pub fn builder() -> RetrievalEngineBuilder {
        RetrievalEngineBuilder::default()
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<ChunkIndex> {
        &self.index
    }

    pub fn status_tracker(&self) -> &Arc<StatusTracker> {
        &self.status
    }

    /// Create or replace the context for a paper.
    ///
    /// The paper counts as processed if the index already holds its chunks.
    pub async fn initialize_context(
        &self,
        paper_id: &str,
        paper_title: &str,
        paper_abstract: &str,
        pdf_url: &str,
    ) -> RetrievalContext {
        let is_pdf_processed = self.index.exists(paper_id);
        let context =
            RetrievalContext::new(paper_id, paper_title, paper_abstract, pdf_url, is_pdf_processed);

        self.contexts.write().await.insert(paper_id.to_string(), context.clone());
        info!(paper_id, pdf_processed = is_pdf_processed, "initialized retrieval context");
        context
    }

    /// Download, chunk, and index the paper's PDF unless that already happened.
    ///
    /// Returns `true` if the paper is processed afterwards. Every failure is
    /// logged, recorded in the paper's status, and reported as `false`; the
    /// paper keeps working from its abstract.
    pub async fn process_if_needed(&self, paper_id: &str) -> bool {
        let pdf_url = {
            let contexts = self.contexts.read().await;
            match contexts.get(paper_id) {
                None => {
                    error!(paper_id, "no context found for paper");
                    return false;
                }
                Some(context) if context.is_pdf_processed => {
                    info!(paper_id, "PDF already processed");
                    return true;
                }
                Some(context) => context.pdf_url.clone(),
            }
        };

        match self.run_pipeline(paper_id, &pdf_url).await {
            Ok(chunk_count) => {
                if let Some(context) = self.contexts.write().await.get_mut(paper_id) {
                    context.is_pdf_processed = true;
                }
                self.status.report(paper_id, ProcessingStatus::complete(chunk_count));
                info!(paper_id, chunk_count, "processed PDF");
                true
            }
            Err(e) => {
                let progress = self.status.get(paper_id).progress;
                self.status.report(paper_id, ProcessingStatus::failed(e.to_string(), progress));
                warn!(paper_id, error = %e, "PDF processing failed, continuing with abstract only");
                false
            }
        }
    }

    async fn run_pipeline(&self, paper_id: &str, pdf_url: &str) -> Result<usize> {
        self.status.report(paper_id, ProcessingStatus::in_phase(ProcessingPhase::Downloading, 0.0));
        let text =
            self.pipeline.download_and_extract(pdf_url, paper_id, self.status.as_ref()).await?;

        let span = progress::CHUNKING_END - progress::EXTRACTION_END;
        let chunks = self.chunker.chunk_with_progress(&text, paper_id, |fraction| {
            self.status.report(
                paper_id,
                ProcessingStatus::in_phase(
                    ProcessingPhase::Chunking,
                    progress::EXTRACTION_END + fraction * span,
                ),
            );
        })?;

        let chunk_count = chunks.len();
        if chunk_count == 0 {
            return Err(RagError::EmptyInput);
        }
        self.index.store(paper_id, chunks).await?;
        Ok(chunk_count)
    }

    /// Free-text search within a paper.
    ///
    /// A repeat of the previous query within the cache TTL replays the cached
    /// chunks with score 1.0 and skips scoring. Otherwise the index ranks
    /// the chunks and results carry rank-based scores
    /// (`max(0.1, 1.0 - 0.15 * rank)`), not the scorer's raw values. Returns
    /// nothing if the paper has no context or no processed PDF.
    pub async fn search_semantic(
        &self,
        paper_id: &str,
        query: &str,
        top_k: usize,
        use_cache: bool,
    ) -> Vec<SearchResult> {
        {
            let contexts = self.contexts.read().await;
            let Some(context) = contexts.get(paper_id) else {
                error!(paper_id, "no context found for paper");
                return Vec::new();
            };

            if use_cache && context.cache_hit(query, self.config.cache_ttl(), Utc::now()) {
                debug!(paper_id, "using cached search results");
                return context.retrieved_chunks.iter().cloned().map(SearchResult::cached).collect();
            }

            if !context.is_pdf_processed {
                warn!(paper_id, "PDF not processed, cannot search full text");
                return Vec::new();
            }
        }

        let chunks = self.index.search(paper_id, query, top_k);
        if chunks.is_empty() {
            info!(paper_id, query, "no text search results");
            return Vec::new();
        }

        let results: Vec<SearchResult> = chunks
            .iter()
            .cloned()
            .enumerate()
            .map(|(rank, chunk)| SearchResult::ranked(chunk, rank))
            .collect();

        if let Some(context) = self.contexts.write().await.get_mut(paper_id) {
            context.record_search(query, chunks, Utc::now());
        }

        info!(paper_id, result_count = results.len(), "text search completed");
        results
    }

    /// Keyword-occurrence search within a processed paper. Never cached.
    pub async fn search_keyword<S: AsRef<str>>(
        &self,
        paper_id: &str,
        keywords: &[S],
        top_k: usize,
    ) -> Vec<SearchResult> {
        let processed = self
            .contexts
            .read()
            .await
            .get(paper_id)
            .is_some_and(|context| context.is_pdf_processed);
        if !processed {
            warn!(paper_id, "cannot perform keyword search, PDF not processed");
            return Vec::new();
        }

        let results: Vec<SearchResult> = self
            .index
            .search_by_keywords(paper_id, keywords, top_k)
            .into_iter()
            .enumerate()
            .map(|(rank, chunk)| SearchResult::ranked(chunk, rank))
            .collect();

        info!(paper_id, result_count = results.len(), "keyword search completed");
        results
    }

    /// A snapshot of the paper's context.
    pub async fn get_context(&self, paper_id: &str) -> Option<RetrievalContext> {
        self.contexts.read().await.get(paper_id).cloned()
    }

    /// Forget the paper's context and processing status. Indexed chunks stay
    /// on disk.
    pub async fn clear_context(&self, paper_id: &str) {
        if self.contexts.write().await.remove(paper_id).is_some() {
            info!(paper_id, "cleared retrieval context");
        }
        self.status.remove(paper_id);
    }

    /// Render the paper's context for an LLM prompt, or `None` without a context.
    pub async fn render_context(&self, paper_id: &str, max_tokens: usize) -> Option<String> {
        self.contexts.read().await.get(paper_id).map(|context| context.render(max_tokens))
    }

    /// [`search_semantic`](Self::search_semantic) with the configured `top_k`
    /// and the cache enabled.
    pub async fn search(&self, paper_id: &str, query: &str) -> Vec<SearchResult> {
        self.search_semantic(paper_id, query, self.config.top_k, true).await
    }

    /// [`render_context`](Self::render_context) with the configured
    /// `max_context_tokens`.
    pub async fn prompt_context(&self, paper_id: &str) -> Option<String> {
        self.render_context(paper_id, self.config.max_context_tokens).await
    }

    pub async fn get_processing_status(&self, paper_id: &str) -> PaperStatus {
        let status = self.status.get(paper_id);
        let (pdf_processed, has_context) = match self.contexts.read().await.get(paper_id) {
            Some(context) => (context.is_pdf_processed, true),
            None => (false, false),
        };

        PaperStatus {
            paper_id: paper_id.to_string(),
            is_processing: status.is_active(),
            phase: status.phase,
            progress: status.progress,
            error_message: status.error_message,
            total_chunks: status.total_chunks,
            processed_chunks: status.processed_chunks,
            pdf_processed,
            has_context,
        }
    }

    pub async fn stats(&self) -> EngineStats {
        EngineStats {
            active_contexts: self.contexts.read().await.len(),
            index: self.index.stats(),
        }
    }
}

/// Builder for constructing a [`RetrievalEngine`].
///
/// `index` and `pipeline` are required. `config` defaults to
/// [`RetrievalConfig::default()`] and a fresh [`StatusTracker`] is created
/// unless one is supplied.
#[derive(Default)]
pub struct RetrievalEngineBuilder {
    config: Option<RetrievalConfig>,
    index: Option<Arc<ChunkIndex>>,
    pipeline: Option<Arc<dyn PdfPipeline>>,
    status: Option<Arc<StatusTracker>>,
}

impl RetrievalEngineBuilder {
    pub fn config(mut self, config: RetrievalConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn index(mut self, index: Arc<ChunkIndex>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn pipeline(mut self, pipeline: Arc<dyn PdfPipeline>) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    /// Share a status tracker with other components, e.g. an HTTP status route.
    pub fn status_tracker(mut self, status: Arc<StatusTracker>) -> Self {
        self.status = Some(status);
        self
    }

    /// Build the [`RetrievalEngine`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `index` or `pipeline` is missing,
    /// or if the config has a zero `chunk_size`.
    pub fn build(self) -> Result<RetrievalEngine> {
        let config = self.config.unwrap_or_default();
        if config.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        let index =
            self.index.ok_or_else(|| RagError::ConfigError("index is required".to_string()))?;
        let pipeline = self
            .pipeline
            .ok_or_else(|| RagError::ConfigError("pipeline is required".to_string()))?;

        Ok(RetrievalEngine {
            chunker: SentenceChunker::new(config.chunk_size, config.chunk_overlap),
            config,
            index,
            pipeline,
            status: self.status.unwrap_or_default(),
            contexts: RwLock::new(HashMap::new()),
        })
    }
}
