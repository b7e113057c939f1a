//! Per-paper chunk index with durable JSON persistence.
//!
//! [`ChunkIndex`] keeps every paper's chunks in memory behind a
//! `std::sync::RwLock` and mirrors them to one JSON record per paper. Reads
//! never touch the disk and never wait on a write in progress; disk writes
//! are serialized by a single store-wide async mutex.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::document::DocumentChunk;
use crate::error::{RagError, Result};
use crate::persistence;
use crate::scoring::{self, KeywordMatcher};

/// A chunk paired with the raw relevance score the scorer gave it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f64,
}

/// Index-wide counters.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexStats {
    pub total_papers: usize,
    pub total_chunks: usize,
    pub persist_directory: PathBuf,
}

/// Durable store of [`DocumentChunk`] sets, one set per paper.
///
/// # Example
///
/// ```rust,ignore
/// use paperpal_rag::ChunkIndex;
///
/// let index = ChunkIndex::open("data/text_db").await?;
/// index.store("2401.12345", chunks).await?;
/// let hits = index.search("2401.12345", "attention heads", 5);
/// ```
#[derive(Debug)]
pub struct ChunkIndex {
    dir: PathBuf,
    papers: RwLock<HashMap<String, Arc<[DocumentChunk]>>>,
    write_lock: Mutex<()>,
}

impl ChunkIndex {
    /// Open the index rooted at `dir`, creating the directory if needed and
    /// loading every persisted record.
    ///
    /// Records that cannot be read are logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PersistenceError`] if the directory itself cannot
    /// be created or listed.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let dir_error = |source| RagError::PersistenceError { paper_id: String::new(), source };

        tokio::fs::create_dir_all(&dir).await.map_err(dir_error)?;
        let loaded = persistence::load_all_records(&dir).await.map_err(dir_error)?;

        let papers: HashMap<String, Arc<[DocumentChunk]>> =
            loaded.into_iter().map(|(paper_id, chunks)| (paper_id, chunks.into())).collect();
        info!(dir = %dir.display(), paper_count = papers.len(), "chunk index opened");

        Ok(Self { dir, papers: RwLock::new(papers), write_lock: Mutex::new(()) })
    }

    pub fn persist_directory(&self) -> &Path {
        &self.dir
    }

    /// Replace the chunk set for `paper_id`.
    ///
    /// An empty `chunks` is ignored with a warning and leaves any existing
    /// set untouched. Paper ids that differ only in characters the storage
    /// key replaces (`2401.12345` and `2401_12345`) share one record, so the
    /// later store evicts the earlier paper. The record is written to disk before the in-memory set
    /// changes, so a failed write leaves the index as it was.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PersistenceError`] if the record cannot be written.
    pub async fn store(&self, paper_id: &str, chunks: Vec<DocumentChunk>) -> Result<()> {
        if chunks.is_empty() {
            warn!(paper_id, "no chunks to store");
            return Ok(());
        }

        let _guard = self.write_lock.lock().await;
        persistence::save_record(&self.dir, paper_id, &chunks).await.map_err(|source| {
            RagError::PersistenceError { paper_id: paper_id.to_string(), source }
        })?;

        let chunk_count = chunks.len();
        let mut papers = self.write_papers();
        if let Some(displaced) = sharing_record(&papers, paper_id) {
            // the record on disk now belongs to paper_id alone
            papers.remove(&displaced);
            warn!(
                paper_id,
                displaced = %displaced,
                "paper ids share a storage key, replaced the earlier paper"
            );
        }
        papers.insert(paper_id.to_string(), chunks.into());
        info!(paper_id, chunk_count, "stored chunks");
        Ok(())
    }

    /// Whether a non-empty chunk set is held for `paper_id`.
    pub fn exists(&self, paper_id: &str) -> bool {
        self.read_papers().get(paper_id).is_some_and(|chunks| !chunks.is_empty())
    }

    /// The stored chunk set for `paper_id`, in chunk order.
    pub fn chunks(&self, paper_id: &str) -> Option<Arc<[DocumentChunk]>> {
        self.read_papers().get(paper_id).cloned()
    }

    /// Rank `paper_id`'s chunks against a free-text query.
    ///
    /// Returns at most `top_k` chunks, most relevant first.
    pub fn search(&self, paper_id: &str, query: &str, top_k: usize) -> Vec<DocumentChunk> {
        self.search_scored(paper_id, query, top_k).into_iter().map(|hit| hit.chunk).collect()
    }

    /// Like [`search`](Self::search), keeping the scorer's raw scores.
    ///
    /// Chinese section words in the query are expanded to English headings.
    /// When the query yields no terms at all, chunks containing the query
    /// verbatim (case-insensitive) are returned in chunk order with score 1.0.
    pub fn search_scored(&self, paper_id: &str, query: &str, top_k: usize) -> Vec<ScoredChunk> {
        let Some(chunks) = self.chunks(paper_id).filter(|chunks| !chunks.is_empty()) else {
            info!(paper_id, "no chunks found for paper");
            return Vec::new();
        };

        let terms = scoring::query_terms(query);
        if terms.is_empty() {
            let needle = query.to_lowercase();
            let hits: Vec<ScoredChunk> = chunks
                .iter()
                .filter(|chunk| chunk.content().to_lowercase().contains(&needle))
                .take(top_k)
                .map(|chunk| ScoredChunk { chunk: chunk.clone(), score: 1.0 })
                .collect();
            info!(paper_id, result_count = hits.len(), "substring search completed");
            return hits;
        }

        let candidates = chunks.iter().map(|chunk| {
            let score = scoring::score(&chunk.content().to_lowercase(), &terms);
            (chunk, score)
        });
        let hits: Vec<ScoredChunk> = scoring::rank(candidates, top_k)
            .into_iter()
            .map(|(chunk, score)| ScoredChunk { chunk: chunk.clone(), score })
            .collect();

        info!(paper_id, result_count = hits.len(), "keyword relevance search completed");
        hits
    }

    /// Rank `paper_id`'s chunks by literal keyword occurrences.
    ///
    /// Chunks with no occurrences are dropped; ties keep chunk order.
    pub fn search_by_keywords<S: AsRef<str>>(
        &self,
        paper_id: &str,
        keywords: &[S],
        top_k: usize,
    ) -> Vec<DocumentChunk> {
        let Some(chunks) = self.chunks(paper_id) else {
            return Vec::new();
        };

        let matcher = KeywordMatcher::new(keywords);
        if matcher.is_empty() {
            return Vec::new();
        }

        let counts =
            chunks.iter().map(|chunk| (chunk, occurrence_score(matcher.count(chunk.content()))));
        let hits: Vec<DocumentChunk> = scoring::rank(counts, top_k)
            .into_iter()
            .map(|(chunk, _)| chunk.clone())
            .collect();

        info!(paper_id, result_count = hits.len(), "keyword occurrence search completed");
        hits
    }

    /// Remove `paper_id` from memory and disk. Deleting an unknown paper is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PersistenceError`] if the record exists but cannot
    /// be removed.
    pub async fn delete(&self, paper_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(removed) = self.write_papers().remove(paper_id) {
            info!(paper_id, chunk_count = removed.len(), "deleted chunks");
        }
        persistence::remove_record(&self.dir, paper_id)
            .await
            .map_err(|source| RagError::PersistenceError { paper_id: paper_id.to_string(), source })
    }

    /// Drop every paper from memory and disk.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PersistenceError`] if a record cannot be removed.
    pub async fn reset(&self) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write_papers().clear();
        persistence::remove_all_records(&self.dir)
            .await
            .map_err(|source| RagError::PersistenceError { paper_id: String::new(), source })?;
        warn!(dir = %self.dir.display(), "chunk index reset, all records deleted");
        Ok(())
    }

    pub fn stats(&self) -> IndexStats {
        let papers = self.read_papers();
        IndexStats {
            total_papers: papers.len(),
            total_chunks: papers.values().map(|chunks| chunks.len()).sum(),
            persist_directory: self.dir.clone(),
        }
    }

    fn read_papers(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<[DocumentChunk]>>> {
        self.papers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_papers(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<[DocumentChunk]>>> {
        self.papers.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Another paper held in `papers` whose storage key collides with `paper_id`.
fn sharing_record(
    papers: &HashMap<String, Arc<[DocumentChunk]>>,
    paper_id: &str,
) -> Option<String> {
    let key = persistence::storage_key(paper_id);
    papers
        .keys()
        .find(|other| other.as_str() != paper_id && persistence::storage_key(other) == key)
        .cloned()
}

/// Occurrence count as a rankable score, saturating at `u32::MAX`.
fn occurrence_score(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}
