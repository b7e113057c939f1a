//! PDF processing status tracking.
//!
//! A paper's processing state is a single [`ProcessingPhase`] plus a progress
//! fraction, so combinations like "downloading and complete" cannot occur.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

/// Where a paper is in the download → extract → chunk pipeline.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingPhase {
    #[default]
    Idle,
    Downloading,
    Extracting,
    Chunking,
    Complete,
    Failed,
}

/// Progress bands each phase reports within.
pub mod progress {
    pub const DOWNLOAD_END: f32 = 0.5;
    pub const EXTRACTION_END: f32 = 0.8;
    pub const CHUNKING_END: f32 = 0.9;
}

/// Snapshot of one paper's processing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProcessingStatus {
    pub phase: ProcessingPhase,
    /// Fraction complete, `0.0..=1.0`.
    pub progress: f32,
    pub error_message: Option<String>,
    pub total_chunks: usize,
    pub processed_chunks: usize,
}

impl ProcessingStatus {
    pub fn idle() -> Self {
        Self::default()
    }

    /// Status in `phase` at `progress`, clamped to `[0, 1]`.
    pub fn in_phase(phase: ProcessingPhase, progress: f32) -> Self {
        Self { phase, progress: progress.clamp(0.0, 1.0), ..Self::default() }
    }

    pub fn failed(message: impl Into<String>, progress: f32) -> Self {
        Self {
            phase: ProcessingPhase::Failed,
            progress: progress.clamp(0.0, 1.0),
            error_message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn complete(total_chunks: usize) -> Self {
        Self {
            phase: ProcessingPhase::Complete,
            progress: 1.0,
            error_message: None,
            total_chunks,
            processed_chunks: total_chunks,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.phase,
            ProcessingPhase::Downloading | ProcessingPhase::Extracting | ProcessingPhase::Chunking
        )
    }
}

/// Receives processing updates for papers.
///
/// Implementations must be cheap; the chunker reports after every window.
pub trait StatusSink: Send + Sync {
    fn report(&self, paper_id: &str, status: ProcessingStatus);
}

/// In-memory [`StatusSink`] keeping the latest status per paper.
#[derive(Debug, Default)]
pub struct StatusTracker {
    statuses: RwLock<HashMap<String, ProcessingStatus>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest status for `paper_id`, or idle if nothing was reported.
    pub fn get(&self, paper_id: &str) -> ProcessingStatus {
        self.statuses
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(paper_id)
            .cloned()
            .unwrap_or_else(ProcessingStatus::idle)
    }

    /// Forget `paper_id`'s status.
    pub fn remove(&self, paper_id: &str) {
        self.statuses.write().unwrap_or_else(PoisonError::into_inner).remove(paper_id);
    }
}

impl StatusSink for StatusTracker {
    fn report(&self, paper_id: &str, status: ProcessingStatus) {
        self.statuses
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(paper_id.to_string(), status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_paper_is_idle() {
        let tracker = StatusTracker::new();
        let status = tracker.get("nope");
        assert_eq!(status.phase, ProcessingPhase::Idle);
        assert_eq!(status.progress, 0.0);
        assert!(!status.is_active());
    }

    #[test]
    fn latest_report_wins() {
        let tracker = StatusTracker::new();
        tracker.report("p", ProcessingStatus::in_phase(ProcessingPhase::Downloading, 0.2));
        assert!(tracker.get("p").is_active());

        tracker.report("p", ProcessingStatus::failed("Download failed: 404", 0.2));
        let status = tracker.get("p");
        assert_eq!(status.phase, ProcessingPhase::Failed);
        assert_eq!(status.error_message.as_deref(), Some("Download failed: 404"));

        tracker.remove("p");
        assert_eq!(tracker.get("p").phase, ProcessingPhase::Idle);
    }

    #[test]
    fn progress_is_clamped_and_complete_is_full() {
        assert_eq!(ProcessingStatus::in_phase(ProcessingPhase::Chunking, 1.7).progress, 1.0);
        let done = ProcessingStatus::complete(12);
        assert_eq!(done.progress, 1.0);
        assert_eq!(done.processed_chunks, 12);
    }

    #[test]
    fn phase_serializes_snake_case() {
        let json = serde_json::to_string(&ProcessingPhase::Downloading).unwrap();
        assert_eq!(json, "\"downloading\"");
    }
}
