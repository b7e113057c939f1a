//! JSON persistence for per-paper chunk records.
//!
//! Each paper lives in one `{key}.json` file holding an array of
//! [`ChunkRecord`]s. Writes go to a temp file first and are renamed into
//! place so a crash never leaves a half-written record behind.

use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{info, warn};

use crate::document::{ChunkRecord, DocumentChunk};

const RECORD_EXTENSION: &str = "json";

/// Filesystem-safe key for `paper_id`.
///
/// Path-hazard characters `<>:"/\|?*` become `_`, and so does `.`, which
/// would otherwise be confused with an extension (`2401.12345` →
/// `2401_12345`).
pub fn storage_key(paper_id: &str) -> String {
    paper_id
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' | '.' => '_',
            c => c,
        })
        .collect()
}

/// Path of the record for `paper_id` under `dir`.
pub fn record_path(dir: &Path, paper_id: &str) -> PathBuf {
    dir.join(format!("{}.{RECORD_EXTENSION}", storage_key(paper_id)))
}

/// Write a paper's chunks atomically: temp file, then rename.
pub async fn save_record(dir: &Path, paper_id: &str, chunks: &[DocumentChunk]) -> io::Result<()> {
    fs::create_dir_all(dir).await?;

    let records: Vec<ChunkRecord> = chunks.iter().cloned().map(ChunkRecord::from).collect();
    let bytes = serde_json::to_vec_pretty(&records)?;

    let path = record_path(dir, paper_id);
    let tmp_path = path.with_extension(format!("{RECORD_EXTENSION}.tmp"));
    fs::write(&tmp_path, &bytes).await?;
    fs::rename(&tmp_path, &path).await?;

    info!(paper_id, chunk_count = chunks.len(), path = %path.display(), "saved chunk record");
    Ok(())
}

/// Remove a paper's record. A missing record is not an error.
pub async fn remove_record(dir: &Path, paper_id: &str) -> io::Result<()> {
    match fs::remove_file(record_path(dir, paper_id)).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Read and validate one record file.
pub async fn load_record(path: &Path) -> io::Result<Vec<DocumentChunk>> {
    let raw = fs::read(path).await?;
    serde_json::from_slice(&raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Load every record under `dir`, keyed by paper id.
///
/// Unreadable or invalid records are logged and skipped. The paper id is
/// read from the chunks themselves, since the file name is a lossy key; a
/// record with no chunks falls back to its file stem.
pub async fn load_all_records(dir: &Path) -> io::Result<Vec<(String, Vec<DocumentChunk>)>> {
    if !fs::try_exists(dir).await? {
        return Ok(Vec::new());
    }

    let mut papers = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some(RECORD_EXTENSION) {
            continue;
        }
        match load_record(&path).await {
            Ok(chunks) => {
                let paper_id = match chunks.first() {
                    Some(chunk) => chunk.paper_id().to_string(),
                    None => match path.file_stem().and_then(|s| s.to_str()) {
                        Some(stem) => stem.to_string(),
                        None => continue,
                    },
                };
                info!(paper_id = %paper_id, chunk_count = chunks.len(), "loaded chunk record");
                papers.push((paper_id, chunks));
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable chunk record");
            }
        }
    }
    Ok(papers)
}

/// Delete every record under `dir`.
pub async fn remove_all_records(dir: &Path) -> io::Result<()> {
    if !fs::try_exists(dir).await? {
        return Ok(());
    }
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some(RECORD_EXTENSION) {
            fs::remove_file(&path).await?;
        }
    }
    Ok(())
}
