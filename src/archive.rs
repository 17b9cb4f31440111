//! Archive ingestion: walk a zip bundle and drive the document pipeline
//! per entry.
//!
//! Directory paths are recreated as folder records, deduplicated by
//! `(parent, name)` so re-running the same archive creates no siblings.
//! Failures are per-entry: an unreadable, unsafe, oversize, or unsupported entry is
//! appended to `errors` and the walk continues; the job never aborts
//! wholesale. There is no checkpoint state; a re-run relies entirely on the
//! duplicate gate to skip already-ingested documents.

use anyhow::Result;
use sqlx::SqlitePool;
use std::io::Read;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::IngestError;
use crate::extract;
use crate::folders;
use crate::index::VectorIndex;
use crate::ingest::{ingest_document, DocumentOutcome};
use crate::models::DocumentRef;

/// Outcome of one archive ingestion job.
#[derive(Debug, Default)]
pub struct ArchiveSummary {
    /// File entries successfully extracted from the archive.
    pub extracted_count: usize,
    /// Names of folders newly created while recreating directory paths.
    pub folders_created: Vec<String>,
    pub documents_created: Vec<DocumentRef>,
    /// Entries whose content already existed as an active document.
    pub skipped_duplicates: Vec<DocumentRef>,
    pub errors: Vec<IngestError>,
}

enum EntryData {
    Dir(PathBuf),
    File { path: PathBuf, data: Vec<u8> },
}

/// Ingest every entry of a zip archive under `target_folder_id`.
pub async fn ingest_archive(
    pool: &SqlitePool,
    config: &Config,
    index: &VectorIndex,
    bytes: &[u8],
    target_folder_id: Option<&str>,
) -> Result<ArchiveSummary> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| anyhow::anyhow!("not a readable zip archive: {}", e))?;

    let mut summary = ArchiveSummary::default();

    for i in 0..archive.len() {
        // The zip entry borrows the archive; read it fully before any await.
        let entry_data = read_entry(&mut archive, i, config.archive.max_entry_bytes);

        match entry_data {
            Err(e) => summary.errors.push(e),
            Ok(EntryData::Dir(path)) => {
                let components = path_components(&path);
                match folders::ensure_path(pool, target_folder_id, &components).await {
                    Ok((_, created)) => summary.folders_created.extend(created),
                    Err(e) => summary.errors.push(IngestError::ArchiveEntry {
                        name: path.display().to_string(),
                        reason: e.to_string(),
                    }),
                }
            }
            Ok(EntryData::File { path, data }) => {
                summary.extracted_count += 1;

                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());

                let parent_refs: Vec<&str> =
                    path.parent().map(path_components).unwrap_or_default();

                let folder_id = match folders::ensure_path(pool, target_folder_id, &parent_refs)
                    .await
                {
                    Ok((folder_id, created)) => {
                        summary.folders_created.extend(created);
                        folder_id.or_else(|| target_folder_id.map(|s| s.to_string()))
                    }
                    Err(e) => {
                        summary.errors.push(IngestError::ArchiveEntry {
                            name: path.display().to_string(),
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };

                let media_type = extract::media_type_for_path(&filename);
                match ingest_document(
                    pool,
                    config,
                    index,
                    &data,
                    &filename,
                    media_type,
                    folder_id.as_deref(),
                )
                .await
                {
                    Ok(DocumentOutcome::Created(doc)) => summary.documents_created.push(doc),
                    Ok(DocumentOutcome::Unsupported { media_type }) => {
                        summary.errors.push(IngestError::ArchiveEntry {
                            name: path.display().to_string(),
                            reason: IngestError::UnsupportedFormat(media_type).to_string(),
                        });
                    }
                    Ok(DocumentOutcome::Duplicate { existing }) => {
                        tracing::info!(
                            entry = %path.display(),
                            existing = %existing.id,
                            "archive entry skipped as exact duplicate"
                        );
                        summary.skipped_duplicates.push(existing);
                    }
                    Err(e) => summary.errors.push(IngestError::ArchiveEntry {
                        name: path.display().to_string(),
                        reason: e.to_string(),
                    }),
                }
            }
        }
    }

    tracing::info!(
        extracted = summary.extracted_count,
        created = summary.documents_created.len(),
        duplicates = summary.skipped_duplicates.len(),
        errors = summary.errors.len(),
        "archive ingestion finished"
    );

    Ok(summary)
}

fn read_entry(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    index: usize,
    max_bytes: u64,
) -> Result<EntryData, IngestError> {
    let entry = archive
        .by_index(index)
        .map_err(|e| IngestError::ArchiveEntry {
            name: format!("#{}", index),
            reason: e.to_string(),
        })?;

    let raw_name = entry.name().to_string();
    let path = entry
        .enclosed_name()
        .ok_or_else(|| IngestError::ArchiveEntry {
            name: raw_name.clone(),
            reason: "unsafe entry path".to_string(),
        })?;

    if entry.is_dir() {
        return Ok(EntryData::Dir(path));
    }

    let mut data = Vec::new();
    entry
        .take(max_bytes + 1)
        .read_to_end(&mut data)
        .map_err(|e| IngestError::ArchiveEntry {
            name: raw_name.clone(),
            reason: e.to_string(),
        })?;
    if data.len() as u64 > max_bytes {
        return Err(IngestError::ArchiveEntry {
            name: raw_name,
            reason: format!("entry exceeds size limit ({} bytes)", max_bytes),
        });
    }

    Ok(EntryData::File { path, data })
}

fn path_components(path: &std::path::Path) -> Vec<&str> {
    path.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => s.to_str(),
            _ => None,
        })
        .collect()
}
