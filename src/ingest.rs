//! Upload boundary and the document ingestion pipeline.
//!
//! Every file follows the same path: duplicate gate → normalize → chunk →
//! index upsert → document row, so a document row only exists once its
//! content has an index representation (or an explicit unsearchable
//! fallback). Files in a batch are processed sequentially to keep peak
//! memory bounded. Archives are dispatched to [`crate::archive`], which
//! re-enters this pipeline per extracted entry.

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::archive::{self, ArchiveSummary};
use crate::chunk::chunk_text;
use crate::config::Config;
use crate::dedup;
use crate::error::IngestError;
use crate::extract;
use crate::folders;
use crate::index::VectorIndex;
use crate::models::{Chunk, Document, DocumentRef};

/// One file handed over by the upload collaborator.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub bytes: Vec<u8>,
    pub original_filename: String,
    pub media_type: String,
    pub target_folder_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Document,
    Archive,
}

/// Per-file outcome returned to the upload collaborator.
#[derive(Debug)]
pub enum UploadOutcome {
    Created(DocumentRef),
    Duplicate { existing: DocumentRef },
    Archive(ArchiveSummary),
    Error(String),
}

#[derive(Debug)]
pub struct FileResult {
    pub filename: String,
    pub kind: UploadKind,
    pub outcome: UploadOutcome,
}

/// Outcome of the single-document pipeline.
#[derive(Debug)]
pub enum DocumentOutcome {
    Created(DocumentRef),
    Duplicate { existing: DocumentRef },
    /// No extractor is registered for the media type; nothing was stored.
    Unsupported { media_type: String },
}

/// Ingest an ordered batch of uploads. Files are processed one at a time;
/// a failure on one file becomes its `Error` outcome and the batch
/// continues.
pub async fn ingest_batch(
    pool: &SqlitePool,
    config: &Config,
    index: &VectorIndex,
    files: Vec<UploadFile>,
) -> Vec<FileResult> {
    let mut results = Vec::with_capacity(files.len());

    for file in files {
        let kind = if file.media_type == extract::MIME_ZIP {
            UploadKind::Archive
        } else {
            UploadKind::Document
        };

        let outcome = match kind {
            UploadKind::Archive => {
                match archive::ingest_archive(
                    pool,
                    config,
                    index,
                    &file.bytes,
                    file.target_folder_id.as_deref(),
                )
                .await
                {
                    Ok(summary) => UploadOutcome::Archive(summary),
                    Err(e) => UploadOutcome::Error(e.to_string()),
                }
            }
            UploadKind::Document => {
                match ingest_document(
                    pool,
                    config,
                    index,
                    &file.bytes,
                    &file.original_filename,
                    &file.media_type,
                    file.target_folder_id.as_deref(),
                )
                .await
                {
                    Ok(DocumentOutcome::Created(doc)) => UploadOutcome::Created(doc),
                    Ok(DocumentOutcome::Duplicate { existing }) => {
                        UploadOutcome::Duplicate { existing }
                    }
                    Ok(DocumentOutcome::Unsupported { media_type }) => {
                        UploadOutcome::Error(IngestError::UnsupportedFormat(media_type).to_string())
                    }
                    Err(e) => UploadOutcome::Error(e.to_string()),
                }
            }
        };

        results.push(FileResult {
            filename: file.original_filename,
            kind,
            outcome,
        });
    }

    results
}

/// Run one file through the document pipeline.
pub async fn ingest_document(
    pool: &SqlitePool,
    config: &Config,
    index: &VectorIndex,
    bytes: &[u8],
    filename: &str,
    media_type: &str,
    folder_id: Option<&str>,
) -> Result<DocumentOutcome> {
    // Gate before any write; the caller decides nothing here, identical content
    // is simply reported against the existing document.
    let check = dedup::check(pool, bytes, filename).await?;
    if let Some(existing) = check.matched_document {
        tracing::info!(
            filename,
            existing = %existing.id,
            "{}",
            IngestError::DuplicateDetected {
                document_id: existing.id.clone(),
                display_name: existing.display_name.clone(),
            }
        );
        return Ok(DocumentOutcome::Duplicate { existing });
    }
    for similar in &check.similar_documents {
        tracing::warn!(
            filename,
            similar_to = %similar.display_name,
            similarity = similar.similarity,
            "near-duplicate filename; upload proceeds"
        );
    }

    // Unsupported types are skipped outright, not stored as dead rows; the
    // caller sees the skip in its errors collection or outcome.
    if !extract::is_supported(media_type) {
        tracing::warn!(
            filename,
            "{}",
            IngestError::UnsupportedFormat(media_type.to_string())
        );
        return Ok(DocumentOutcome::Unsupported {
            media_type: media_type.to_string(),
        });
    }

    let text = extract::normalize(bytes, media_type);
    if text.trim().is_empty() && !bytes.is_empty() {
        tracing::warn!(
            filename,
            media_type,
            "{}",
            IngestError::ExtractionDegraded("no text extracted".to_string())
        );
    }

    let doc_id = Uuid::new_v4().to_string();
    let chunks = chunk_text(&doc_id, &text, config.chunking.chunk_size_words);
    let namespace = folders::namespace_for(pool, folder_id).await?;

    // Index before the document row so a visible document always has a
    // durable index representation. An index failure degrades search
    // visibility but still persists the document.
    let mut searchable = !chunks.is_empty();
    if !chunks.is_empty() {
        if let Err(e) = index.upsert(&doc_id, &chunks, &namespace, filename).await {
            searchable = false;
            tracing::error!(
                filename,
                "{}",
                IngestError::IndexingFailed(e.to_string())
            );
        }
    }

    let now = chrono::Utc::now().timestamp();
    let insert = sqlx::query(
        r#"
        INSERT INTO documents (id, display_name, original_name, media_type, byte_size,
                               storage_path, content_hash, name_hash, folder_id,
                               active, searchable, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, NULL, ?, ?, ?, 1, ?, ?, ?)
        "#,
    )
    .bind(&doc_id)
    .bind(filename)
    .bind(filename)
    .bind(media_type)
    .bind(bytes.len() as i64)
    .bind(&check.content_hash)
    .bind(&check.name_hash)
    .bind(folder_id)
    .bind(searchable as i64)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await;

    match insert {
        Ok(_) => {}
        // A concurrent upload of identical bytes won the race; the unique
        // index is the final authority, so reinterpret as a duplicate.
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            index.remove(&doc_id).await?;
            let existing = sqlx::query_as::<_, (String, String)>(
                "SELECT id, display_name FROM documents WHERE content_hash = ? AND active = 1",
            )
            .bind(&check.content_hash)
            .fetch_one(pool)
            .await?;
            return Ok(DocumentOutcome::Duplicate {
                existing: DocumentRef {
                    id: existing.0,
                    display_name: existing.1,
                },
            });
        }
        Err(e) => return Err(e.into()),
    }

    replace_chunks(pool, &doc_id, &chunks).await?;

    Ok(DocumentOutcome::Created(DocumentRef {
        id: doc_id,
        display_name: filename.to_string(),
    }))
}

/// Active documents in upload order. Backs the CLI listing.
pub async fn list_documents(pool: &SqlitePool) -> Result<Vec<Document>> {
    let docs = sqlx::query_as::<_, Document>(
        r#"
        SELECT id, display_name, original_name, media_type, byte_size, storage_path,
               content_hash, name_hash, folder_id, active, searchable,
               created_at, updated_at
        FROM documents WHERE active = 1 ORDER BY created_at
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(docs)
}

/// Replace the document's stored chunk set wholesale (upsert, not append).
async fn replace_chunks(pool: &SqlitePool, document_id: &str, chunks: &[Chunk]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM chunks WHERE document_id = ?")
        .bind(document_id)
        .execute(&mut *tx)
        .await?;

    for chunk in chunks {
        sqlx::query(
            r#"
            INSERT INTO chunks (id, document_id, chunk_index, text, token_count, start_word, end_word)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chunk.id)
        .bind(&chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(&chunk.text)
        .bind(chunk.token_count)
        .bind(chunk.start_word)
        .bind(chunk.end_word)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}
