//! Per-entry ingestion error taxonomy.
//!
//! Every ingestion-path failure is captured per entry and returned in an
//! errors collection rather than thrown, so a batch or archive never fails
//! atomically because of one bad member. Command-level plumbing uses
//! `anyhow::Result`; these variants carry the cases callers branch on.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum IngestError {
    /// Identical content already exists as an active document. Non-fatal;
    /// reported with the existing document's reference.
    #[error("duplicate of existing document '{display_name}' ({document_id})")]
    DuplicateDetected {
        document_id: String,
        display_name: String,
    },

    /// No extractor is registered for the media type. The entry is skipped,
    /// the batch continues.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Extraction produced no text; the document is stored but unsearchable.
    #[error("extraction degraded: {0}")]
    ExtractionDegraded(String),

    /// The vector index rejected the upsert; the document is persisted with
    /// search visibility degraded.
    #[error("indexing failed: {0}")]
    IndexingFailed(String),

    /// A single archive entry could not be processed; the job continues.
    #[error("archive entry '{name}': {reason}")]
    ArchiveEntry { name: String, reason: String },
}
