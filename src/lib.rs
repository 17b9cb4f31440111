//! # kb-pipeline
//!
//! A knowledge ingestion and retrieval pipeline for sales-agent assistants.
//!
//! Uploads (documents and zip archives) are deduplicated, normalized to
//! plain text, chunked on word boundaries, and indexed per-folder in a
//! namespace-scoped vector index. Queries are routed through an ordered
//! fallback (curated FAQ, then the document corpus, then live web search)
//! under a single sensitivity threshold.
//!
//! ## Architecture
//!
//! ```text
//! uploads ──▶ DuplicateGuard ──▶ Normalizer ──▶ Chunker ──▶ VectorIndex
//!                  │ gate                                      (SQLite,
//!                  ▼                                        per-namespace)
//!             zip archives ──▶ ArchiveIngestor ──┐
//!                              (per entry) ──────┘
//!
//! queries ──▶ RetrievalRouter ──▶ { FAQ │ documents │ web } ──▶ answer
//!                                                               + provenance
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Per-entry ingestion error taxonomy |
//! | [`dedup`] | Content/name hashing and the similarity pass |
//! | [`extract`] | Format-handler table for text extraction |
//! | [`chunk`] | Word-boundary chunking |
//! | [`embedding`] | Embedding providers and vector utilities |
//! | [`index`] | Namespace-scoped vector index |
//! | [`folders`] | Folder tree with stable namespaces |
//! | [`archive`] | Zip archive ingestion |
//! | [`ingest`] | Upload boundary and document pipeline |
//! | [`faq`] | Curated FAQ read side |
//! | [`websearch`] | Web-search fallback collaborator |
//! | [`router`] | Ordered-fallback retrieval routing |
//! | [`db`] | Database open: pool setup plus migrations |
//! | [`migrate`] | Schema migrations |

pub mod archive;
pub mod chunk;
pub mod config;
pub mod db;
pub mod dedup;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod faq;
pub mod folders;
pub mod index;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod router;
pub mod websearch;
