//! Core data models used throughout the knowledge pipeline.
//!
//! These types represent the documents, chunks, folders, and routed answers
//! that flow through the ingestion and retrieval paths.

use std::fmt;
use std::str::FromStr;

/// Normalized document stored in SQLite.
///
/// At most one *active* document may exist per `content_hash`; the partial
/// unique index created in [`crate::migrate`] is the final authority under
/// concurrent uploads of identical bytes.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Document {
    pub id: String,
    pub display_name: String,
    pub original_name: String,
    pub media_type: String,
    pub byte_size: i64,
    pub storage_path: Option<String>,
    pub content_hash: String,
    pub name_hash: String,
    pub folder_id: Option<String>,
    pub active: bool,
    pub searchable: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Minimal reference to an existing document, used in duplicate reports
/// and upload outcomes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub id: String,
    pub display_name: String,
}

/// A chunk of a document's normalized text.
///
/// Chunk ids are `{document_id}_chunk_{index}`, deterministic for a given
/// document and chunking configuration. Offsets are word offsets into the
/// whitespace-normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: i64,
    pub text: String,
    pub token_count: i64,
    pub start_word: i64,
    pub end_word: i64,
}

/// Organizational folder. `namespace` scopes vector-index queries and never
/// changes after creation (index entries would orphan otherwise).
#[derive(Debug, Clone)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub namespace: String,
}

/// Curated question/answer entry. CRUD lifecycle is owned by an external
/// collaborator; the router only reads these.
#[derive(Debug, Clone)]
pub struct FaqEntry {
    pub id: String,
    pub question: String,
    pub answer: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub priority: i64,
    pub active: bool,
}

/// A knowledge source the router can draw an answer from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KnowledgeSource {
    Faq,
    Documents,
    Web,
}

impl KnowledgeSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            KnowledgeSource::Faq => "faq",
            KnowledgeSource::Documents => "documents",
            KnowledgeSource::Web => "web",
        }
    }
}

impl fmt::Display for KnowledgeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KnowledgeSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "faq" => Ok(KnowledgeSource::Faq),
            "documents" => Ok(KnowledgeSource::Documents),
            "web" => Ok(KnowledgeSource::Web),
            other => Err(format!(
                "unknown knowledge source '{}'. Use faq, documents, or web.",
                other
            )),
        }
    }
}

/// One ranked result inside a routed answer. Produced fresh per query,
/// never persisted.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub content: String,
    pub citation: String,
    pub score: f64,
}

/// The router's best-effort answer with explicit provenance.
#[derive(Debug, Clone)]
pub struct RoutedAnswer {
    pub source: KnowledgeSource,
    pub results: Vec<SearchResult>,
}

/// A near-duplicate warning surfaced by the similarity pass.
#[derive(Debug, Clone)]
pub struct SimilarDocument {
    pub id: String,
    pub display_name: String,
    pub similarity: f64,
}

/// Result of the duplicate gate run before any write.
#[derive(Debug, Clone)]
pub struct DuplicateCheck {
    pub is_duplicate: bool,
    pub matched_document: Option<DocumentRef>,
    pub similar_documents: Vec<SimilarDocument>,
    pub content_hash: String,
    pub name_hash: String,
}

/// One turn of conversation context forwarded to a downstream generator.
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: String,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_roundtrips_through_str() {
        for s in [
            KnowledgeSource::Faq,
            KnowledgeSource::Documents,
            KnowledgeSource::Web,
        ] {
            assert_eq!(s.as_str().parse::<KnowledgeSource>().unwrap(), s);
        }
    }

    #[test]
    fn unknown_source_is_rejected() {
        assert!("wiki".parse::<KnowledgeSource>().is_err());
    }
}
