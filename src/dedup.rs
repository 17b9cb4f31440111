//! Duplicate gate run before any write.
//!
//! Computes the strong content identity (SHA-256 over the full bytes) and a
//! normalized-filename fingerprint, then surfaces near-duplicate names as
//! warnings. Pure with respect to storage: this module never deletes or
//! blocks on its own; the caller decides whether to abort. Under racing
//! uploads of identical bytes, the partial unique index on
//! `documents(content_hash)` is the final authority.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};

use crate::models::{DocumentRef, DuplicateCheck, SimilarDocument};

/// Name-similarity ratio at or above which a document is surfaced as a
/// near-duplicate warning (not a rejection).
pub const SIMILARITY_THRESHOLD: f64 = 0.8;

/// Run the duplicate gate for an incoming file.
pub async fn check(pool: &SqlitePool, bytes: &[u8], filename: &str) -> Result<DuplicateCheck> {
    let content_hash = content_hash(bytes);
    let normalized = normalize_filename(filename);
    let name_hash = hash_hex(normalized.as_bytes());

    let matched_document = sqlx::query(
        "SELECT id, display_name FROM documents WHERE content_hash = ? AND active = 1",
    )
    .bind(&content_hash)
    .fetch_optional(pool)
    .await?
    .map(|row| DocumentRef {
        id: row.get("id"),
        display_name: row.get("display_name"),
    });

    // Similarity pass over active documents. The name-hash bucket is the
    // cheap pre-filter; the broader candidate scan catches renamed copies.
    let rows = sqlx::query("SELECT id, display_name, original_name FROM documents WHERE active = 1")
        .fetch_all(pool)
        .await?;

    let mut similar_documents = Vec::new();
    for row in rows {
        let id: String = row.get("id");
        if let Some(ref matched) = matched_document {
            if matched.id == id {
                continue;
            }
        }
        let original_name: String = row.get("original_name");
        let ratio = name_similarity(&normalized, &normalize_filename(&original_name));
        if ratio >= SIMILARITY_THRESHOLD {
            similar_documents.push(SimilarDocument {
                id,
                display_name: row.get("display_name"),
                similarity: ratio,
            });
        }
    }
    similar_documents.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(DuplicateCheck {
        is_duplicate: matched_document.is_some(),
        matched_document,
        similar_documents,
        content_hash,
        name_hash,
    })
}

/// Strong whole-content digest, the document's canonical identity.
pub fn content_hash(bytes: &[u8]) -> String {
    hash_hex(bytes)
}

/// Digest of the normalized filename, used only as a cheap pre-filter bucket.
pub fn name_hash(filename: &str) -> String {
    hash_hex(normalize_filename(filename).as_bytes())
}

fn hash_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Lowercase, strip the extension, collapse punctuation and whitespace runs
/// to single spaces.
pub fn normalize_filename(name: &str) -> String {
    let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(name);
    stem.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Token-sorted normalized Levenshtein ratio between two normalized names,
/// so word order does not mask a near-duplicate.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let sorted = |s: &str| {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    };
    strsim::normalized_levenshtein(&sorted(a), &sorted(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_deterministic() {
        let bytes = b"the same content";
        assert_eq!(content_hash(bytes), content_hash(bytes));
    }

    #[test]
    fn different_content_hashes_differ() {
        assert_ne!(content_hash(b"alpha"), content_hash(b"beta"));
    }

    #[test]
    fn filename_normalization() {
        assert_eq!(
            normalize_filename("Q3--Pricing_Sheet  (final).PDF"),
            "q3 pricing sheet final"
        );
        assert_eq!(normalize_filename("notes"), "notes");
    }

    #[test]
    fn name_hash_ignores_extension_and_case() {
        assert_eq!(name_hash("Pricing Sheet.pdf"), name_hash("pricing_sheet.docx"));
    }

    #[test]
    fn similar_names_clear_the_threshold() {
        let ratio = name_similarity(
            &normalize_filename("q3 pricing sheet.pdf"),
            &normalize_filename("Pricing Sheet Q3 (1).pdf"),
        );
        assert!(ratio >= SIMILARITY_THRESHOLD, "ratio was {}", ratio);
    }

    #[test]
    fn unrelated_names_stay_below_threshold() {
        let ratio = name_similarity(
            &normalize_filename("q3 pricing sheet.pdf"),
            &normalize_filename("employee handbook.docx"),
        );
        assert!(ratio < SIMILARITY_THRESHOLD, "ratio was {}", ratio);
    }

    #[test]
    fn identical_names_score_one() {
        let ratio = name_similarity("pricing sheet", "pricing sheet");
        assert!((ratio - 1.0).abs() < 1e-9);
    }
}
