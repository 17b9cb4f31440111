//! Namespace-scoped vector index over SQLite.
//!
//! Upserts replace a document's prior chunk set in one transaction, so
//! re-indexing N times leaves exactly the current chunk count. Queries embed
//! the text and rank by cosine similarity within a single namespace; a query
//! against namespace A never surfaces chunks indexed under namespace B.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob, Embedder};
use crate::models::Chunk;

/// A ranked chunk returned from a namespace query.
#[derive(Debug, Clone)]
pub struct ChunkMatch {
    pub chunk_id: String,
    pub document_id: String,
    pub document_name: String,
    pub text: String,
    pub score: f64,
}

pub struct VectorIndex {
    pool: SqlitePool,
    embedder: Box<dyn Embedder>,
}

impl VectorIndex {
    pub fn new(pool: SqlitePool, embedder: Box<dyn Embedder>) -> Self {
        Self { pool, embedder }
    }

    /// Replace the document's indexed chunk set with `chunks`. Safe to
    /// retry; keyed by `document_id`.
    pub async fn upsert(
        &self,
        document_id: &str,
        chunks: &[Chunk],
        namespace: &str,
        document_name: &str,
    ) -> Result<()> {
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await?;

        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            sqlx::query(
                r#"
                INSERT INTO chunk_vectors (chunk_id, document_id, namespace, document_name, embedding)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.id)
            .bind(document_id)
            .bind(namespace)
            .bind(document_name)
            .bind(vec_to_blob(embedding))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Rank the namespace's chunks against `text` and return the top `k`.
    pub async fn query(&self, namespace: &str, text: &str, k: i64) -> Result<Vec<ChunkMatch>> {
        let query_vec = self
            .embedder
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

        let rows = sqlx::query(
            r#"
            SELECT cv.chunk_id, cv.document_id, cv.document_name, cv.embedding,
                   COALESCE(c.text, '') AS text
            FROM chunk_vectors cv
            LEFT JOIN chunks c ON c.id = cv.chunk_id
            WHERE cv.namespace = ?
            "#,
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;

        let mut matches: Vec<ChunkMatch> = rows
            .iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let vec = blob_to_vec(&blob);
                ChunkMatch {
                    chunk_id: row.get("chunk_id"),
                    document_id: row.get("document_id"),
                    document_name: row.get("document_name"),
                    text: row.get("text"),
                    score: cosine_similarity(&query_vec, &vec) as f64,
                }
            })
            .collect();

        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        matches.truncate(k.max(0) as usize);

        Ok(matches)
    }

    /// Drop every vector indexed for a document. Called by the external
    /// delete collaborator when a document is removed.
    pub async fn remove(&self, document_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM chunk_vectors WHERE document_id = ?")
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Indexed chunk count for a document (test and diagnostics helper).
    pub async fn chunk_count(&self, document_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM chunk_vectors WHERE document_id = ?")
                .bind(document_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
