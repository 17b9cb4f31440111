//! Read side of the curated FAQ store.
//!
//! Entry CRUD is owned by an external collaborator; the router only needs a
//! best-match lookup. Confidence is the fraction of query tokens covered by
//! an entry's question, category, and tags, a [0, 1] scale the shared
//! sensitivity threshold is applied to directly.

use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use uuid::Uuid;

use crate::embedding::tokenize;
use crate::models::FaqEntry;

#[derive(Debug, Clone)]
pub struct FaqMatch {
    pub entry: FaqEntry,
    pub confidence: f64,
}

/// The active entry that best covers the query, or `None` when the store is
/// empty or nothing overlaps. Ties on confidence break by priority.
pub async fn best_match(pool: &SqlitePool, query: &str) -> Result<Option<FaqMatch>> {
    let query_tokens: Vec<String> = tokenize(query);
    if query_tokens.is_empty() {
        return Ok(None);
    }

    let entries = list_entries(pool).await?;

    let mut best: Option<FaqMatch> = None;
    for entry in entries.into_iter().filter(|e| e.active) {
        let confidence = match_confidence(&query_tokens, &entry);
        if confidence <= 0.0 {
            continue;
        }
        let better = match &best {
            None => true,
            Some(current) => {
                confidence > current.confidence
                    || (confidence == current.confidence && entry.priority > current.entry.priority)
            }
        };
        if better {
            best = Some(FaqMatch { entry, confidence });
        }
    }

    Ok(best)
}

fn match_confidence(query_tokens: &[String], entry: &FaqEntry) -> f64 {
    let mut entry_tokens: HashSet<String> = tokenize(&entry.question).into_iter().collect();
    if let Some(ref category) = entry.category {
        entry_tokens.extend(tokenize(category));
    }
    for tag in &entry.tags {
        entry_tokens.extend(tokenize(tag));
    }

    let covered = query_tokens
        .iter()
        .filter(|t| entry_tokens.contains(*t))
        .count();
    covered as f64 / query_tokens.len() as f64
}

pub async fn add_entry(
    pool: &SqlitePool,
    question: &str,
    answer: &str,
    category: Option<&str>,
    tags: &[String],
    priority: i64,
) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO faq_entries (id, question, answer, category, tags_json, priority, active)
        VALUES (?, ?, ?, ?, ?, ?, 1)
        "#,
    )
    .bind(&id)
    .bind(question)
    .bind(answer)
    .bind(category)
    .bind(serde_json::to_string(tags)?)
    .bind(priority)
    .execute(pool)
    .await?;
    Ok(id)
}

pub async fn list_entries(pool: &SqlitePool) -> Result<Vec<FaqEntry>> {
    let rows = sqlx::query(
        "SELECT id, question, answer, category, tags_json, priority, active FROM faq_entries ORDER BY priority DESC",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let tags_json: String = row.get("tags_json");
            Ok(FaqEntry {
                id: row.get("id"),
                question: row.get("question"),
                answer: row.get("answer"),
                category: row.get("category"),
                tags: serde_json::from_str(&tags_json)?,
                priority: row.get("priority"),
                active: row.get::<i64, _>("active") != 0,
            })
        })
        .collect()
}
