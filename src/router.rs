//! Retrieval router: ordered fallback across FAQ, documents, and the web.
//!
//! Stateless per call. The configured source order always dominates raw
//! score: a FAQ hit that clears the sensitivity bar is preferred over a
//! higher-scoring document chunk, because curated answers are trusted more
//! than raw similarity. Routing never fails from the caller's perspective:
//! when every internal source falls below the bar the router falls through
//! to the web collaborator and records the gap for human review.

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::faq;
use crate::folders;
use crate::index::{ChunkMatch, VectorIndex};
use crate::models::{ChatTurn, KnowledgeSource, RoutedAnswer, SearchResult};
use crate::websearch::WebSearch;

pub struct Router {
    pool: SqlitePool,
    index: VectorIndex,
    web: Box<dyn WebSearch>,
    top_k: i64,
}

impl Router {
    pub fn new(pool: SqlitePool, index: VectorIndex, web: Box<dyn WebSearch>, top_k: i64) -> Self {
        Self {
            pool,
            index,
            web,
            top_k,
        }
    }

    /// Walk `search_order` and return the first source whose best match
    /// clears `sensitivity`. `namespaces` are the caller's reachable vector
    /// namespaces; pass an empty slice to search all of them.
    pub async fn answer(
        &self,
        query: &str,
        search_order: &[KnowledgeSource],
        sensitivity: f64,
        namespaces: &[String],
    ) -> Result<RoutedAnswer> {
        for source in search_order {
            match source {
                KnowledgeSource::Faq => {
                    if let Some(m) = faq::best_match(&self.pool, query).await? {
                        if m.confidence >= sensitivity {
                            return Ok(RoutedAnswer {
                                source: KnowledgeSource::Faq,
                                results: vec![SearchResult {
                                    content: m.entry.answer,
                                    citation: m.entry.question,
                                    score: m.confidence,
                                }],
                            });
                        }
                    }
                }
                KnowledgeSource::Documents => {
                    let matches = self.query_namespaces(query, namespaces).await?;
                    if matches.first().map(|m| m.score >= sensitivity) == Some(true) {
                        return Ok(RoutedAnswer {
                            source: KnowledgeSource::Documents,
                            results: aggregate_chunks(matches, self.top_k as usize),
                        });
                    }
                }
                KnowledgeSource::Web => {
                    return self.web_fallback(query).await;
                }
            }
        }

        // Every configured source fell below the bar; the web collaborator
        // is the unconditional last rung.
        self.web_fallback(query).await
    }

    async fn query_namespaces(
        &self,
        query: &str,
        namespaces: &[String],
    ) -> Result<Vec<ChunkMatch>> {
        let reachable = if namespaces.is_empty() {
            folders::all_namespaces(&self.pool).await?
        } else {
            namespaces.to_vec()
        };

        let mut matches = Vec::new();
        for namespace in &reachable {
            matches.extend(self.index.query(namespace, query, self.top_k).await?);
        }
        matches.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_id.cmp(&b.chunk_id))
        });
        Ok(matches)
    }

    async fn web_fallback(&self, query: &str) -> Result<RoutedAnswer> {
        let answer = self.web.search(query).await?;

        // A query that bypassed internal knowledge is itself a signal that
        // the corpus has a gap; keep it for review.
        record_fallback(&self.pool, query, &answer.text, "below-threshold").await?;

        let citation = answer.citations.first().cloned().unwrap_or_default();
        Ok(RoutedAnswer {
            source: KnowledgeSource::Web,
            results: vec![SearchResult {
                content: answer.text,
                citation,
                score: 0.0,
            }],
        })
    }
}

/// Aggregate ranked chunks into results, deduplicated by document so one
/// document cannot crowd out the rest of the answer.
fn aggregate_chunks(matches: Vec<ChunkMatch>, top_k: usize) -> Vec<SearchResult> {
    let mut seen = std::collections::HashSet::new();
    let mut results = Vec::new();
    for m in matches {
        if !seen.insert(m.document_id.clone()) {
            continue;
        }
        results.push(SearchResult {
            content: m.text,
            citation: m.document_name,
            score: m.score,
        });
        if results.len() >= top_k {
            break;
        }
    }
    results
}

async fn record_fallback(
    pool: &SqlitePool,
    query: &str,
    response: &str,
    reason: &str,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO fallback_log (id, query, response, reason, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(query)
    .bind(response)
    .bind(reason)
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?;
    tracing::info!(query, reason, "query fell through to web search");
    Ok(())
}

/// Bound the conversation context forwarded to a downstream generator to
/// the most recent turns. A payload-size policy, not a routing rule.
pub fn truncate_context(turns: &[ChatTurn], max_turns: usize) -> &[ChatTurn] {
    if turns.len() <= max_turns {
        turns
    } else {
        &turns[turns.len() - max_turns..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_match(chunk_id: &str, document_id: &str, score: f64) -> ChunkMatch {
        ChunkMatch {
            chunk_id: chunk_id.to_string(),
            document_id: document_id.to_string(),
            document_name: format!("{}.txt", document_id),
            text: format!("text of {}", chunk_id),
            score,
        }
    }

    #[test]
    fn aggregation_dedupes_by_document() {
        let matches = vec![
            chunk_match("d1_chunk_0", "d1", 0.9),
            chunk_match("d1_chunk_1", "d1", 0.85),
            chunk_match("d2_chunk_0", "d2", 0.8),
        ];
        let results = aggregate_chunks(matches, 5);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].citation, "d1.txt");
        assert_eq!(results[1].citation, "d2.txt");
    }

    #[test]
    fn aggregation_honors_top_k() {
        let matches = vec![
            chunk_match("d1_chunk_0", "d1", 0.9),
            chunk_match("d2_chunk_0", "d2", 0.8),
            chunk_match("d3_chunk_0", "d3", 0.7),
        ];
        assert_eq!(aggregate_chunks(matches, 2).len(), 2);
    }

    #[test]
    fn context_truncation_keeps_most_recent_turns() {
        let turns: Vec<ChatTurn> = (0..10)
            .map(|i| ChatTurn {
                role: "user".into(),
                content: format!("turn {}", i),
            })
            .collect();
        let kept = truncate_context(&turns, 3);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].content, "turn 7");
        assert_eq!(kept[2].content, "turn 9");
    }

    #[test]
    fn context_truncation_is_noop_when_short() {
        let turns = vec![ChatTurn {
            role: "user".into(),
            content: "only".into(),
        }];
        assert_eq!(truncate_context(&turns, 6).len(), 1);
    }
}
