//! End-to-end pipeline tests against a temporary SQLite database.
//!
//! Everything runs offline: the hashing embedding provider is
//! deterministic, and web search is replaced by a local stub.

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::io::Write;
use tempfile::TempDir;

use kb_pipeline::{
    archive, chunk, config::Config, db, embedding, faq, folders,
    index::VectorIndex, ingest,
    models::{KnowledgeSource, SimilarDocument},
    router::Router,
    websearch::{WebAnswer, WebSearch},
};

async fn setup() -> (TempDir, SqlitePool, Config) {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::minimal(dir.path().join("kb.sqlite"));
    let pool = db::open(&config.db.path).await.unwrap();
    (dir, pool, config)
}

fn make_index(pool: &SqlitePool, config: &Config) -> VectorIndex {
    VectorIndex::new(
        pool.clone(),
        embedding::create_embedder(&config.embedding).unwrap(),
    )
}

struct StubWeb;

#[async_trait]
impl WebSearch for StubWeb {
    async fn search(&self, query: &str) -> anyhow::Result<WebAnswer> {
        Ok(WebAnswer {
            text: format!("web answer for: {}", query),
            citations: vec!["https://example.com/stub".to_string()],
        })
    }
}

async fn ingest_text(
    pool: &SqlitePool,
    config: &Config,
    index: &VectorIndex,
    text: &str,
    filename: &str,
) -> ingest::DocumentOutcome {
    ingest::ingest_document(pool, config, index, text.as_bytes(), filename, "text/plain", None)
        .await
        .unwrap()
}

#[tokio::test]
async fn duplicate_reupload_references_first_document() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    let first = match ingest_text(&pool, &config, &index, "pricing sheet v1", "pricing.txt").await
    {
        ingest::DocumentOutcome::Created(doc) => doc,
        other => panic!("expected created, got {:?}", other),
    };

    // Same bytes under a different name must be reported against the
    // original, not stored again.
    match ingest_text(&pool, &config, &index, "pricing sheet v1", "pricing-copy.txt").await {
        ingest::DocumentOutcome::Duplicate { existing } => {
            assert_eq!(existing.id, first.id);
            assert_eq!(existing.display_name, "pricing.txt");
        }
        other => panic!("expected duplicate, got {:?}", other),
    }

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents WHERE active = 1")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn near_duplicate_names_are_flagged_but_not_blocked() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    ingest_text(&pool, &config, &index, "terms for 2025", "Merchant_Terms_2025.txt").await;
    let check = kb_pipeline::dedup::check(
        &pool,
        b"terms for 2026, revised",
        "merchant terms 2025 (1).txt",
    )
    .await
    .unwrap();

    assert!(!check.is_duplicate);
    assert!(
        check
            .similar_documents
            .iter()
            .any(|s: &SimilarDocument| s.display_name == "Merchant_Terms_2025.txt"),
        "expected a near-duplicate name flag"
    );
}

#[tokio::test]
async fn reindexing_a_document_is_idempotent() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
    let chunks = chunk::chunk_text("doc-1", text, 4);
    assert!(chunks.len() > 1);

    index.upsert("doc-1", &chunks, "default", "doc.txt").await.unwrap();
    index.upsert("doc-1", &chunks, "default", "doc.txt").await.unwrap();

    assert_eq!(
        index.chunk_count("doc-1").await.unwrap(),
        chunks.len() as i64
    );
}

#[tokio::test]
async fn queries_are_isolated_per_namespace() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    let chunks = chunk::chunk_text("doc-a", "quantic clover hubwallet terminals", 200);
    index.upsert("doc-a", &chunks, "ns-a", "a.txt").await.unwrap();

    let hits_a = index.query("ns-a", "quantic clover terminals", 5).await.unwrap();
    let hits_b = index.query("ns-b", "quantic clover terminals", 5).await.unwrap();

    assert!(!hits_a.is_empty());
    assert!(hits_b.is_empty(), "namespace b must not see namespace a");
}

fn build_zip(entries: &[(&str, Option<&str>)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default();
        for (name, content) in entries {
            match content {
                None => writer.add_directory(*name, options).unwrap(),
                Some(text) => {
                    writer.start_file(*name, options).unwrap();
                    writer.write_all(text.as_bytes()).unwrap();
                }
            }
        }
        writer.finish().unwrap();
    }
    buf
}

#[tokio::test]
async fn archive_ingestion_continues_past_bad_entries() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    let bytes = build_zip(&[
        ("guides/", None),
        ("guides/onboarding.txt", Some("merchant onboarding checklist")),
        ("guides/terminals.txt", Some("supported terminal models")),
        ("pricing.txt", Some("interchange plus pricing tiers")),
        ("faq.md", Some("# common questions about settlement")),
        ("notes.csv", Some("region,rep\nwest,dana")),
        ("../evil.txt", Some("path traversal attempt")),
    ]);

    let summary = archive::ingest_archive(&pool, &config, &index, &bytes, None)
        .await
        .unwrap();

    assert_eq!(summary.documents_created.len(), 5);
    assert_eq!(summary.extracted_count, 5);
    assert_eq!(summary.errors.len(), 1, "unsafe path must be an error");
    assert!(summary.folders_created.contains(&"guides".to_string()));
}

#[tokio::test]
async fn archive_rerun_skips_already_ingested_entries() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    let bytes = build_zip(&[("a.txt", Some("alpha")), ("b.txt", Some("beta"))]);

    let first = archive::ingest_archive(&pool, &config, &index, &bytes, None)
        .await
        .unwrap();
    assert_eq!(first.documents_created.len(), 2);

    let second = archive::ingest_archive(&pool, &config, &index, &bytes, None)
        .await
        .unwrap();
    assert_eq!(second.documents_created.len(), 0);
    assert_eq!(second.skipped_duplicates.len(), 2);
    assert!(second.errors.is_empty());
}

#[tokio::test]
async fn archive_directories_dedupe_across_runs() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    let bytes = build_zip(&[("guides/", None), ("guides/x.txt", Some("x body"))]);

    let first = archive::ingest_archive(&pool, &config, &index, &bytes, None)
        .await
        .unwrap();
    assert_eq!(first.folders_created, vec!["guides".to_string()]);

    let second = archive::ingest_archive(&pool, &config, &index, &bytes, None)
        .await
        .unwrap();
    assert!(second.folders_created.is_empty());

    let (folder_id, _) = folders::ensure_path(&pool, None, &["guides"]).await.unwrap();
    let folder_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM folders")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(folder_count, 1);
    assert!(folder_id.is_some());
}

#[tokio::test]
async fn faq_outranks_documents_when_both_clear_the_bar() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    // A document whose text is the query verbatim would score highest on
    // raw similarity, but source order dominates.
    ingest_text(&pool, &config, &index, "archery pos options", "notes.txt").await;
    faq::add_entry(
        &pool,
        "What POS options work for archery shops?",
        "Quantic is the strongest fit for archery retail.",
        Some("pos"),
        &["archery".to_string()],
        10,
    )
    .await
    .unwrap();

    let router = Router::new(pool.clone(), index, Box::new(StubWeb), config.retrieval.top_k);
    let order = [
        KnowledgeSource::Faq,
        KnowledgeSource::Documents,
        KnowledgeSource::Web,
    ];
    let answer = router.answer("archery pos options", &order, 0.7, &[]).await.unwrap();

    assert_eq!(answer.source, KnowledgeSource::Faq);
    assert_eq!(
        answer.results[0].content,
        "Quantic is the strongest fit for archery retail."
    );
    assert!(answer.results[0].score >= 0.7);
}

#[tokio::test]
async fn documents_answer_when_faq_misses() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    ingest_text(
        &pool,
        &config,
        &index,
        "Supported point of sale systems: Quantic, Clover, and HubWallet.",
        "pos-systems.txt",
    )
    .await;
    faq::add_entry(&pool, "How do refunds work?", "Within 5 days.", None, &[], 0)
        .await
        .unwrap();

    let router = Router::new(pool.clone(), index, Box::new(StubWeb), config.retrieval.top_k);
    let order = [
        KnowledgeSource::Faq,
        KnowledgeSource::Documents,
        KnowledgeSource::Web,
    ];
    let answer = router
        .answer("quantic clover hubwallet point of sale systems", &order, 0.5, &[])
        .await
        .unwrap();

    assert_eq!(answer.source, KnowledgeSource::Documents);
    assert_eq!(answer.results[0].citation, "pos-systems.txt");
    assert!(answer.results[0].content.contains("HubWallet"));
}

#[tokio::test]
async fn below_threshold_falls_through_to_web_and_logs_the_gap() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    let router = Router::new(pool.clone(), index, Box::new(StubWeb), config.retrieval.top_k);
    let order = [KnowledgeSource::Faq, KnowledgeSource::Documents];
    let answer = router
        .answer("kuiper belt object taxonomy", &order, 0.9, &[])
        .await
        .unwrap();

    assert_eq!(answer.source, KnowledgeSource::Web);
    assert!(answer.results[0].content.contains("kuiper belt object taxonomy"));
    assert_eq!(answer.results[0].citation, "https://example.com/stub");

    let logged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM fallback_log")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(logged, 1);
}

#[tokio::test]
async fn batch_mixes_documents_and_archives() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    let zip_bytes = build_zip(&[("inner.txt", Some("inner archive text"))]);
    let files = vec![
        ingest::UploadFile {
            bytes: b"plain body".to_vec(),
            original_filename: "plain.txt".to_string(),
            media_type: "text/plain".to_string(),
            target_folder_id: None,
        },
        ingest::UploadFile {
            bytes: zip_bytes,
            original_filename: "bundle.zip".to_string(),
            media_type: "application/zip".to_string(),
            target_folder_id: None,
        },
    ];

    let results = ingest::ingest_batch(&pool, &config, &index, files).await;
    assert_eq!(results.len(), 2);
    assert!(matches!(results[0].outcome, ingest::UploadOutcome::Created(_)));
    match &results[1].outcome {
        ingest::UploadOutcome::Archive(summary) => {
            assert_eq!(summary.documents_created.len(), 1);
        }
        other => panic!("expected archive outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn unsupported_format_is_skipped_and_reported() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    let outcome = ingest::ingest_document(
        &pool,
        &config,
        &index,
        &[0u8, 1, 2, 3],
        "photo.bin",
        "application/octet-stream",
        None,
    )
    .await
    .unwrap();
    assert!(matches!(
        outcome,
        ingest::DocumentOutcome::Unsupported { .. }
    ));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0, "skipped uploads must not leave document rows");

    // The batch boundary reports the skip as an error outcome.
    let results = ingest::ingest_batch(
        &pool,
        &config,
        &index,
        vec![ingest::UploadFile {
            bytes: vec![0u8, 1, 2, 3],
            original_filename: "photo.bin".to_string(),
            media_type: "application/octet-stream".to_string(),
            target_folder_id: None,
        }],
    )
    .await;
    match &results[0].outcome {
        ingest::UploadOutcome::Error(msg) => assert!(msg.contains("unsupported format")),
        other => panic!("expected error outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_extraction_is_persisted_but_unsearchable() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    // Supported type, but no extractable text.
    let doc = match ingest_text(&pool, &config, &index, "  \n\t ", "blank.txt").await {
        ingest::DocumentOutcome::Created(doc) => doc,
        other => panic!("expected created, got {:?}", other),
    };

    let searchable: i64 = sqlx::query_scalar("SELECT searchable FROM documents WHERE id = ?")
        .bind(&doc.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(searchable, 0);
    assert_eq!(index.chunk_count(&doc.id).await.unwrap(), 0);
}

#[tokio::test]
async fn archive_reports_unsupported_entries() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    let bytes = build_zip(&[
        ("logo.jpg", Some("not really an image")),
        ("notes.txt", Some("release notes")),
    ]);

    let summary = archive::ingest_archive(&pool, &config, &index, &bytes, None)
        .await
        .unwrap();

    assert_eq!(summary.extracted_count, 2);
    assert_eq!(summary.documents_created.len(), 1);
    assert_eq!(summary.errors.len(), 1);
    assert!(
        summary.errors[0].to_string().contains("unsupported format"),
        "error was: {}",
        summary.errors[0]
    );
}

#[tokio::test]
async fn open_creates_nested_database_paths() {
    let dir = tempfile::tempdir().unwrap();
    let pool = db::open(&dir.path().join("state").join("nested").join("kb.sqlite"))
        .await
        .unwrap();

    // Schema is ready without a separate migration step.
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn document_listing_reflects_ingested_state() {
    let (_dir, pool, config) = setup().await;
    let index = make_index(&pool, &config);

    ingest_text(&pool, &config, &index, "quarterly pricing sheet", "pricing.txt").await;

    let docs = ingest::list_documents(&pool).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].display_name, "pricing.txt");
    assert_eq!(docs[0].media_type, "text/plain");
    assert!(docs[0].active);
    assert!(docs[0].searchable);
    assert!(!docs[0].content_hash.is_empty());
}
