//! # kb-pipeline CLI (`kbp`)
//!
//! The `kbp` binary drives the knowledge pipeline: database
//! initialization, file and archive ingestion, FAQ seeding, and routed
//! queries.
//!
//! ```bash
//! kbp init                                   # create database
//! kbp ingest docs/pricing.pdf bundle.zip     # ingest files and archives
//! kbp faq add --question "..." --answer "..."
//! kbp query "archery POS options" --sensitivity 0.5
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use kb_pipeline::{
    config, db, embedding, extract, faq, folders, index::VectorIndex, ingest, router::Router,
    websearch,
};

/// Knowledge ingestion and retrieval for sales-agent assistants.
#[derive(Parser)]
#[command(
    name = "kbp",
    about = "Knowledge ingestion and retrieval pipeline for sales-agent assistants",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kbp.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Ingest files. Zip archives are walked entry by entry; everything
    /// else runs through the document pipeline.
    Ingest {
        /// Files to ingest.
        paths: Vec<PathBuf>,

        /// Target folder name (created at the root if missing).
        #[arg(long)]
        folder: Option<String>,
    },

    /// Route a query through FAQ, documents, and web fallback.
    Query {
        /// The question text.
        query: String,

        /// Source order override, e.g. `faq,documents,web`.
        #[arg(long)]
        order: Option<String>,

        /// Sensitivity threshold override (0.3–1.0).
        #[arg(long)]
        sensitivity: Option<f64>,
    },

    /// Manage curated FAQ entries.
    Faq {
        #[command(subcommand)]
        action: FaqAction,
    },

    /// List ingested documents.
    Docs,
}

#[derive(Subcommand)]
enum FaqAction {
    /// Add a curated entry.
    Add {
        #[arg(long)]
        question: String,
        #[arg(long)]
        answer: String,
        #[arg(long)]
        category: Option<String>,
        /// Repeatable tag flag.
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, default_value_t = 0)]
        priority: i64,
    },
    /// List all entries.
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kb_pipeline=info,kbp=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        tracing::debug!(path = %cli.config.display(), "no config file, using defaults");
        config::Config::minimal(PathBuf::from("./kb.sqlite"))
    };

    match cli.command {
        Commands::Init => {
            let pool = db::open(&cfg.db.path).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }

        Commands::Ingest { paths, folder } => {
            if paths.is_empty() {
                anyhow::bail!("nothing to ingest: pass at least one file path");
            }
            let pool = db::open(&cfg.db.path).await?;

            let folder_id = match folder {
                Some(name) => {
                    let (folder, _) = folders::ensure_folder(&pool, None, &name).await?;
                    Some(folder.id)
                }
                None => None,
            };

            let mut files = Vec::new();
            for path in &paths {
                let bytes = std::fs::read(path)?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                let media_type = extract::media_type_for_path(&filename).to_string();
                files.push(ingest::UploadFile {
                    bytes,
                    original_filename: filename,
                    media_type,
                    target_folder_id: folder_id.clone(),
                });
            }

            let vector_index =
                VectorIndex::new(pool.clone(), embedding::create_embedder(&cfg.embedding)?);
            let results = ingest::ingest_batch(&pool, &cfg, &vector_index, files).await;

            for result in &results {
                match &result.outcome {
                    ingest::UploadOutcome::Created(doc) => {
                        println!("created  {}  ({})", result.filename, doc.id);
                    }
                    ingest::UploadOutcome::Duplicate { existing } => {
                        println!(
                            "duplicate  {}  (already stored as '{}', {})",
                            result.filename, existing.display_name, existing.id
                        );
                    }
                    ingest::UploadOutcome::Archive(summary) => {
                        println!(
                            "archive  {}  extracted: {}, documents: {}, duplicates: {}, folders: {}, errors: {}",
                            result.filename,
                            summary.extracted_count,
                            summary.documents_created.len(),
                            summary.skipped_duplicates.len(),
                            summary.folders_created.len(),
                            summary.errors.len()
                        );
                        for e in &summary.errors {
                            println!("  error: {}", e);
                        }
                    }
                    ingest::UploadOutcome::Error(e) => {
                        println!("error  {}  {}", result.filename, e);
                    }
                }
            }
            println!("ok");
            pool.close().await;
        }

        Commands::Query {
            query,
            order,
            sensitivity,
        } => {
            let pool = db::open(&cfg.db.path).await?;

            let order_strings: Vec<String> = match order {
                Some(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
                None => cfg.retrieval.search_order.clone(),
            };
            let search_order = config::parse_search_order(&order_strings)?;

            let sensitivity = sensitivity.unwrap_or(cfg.retrieval.sensitivity);
            if !(config::SENSITIVITY_MIN..=config::SENSITIVITY_MAX).contains(&sensitivity) {
                anyhow::bail!(
                    "sensitivity must be in [{}, {}]",
                    config::SENSITIVITY_MIN,
                    config::SENSITIVITY_MAX
                );
            }

            let vector_index =
                VectorIndex::new(pool.clone(), embedding::create_embedder(&cfg.embedding)?);
            let web = websearch::create_web_search(&cfg.websearch)?;
            let router = Router::new(pool.clone(), vector_index, web, cfg.retrieval.top_k);

            let answer = router.answer(&query, &search_order, sensitivity, &[]).await?;

            println!("source: {}", answer.source);
            for (i, result) in answer.results.iter().enumerate() {
                println!("{}. [{:.2}] {}", i + 1, result.score, result.citation);
                println!("   {}", result.content.replace('\n', " "));
            }
            pool.close().await;
        }

        Commands::Faq { action } => {
            let pool = db::open(&cfg.db.path).await?;
            match action {
                FaqAction::Add {
                    question,
                    answer,
                    category,
                    tags,
                    priority,
                } => {
                    let id = faq::add_entry(
                        &pool,
                        &question,
                        &answer,
                        category.as_deref(),
                        &tags,
                        priority,
                    )
                    .await?;
                    println!("added FAQ entry {}", id);
                }
                FaqAction::List => {
                    for entry in faq::list_entries(&pool).await? {
                        let status = if entry.active { "active" } else { "inactive" };
                        println!(
                            "[{}] ({}) {} :: {}",
                            status, entry.priority, entry.question, entry.answer
                        );
                    }
                }
            }
            pool.close().await;
        }

        Commands::Docs => {
            let pool = db::open(&cfg.db.path).await?;
            for doc in ingest::list_documents(&pool).await? {
                let flag = if doc.searchable { "" } else { "  (unsearchable)" };
                println!(
                    "{}  {}  {}{}",
                    doc.id, doc.display_name, doc.media_type, flag
                );
            }
            pool.close().await;
        }
    }

    Ok(())
}
