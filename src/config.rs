use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::KnowledgeSource;

/// Sensitivity is a single scalar applied uniformly to every source's own
/// scoring scale. The bounds are part of the product contract.
pub const SENSITIVITY_MIN: f64 = 0.3;
pub const SENSITIVITY_MAX: f64 = 1.0;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub websearch: WebSearchConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size_words")]
    pub chunk_size_words: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size_words: default_chunk_size_words(),
        }
    }
}

fn default_chunk_size_words() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Ordered source priority walked before falling back further.
    #[serde(default = "default_search_order")]
    pub search_order: Vec<String>,
    /// Confidence a source's best match must clear before being accepted.
    #[serde(default = "default_sensitivity")]
    pub sensitivity: f64,
    /// Chunks aggregated into a documents answer, deduplicated by document.
    #[serde(default = "default_top_k")]
    pub top_k: i64,
    /// Conversation turns forwarded to a downstream generator.
    #[serde(default = "default_context_max_turns")]
    pub context_max_turns: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_order: default_search_order(),
            sensitivity: default_sensitivity(),
            top_k: default_top_k(),
            context_max_turns: default_context_max_turns(),
        }
    }
}

fn default_search_order() -> Vec<String> {
    vec!["faq".to_string(), "documents".to_string(), "web".to_string()]
}
fn default_sensitivity() -> f64 {
    0.5
}
fn default_top_k() -> i64 {
    5
}
fn default_context_max_turns() -> usize {
    6
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: default_dims(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_provider() -> String {
    "hashing".to_string()
}
fn default_dims() -> Option<usize> {
    Some(256)
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebSearchConfig {
    #[serde(default = "default_web_provider")]
    pub provider: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_web_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            provider: default_web_provider(),
            max_results: default_max_results(),
            timeout_secs: default_web_timeout_secs(),
        }
    }
}

fn default_web_provider() -> String {
    "duckduckgo".to_string()
}
fn default_max_results() -> usize {
    5
}
fn default_web_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct ArchiveConfig {
    /// Maximum decompressed bytes read from a single archive entry
    /// (zip-bomb protection).
    #[serde(default = "default_max_entry_bytes")]
    pub max_entry_bytes: u64,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_entry_bytes: default_max_entry_bytes(),
        }
    }
}

fn default_max_entry_bytes() -> u64 {
    50 * 1024 * 1024
}

impl Config {
    /// A default configuration over the given database path. Used by tests
    /// and by commands that run before a config file exists.
    pub fn minimal(db_path: PathBuf) -> Self {
        Self {
            db: DbConfig { path: db_path },
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            embedding: EmbeddingConfig::default(),
            websearch: WebSearchConfig::default(),
            archive: ArchiveConfig::default(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.chunk_size_words == 0 {
        anyhow::bail!("chunking.chunk_size_words must be > 0");
    }

    if !(SENSITIVITY_MIN..=SENSITIVITY_MAX).contains(&config.retrieval.sensitivity) {
        anyhow::bail!(
            "retrieval.sensitivity must be in [{}, {}]",
            SENSITIVITY_MIN,
            SENSITIVITY_MAX
        );
    }

    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }

    if config.retrieval.search_order.is_empty() {
        anyhow::bail!("retrieval.search_order must name at least one source");
    }
    for source in &config.retrieval.search_order {
        source
            .parse::<KnowledgeSource>()
            .map_err(|e| anyhow::anyhow!("retrieval.search_order: {}", e))?;
    }

    match config.embedding.provider.as_str() {
        "hashing" | "openai" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be hashing, openai, or disabled.",
            other
        ),
    }

    if config.embedding.provider != "disabled" {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.provider == "openai" && config.embedding.model.is_none() {
        anyhow::bail!("embedding.model must be specified when provider is 'openai'");
    }

    match config.websearch.provider.as_str() {
        "duckduckgo" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown web search provider: '{}'. Must be duckduckgo or disabled.",
            other
        ),
    }

    if config.archive.max_entry_bytes == 0 {
        anyhow::bail!("archive.max_entry_bytes must be > 0");
    }

    Ok(())
}

/// Parse an ordered source list such as `"faq,documents,web"`.
pub fn parse_search_order(order: &[String]) -> Result<Vec<KnowledgeSource>> {
    order
        .iter()
        .map(|s| {
            s.parse::<KnowledgeSource>()
                .map_err(|e| anyhow::anyhow!(e))
        })
        .collect()
}
