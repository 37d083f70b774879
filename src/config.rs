//! TOML configuration parsing and validation.
//!
//! All sections except `[corpus]` are optional and fall back to the
//! defaults below.
//!
//! ```toml
//! [corpus]
//! root = "./docs"
//! include_globs = ["**/*.md", "**/*.txt"]
//!
//! [chunking]
//! max_tokens = 60
//!
//! [index]
//! max_vocabulary = 5000
//! priority_names = ["12", "13", "14", "15"]
//! snapshot_path = "./data/index.json"
//!
//! [retrieval]
//! top_k = 3
//! min_score = 0.08
//! priority_boost = 2.0
//!
//! [watch]
//! debounce_ms = 600
//! poll_interval_ms = 1000
//!
//! [embedding]
//! provider = "disabled"   # or "openai", "ollama"
//! ```

use anyhow::{Context, Result};
use context_ranker_core::search::RankParams;
use context_ranker_core::IndexOptions;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_max_tokens() -> usize {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    #[serde(default = "default_max_vocabulary")]
    pub max_vocabulary: usize,
    #[serde(default = "default_priority_names")]
    pub priority_names: Vec<String>,
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            max_vocabulary: default_max_vocabulary(),
            priority_names: default_priority_names(),
            snapshot_path: None,
        }
    }
}

fn default_max_vocabulary() -> usize {
    5000
}
fn default_priority_names() -> Vec<String> {
    ["12", "13", "14", "15"].iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_min_score")]
    pub min_score: f64,
    #[serde(default = "default_priority_boost")]
    pub priority_boost: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: default_min_score(),
            priority_boost: default_priority_boost(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_min_score() -> f64 {
    0.08
}
fn default_priority_boost() -> f64 {
    2.0
}

#[derive(Debug, Deserialize, Clone)]
pub struct WatchConfig {
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

fn default_debounce_ms() -> u64 {
    600
}
fn default_poll_interval_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for Ollama (default `http://localhost:11434`).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Minimum cosine similarity for dense hits.
    #[serde(default = "default_embedding_min_score")]
    pub min_score: f64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "disabled".to_string(),
            model: None,
            dims: None,
            url: None,
            batch_size: 64,
            max_retries: 3,
            timeout_secs: 30,
            min_score: 0.3,
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_embedding_min_score() -> f64 {
    0.3
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

impl Config {
    /// Build options handed to the core index builder.
    pub fn index_options(&self) -> IndexOptions {
        IndexOptions {
            max_tokens: self.chunking.max_tokens,
            max_vocabulary: self.index.max_vocabulary,
            priority_names: self.index.priority_names.iter().cloned().collect(),
        }
    }

    /// Ranking parameters from `[retrieval]`.
    pub fn rank_params(&self) -> RankParams {
        RankParams {
            top_k: self.retrieval.top_k,
            min_score: self.retrieval.min_score,
            priority_boost: self.retrieval.priority_boost,
        }
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.watch.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch.poll_interval_ms)
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.max_tokens == 0 {
        anyhow::bail!("chunking.max_tokens must be > 0");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(config.retrieval.min_score >= 0.0) {
        anyhow::bail!("retrieval.min_score must be >= 0.0");
    }
    if !(config.retrieval.priority_boost > 0.0) {
        anyhow::bail!("retrieval.priority_boost must be > 0.0");
    }

    // Validate watch
    if config.watch.debounce_ms == 0 {
        anyhow::bail!("watch.debounce_ms must be > 0");
    }
    if config.watch.poll_interval_ms == 0 {
        anyhow::bail!("watch.poll_interval_ms must be > 0");
    }

    // Validate embedding
    if config.embedding.is_enabled() {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }

    Ok(config)
}
