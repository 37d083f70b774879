//! Optional dense-vector ranking backed by a remote embedding service.
//!
//! Two HTTP backends are supported:
//! - **OpenAI**: `POST https://api.openai.com/v1/embeddings`, key from `OPENAI_API_KEY`.
//! - **Ollama**: `POST {url}/api/embed`, default `http://localhost:11434`.
//!
//! After every index build the [`DenseRanker`] embeds all chunk texts and
//! keeps the vectors next to the generation they belong to. At query time
//! it only answers for that exact generation; anything else (no vectors
//! yet, a newer generation, a failing service) is an error, and
//! [`rank_with_fallback`](context_ranker_core::embedding::rank_with_fallback)
//! answers from term weights instead.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use context_ranker_core::embedding::{rank_by_vectors, EmbeddingProvider, RankingSource};
use context_ranker_core::{Index, SearchHit};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::EmbeddingConfig;

const OPENAI_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// An embedding backend that can turn texts into vectors.
#[async_trait]
pub trait TextEmbedder: EmbeddingProvider {
    /// One vector per input text, in input order.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[derive(Debug, Clone)]
enum Backend {
    OpenAi { api_key: String },
    Ollama { url: String },
}

impl Backend {
    fn label(&self) -> &'static str {
        match self {
            Backend::OpenAi { .. } => "OpenAI",
            Backend::Ollama { .. } => "Ollama",
        }
    }
}

/// HTTP embedding client for OpenAI or Ollama.
pub struct RemoteEmbedder {
    backend: Backend,
    model: String,
    dims: usize,
    batch_size: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl RemoteEmbedder {
    /// Build the embedder described by `[embedding]`.
    ///
    /// Returns `Ok(None)` when the provider is `"disabled"`.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Option<Self>> {
        let backend = match config.provider.as_str() {
            "disabled" => return Ok(None),
            "openai" => {
                let api_key = std::env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;
                Backend::OpenAi { api_key }
            }
            "ollama" => Backend::Ollama {
                url: config
                    .url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string())
                    .trim_end_matches('/')
                    .to_string(),
            },
            other => bail!("Unknown embedding provider: {}", other),
        };

        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for {}", backend.label()))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for {}", backend.label()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Some(Self {
            backend,
            model,
            dims,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            client,
        }))
    }

    fn request(&self, texts: &[String]) -> reqwest::RequestBuilder {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });
        match &self.backend {
            Backend::OpenAi { api_key } => self
                .client
                .post(OPENAI_URL)
                .header("Authorization", format!("Bearer {}", api_key))
                .json(&body),
            Backend::Ollama { url } => self.client.post(format!("{}/api/embed", url)).json(&body),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let label = self.backend.label();
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                debug!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            match self.request(texts).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return match self.backend {
                            Backend::OpenAi { .. } => parse_openai_response(&json),
                            Backend::Ollama { .. } => parse_ollama_response(&json),
                        };
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                        continue;
                    }
                    bail!("{} API error {}: {}", label, status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow!("{} connection error: {}", label, e));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("{} embedding failed after retries", label)))
    }
}

impl EmbeddingProvider for RemoteEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }
    fn dims(&self) -> usize {
        self.dims
    }
}

#[async_trait]
impl TextEmbedder for RemoteEmbedder {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self.embed_batch(batch).await?;
            if vectors.len() != batch.len() {
                bail!(
                    "Embedding service returned {} vectors for {} texts",
                    vectors.len(),
                    batch.len()
                );
            }
            out.extend(vectors);
        }
        Ok(out)
    }
}

/// Parse `data[].embedding`, ordered by each item's `index` field.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (pos, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(pos);
        indexed.push((index, to_f32_vec(embedding)));
    }

    indexed.sort_by_key(|(i, _)| *i);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| to_f32_vec(values))
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

fn to_f32_vec(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

/// Chunk vectors computed for one index generation.
struct ChunkVectors {
    index: Arc<Index>,
    vectors: Arc<Vec<Vec<f32>>>,
}

/// Dense-vector [`RankingSource`] over the chunks of one generation.
pub struct DenseRanker {
    embedder: Arc<dyn TextEmbedder>,
    min_score: f64,
    current: RwLock<Option<ChunkVectors>>,
}

impl DenseRanker {
    pub fn new(embedder: Arc<dyn TextEmbedder>, min_score: f64) -> Self {
        Self {
            embedder,
            min_score,
            current: RwLock::new(None),
        }
    }

    /// Embed every chunk of `index` and make the vectors current.
    ///
    /// On error the previous vectors are kept; they no longer match the
    /// live generation, so queries fall back to term weights until the
    /// next successful refresh.
    pub async fn refresh(&self, index: Arc<Index>) -> Result<usize> {
        let texts: Vec<String> = index.chunks().iter().map(|c| c.chunk.text.clone()).collect();
        let vectors = if texts.is_empty() {
            Vec::new()
        } else {
            self.embedder.embed_texts(&texts).await?
        };

        let dims = self.embedder.dims();
        if let Some(bad) = vectors.iter().find(|v| v.len() != dims) {
            bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                dims,
                bad.len()
            );
        }

        let count = vectors.len();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(ChunkVectors {
            index,
            vectors: Arc::new(vectors),
        });
        info!(model = self.embedder.model_name(), chunks = count, "chunk embeddings ready");
        Ok(count)
    }

    fn vectors_for(&self, index: &Index) -> Option<Arc<Vec<Vec<f32>>>> {
        let current = self.current.read().unwrap_or_else(PoisonError::into_inner);
        current
            .as_ref()
            .filter(|cv| std::ptr::eq(Arc::as_ptr(&cv.index), index))
            .map(|cv| Arc::clone(&cv.vectors))
    }
}

#[async_trait]
impl RankingSource for DenseRanker {
    fn name(&self) -> &str {
        "dense"
    }

    async fn rank(&self, index: &Index, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let vectors = self
            .vectors_for(index)
            .ok_or_else(|| anyhow!("no chunk embeddings for the live index generation"))?;
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let query_vec = self
            .embedder
            .embed_texts(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))?;
        Ok(rank_by_vectors(index, &vectors, &query_vec, k, self.min_score))
    }
}
