//! Ranking-source abstraction and dense-vector utilities.
//!
//! The term-weight ranker is always available. An application may also
//! plug in a dense-vector source (an external embedding service); when
//! that source is missing or fails, [`rank_with_fallback`] answers from
//! the term-weight ranker instead and the caller never sees the error.
//!
//! Concrete embedding providers (OpenAI, Ollama) live in the
//! `context-ranker` app crate.

use std::cmp::Ordering;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::index::Index;
use crate::models::SearchHit;
use crate::search::{search, RankParams, SearchRequest};

/// Trait for embedding providers.
///
/// Implementations are created by the application; the core only needs
/// their metadata to check that stored vectors are compatible.
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;
}

/// Anything that can turn a query into ranked hits over an index.
#[async_trait]
pub trait RankingSource: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    /// Return at most `k` hits, best first.
    async fn rank(&self, index: &Index, query: &str, k: usize) -> Result<Vec<SearchHit>>;
}

/// The TF-IDF ranker as a [`RankingSource`].
#[derive(Debug, Clone, Default)]
pub struct TermRanker {
    pub params: RankParams,
}

impl TermRanker {
    pub fn new(params: RankParams) -> Self {
        Self { params }
    }

    /// Synchronous entry point; never fails.
    pub fn rank_sync(&self, index: &Index, query: &str, k: usize) -> Vec<SearchHit> {
        let mut params = self.params;
        params.top_k = k;
        search(
            index,
            &SearchRequest {
                query,
                params,
                explain: false,
            },
        )
    }
}

#[async_trait]
impl RankingSource for TermRanker {
    fn name(&self) -> &str {
        "tfidf"
    }

    async fn rank(&self, index: &Index, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        Ok(self.rank_sync(index, query, k))
    }
}

/// Rank with `primary` when present, falling back to `fallback` on error.
pub async fn rank_with_fallback(
    primary: Option<&dyn RankingSource>,
    fallback: &TermRanker,
    index: &Index,
    query: &str,
    k: usize,
) -> Vec<SearchHit> {
    if let Some(source) = primary {
        match source.rank(index, query, k).await {
            Ok(hits) => return hits,
            Err(e) => {
                warn!(source = source.name(), error = %e, "ranking source failed; using term weights");
            }
        }
    }
    fallback.rank_sync(index, query, k)
}

/// Rank index chunks by cosine similarity to a query embedding.
///
/// `chunk_vectors[i]` must belong to `index.chunks()[i]`. Hits below
/// `min_score` are dropped; ties keep chunk insertion order.
pub fn rank_by_vectors(
    index: &Index,
    chunk_vectors: &[Vec<f32>],
    query_vec: &[f32],
    k: usize,
    min_score: f64,
) -> Vec<SearchHit> {
    let mut scored: Vec<(usize, f64)> = chunk_vectors
        .iter()
        .enumerate()
        .take(index.len())
        .map(|(i, v)| (i, cosine_similarity(query_vec, v) as f64))
        .filter(|(_, s)| *s > 0.0 && *s >= min_score)
        .collect();

    scored.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
    scored.truncate(k);

    scored
        .into_iter()
        .map(|(i, score)| {
            let chunk = &index.chunks()[i].chunk;
            SearchHit {
                filename: chunk.filename.clone(),
                snippet: chunk.text.clone(),
                score,
                explain: None,
            }
        })
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{build_index, IndexOptions};
    use crate::models::Document;
    use anyhow::bail;

    struct Failing;

    #[async_trait]
    impl RankingSource for Failing {
        fn name(&self) -> &str {
            "failing"
        }
        async fn rank(&self, _index: &Index, _query: &str, _k: usize) -> Result<Vec<SearchHit>> {
            bail!("401 unauthorized")
        }
    }

    struct Fixed(Vec<SearchHit>);

    #[async_trait]
    impl RankingSource for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn rank(&self, _index: &Index, _query: &str, _k: usize) -> Result<Vec<SearchHit>> {
            Ok(self.0.clone())
        }
    }

    fn index() -> Index {
        build_index(
            &[
                Document::new("rust.md", "cargo builds crates and runs the whole test suite"),
                Document::new("python.md", "pip installs packages into a virtual environment"),
            ],
            &IndexOptions::default(),
        )
    }

    #[tokio::test]
    async fn test_failing_source_falls_back() {
        let index = index();
        let fallback = TermRanker::default();
        let hits = rank_with_fallback(Some(&Failing), &fallback, &index, "cargo", 3).await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].filename, "rust.md");
    }

    #[tokio::test]
    async fn test_missing_source_uses_term_ranker() {
        let index = index();
        let hits = rank_with_fallback(None, &TermRanker::default(), &index, "pip", 3).await;
        assert_eq!(hits[0].filename, "python.md");
    }

    #[tokio::test]
    async fn test_working_source_wins() {
        let index = index();
        let fixed = Fixed(vec![SearchHit {
            filename: "dense.md".to_string(),
            snippet: "from vectors".to_string(),
            score: 0.9,
            explain: None,
        }]);
        let hits = rank_with_fallback(Some(&fixed), &TermRanker::default(), &index, "cargo", 3).await;
        assert_eq!(hits[0].filename, "dense.md");
    }

    #[test]
    fn test_rank_by_vectors_orders_and_filters() {
        let index = index();
        let vectors = vec![vec![1.0, 0.0], vec![0.6, 0.8]];
        let hits = rank_by_vectors(&index, &vectors, &[0.0, 1.0], 3, 0.1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].filename, "python.md");

        let hits = rank_by_vectors(&index, &vectors, &[1.0, 1.0], 3, 0.0);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_or_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
