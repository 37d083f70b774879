//! Priority-boosted, thresholded TF-IDF ranking.
//!
//! The ranker reads one [`Index`] generation and never mutates it. All
//! tuning comes in through [`RankParams`], so a caller can try a different
//! threshold for a single query without touching shared configuration.
//!
//! # Scoring Algorithm
//!
//! 1. Normalize the query with the same [`normalize`] used at build time.
//! 2. Weigh query terms as `count × idf` over the index vocabulary.
//! 3. Score each chunk by cosine similarity between the query vector and
//!    the chunk's stored vector (shared-term dot product over both norms).
//! 4. Multiply by `priority_boost` when the chunk's base name is in the
//!    index's priority set.
//! 5. Keep chunks with a positive boosted score `>= min_score`.
//! 6. Sort by score (desc), then chunk id (asc); truncate to `top_k`.

use std::cmp::Ordering;

use crate::index::{l2_norm, Index, IndexedChunk};
use crate::models::{ScoreExplanation, SearchHit};
use crate::normalize::normalize;

/// Default number of hits returned.
pub const DEFAULT_TOP_K: usize = 3;
/// Default minimum boosted score.
pub const DEFAULT_MIN_SCORE: f64 = 0.08;
/// Default multiplier for priority documents.
pub const DEFAULT_PRIORITY_BOOST: f64 = 2.0;

/// Ranking tuning parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankParams {
    pub top_k: usize,
    /// Boosted scores below this are dropped; a score equal to it is kept.
    pub min_score: f64,
    pub priority_boost: f64,
}

impl Default for RankParams {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
            priority_boost: DEFAULT_PRIORITY_BOOST,
        }
    }
}

/// Bundles all inputs for a single search invocation.
#[derive(Debug, Clone)]
pub struct SearchRequest<'a> {
    pub query: &'a str,
    pub params: RankParams,
    /// If true, populate [`ScoreExplanation`] on each hit.
    pub explain: bool,
}

impl<'a> SearchRequest<'a> {
    pub fn new(query: &'a str) -> Self {
        Self {
            query,
            params: RankParams::default(),
            explain: false,
        }
    }
}

/// Return at most `k` hits for `query`, best first.
///
/// `threshold` overrides the default minimum score for this call only.
/// A missing index, an empty query and `k == 0` all yield an empty list.
///
/// ```rust
/// use context_ranker_core::{build_index, retrieve_top_k, Document, IndexOptions};
///
/// let docs = vec![
///     Document::new("rust.md", "cargo builds crates and runs the test suite"),
///     Document::new("py.md", "pip installs packages into a virtual environment"),
/// ];
/// let index = build_index(&docs, &IndexOptions::default());
/// let hits = retrieve_top_k(Some(&index), "cargo crates", 3, None);
/// assert_eq!(hits[0].filename, "rust.md");
/// assert!(retrieve_top_k(None, "cargo", 3, None).is_empty());
/// ```
pub fn retrieve_top_k(
    index: Option<&Index>,
    query: &str,
    k: usize,
    threshold: Option<f64>,
) -> Vec<SearchHit> {
    let Some(index) = index else {
        return Vec::new();
    };
    let mut req = SearchRequest::new(query);
    req.params.top_k = k;
    if let Some(t) = threshold {
        req.params.min_score = t;
    }
    search(index, &req)
}

/// Rank every chunk of `index` against the request.
pub fn search(index: &Index, req: &SearchRequest<'_>) -> Vec<SearchHit> {
    if req.params.top_k == 0 || index.is_empty() {
        return Vec::new();
    }

    let terms = normalize(req.query);
    let query_vec = index.weigh_terms(&terms);
    if query_vec.is_empty() {
        return Vec::new();
    }
    let query_norm = l2_norm(query_vec.iter().map(|(_, w)| *w));

    struct Scored<'i> {
        chunk: &'i IndexedChunk,
        raw: f64,
        boost: f64,
        score: f64,
    }

    let mut scored: Vec<Scored<'_>> = index
        .chunks()
        .iter()
        .filter_map(|c| {
            let raw = cosine(&query_vec, query_norm, c);
            if raw <= 0.0 {
                return None;
            }
            let boost = if index.is_priority(&c.chunk.base) {
                req.params.priority_boost
            } else {
                1.0
            };
            let score = raw * boost;
            (score >= req.params.min_score).then_some(Scored {
                chunk: c,
                raw,
                boost,
                score,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(a.chunk.chunk.id.cmp(&b.chunk.chunk.id))
    });
    scored.truncate(req.params.top_k);

    scored
        .into_iter()
        .map(|s| SearchHit {
            filename: s.chunk.chunk.filename.clone(),
            snippet: s.chunk.chunk.text.clone(),
            score: s.score,
            explain: req.explain.then(|| ScoreExplanation {
                raw_score: s.raw,
                boost: s.boost,
                matched_terms: matched_terms(index, &query_vec, s.chunk),
                chunk_id: s.chunk.chunk.id,
            }),
        })
        .collect()
}

/// Cosine similarity of a sparse query vector against a chunk vector.
///
/// Both vectors are sorted by term index, so shared terms are found with
/// a single merge pass.
fn cosine(query: &[(usize, f64)], query_norm: f64, chunk: &IndexedChunk) -> f64 {
    if query_norm == 0.0 || chunk.norm == 0.0 {
        return 0.0;
    }
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < query.len() && j < chunk.weights.len() {
        match query[i].0.cmp(&chunk.weights[j].0) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                dot += query[i].1 * chunk.weights[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot / (query_norm * chunk.norm)
}

fn matched_terms(index: &Index, query: &[(usize, f64)], chunk: &IndexedChunk) -> Vec<String> {
    query
        .iter()
        .filter(|(id, _)| chunk.weight(*id) > 0.0)
        .map(|(id, _)| index.vocabulary()[*id].clone())
        .collect()
}
