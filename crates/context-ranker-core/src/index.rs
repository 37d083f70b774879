//! TF-IDF term-weight index.
//!
//! An [`Index`] is one immutable generation: the vocabulary, the IDF
//! table, and every chunk with its precomputed sparse weight vector. It is
//! always rebuilt wholesale from the full document set, so the vocabulary
//! and IDF values can never mix statistics from two different corpora.
//!
//! # Build steps
//!
//! 1. Record each document's base name in the priority set when it is on
//!    the configured allow-list.
//! 2. Chunk every document and number the chunks in insertion order.
//! 3. Count raw term occurrences across all chunks and keep the
//!    `max_vocabulary` most frequent (ties keep first-seen order).
//! 4. `idf(t) = ln((1 + chunks) / (1 + df(t))) + 1` over the kept terms.
//! 5. Weight each chunk term as `count × idf`, dropping zero weights.
//!
//! The `+ 1` keeps every idf at 1 or above, so a term present in every
//! chunk (including every term of a one-chunk corpus) still scores.

use std::collections::{BTreeSet, HashMap, HashSet};

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::chunk::{chunk_text, DEFAULT_MAX_TOKENS};
use crate::models::{base_name, Chunk, Document};
use crate::normalize::stem;

/// Default vocabulary cap.
pub const DEFAULT_MAX_VOCABULARY: usize = 5000;

/// Build-time tuning, decoupled from application config.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexOptions {
    /// Window size handed to the chunker.
    pub max_tokens: usize,
    /// Keep at most this many terms; `0` keeps every term.
    pub max_vocabulary: usize,
    /// Document base names whose chunks receive the priority boost.
    pub priority_names: BTreeSet<String>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            max_vocabulary: DEFAULT_MAX_VOCABULARY,
            priority_names: ["12", "13", "14", "15"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

/// A chunk together with its sparse TF-IDF vector.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub chunk: Chunk,
    /// `(term index, weight)` pairs sorted by term index, no zero weights.
    pub weights: Vec<(usize, f64)>,
    /// L2 norm of `weights`.
    pub norm: f64,
}

impl IndexedChunk {
    pub(crate) fn new(chunk: Chunk, weights: Vec<(usize, f64)>) -> Self {
        let norm = l2_norm(weights.iter().map(|(_, w)| *w));
        Self {
            chunk,
            weights,
            norm,
        }
    }

    /// Weight of a term in this chunk, or `0.0` when absent.
    pub fn weight(&self, term_id: usize) -> f64 {
        self.weights
            .binary_search_by_key(&term_id, |(id, _)| *id)
            .map(|pos| self.weights[pos].1)
            .unwrap_or(0.0)
    }
}

/// Counters describing how a generation was built.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildStats {
    /// Documents that were read and chunked.
    pub documents: usize,
    /// Documents that could not be read and were skipped.
    pub skipped: usize,
    pub built_at: DateTime<Utc>,
}

/// One complete, immutable index generation.
#[derive(Debug, Clone)]
pub struct Index {
    vocabulary: Vec<String>,
    term_ids: HashMap<String, usize>,
    idf: Vec<f64>,
    chunks: Vec<IndexedChunk>,
    priority: BTreeSet<String>,
    stats: BuildStats,
}

impl Index {
    pub(crate) fn from_parts(
        vocabulary: Vec<String>,
        idf: Vec<f64>,
        chunks: Vec<IndexedChunk>,
        priority: BTreeSet<String>,
        stats: BuildStats,
    ) -> Self {
        let term_ids = vocabulary
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
        Self {
            vocabulary,
            term_ids,
            idf,
            chunks,
            priority,
            stats,
        }
    }

    /// Terms in frequency-rank order; a term's position is its term index.
    pub fn vocabulary(&self) -> &[String] {
        &self.vocabulary
    }

    /// IDF values aligned with [`vocabulary`](Index::vocabulary).
    pub fn idf_table(&self) -> &[f64] {
        &self.idf
    }

    pub fn term_id(&self, term: &str) -> Option<usize> {
        self.term_ids.get(term).copied()
    }

    pub fn idf(&self, term: &str) -> Option<f64> {
        self.term_id(term).map(|id| self.idf[id])
    }

    /// Chunks in insertion order.
    pub fn chunks(&self) -> &[IndexedChunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Base names present in this generation that receive the boost.
    pub fn priority_set(&self) -> &BTreeSet<String> {
        &self.priority
    }

    pub fn is_priority(&self, base: &str) -> bool {
        self.priority.contains(base)
    }

    pub fn stats(&self) -> &BuildStats {
        &self.stats
    }

    /// Build a sparse `count × idf` vector for already-normalized terms.
    ///
    /// Terms outside the vocabulary are ignored. Used for queries so they
    /// are weighted exactly like chunks.
    pub fn weigh_terms(&self, terms: &[String]) -> Vec<(usize, f64)> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for term in terms {
            if let Some(id) = self.term_id(term) {
                *counts.entry(id).or_insert(0) += 1;
            }
        }
        let mut weights: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(id, count)| (id, count as f64 * self.idf[id]))
            .filter(|(_, w)| *w != 0.0)
            .collect();
        weights.sort_by_key(|(id, _)| *id);
        weights
    }
}

/// Build an index from documents that are already in memory.
pub fn build_index(documents: &[Document], options: &IndexOptions) -> Index {
    build_index_from(documents.iter().cloned().map(Ok), options)
}

/// Build an index from a document source that may fail per document.
///
/// Failed reads are logged and skipped; the index is built from whatever
/// documents could be read. An empty source yields an empty index.
pub fn build_index_from<I>(reads: I, options: &IndexOptions) -> Index
where
    I: IntoIterator<Item = Result<Document>>,
{
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut chunk_terms: Vec<Vec<String>> = Vec::new();
    let mut priority = BTreeSet::new();
    let mut documents = 0;
    let mut skipped = 0;

    for read in reads {
        let doc = match read {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "skipping unreadable document");
                skipped += 1;
                continue;
            }
        };
        documents += 1;

        let base = base_name(&doc.filename);
        if options.priority_names.contains(&base) {
            priority.insert(base.clone());
        }

        let windows = chunk_text(&doc.text, options.max_tokens);
        debug!(filename = %doc.filename, chunks = windows.len(), "chunked document");
        for (position, text) in windows.into_iter().enumerate() {
            // window text is already tokenized
            chunk_terms.push(text.split_whitespace().map(stem).collect());
            chunks.push(Chunk {
                id: chunks.len(),
                filename: doc.filename.clone(),
                base: base.clone(),
                position,
                text,
            });
        }
    }

    let vocabulary = build_vocabulary(&chunk_terms, options.max_vocabulary);
    let term_ids: HashMap<&str, usize> = vocabulary
        .iter()
        .enumerate()
        .map(|(i, t)| (t.as_str(), i))
        .collect();

    let idf = compute_idf(&chunk_terms, &term_ids, vocabulary.len());

    let indexed: Vec<IndexedChunk> = chunks
        .into_iter()
        .zip(chunk_terms.iter())
        .map(|(chunk, terms)| IndexedChunk::new(chunk, chunk_weights(terms, &term_ids, &idf)))
        .collect();

    info!(
        documents,
        skipped,
        chunks = indexed.len(),
        terms = vocabulary.len(),
        "index built"
    );

    Index::from_parts(
        vocabulary,
        idf,
        indexed,
        priority,
        BuildStats {
            documents,
            skipped,
            built_at: Utc::now(),
        },
    )
}

/// Most frequent terms first; equal counts keep first-seen order.
fn build_vocabulary(chunk_terms: &[Vec<String>], cap: usize) -> Vec<String> {
    // term -> (raw count, first-seen rank)
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for term in chunk_terms.iter().flatten() {
        let next_rank = counts.len();
        counts.entry(term.as_str()).or_insert((0, next_rank)).0 += 1;
    }

    let mut ranked: Vec<(&str, usize, usize)> = counts
        .into_iter()
        .map(|(term, (count, first_seen))| (term, count, first_seen))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));

    if cap > 0 {
        ranked.truncate(cap);
    }
    ranked.into_iter().map(|(t, _, _)| t.to_string()).collect()
}

fn compute_idf(
    chunk_terms: &[Vec<String>],
    term_ids: &HashMap<&str, usize>,
    vocab_len: usize,
) -> Vec<f64> {
    let mut doc_freq = vec![0usize; vocab_len];
    for terms in chunk_terms {
        let unique: HashSet<usize> = terms
            .iter()
            .filter_map(|t| term_ids.get(t.as_str()).copied())
            .collect();
        for id in unique {
            doc_freq[id] += 1;
        }
    }

    let n = chunk_terms.len() as f64;
    doc_freq
        .into_iter()
        .map(|df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
        .collect()
}

fn chunk_weights(
    terms: &[String],
    term_ids: &HashMap<&str, usize>,
    idf: &[f64],
) -> Vec<(usize, f64)> {
    let mut counts: HashMap<usize, usize> = HashMap::new();
    for term in terms {
        if let Some(&id) = term_ids.get(term.as_str()) {
            *counts.entry(id).or_insert(0) += 1;
        }
    }
    let mut weights: Vec<(usize, f64)> = counts
        .into_iter()
        .map(|(id, count)| (id, count as f64 * idf[id]))
        .filter(|(_, w)| *w != 0.0)
        .collect();
    weights.sort_by_key(|(id, _)| *id);
    weights
}

pub(crate) fn l2_norm(values: impl Iterator<Item = f64>) -> f64 {
    values.map(|w| w * w).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(name: &str, text: &str) -> Document {
        Document::new(name, text)
    }

    fn small_options() -> IndexOptions {
        IndexOptions {
            max_tokens: 5,
            ..IndexOptions::default()
        }
    }

    #[test]
    fn test_empty_corpus_builds_empty_index() {
        let index = build_index(&[], &IndexOptions::default());
        assert!(index.is_empty());
        assert!(index.vocabulary().is_empty());
        assert!(index.idf_table().is_empty());
        assert_eq!(index.stats().documents, 0);
    }

    #[test]
    fn test_chunk_ids_monotonic_across_documents() {
        let docs = vec![
            doc("a.md", "alpha bravo charlie delta echo foxtrot golf hotel india juliet"),
            doc("b.md", "kilo lima mike november oscar papa quebec romeo sierra tango"),
        ];
        let index = build_index(&docs, &small_options());
        let ids: Vec<usize> = index.chunks().iter().map(|c| c.chunk.id).collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
        assert_eq!(index.chunks()[2].chunk.filename, "b.md");
        assert_eq!(index.chunks()[2].chunk.position, 0);
        assert_eq!(index.chunks()[3].chunk.position, 1);
    }

    #[test]
    fn test_idf_formula() {
        let docs = vec![
            doc("a.md", "common rareone filler words here"),
            doc("b.md", "common raretwo filler words also"),
        ];
        let index = build_index(&docs, &small_options());
        assert_eq!(index.len(), 2);
        // in both chunks: ln(3/3) + 1
        assert_eq!(index.idf("common"), Some(1.0));
        // in one chunk: ln(3/2) + 1
        let expected = (3.0f64 / 2.0).ln() + 1.0;
        assert!((index.idf("rareone").unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_term_in_every_chunk_still_weighted() {
        let docs = vec![
            doc("a.md", "common rareone filler words here"),
            doc("b.md", "common raretwo filler words also"),
        ];
        let index = build_index(&docs, &small_options());
        let common = index.term_id("common").unwrap();
        for c in index.chunks() {
            assert_eq!(c.weight(common), 1.0);
            assert!(c.weights.iter().all(|(_, w)| *w > 0.0));
        }
    }

    #[test]
    fn test_single_chunk_corpus_has_positive_weights() {
        let docs = vec![doc("12.md", "משחק טטריס כיף וגם עוד כמה מילים")];
        let index = build_index(&docs, &IndexOptions::default());
        assert_eq!(index.len(), 1);
        assert!(index.idf_table().iter().all(|idf| *idf == 1.0));
        assert_eq!(index.chunks()[0].weights.len(), index.vocabulary().len());
        assert!(index.chunks()[0].norm > 0.0);
    }

    #[test]
    fn test_punctuation_only_document_adds_no_chunks() {
        let docs = vec![
            doc("rule.md", "---- ---- ---- ---- ---- ...."),
            doc("a.md", "a readable document with plenty of words"),
        ];
        let index = build_index(&docs, &IndexOptions::default());
        assert_eq!(index.stats().documents, 2);
        assert_eq!(index.len(), 1);
        assert_eq!(index.chunks()[0].chunk.filename, "a.md");
        assert!(index.chunks().iter().all(|c| !c.weights.is_empty()));
    }

    #[test]
    fn test_chunk_terms_are_stemmed_chunk_tokens() {
        let docs = vec![doc("a.md", "הַסְּפָרִים של המשפחה על המדף בבית")];
        let index = build_index(&docs, &IndexOptions::default());
        assert_eq!(index.chunks()[0].chunk.text, "הספרימ של המשפחה על המדפ בבית");
        for term in ["ספר", "משפח", "מדפ", "בית"] {
            assert!(index.term_id(term).is_some(), "missing {}", term);
        }
        assert!(index.term_id("הספרימ").is_none());
    }

    #[test]
    fn test_weight_is_count_times_idf() {
        let docs = vec![
            doc("a.md", "echo echo echo foxtrot golfing"),
            doc("b.md", "other words entirely different here"),
        ];
        let index = build_index(&docs, &small_options());
        let echo = index.term_id("echo").unwrap();
        let idf = index.idf("echo").unwrap();
        assert!((index.chunks()[0].weight(echo) - 3.0 * idf).abs() < 1e-12);
        assert_eq!(index.chunks()[1].weight(echo), 0.0);
    }

    #[test]
    fn test_vocabulary_frequency_order_with_first_seen_ties() {
        let docs = vec![doc(
            "a.md",
            "zulu yankee zulu xray yankee zulu whiskey victor uniform",
        )];
        let options = IndexOptions {
            max_tokens: 60,
            ..IndexOptions::default()
        };
        let index = build_index(&docs, &options);
        assert_eq!(
            index.vocabulary(),
            &["zulu", "yankee", "xray", "whiskey", "victor", "uniform"]
        );
    }

    #[test]
    fn test_vocabulary_cap() {
        let docs = vec![doc(
            "a.md",
            "zulu yankee zulu xray yankee zulu whiskey victor uniform",
        )];
        let options = IndexOptions {
            max_tokens: 60,
            max_vocabulary: 2,
            ..IndexOptions::default()
        };
        let index = build_index(&docs, &options);
        assert_eq!(index.vocabulary(), &["zulu", "yankee"]);
        assert_eq!(index.idf_table().len(), 2);
        assert!(index.term_id("xray").is_none());
    }

    #[test]
    fn test_priority_set_from_allow_list() {
        let docs = vec![
            doc("12.md", "priority document text with enough characters"),
            doc("notes.md", "ordinary document text with enough characters"),
            doc("docs/13.txt", "another priority document with enough text"),
        ];
        let index = build_index(&docs, &IndexOptions::default());
        let expected: BTreeSet<String> = ["12", "13"].into_iter().map(String::from).collect();
        assert_eq!(index.priority_set(), &expected);
        assert!(index.is_priority("12"));
        assert!(!index.is_priority("notes"));
    }

    #[test]
    fn test_unreadable_documents_skipped() {
        let reads = vec![
            Ok(doc("a.md", "readable document with plenty of words inside")),
            Err(anyhow::anyhow!("permission denied")),
            Ok(doc("c.md", "second readable document with plenty of words")),
        ];
        let index = build_index_from(reads, &IndexOptions::default());
        assert_eq!(index.stats().documents, 2);
        assert_eq!(index.stats().skipped, 1);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_build_idempotent() {
        let docs = vec![
            doc("12.md", "משחק טטריס כיף מאוד לכל המשפחה ועוד הרבה מילים נוספות כאן"),
            doc("b.md", "rust programming language with cargo and crates for everyone"),
        ];
        let a = build_index(&docs, &small_options());
        let b = build_index(&docs, &small_options());
        assert_eq!(a.vocabulary(), b.vocabulary());
        assert_eq!(a.idf_table(), b.idf_table());
        assert_eq!(a.chunks(), b.chunks());
    }

    #[test]
    fn test_chunk_text_never_empty() {
        let docs = vec![doc("a.md", "x y z\n\n\n    short      words    everywhere   here")];
        let index = build_index(&docs, &IndexOptions::default());
        for c in index.chunks() {
            assert!(!c.chunk.text.is_empty());
        }
    }

    #[test]
    fn test_weigh_terms_ignores_unknown() {
        let docs = vec![
            doc("a.md", "echo echo echo foxtrot golfing"),
            doc("b.md", "other words entirely different here"),
        ];
        let index = build_index(&docs, &small_options());
        let q = index.weigh_terms(&["echo".to_string(), "unknown".to_string()]);
        assert_eq!(q.len(), 1);
        assert_eq!(q[0].0, index.term_id("echo").unwrap());
    }
}
