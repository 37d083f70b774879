//! Core data models used throughout Context Ranker.
//!
//! These types represent the documents, chunks, and search hits that flow
//! through the index build and retrieval pipeline.

use serde::{Deserialize, Serialize};

/// A document as supplied by the document source.
///
/// `filename` is the identifier used in search results (usually a path
/// relative to the corpus root). The text must already be UTF-8; format
/// extraction happens before the document reaches the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub filename: String,
    pub text: String,
}

impl Document {
    pub fn new(filename: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            text: text.into(),
        }
    }

    /// The filename without directories and without its extension.
    ///
    /// This is the key matched against the priority allow-list:
    /// `docs/12.md` → `12`, `notes.tar.gz` → `notes.tar`, `README` → `README`.
    pub fn base_name(&self) -> String {
        base_name(&self.filename)
    }
}

/// Strip directories and the final extension from a filename.
pub fn base_name(filename: &str) -> String {
    let file = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);
    match file.rfind('.') {
        Some(0) | None => file.to_string(),
        Some(pos) => file[..pos].to_string(),
    }
}

/// A token window of a document's text: the unit of retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Monotonically increasing across a whole index build; doubles as
    /// the insertion order used to break score ties.
    pub id: usize,
    /// Owning document's filename.
    pub filename: String,
    /// Owning document's base name (priority key).
    pub base: String,
    /// Ordinal of this window within its document.
    pub position: usize,
    pub text: String,
}

/// A ranked snippet returned from retrieval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub filename: String,
    pub snippet: String,
    pub score: f64,
    /// Scoring breakdown (populated when `explain` is requested).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explain: Option<ScoreExplanation>,
}

/// Scoring breakdown for a search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreExplanation {
    /// Cosine similarity before the priority multiplier.
    pub raw_score: f64,
    /// Multiplier applied (1.0 for non-priority documents).
    pub boost: f64,
    /// Normalized query terms that were found in the chunk.
    pub matched_terms: Vec<String>,
    /// Chunk id (insertion order).
    pub chunk_id: usize,
}
