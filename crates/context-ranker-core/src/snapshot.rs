//! Serializable shape of an index generation.
//!
//! A snapshot stores the vocabulary, the IDF table and each chunk's
//! filename, text and sparse weights as `(term index, weight)` pairs.
//! Base names, positions and norms are derived again on load, and the
//! priority set is recomputed from the caller's allow-list so a changed
//! configuration takes effect without a rebuild.
//!
//! A snapshot may also carry an opaque fingerprint of the corpus it was
//! built from; the application compares it against the live corpus to
//! decide whether the snapshot is still current. Reading and writing
//! snapshot files is left to the application.

use std::collections::BTreeSet;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::index::{BuildStats, Index, IndexedChunk};
use crate::models::{base_name, Chunk};

/// Current snapshot layout version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    pub version: u32,
    pub built_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corpus_fingerprint: Option<String>,
    pub vocabulary: Vec<String>,
    pub idf: Vec<f64>,
    pub chunks: Vec<SnapshotChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotChunk {
    pub filename: String,
    pub text: String,
    pub weights: Vec<(usize, f64)>,
}

impl IndexSnapshot {
    pub fn from_index(index: &Index) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            built_at: index.stats().built_at,
            corpus_fingerprint: None,
            vocabulary: index.vocabulary().to_vec(),
            idf: index.idf_table().to_vec(),
            chunks: index
                .chunks()
                .iter()
                .map(|c| SnapshotChunk {
                    filename: c.chunk.filename.clone(),
                    text: c.chunk.text.clone(),
                    weights: c.weights.clone(),
                })
                .collect(),
        }
    }

    /// Rebuild an [`Index`] from this snapshot.
    ///
    /// Fails when the version is unknown or a weight refers to a term
    /// index outside the vocabulary.
    pub fn into_index(self, priority_names: &BTreeSet<String>) -> Result<Index> {
        if self.version != SNAPSHOT_VERSION {
            bail!(
                "Unsupported snapshot version {} (expected {})",
                self.version,
                SNAPSHOT_VERSION
            );
        }
        if self.idf.len() != self.vocabulary.len() {
            bail!(
                "Snapshot idf table has {} entries for {} terms",
                self.idf.len(),
                self.vocabulary.len()
            );
        }

        let mut priority = BTreeSet::new();
        let mut filenames = BTreeSet::new();
        let mut chunks = Vec::with_capacity(self.chunks.len());
        let mut position = 0;
        let mut previous: Option<String> = None;

        for (id, sc) in self.chunks.into_iter().enumerate() {
            if let Some(&(bad, _)) = sc.weights.iter().find(|(t, _)| *t >= self.vocabulary.len()) {
                bail!("Snapshot chunk {} references unknown term index {}", id, bad);
            }

            position = match previous.as_deref() {
                Some(prev) if prev == sc.filename => position + 1,
                _ => 0,
            };
            previous = Some(sc.filename.clone());

            let base = base_name(&sc.filename);
            if priority_names.contains(&base) {
                priority.insert(base.clone());
            }
            filenames.insert(sc.filename.clone());

            let mut weights = sc.weights;
            weights.sort_by_key(|(t, _)| *t);
            chunks.push(IndexedChunk::new(
                Chunk {
                    id,
                    filename: sc.filename,
                    base,
                    position,
                    text: sc.text,
                },
                weights,
            ));
        }

        Ok(Index::from_parts(
            self.vocabulary,
            self.idf,
            chunks,
            priority,
            BuildStats {
                documents: filenames.len(),
                skipped: 0,
                built_at: self.built_at,
            },
        ))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize index snapshot")
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse index snapshot")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{build_index, IndexOptions};
    use crate::models::Document;
    use crate::search::retrieve_top_k;

    fn sample() -> Index {
        let docs = vec![
            Document::new(
                "12.md",
                "משחק טטריס כיף מאוד לכל המשפחה ועוד הרבה מילים נוספות כאן",
            ),
            Document::new("notes.md", "rust programming language with cargo and crates"),
        ];
        build_index(
            &docs,
            &IndexOptions {
                max_tokens: 5,
                ..IndexOptions::default()
            },
        )
    }

    #[test]
    fn test_restored_index_ranks_identically() {
        let index = sample();
        let json = IndexSnapshot::from_index(&index).to_json().unwrap();
        let restored = IndexSnapshot::from_json(&json)
            .unwrap()
            .into_index(&IndexOptions::default().priority_names)
            .unwrap();

        assert_eq!(restored.vocabulary(), index.vocabulary());
        assert_eq!(restored.priority_set(), index.priority_set());
        for (a, b) in restored.idf_table().iter().zip(index.idf_table()) {
            assert!((a - b).abs() < 1e-12);
        }
        assert_eq!(restored.len(), index.len());
        for (a, b) in restored.chunks().iter().zip(index.chunks()) {
            assert_eq!(a.chunk, b.chunk);
            assert_eq!(a.weights.len(), b.weights.len());
        }

        for query in ["טטריס", "cargo crates", "מילים"] {
            let got = retrieve_top_k(Some(&restored), query, 3, None);
            let want = retrieve_top_k(Some(&index), query, 3, None);
            assert!(!want.is_empty());
            assert_eq!(got.len(), want.len());
            for (g, w) in got.iter().zip(&want) {
                assert_eq!(g.filename, w.filename);
                assert_eq!(g.snippet, w.snippet);
                assert!((g.score - w.score).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_priority_recomputed_from_allow_list() {
        let snapshot = IndexSnapshot::from_index(&sample());
        let names: BTreeSet<String> = ["notes".to_string()].into_iter().collect();
        let restored = snapshot.into_index(&names).unwrap();
        assert!(restored.is_priority("notes"));
        assert!(!restored.is_priority("12"));
    }

    #[test]
    fn test_rejects_out_of_range_term() {
        let mut snapshot = IndexSnapshot::from_index(&sample());
        snapshot.chunks[0].weights.push((10_000, 1.0));
        assert!(snapshot.into_index(&BTreeSet::new()).is_err());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut snapshot = IndexSnapshot::from_index(&sample());
        snapshot.version = 99;
        assert!(snapshot.into_index(&BTreeSet::new()).is_err());
    }

    #[test]
    fn test_corpus_fingerprint_is_optional() {
        let mut snapshot = IndexSnapshot::from_index(&sample());
        let json = snapshot.to_json().unwrap();
        assert!(!json.contains("corpus_fingerprint"));
        assert_eq!(IndexSnapshot::from_json(&json).unwrap().corpus_fingerprint, None);

        snapshot.corpus_fingerprint = Some("abc123".to_string());
        let parsed = IndexSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(parsed.corpus_fingerprint.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_weights_serialize_as_pairs() {
        let snapshot = IndexSnapshot::from_index(&sample());
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
        let first = &value["chunks"][0]["weights"][0];
        assert!(first.is_array());
        assert_eq!(first.as_array().unwrap().len(), 2);
    }
}
