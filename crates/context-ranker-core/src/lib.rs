//! # Context Ranker Core
//!
//! Pure, synchronous retrieval engine for Context Ranker: text
//! normalization, chunking, the TF-IDF term-weight index, the
//! priority-boosted ranker, and the swappable index handle.
//!
//! This crate performs no filesystem or network I/O. Documents come in
//! as UTF-8 text and ranked snippets come out; reading files, persisting
//! snapshots and talking to embedding services is the job of the
//! `context-ranker` application crate.

pub mod chunk;
pub mod classify;
pub mod embedding;
pub mod index;
pub mod lifecycle;
pub mod models;
pub mod normalize;
pub mod search;
pub mod snapshot;

pub use index::{build_index, build_index_from, Index, IndexOptions};
pub use lifecycle::{IndexHandle, RebuildOutcome};
pub use models::{Chunk, Document, SearchHit};
pub use search::{retrieve_top_k, search, RankParams, SearchRequest};
