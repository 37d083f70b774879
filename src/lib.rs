//! # Context Ranker
//!
//! A small in-memory retrieval engine for Hebrew and English document
//! corpora. Documents are split into short chunks, weighted with TF-IDF
//! over a normalized vocabulary, and ranked against free-text queries;
//! a handful of designated documents get a score boost.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ Filesystem  │──▶│ Index build  │──▶│ IndexHandle  │──▶ ranked snippets
//! │  corpus     │   │ (core crate) │   │ live gen.    │
//! └──────┬──────┘   └──────────────┘   └──────┬───────┘
//!        │ poll                               │
//!        ▼                                    ▼
//!  CorpusWatcher ──▶ Debouncer ──▶ rebuild   snapshot file
//! ```
//!
//! The algorithms live in `context-ranker-core`; this crate adds the
//! configuration, the filesystem reader, snapshot persistence, the
//! debounced rebuild loop, the optional embedding service and the `ctxr`
//! CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! ctxr index                    # build and report
//! ctxr search "טטריס"           # top snippets
//! ctxr search "tetris" --explain
//! ctxr watch                    # rebuild on change, answer stdin queries
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`connector_fs`] | Corpus reader |
//! | [`engine`] | Index handle, snapshot and ranking wired together |
//! | [`embedding`] | Remote embedding providers and dense ranking |
//! | [`ingest`] | `ctxr index` |
//! | [`search`] | `ctxr search`, `ctxr classify` |
//! | [`store`] | Snapshot files |
//! | [`watch`] | Debounced rebuilds and `ctxr watch` |

pub mod config;
pub mod connector_fs;
pub mod embedding;
pub mod engine;
pub mod ingest;
pub mod search;
pub mod store;
pub mod watch;
