//! The retrieval engine: index handle, snapshot store and optional dense
//! ranker wired together from one [`Config`].
//!
//! Both the one-shot CLI commands and the watch loop go through
//! [`Engine`], so a query answered right after `ctxr index` and one
//! answered inside `ctxr watch` see the same ranking.

use anyhow::Result;
use context_ranker_core::embedding::{rank_with_fallback, RankingSource, TermRanker};
use context_ranker_core::search::{search, SearchRequest};
use context_ranker_core::{Index, IndexHandle, RankParams, RebuildOutcome, SearchHit};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::connector_fs;
use crate::embedding::{DenseRanker, RemoteEmbedder};
use crate::store;

pub struct Engine {
    config: Arc<Config>,
    handle: Arc<IndexHandle>,
    dense: Option<Arc<DenseRanker>>,
}

impl Engine {
    /// An embedding provider that cannot be set up (missing API key, bad
    /// client settings) is logged and left out; ranking then uses term
    /// weights only.
    pub fn new(config: Config) -> Self {
        let dense = match RemoteEmbedder::from_config(&config.embedding) {
            Ok(embedder) => embedder
                .map(|e| Arc::new(DenseRanker::new(Arc::new(e), config.embedding.min_score))),
            Err(e) => {
                warn!(error = %e, "embedding provider unavailable; using term weights");
                None
            }
        };
        Self::with_dense(config, dense)
    }

    /// Build an engine with an explicit dense ranker (or none).
    pub fn with_dense(config: Config, dense: Option<Arc<DenseRanker>>) -> Self {
        let handle = Arc::new(IndexHandle::new(config.index_options()));
        Self {
            config: Arc::new(config),
            handle,
            dense,
        }
    }

    /// The live generation, if any.
    pub fn current(&self) -> Option<Arc<Index>> {
        self.handle.current()
    }

    /// Install the on-disk snapshot, if one is configured, usable and
    /// built from the corpus as it is now.
    ///
    /// A snapshot whose corpus fingerprint no longer matches is left
    /// alone. When the corpus cannot be read at all, the snapshot is
    /// installed as is. Returns whether a generation was installed.
    pub fn restore(&self) -> bool {
        let Some(path) = self.config.index.snapshot_path.as_deref() else {
            return false;
        };
        let Some(stored) = store::try_load_snapshot(path, &self.handle.options().priority_names)
        else {
            return false;
        };

        match connector_fs::fingerprint(&self.config.corpus) {
            Ok(current) if stored.fingerprint.as_deref() != Some(current.as_str()) => {
                info!(path = %path.display(), "corpus changed since snapshot was written");
                return false;
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "cannot read corpus; using snapshot as is"),
        }

        let chunks = stored.index.len();
        let generation = self.handle.install(stored.index);
        info!(path = %path.display(), generation, chunks, "restored index snapshot");
        true
    }

    /// Re-read the corpus and build a new generation.
    ///
    /// The build runs on the blocking pool. On success the snapshot of
    /// the generation this call built is written and chunk embeddings are
    /// refreshed; failures of either are logged and do not undo the new
    /// generation.
    pub async fn rebuild(&self) -> Result<RebuildOutcome> {
        let handle = Arc::clone(&self.handle);
        let config = Arc::clone(&self.config);
        let (outcome, fingerprint) = tokio::task::spawn_blocking(move || {
            let mut fingerprint = None;
            let outcome = handle.rebuild(|| {
                // before reading: an edit during the scan leaves the snapshot stale
                fingerprint = connector_fs::fingerprint(&config.corpus).ok();
                connector_fs::scan_documents(&config.corpus)
            })?;
            Ok::<_, anyhow::Error>((outcome, fingerprint))
        })
        .await??;

        if let RebuildOutcome::Rebuilt { index, .. } = &outcome {
            self.after_build(Arc::clone(index), fingerprint.as_deref()).await;
        }
        Ok(outcome)
    }

    async fn after_build(&self, index: Arc<Index>, fingerprint: Option<&str>) {
        if let Some(path) = self.config.index.snapshot_path.as_deref() {
            if let Err(e) = store::save_snapshot(path, &index, fingerprint) {
                warn!(path = %path.display(), error = %e, "failed to write snapshot");
            }
        }
        if let Some(dense) = &self.dense {
            if let Err(e) = dense.refresh(index).await {
                warn!(error = %e, "chunk embedding failed; queries use term weights");
            }
        }
    }

    /// Top-k snippets for `query` against the live generation.
    ///
    /// Returns an empty list before the first build.
    pub async fn retrieve(&self, query: &str, k: usize) -> Vec<SearchHit> {
        let mut params = self.config.rank_params();
        params.top_k = k;
        self.retrieve_with(query, params).await
    }

    /// Like [`Engine::retrieve`] with explicit term-ranker parameters.
    pub async fn retrieve_with(&self, query: &str, params: RankParams) -> Vec<SearchHit> {
        let Some(index) = self.handle.current() else {
            return Vec::new();
        };
        let fallback = TermRanker::new(params);
        let primary = self.dense.as_deref().map(|d| d as &dyn RankingSource);
        rank_with_fallback(primary, &fallback, &index, query, params.top_k).await
    }

    /// Term-weight search with explicit parameters, optionally explained.
    pub fn search(&self, query: &str, params: RankParams, explain: bool) -> Vec<SearchHit> {
        match self.handle.current() {
            Some(index) => search(
                &index,
                &SearchRequest {
                    query,
                    params,
                    explain,
                },
            ),
            None => Vec::new(),
        }
    }
}
