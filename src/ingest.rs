//! `ctxr index`: build one generation from the corpus and report on it.

use anyhow::{bail, Result};
use context_ranker_core::RebuildOutcome;

use crate::config::Config;
use crate::engine::Engine;

pub async fn run_index(config: &Config) -> Result<()> {
    if !config.corpus.root.exists() {
        bail!("Corpus root does not exist: {}", config.corpus.root.display());
    }

    let engine = Engine::new(config.clone());
    let outcome = engine.rebuild().await?;
    let RebuildOutcome::Rebuilt { index, .. } = outcome else {
        bail!("Index build did not complete");
    };

    let stats = index.stats();
    println!("index {}", config.corpus.root.display());
    println!("  documents: {}", stats.documents);
    if stats.skipped > 0 {
        println!("  skipped: {}", stats.skipped);
    }
    println!("  chunks: {}", index.len());
    println!("  vocabulary: {}", index.vocabulary().len());
    let priority: Vec<&str> = index.priority_set().iter().map(String::as_str).collect();
    if !priority.is_empty() {
        println!("  priority: {}", priority.join(", "));
    }
    if let Some(path) = &config.index.snapshot_path {
        println!("  snapshot: {}", path.display());
    }
    println!("  built: {}", stats.built_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("ok");
    Ok(())
}
