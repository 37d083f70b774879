//! `ctxr search` and `ctxr classify`.

use anyhow::{bail, Result};
use context_ranker_core::classify::classify;
use context_ranker_core::SearchHit;

use crate::config::Config;
use crate::engine::Engine;

pub async fn run_search(
    config: &Config,
    query: &str,
    limit: Option<usize>,
    min_score: Option<f64>,
    explain: bool,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results.");
        return Ok(());
    }

    let mut params = config.rank_params();
    if let Some(limit) = limit {
        if limit == 0 {
            bail!("--limit must be >= 1");
        }
        params.top_k = limit;
    }
    if let Some(min) = min_score {
        if !(min >= 0.0) {
            bail!("--min-score must be >= 0.0");
        }
        params.min_score = min;
    }

    let engine = Engine::new(config.clone());
    if !engine.restore() {
        engine.rebuild().await?;
    }

    let hits = if explain {
        engine.search(query, params, true)
    } else {
        engine.retrieve_with(query, params).await
    };

    print_hits(&hits);
    Ok(())
}

pub fn run_classify(query: &str) {
    println!("{}", classify(query));
}

/// Human-readable result listing on stdout.
pub fn print_hits(hits: &[SearchHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        println!("{}. [{:.4}] {}", i + 1, hit.score, hit.filename);
        println!("    excerpt: \"{}\"", hit.snippet.replace('\n', " ").trim());
        if let Some(ex) = &hit.explain {
            println!(
                "    raw: {:.4}  boost: {}  chunk: {}",
                ex.raw_score, ex.boost, ex.chunk_id
            );
            println!("    matched: {}", ex.matched_terms.join(", "));
        }
        println!();
    }
}
