//! # Context Ranker CLI (`ctxr`)
//!
//! ## Usage
//!
//! ```bash
//! ctxr --config ./config/ctxr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ctxr index` | Build the index from the corpus and print stats |
//! | `ctxr search "<query>"` | Print the top-ranked snippets |
//! | `ctxr classify "<query>"` | Print the task kind of a query |
//! | `ctxr watch` | Rebuild on corpus changes and answer queries from stdin |
//!
//! Diagnostics go to stderr through `tracing`; set `RUST_LOG=debug` for
//! more detail.

use clap::{Parser, Subcommand};
use context_ranker::{config, ingest, search, watch};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Context Ranker: TF-IDF retrieval over a small Hebrew/English corpus.
#[derive(Parser)]
#[command(
    name = "ctxr",
    about = "Context Ranker: TF-IDF snippet retrieval over a small Hebrew/English corpus",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/ctxr.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from the corpus.
    ///
    /// Writes the snapshot when `[index].snapshot_path` is set.
    Index,

    /// Search the corpus.
    ///
    /// Uses the snapshot when one is available, otherwise builds first.
    Search {
        /// The search query string.
        query: String,

        /// Maximum number of results (default `[retrieval].top_k`).
        #[arg(long)]
        limit: Option<usize>,

        /// Minimum score (default `[retrieval].min_score`).
        #[arg(long)]
        min_score: Option<f64>,

        /// Show raw score, boost and matched terms for each hit.
        #[arg(long)]
        explain: bool,
    },

    /// Classify a query as code, summarize, compare, explain or general.
    Classify {
        query: String,
    },

    /// Watch the corpus and answer queries from stdin.
    Watch,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Needs no config
    if let Commands::Classify { query } = &cli.command {
        search::run_classify(query);
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Index => {
            ingest::run_index(&cfg).await?;
        }
        Commands::Search {
            query,
            limit,
            min_score,
            explain,
        } => {
            search::run_search(&cfg, &query, limit, min_score, explain).await?;
        }
        Commands::Watch => {
            watch::run_watch(&cfg).await?;
        }
        Commands::Classify { .. } => unreachable!("handled above"),
    }

    Ok(())
}
