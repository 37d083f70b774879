//! Debounced index rebuilds.
//!
//! Anything that wants a rebuild holds a [`RebuildTrigger`] and calls
//! [`RebuildTrigger::fire`]. A single [`Debouncer`] task owns the other
//! end of a one-slot channel: it waits until triggers stop arriving for
//! `window`, then runs exactly one rebuild. A trigger that arrives while
//! a rebuild runs stays in the slot and causes one follow-up rebuild;
//! further triggers are dropped because the slot is already full.
//!
//! [`CorpusWatcher`] is one such trigger source. It polls a fingerprint
//! of the corpus and fires whenever the fingerprint changes.

use anyhow::Result;
use context_ranker_core::RebuildOutcome;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{Config, CorpusConfig};
use crate::connector_fs;
use crate::engine::Engine;
use crate::search::print_hits;

/// Why a rebuild was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The corpus fingerprint changed.
    CorpusChanged,
    /// Someone asked explicitly (`:reindex` in `ctxr watch`, tests).
    Manual,
}

/// Cloneable, non-blocking sender of rebuild requests.
#[derive(Debug, Clone)]
pub struct RebuildTrigger {
    tx: mpsc::Sender<Trigger>,
}

impl RebuildTrigger {
    /// Request a rebuild.
    ///
    /// Returns `false` when the debouncer has shut down.
    pub fn fire(&self, trigger: Trigger) -> bool {
        match self.tx.try_send(trigger) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(?trigger, "rebuild already pending; trigger coalesced");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving side: turns bursts of triggers into single rebuilds.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    rx: mpsc::Receiver<Trigger>,
}

impl Debouncer {
    pub fn new(window: Duration) -> (RebuildTrigger, Debouncer) {
        let (tx, rx) = mpsc::channel(1);
        (RebuildTrigger { tx }, Debouncer { window, rx })
    }

    /// Run until every [`RebuildTrigger`] is dropped.
    ///
    /// A burst that is still settling when the last trigger is dropped is
    /// flushed with one final rebuild before returning.
    pub async fn run<F, Fut>(mut self, mut rebuild: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ()>,
    {
        while let Some(first) = self.rx.recv().await {
            let mut coalesced = 0usize;
            let mut closed = false;
            loop {
                match timeout(self.window, self.rx.recv()).await {
                    Ok(Some(_)) => coalesced += 1,
                    Ok(None) => {
                        closed = true;
                        break;
                    }
                    Err(_) => break,
                }
            }

            debug!(?first, coalesced, "debounce window settled; rebuilding");
            rebuild().await;

            if closed {
                break;
            }
        }
    }
}

/// Polls the corpus and fires a trigger when its fingerprint changes.
pub struct CorpusWatcher {
    corpus: CorpusConfig,
    interval: Duration,
    trigger: RebuildTrigger,
}

impl CorpusWatcher {
    pub fn new(corpus: CorpusConfig, interval: Duration, trigger: RebuildTrigger) -> Self {
        Self {
            corpus,
            interval,
            trigger,
        }
    }

    /// Poll until the debouncer goes away.
    pub async fn run(self) {
        let mut last = self.poll();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        info!(root = %self.corpus.root.display(), interval = ?self.interval, "watching corpus");
        loop {
            ticker.tick().await;
            if self.trigger.is_closed() {
                break;
            }
            let current = self.poll();
            if current != last {
                debug!("corpus fingerprint changed");
                last = current;
                if !self.trigger.fire(Trigger::CorpusChanged) {
                    break;
                }
            }
        }
    }

    fn poll(&self) -> Option<String> {
        match connector_fs::fingerprint(&self.corpus) {
            Ok(fp) => Some(fp),
            Err(e) => {
                warn!(error = %e, "cannot read corpus");
                None
            }
        }
    }
}

/// `ctxr watch`: keep the index fresh and answer queries from stdin.
///
/// Each non-empty stdin line is a query; `:reindex` forces a rebuild.
/// Returns at end of input.
pub async fn run_watch(config: &Config) -> Result<()> {
    let engine = Arc::new(Engine::new(config.clone()));
    engine.restore();
    if let Err(e) = engine.rebuild().await {
        warn!(error = %e, "startup rebuild failed");
    }

    let (trigger, debouncer) = Debouncer::new(config.debounce_window());
    let rebuild_engine = Arc::clone(&engine);
    let debounce_task = tokio::spawn(debouncer.run(move || {
        let engine = Arc::clone(&rebuild_engine);
        async move {
            match engine.rebuild().await {
                Ok(RebuildOutcome::Rebuilt { generation, chunks, .. }) => {
                    info!(generation, chunks, "index rebuilt");
                }
                Ok(RebuildOutcome::Coalesced) => debug!("rebuild coalesced"),
                Err(e) => warn!(error = %e, "rebuild failed; keeping previous generation"),
            }
        }
    }));

    let watcher = tokio::spawn(
        CorpusWatcher::new(
            config.corpus.clone(),
            config.poll_interval(),
            trigger.clone(),
        )
        .run(),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if query == ":reindex" {
            trigger.fire(Trigger::Manual);
            continue;
        }
        let hits = engine.retrieve(query, config.retrieval.top_k).await;
        print_hits(&hits);
    }

    watcher.abort();
    let _ = watcher.await;
    drop(trigger);
    debounce_task.await?;
    Ok(())
}
