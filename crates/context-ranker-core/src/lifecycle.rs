//! Owned, swappable handle to the live index generation.
//!
//! Readers call [`IndexHandle::current`] and get an `Arc<Index>` they can
//! rank against for as long as they like; a concurrent rebuild never
//! mutates that generation, it builds a new one and swaps the pointer.
//! Builds are serialized with a busy flag: a rebuild requested while
//! another one is running is coalesced instead of queued.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;
use tracing::{debug, info};

use crate::index::{build_index_from, Index, IndexOptions};
use crate::models::Document;

/// What a call to [`IndexHandle::rebuild`] did.
#[derive(Debug, Clone)]
pub enum RebuildOutcome {
    /// A new generation was built and installed.
    ///
    /// `index` is the generation this call built, even if a later install
    /// has already replaced it.
    Rebuilt {
        generation: u64,
        chunks: usize,
        index: Arc<Index>,
    },
    /// Another rebuild was already running; nothing was built.
    Coalesced,
}

/// Holder of the current index generation.
///
/// Share it behind an `Arc`. Reads take a short read lock to clone the
/// inner `Arc<Index>`; the lock is never held while building.
pub struct IndexHandle {
    live: RwLock<Option<Arc<Index>>>,
    building: AtomicBool,
    generation: AtomicU64,
    options: IndexOptions,
}

impl IndexHandle {
    pub fn new(options: IndexOptions) -> Self {
        Self {
            live: RwLock::new(None),
            building: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            options,
        }
    }

    pub fn options(&self) -> &IndexOptions {
        &self.options
    }

    /// The latest complete generation, or `None` before the first build.
    pub fn current(&self) -> Option<Arc<Index>> {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of generations installed so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Whether a rebuild is running right now.
    pub fn is_building(&self) -> bool {
        self.building.load(Ordering::SeqCst)
    }

    /// Replace the live generation in a single step.
    ///
    /// Returns the new generation number.
    pub fn install(&self, index: Index) -> u64 {
        self.install_shared(Arc::new(index))
    }

    fn install_shared(&self, index: Arc<Index>) -> u64 {
        let mut live = self.live.write().unwrap_or_else(PoisonError::into_inner);
        *live = Some(index);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Build a new generation from `load` and install it.
    ///
    /// `load` is only called when no other rebuild is in flight. Documents
    /// that fail to load are skipped by the builder; an error from `load`
    /// itself leaves the previous generation in place.
    pub fn rebuild<F, I>(&self, load: F) -> Result<RebuildOutcome>
    where
        F: FnOnce() -> Result<I>,
        I: IntoIterator<Item = Result<Document>>,
    {
        if self
            .building
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("rebuild already running; coalescing request");
            return Ok(RebuildOutcome::Coalesced);
        }
        let _guard = BusyGuard(&self.building);

        let reads = load()?;
        let index = Arc::new(build_index_from(reads, &self.options));
        let chunks = index.len();
        let generation = self.install_shared(Arc::clone(&index));
        info!(generation, chunks, "installed index generation");
        Ok(RebuildOutcome::Rebuilt {
            generation,
            chunks,
            index,
        })
    }
}

/// Clears the busy flag even if the build panics or errors.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
