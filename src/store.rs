//! Snapshot persistence on local disk.
//!
//! The snapshot file is written to a temporary sibling and renamed into
//! place, so a reader never sees a half-written file. A snapshot that
//! fails to load is reported and ignored; the caller falls back to a
//! fresh build. Each snapshot records the fingerprint of the corpus it
//! was built from so callers can tell when it has gone stale.

use anyhow::{Context, Result};
use context_ranker_core::snapshot::IndexSnapshot;
use context_ranker_core::Index;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, warn};

/// An index read back from disk with the corpus fingerprint it was
/// saved with.
#[derive(Debug)]
pub struct StoredIndex {
    pub index: Index,
    pub fingerprint: Option<String>,
}

/// Write `index` to `path`, replacing any previous snapshot.
pub fn save_snapshot(path: &Path, index: &Index, fingerprint: Option<&str>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create snapshot directory: {}", parent.display())
            })?;
        }
    }

    let mut snapshot = IndexSnapshot::from_index(index);
    snapshot.corpus_fingerprint = fingerprint.map(String::from);
    let json = snapshot.to_json()?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)
        .with_context(|| format!("Failed to write snapshot: {}", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("Failed to move snapshot into place: {}", path.display()))?;

    debug!(path = %path.display(), chunks = index.len(), "snapshot written");
    Ok(())
}

/// Read the snapshot at `path`.
///
/// `Ok(None)` when there is no file yet.
pub fn load_snapshot(
    path: &Path,
    priority_names: &BTreeSet<String>,
) -> Result<Option<StoredIndex>> {
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    let mut snapshot = IndexSnapshot::from_json(&json)?;
    let fingerprint = snapshot.corpus_fingerprint.take();
    let index = snapshot.into_index(priority_names)?;
    Ok(Some(StoredIndex { index, fingerprint }))
}

/// Like [`load_snapshot`], but a corrupt or unreadable file is logged and
/// treated as absent.
pub fn try_load_snapshot(path: &Path, priority_names: &BTreeSet<String>) -> Option<StoredIndex> {
    match load_snapshot(path, priority_names) {
        Ok(index) => index,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unusable snapshot");
            None
        }
    }
}
