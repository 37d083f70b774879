//! Filesystem corpus reader.
//!
//! Walks `[corpus].root`, applies include/exclude globs and reads every
//! matching file as UTF-8. A file that cannot be read, and a walk entry
//! that cannot be visited (dangling symlink, unreadable directory), comes
//! back as an `Err` entry so the index builder can skip it and keep
//! going; only a missing root or a bad glob fails the whole scan.

use anyhow::{bail, Context, Result};
use context_ranker_core::Document;
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::debug;
use walkdir::WalkDir;

use crate::config::CorpusConfig;

/// Directories no corpus should ever index.
const DEFAULT_EXCLUDES: [&str; 3] = ["**/.git/**", "**/target/**", "**/node_modules/**"];

/// A file selected for indexing, before its content is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusEntry {
    pub path: PathBuf,
    /// Path relative to the corpus root, `/`-separated.
    pub relative: String,
}

/// Result of walking the corpus root.
#[derive(Debug, Default)]
pub struct CorpusListing {
    /// Matching files in relative path order.
    pub entries: Vec<CorpusEntry>,
    /// Walk errors on paths the globs would have selected, in walk order.
    pub unreadable: Vec<anyhow::Error>,
}

/// List matching files in deterministic (relative path) order.
pub fn list_corpus(corpus: &CorpusConfig) -> Result<CorpusListing> {
    let root = &corpus.root;
    if !root.exists() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_globset(&corpus.include_globs)?;

    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(corpus.exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let relative_of = |path: &Path| {
        path.strip_prefix(root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    };

    let mut listing = CorpusListing::default();

    let walker = WalkDir::new(root)
        .follow_links(corpus.follow_symlinks)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let rel_str = e.path().map(relative_of);
                // a missing link target outside the globs is not a corpus file;
                // other errors (unreadable directory, link loop) may hide some
                let selected = match rel_str.as_deref() {
                    Some(rel) if exclude_set.is_match(rel) => false,
                    Some(rel) => include_set.is_match(rel) || !is_not_found(&e),
                    None => true,
                };
                if selected {
                    debug!(path = ?e.path(), error = %e, "cannot visit corpus entry");
                    listing.unreadable.push(anyhow::Error::new(e).context(format!(
                        "Failed to walk {}",
                        rel_str.as_deref().unwrap_or("corpus entry")
                    )));
                }
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel_str = relative_of(path);

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        listing.entries.push(CorpusEntry {
            path: path.to_path_buf(),
            relative: rel_str,
        });
    }

    listing.entries.sort_by(|a, b| a.relative.cmp(&b.relative));
    Ok(listing)
}

/// Read every matching file into a [`Document`].
///
/// The outer `Result` fails on a missing root; each inner entry fails on
/// its own (unreadable file, invalid UTF-8, walk error). Walk errors come
/// after the readable files.
pub fn scan_documents(corpus: &CorpusConfig) -> Result<Vec<Result<Document>>> {
    let listing = list_corpus(corpus)?;
    Ok(listing
        .entries
        .iter()
        .map(|entry| read_document(&entry.path, &entry.relative))
        .chain(listing.unreadable.into_iter().map(Err))
        .collect())
}

/// SHA-256 over (relative path, size, mtime) of every corpus file.
///
/// Changes whenever a matching file is added, removed or rewritten.
pub fn fingerprint(corpus: &CorpusConfig) -> Result<String> {
    let mut hasher = Sha256::new();
    for entry in list_corpus(corpus)?.entries {
        let (len, mtime) = match std::fs::metadata(&entry.path) {
            Ok(meta) => {
                let mtime = meta
                    .modified()
                    .ok()
                    .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                    .map(|d| d.as_nanos())
                    .unwrap_or(0);
                (meta.len(), mtime)
            }
            // vanished between listing and stat
            Err(_) => (u64::MAX, 0),
        };
        hasher.update(entry.relative.as_bytes());
        hasher.update([0u8]);
        hasher.update(len.to_le_bytes());
        hasher.update(mtime.to_le_bytes());
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn is_not_found(e: &walkdir::Error) -> bool {
    e.io_error()
        .map_or(false, |io| io.kind() == std::io::ErrorKind::NotFound)
}

fn read_document(path: &Path, relative: &str) -> Result<Document> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Document::new(relative, text))
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use context_ranker_core::{build_index_from, IndexOptions};
    use std::fs;
    use tempfile::TempDir;

    fn corpus(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root: root.to_path_buf(),
            include_globs: vec!["**/*.md".to_string(), "**/*.txt".to_string()],
            exclude_globs: Vec::new(),
            follow_symlinks: false,
        }
    }

    #[test]
    fn test_scan_is_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("b.md"), "second file").unwrap();
        fs::write(tmp.path().join("a.txt"), "first file").unwrap();
        fs::write(tmp.path().join("image.png"), [0u8, 1, 2]).unwrap();
        fs::create_dir_all(tmp.path().join("sub")).unwrap();
        fs::write(tmp.path().join("sub/c.md"), "nested file").unwrap();
        fs::create_dir_all(tmp.path().join(".git")).unwrap();
        fs::write(tmp.path().join(".git/HEAD.md"), "not corpus").unwrap();

        let docs: Vec<Document> = scan_documents(&corpus(tmp.path()))
            .unwrap()
            .into_iter()
            .map(Result::unwrap)
            .collect();
        let names: Vec<&str> = docs.iter().map(|d| d.filename.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "b.md", "sub/c.md"]);
        assert_eq!(docs[0].text, "first file");
    }

    #[test]
    fn test_invalid_utf8_is_an_entry_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("good.md"), "readable").unwrap();
        fs::write(tmp.path().join("bad.md"), [0xffu8, 0xfe, 0xfd]).unwrap();

        let reads = scan_documents(&corpus(tmp.path())).unwrap();
        assert_eq!(reads.len(), 2);
        assert!(reads[0].is_err(), "bad.md sorts first and fails");
        assert!(reads[1].is_ok());
    }

    #[test]
    fn test_exclude_globs_apply() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("keep.md"), "keep").unwrap();
        fs::write(tmp.path().join("draft.md"), "drop").unwrap();
        let mut cfg = corpus(tmp.path());
        cfg.exclude_globs = vec!["draft.md".to_string()];

        let listing = list_corpus(&cfg).unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert_eq!(listing.entries[0].relative, "keep.md");
        assert!(listing.unreadable.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("good.md"),
            "a readable document that sits next to a broken link",
        )
        .unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone.md"), tmp.path().join("dangling.md"))
            .unwrap();
        let mut cfg = corpus(tmp.path());
        cfg.follow_symlinks = true;

        let reads = scan_documents(&cfg).unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].as_ref().unwrap().filename, "good.md");
        let err = reads[1].as_ref().unwrap_err();
        assert!(err.to_string().contains("dangling.md"), "{}", err);

        let index = build_index_from(reads, &IndexOptions::default());
        assert_eq!(index.stats().documents, 1);
        assert_eq!(index.stats().skipped, 1);
        assert_eq!(index.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn test_dangling_symlink_outside_globs_is_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("good.md"), "readable").unwrap();
        std::os::unix::fs::symlink(tmp.path().join("gone.png"), tmp.path().join("image.png"))
            .unwrap();
        let mut cfg = corpus(tmp.path());
        cfg.follow_symlinks = true;

        let listing = list_corpus(&cfg).unwrap();
        assert_eq!(listing.entries.len(), 1);
        assert!(listing.unreadable.is_empty());
        assert!(fingerprint(&cfg).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_is_skipped_not_fatal() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("good.md"), "readable").unwrap();
        let locked = tmp.path().join("locked");
        fs::create_dir_all(&locked).unwrap();
        fs::write(locked.join("hidden.md"), "cannot be listed").unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        let listed = fs::read_dir(&locked).is_ok();
        let reads = scan_documents(&corpus(tmp.path()));
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if listed {
            // running with privileges that ignore directory permissions
            return;
        }

        let reads = reads.unwrap();
        assert_eq!(reads.len(), 2);
        assert_eq!(reads[0].as_ref().unwrap().filename, "good.md");
        assert!(reads[1].is_err());
    }

    #[test]
    fn test_fingerprint_tracks_changes() {
        let tmp = TempDir::new().unwrap();
        let cfg = corpus(tmp.path());
        fs::write(tmp.path().join("a.md"), "one").unwrap();
        let first = fingerprint(&cfg).unwrap();
        assert_eq!(first, fingerprint(&cfg).unwrap());

        fs::write(tmp.path().join("a.md"), "one and more").unwrap();
        let second = fingerprint(&cfg).unwrap();
        assert_ne!(first, second);

        fs::write(tmp.path().join("ignored.bin"), "binary").unwrap();
        assert_eq!(second, fingerprint(&cfg).unwrap());

        fs::write(tmp.path().join("b.md"), "two").unwrap();
        assert_ne!(second, fingerprint(&cfg).unwrap());
    }

    #[test]
    fn test_missing_root_fails() {
        let tmp = TempDir::new().unwrap();
        let cfg = corpus(&tmp.path().join("nope"));
        assert!(scan_documents(&cfg).is_err());
    }
}
