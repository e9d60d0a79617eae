//! On-disk index cache.
//!
//! The issue index is persisted as versioned JSON named after the store
//! head it was built from (`issues.<head>.cache`). A file whose version or
//! head does not match is a miss, as is any file that fails to read.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::{write_atomic, FileLock};
use crate::record::Document;

/// Bumped whenever the cache layout changes.
pub const CACHE_FORMAT_VERSION: u32 = 1;

const CACHE_PREFIX: &str = "issues.";
const CACHE_SUFFIX: &str = ".cache";
const CACHE_LOCK_FILE: &str = "issues.cache.lock";
const CACHE_LOCK_TIMEOUT_MS: u64 = 500;

/// Serialized form of the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheFile {
    pub format_version: u32,
    pub head: String,
    pub generated_at: DateTime<Utc>,
    pub issues: Vec<Document>,
}

/// Cache files inside one directory (normally the git dir).
#[derive(Debug, Clone)]
pub struct IndexCache {
    dir: PathBuf,
}

impl IndexCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, head: &str) -> PathBuf {
        self.dir.join(format!("{CACHE_PREFIX}{head}{CACHE_SUFFIX}"))
    }

    /// Documents cached for `head`, or `None` on any kind of miss.
    pub fn load(&self, head: &str) -> Option<Vec<Document>> {
        let path = self.path_for(head);
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "index cache miss");
                return None;
            }
        };

        let file: CacheFile = match serde_json::from_slice(&data) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "discarding unreadable index cache");
                return None;
            }
        };
        if file.format_version != CACHE_FORMAT_VERSION || file.head != head {
            tracing::warn!(
                path = %path.display(),
                format_version = file.format_version,
                head = %file.head,
                "discarding foreign index cache"
            );
            return None;
        }

        tracing::debug!(path = %path.display(), issues = file.issues.len(), "index cache hit");
        Some(file.issues)
    }

    /// Write the cache for `head` and purge the others.
    ///
    /// Returns `false` without writing when another process holds the lock.
    pub fn persist(&self, head: &str, issues: Vec<Document>) -> Result<bool> {
        fs::create_dir_all(&self.dir)?;
        let _lock = match FileLock::acquire(self.dir.join(CACHE_LOCK_FILE), CACHE_LOCK_TIMEOUT_MS) {
            Ok(lock) => lock,
            Err(Error::LockFailed(path)) => {
                tracing::warn!(path = %path.display(), "index cache busy, not persisting");
                return Ok(false);
            }
            Err(err) => return Err(err),
        };

        let file = CacheFile {
            format_version: CACHE_FORMAT_VERSION,
            head: head.to_string(),
            generated_at: Utc::now(),
            issues,
        };
        let path = self.path_for(head);
        write_atomic(&path, &serde_json::to_vec(&file)?)?;
        tracing::debug!(path = %path.display(), issues = file.issues.len(), "index cache written");

        self.purge_except(head)?;
        Ok(true)
    }

    /// Delete every cache file not built for `head`.
    pub fn purge_except(&self, head: &str) -> Result<usize> {
        let keep = self.path_for(head);
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => return Err(err.into()),
        };

        let mut removed = 0;
        for entry in entries {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
                continue;
            };
            let is_cache = name.starts_with(CACHE_PREFIX)
                && name.ends_with(CACHE_SUFFIX)
                && name.len() > CACHE_PREFIX.len() + CACHE_SUFFIX.len();
            if is_cache && path != keep {
                fs::remove_file(&path)?;
                tracing::debug!(path = %path.display(), "purged stale index cache");
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn doc(id: &str) -> Document {
        let mut doc = Document::new();
        doc.insert("id".to_string(), id.to_string());
        doc
    }

    #[test]
    fn persisted_cache_loads_for_same_head() {
        let dir = TempDir::new().unwrap();
        let cache = IndexCache::new(dir.path());
        assert!(cache.persist("abc", vec![doc("1"), doc("2")]).unwrap());

        let loaded = cache.load("abc").unwrap();
        assert_eq!(loaded.len(), 2);
        assert!(cache.load("def").is_none());
    }

    #[test]
    fn persist_purges_other_heads() {
        let dir = TempDir::new().unwrap();
        let cache = IndexCache::new(dir.path());
        cache.persist("old", vec![doc("1")]).unwrap();
        fs::write(dir.path().join("unrelated.txt"), "keep").unwrap();

        cache.persist("new", vec![doc("1")]).unwrap();
        assert!(!cache.path_for("old").exists());
        assert!(cache.path_for("new").exists());
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn corrupt_or_foreign_cache_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = IndexCache::new(dir.path());
        fs::write(cache.path_for("abc"), b"{ not json").unwrap();
        assert!(cache.load("abc").is_none());

        let foreign = CacheFile {
            format_version: CACHE_FORMAT_VERSION + 1,
            head: "abc".to_string(),
            generated_at: Utc::now(),
            issues: vec![doc("1")],
        };
        fs::write(cache.path_for("abc"), serde_json::to_vec(&foreign).unwrap()).unwrap();
        assert!(cache.load("abc").is_none());
    }

    #[test]
    fn busy_lock_skips_persist() {
        let dir = TempDir::new().unwrap();
        let cache = IndexCache::new(dir.path());
        let _held = FileLock::acquire(dir.path().join(CACHE_LOCK_FILE), 1000).unwrap();
        assert!(!cache.persist("abc", vec![doc("1")]).unwrap());
        assert!(!cache.path_for("abc").exists());
    }
}
