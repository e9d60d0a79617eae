//! Key-value store seam.
//!
//! Records are persisted as JSON documents under slash separated keys
//! (`<id>/issue`, `<id>/comments/<comment id>`). The core only talks to the
//! backing store through [`Store`]; [`crate::git::GitStore`] keeps the keys
//! in a git branch and [`MemoryStore`] keeps them in memory.

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Minimal interface the record layer needs from a versioned store.
pub trait Store {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Insert or replace the value under `key`.
    fn set(&mut self, key: &str, value: &[u8]) -> Result<()>;

    /// Remove `key`; fails with [`Error::KeyNotFound`] when absent.
    fn delete(&mut self, key: &str) -> Result<()>;

    /// All keys currently visible, in no particular order.
    fn keys(&self) -> Result<Vec<String>>;

    /// Token naming the committed state, `None` before the first commit.
    fn current_head(&self) -> Result<Option<String>>;

    /// Seal pending writes under `message`.
    fn commit(&mut self, message: &str) -> Result<()>;

    /// Whether writes were made since the last commit.
    fn has_pending_writes(&self) -> bool {
        false
    }
}

/// In-memory store with a monotonically increasing revision counter.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, Vec<u8>>,
    revision: u64,
    dirty: bool,
    messages: Vec<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commit messages recorded so far, oldest first.
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_vec());
        self.dirty = true;
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.entries
            .remove(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
        self.dirty = true;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn current_head(&self) -> Result<Option<String>> {
        if self.revision == 0 {
            return Ok(None);
        }
        Ok(Some(format!("mem-{}", self.revision)))
    }

    fn commit(&mut self, message: &str) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        self.revision += 1;
        self.dirty = false;
        self.messages.push(message.to_string());
        Ok(())
    }

    fn has_pending_writes(&self) -> bool {
        self.dirty
    }
}
