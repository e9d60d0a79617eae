//! Issue index: load, cache, filter, sort and prefix lookup.
//!
//! The manager owns an index of every issue in the store, keyed by
//! identifier and iterated in ascending identifier order. The index is
//! rebuilt when the store head moves and is persisted through
//! [`IndexCache`] so the next process can skip the store scan.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::cache::IndexCache;
use crate::error::{Error, Result};
use crate::filter::{FilterOperator, Rule};
use crate::issue::Issue;
use crate::record::{Document, Record, RecordContext};
use crate::store::Store;

/// Key fragment that marks comment records.
pub const COMMENT_MARKER: &str = "/comments/";

/// One identifier matched by an ambiguous prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictEntry {
    pub id: String,
    pub title: String,
}

/// An identifier prefix that matched more than one issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdConflict {
    pub prefix: String,
    /// First index at which the first two matches differ.
    pub threshold: usize,
    pub entries: Vec<ConflictEntry>,
}

impl fmt::Display for IdConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            let split = entry
                .id
                .char_indices()
                .nth(self.threshold)
                .map(|(at, _)| at)
                .unwrap_or(entry.id.len());
            let (head, tail) = entry.id.split_at(split);
            write!(f, "[{head}]{tail}: {}", entry.title)?;
        }
        Ok(())
    }
}

fn first_difference(a: &str, b: &str) -> usize {
    a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count()
}

/// Observable lifecycle of the in-memory index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    Unloaded,
    Loading,
    Loaded,
}

#[derive(Debug)]
enum IndexState {
    Unloaded,
    Loading,
    Loaded {
        head: Option<String>,
        issues: BTreeMap<String, Issue>,
    },
}

/// Builds and queries the issue index.
#[derive(Debug)]
pub struct IssueManager {
    ctx: RecordContext,
    cache: Option<IndexCache>,
    state: IndexState,
}

impl IssueManager {
    /// Manager without an on-disk cache.
    pub fn new(ctx: RecordContext) -> Self {
        Self {
            ctx,
            cache: None,
            state: IndexState::Unloaded,
        }
    }

    /// Persist the index under `dir` between runs.
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache = Some(IndexCache::new(dir));
        self
    }

    pub fn ctx(&self) -> &RecordContext {
        &self.ctx
    }

    pub fn cache_state(&self) -> CacheState {
        match self.state {
            IndexState::Unloaded => CacheState::Unloaded,
            IndexState::Loading => CacheState::Loading,
            IndexState::Loaded { .. } => CacheState::Loaded,
        }
    }

    /// Drop the in-memory index; the next query reloads it.
    pub fn invalidate(&mut self) {
        self.state = IndexState::Unloaded;
    }

    /// Rescan the store, ignoring any cache; returns the issue count.
    pub fn update_db(&mut self, store: &dyn Store) -> Result<usize> {
        let head = store.current_head()?;
        self.rebuild(store, head, false)?;
        Ok(self.index(store)?.len())
    }

    /// Every issue, optionally sorted by a field.
    pub fn all(&mut self, store: &dyn Store, sort_key: Option<&str>) -> Result<Vec<&Issue>> {
        self.filter(store, &[], FilterOperator::And, sort_key)
    }

    /// Issues matching every rule, optionally sorted by a field.
    ///
    /// A rule naming a missing field yields an empty result.
    pub fn filter(
        &mut self,
        store: &dyn Store,
        rules: &[Rule],
        operator: FilterOperator,
        sort_key: Option<&str>,
    ) -> Result<Vec<&Issue>> {
        if operator == FilterOperator::Or {
            return Err(Error::Unsupported(
                "the 'or' filter operator is not supported".to_string(),
            ));
        }
        if let Some(key) = sort_key {
            Issue::blank(&self.ctx).get_property(key)?;
        }

        let issues = self.index(store)?;
        let mut found = Vec::new();
        'issues: for issue in issues.values() {
            for rule in rules {
                match rule.matches(issue) {
                    Ok(true) => {}
                    Ok(false) => continue 'issues,
                    Err(err) => {
                        tracing::warn!(field = %rule.field, error = %err, "error searching issues");
                        return Ok(Vec::new());
                    }
                }
            }
            found.push(issue);
        }

        if let Some(key) = sort_key {
            found.sort_by_cached_key(|issue| issue.value_of(key).unwrap_or_default());
        }
        Ok(found)
    }

    /// The single issue whose identifier starts with `id_prefix`.
    pub fn get(&mut self, store: &dyn Store, id_prefix: &str) -> Result<&Issue> {
        let issues = self.index(store)?;
        let matches: Vec<&Issue> = issues
            .iter()
            .filter(|(id, _)| id.starts_with(id_prefix))
            .map(|(_, issue)| issue)
            .collect();

        match matches.as_slice() {
            [] => Err(Error::NotFound {
                id_prefix: id_prefix.to_string(),
            }),
            [single] => Ok(*single),
            [first, second, ..] => {
                let threshold = first_difference(&first.id(), &second.id());
                let entries = matches
                    .iter()
                    .map(|issue| ConflictEntry {
                        id: issue.id(),
                        title: issue.title(),
                    })
                    .collect();
                Err(Error::Conflict(IdConflict {
                    prefix: id_prefix.to_string(),
                    threshold,
                    entries,
                }))
            }
        }
    }

    /// Current index, reloaded when the store head moved.
    fn index(&mut self, store: &dyn Store) -> Result<&BTreeMap<String, Issue>> {
        let head = store.current_head()?;
        let fresh = matches!(
            &self.state,
            IndexState::Loaded { head: loaded, .. } if *loaded == head
        ) && !store.has_pending_writes();
        if !fresh {
            self.rebuild(store, head, true)?;
        }

        match &self.state {
            IndexState::Loaded { issues, .. } => Ok(issues),
            _ => Err(Error::OperationFailed("issue index failed to load".to_string())),
        }
    }

    fn rebuild(&mut self, store: &dyn Store, head: Option<String>, use_cache: bool) -> Result<()> {
        self.state = IndexState::Loading;

        // Uncommitted writes are not covered by any head.
        let disk = match (&self.cache, &head) {
            (Some(cache), Some(head)) if !store.has_pending_writes() => Some((cache, head.as_str())),
            _ => None,
        };

        let cached = match disk {
            Some((cache, head)) if use_cache => cache
                .load(head)
                .and_then(|documents| from_documents(&self.ctx, store, &documents)),
            _ => None,
        };

        let issues = match cached {
            Some(issues) => issues,
            None => {
                let issues = scan(&self.ctx, store)?;
                if let Some((cache, head)) = disk {
                    let documents: Vec<Document> =
                        issues.values().map(Record::to_document).collect();
                    if let Err(err) = cache.persist(head, documents) {
                        tracing::warn!(error = %err, "failed to persist index cache");
                    }
                }
                issues
            }
        };

        tracing::debug!(head = ?head, issues = issues.len(), "issue index loaded");
        self.state = IndexState::Loaded { head, issues };
        Ok(())
    }
}

fn scan(ctx: &RecordContext, store: &dyn Store) -> Result<BTreeMap<String, Issue>> {
    let mut issues = BTreeMap::new();
    for key in store.keys()? {
        if key.contains(COMMENT_MARKER) {
            continue;
        }
        let issue = Issue::load(ctx, store, &store.get(&key)?)?;
        issues.insert(issue.id(), issue);
    }
    tracing::info!(issues = issues.len(), "scanned store for issues");
    Ok(issues)
}

fn from_documents(
    ctx: &RecordContext,
    store: &dyn Store,
    documents: &[Document],
) -> Option<BTreeMap<String, Issue>> {
    let mut issues = BTreeMap::new();
    for document in documents {
        match Issue::from_document(ctx, store, document) {
            Ok(issue) => {
                issues.insert(issue.id(), issue);
            }
            Err(err) => {
                tracing::warn!(error = %err, "index cache holds an invalid issue, rescanning");
                return None;
            }
        }
    }
    Some(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::parse_filter_expr;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    fn ctx() -> RecordContext {
        RecordContext::new("Alice <alice@example.com>")
    }

    fn put(store: &mut MemoryStore, id: &str, title: &str, status: &str) {
        let mut doc = Document::new();
        doc.insert("id".to_string(), id.to_string());
        doc.insert("title".to_string(), title.to_string());
        doc.insert("status".to_string(), status.to_string());
        let issue = Issue::from_document(&ctx(), &*store, &doc).unwrap();
        issue.save(store).unwrap();
    }

    fn seeded() -> MemoryStore {
        let mut store = MemoryStore::new();
        put(&mut store, "abc123", "crash on start", "new");
        put(&mut store, "abc987", "slow listing", "closed");
        put(&mut store, "def456", "Crash on exit", "assigned");
        store.commit("seed").unwrap();
        store
    }

    fn ids(issues: &[&Issue]) -> Vec<String> {
        issues.iter().map(|issue| issue.id()).collect()
    }

    #[test]
    fn ambiguous_prefix_reports_threshold() {
        let store = seeded();
        let mut manager = IssueManager::new(ctx());
        let err = manager.get(&store, "abc").unwrap_err();
        let Error::Conflict(conflict) = err else {
            panic!("expected an id conflict");
        };
        assert_eq!(conflict.threshold, 3);
        assert_eq!(conflict.entries.len(), 2);
        assert_eq!(
            conflict.to_string(),
            "[abc]123: crash on start\n[abc]987: slow listing"
        );
    }

    #[test]
    fn threshold_uses_first_two_matches_in_index_order() {
        let mut store = MemoryStore::new();
        put(&mut store, "abc100", "first c", "new");
        put(&mut store, "abc200", "second c", "new");
        put(&mut store, "ab9000", "nine", "new");
        store.commit("seed").unwrap();

        let mut manager = IssueManager::new(ctx());
        let Err(Error::Conflict(conflict)) = manager.get(&store, "ab") else {
            panic!("expected an id conflict");
        };
        let listed: Vec<&str> = conflict.entries.iter().map(|entry| entry.id.as_str()).collect();
        assert_eq!(listed, ["ab9000", "abc100", "abc200"]);
        assert_eq!(conflict.threshold, 2);
        assert_eq!(
            conflict.to_string(),
            "[ab]9000: nine\n[ab]c100: first c\n[ab]c200: second c"
        );
    }

    #[test]
    fn get_resolves_unique_and_missing_prefixes() {
        let store = seeded();
        let mut manager = IssueManager::new(ctx());
        assert_eq!(manager.get(&store, "abc1").unwrap().title(), "crash on start");
        assert_eq!(manager.get(&store, "def456").unwrap().id(), "def456");
        assert!(matches!(
            manager.get(&store, "zzz"),
            Err(Error::NotFound { id_prefix }) if id_prefix == "zzz"
        ));
    }

    #[test]
    fn status_not_closed_keeps_open_issues() {
        let store = seeded();
        let mut manager = IssueManager::new(ctx());
        let rules = parse_filter_expr("status__not:closed").unwrap();
        let found = manager.filter(&store, &rules, FilterOperator::And, None).unwrap();
        assert_eq!(ids(&found), ["abc123", "def456"]);
    }

    #[test]
    fn not_rule_is_exact_complement() {
        let store = seeded();
        let mut manager = IssueManager::new(ctx());
        let all = ids(&manager.all(&store, None).unwrap());
        assert_eq!(all, ["abc123", "abc987", "def456"]);

        let hit = ids(&manager
            .filter(&store, &[Rule::parse("title", "crash")], FilterOperator::And, None)
            .unwrap());
        let miss = ids(&manager
            .filter(&store, &[Rule::parse("title__not", "crash")], FilterOperator::And, None)
            .unwrap());
        assert_eq!(hit, ["abc123", "def456"]);
        assert_eq!(miss, ["abc987"]);
    }

    #[test]
    fn missing_field_yields_empty_result() {
        let store = seeded();
        let mut manager = IssueManager::new(ctx());
        let found = manager
            .filter(&store, &[Rule::parse("priority", "high")], FilterOperator::And, None)
            .unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn or_operator_is_rejected() {
        let store = seeded();
        let mut manager = IssueManager::new(ctx());
        assert!(matches!(
            manager.filter(&store, &[], FilterOperator::Or, None),
            Err(Error::Unsupported(_))
        ));
    }

    #[test]
    fn sort_is_by_field_text() {
        let store = seeded();
        let mut manager = IssueManager::new(ctx());
        let sorted = ids(&manager.all(&store, Some("title")).unwrap());
        assert_eq!(sorted, ["def456", "abc123", "abc987"]);
        assert!(matches!(
            manager.all(&store, Some("priority")),
            Err(Error::PropertyNotFound { .. })
        ));
    }

    #[test]
    fn comments_are_not_indexed() {
        let mut store = seeded();
        store
            .set("abc123/comments/fff000", br#"{"id": "fff000", "issue_id": "abc123"}"#)
            .unwrap();
        store.commit("comment").unwrap();
        let mut manager = IssueManager::new(ctx());
        assert_eq!(manager.all(&store, None).unwrap().len(), 3);
    }

    #[test]
    fn index_reloads_when_head_moves() {
        let mut store = seeded();
        let mut manager = IssueManager::new(ctx());
        assert_eq!(manager.cache_state(), CacheState::Unloaded);
        assert_eq!(manager.all(&store, None).unwrap().len(), 3);
        assert_eq!(manager.cache_state(), CacheState::Loaded);

        put(&mut store, "0a0a0a", "new one", "new");
        assert_eq!(manager.all(&store, None).unwrap().len(), 4);
        store.commit("add").unwrap();
        assert_eq!(manager.all(&store, None).unwrap().len(), 4);
    }

    #[test]
    fn disk_cache_is_reused_for_same_head() {
        let dir = TempDir::new().unwrap();
        let store = seeded();
        let head = store.current_head().unwrap().unwrap();

        let mut first = IssueManager::new(ctx()).with_cache_dir(dir.path());
        assert_eq!(first.all(&store, None).unwrap().len(), 3);
        let cache = IndexCache::new(dir.path());
        assert!(cache.path_for(&head).exists());

        let mut doc = Document::new();
        doc.insert("id".to_string(), "abc123".to_string());
        doc.insert("title".to_string(), "from cache".to_string());
        cache.persist(&head, vec![doc]).unwrap();

        let mut second = IssueManager::new(ctx()).with_cache_dir(dir.path());
        let titles: Vec<String> = second
            .all(&store, None)
            .unwrap()
            .iter()
            .map(|issue| issue.title())
            .collect();
        assert_eq!(titles, ["from cache"]);

        assert_eq!(second.update_db(&store).unwrap(), 3);
    }

    #[test]
    fn invalid_cached_issue_forces_rescan() {
        let dir = TempDir::new().unwrap();
        let store = seeded();
        let head = store.current_head().unwrap().unwrap();
        let cache = IndexCache::new(dir.path());

        let mut doc = Document::new();
        doc.insert("id".to_string(), "abc123".to_string());
        doc.insert("title".to_string(), "from cache".to_string());
        doc.insert("status".to_string(), "bogus".to_string());
        assert!(cache.persist(&head, vec![doc]).unwrap());

        let mut manager = IssueManager::new(ctx()).with_cache_dir(dir.path());
        let titles: Vec<String> = manager
            .all(&store, None)
            .unwrap()
            .iter()
            .map(|issue| issue.title())
            .collect();
        assert_eq!(titles, ["crash on start", "slow listing", "Crash on exit"]);

        let rewritten = cache.load(&head).unwrap();
        assert_eq!(rewritten.len(), 3);
        assert!(rewritten.iter().all(|doc| doc.get("status").map(String::as_str) != Some("bogus")));
    }

    #[test]
    fn stale_cache_is_purged_after_commit() {
        let dir = TempDir::new().unwrap();
        let mut store = seeded();
        let old_head = store.current_head().unwrap().unwrap();
        let mut manager = IssueManager::new(ctx()).with_cache_dir(dir.path());
        manager.all(&store, None).unwrap();

        put(&mut store, "0a0a0a", "new one", "new");
        store.commit("add").unwrap();
        let new_head = store.current_head().unwrap().unwrap();
        manager.all(&store, None).unwrap();

        let cache = IndexCache::new(dir.path());
        assert!(!cache.path_for(&old_head).exists());
        assert!(cache.path_for(&new_head).exists());
    }

    #[test]
    fn uncommitted_store_writes_no_cache() {
        let dir = TempDir::new().unwrap();
        let mut store = MemoryStore::new();
        put(&mut store, "abc123", "draft", "new");
        let mut manager = IssueManager::new(ctx()).with_cache_dir(dir.path());
        assert_eq!(manager.all(&store, None).unwrap().len(), 1);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
