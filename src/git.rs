//! Git repository discovery and the git-backed issue store.
//!
//! Issues live in the tree of a dedicated branch (`refs/heads/gitissius` by
//! default). The working tree, the index and `HEAD` are never touched: reads
//! go straight to the branch tip tree and commits are written with libgit2
//! tree builders.
//!
//! A store reads the branch once, at open. Commits are parented on that
//! snapshot and only land if the branch still points at it, so a commit
//! from another process in between is never overwritten.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use git2::{ErrorCode, ObjectType, Oid, Repository, Signature, TreeWalkMode, TreeWalkResult};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::store::Store;

/// Default branch that holds the issue tree.
pub const DEFAULT_BRANCH: &str = "gitissius";

const FILE_MODE: i32 = 0o100_644;
const TREE_MODE: i32 = 0o040_000;

/// Discover a git repository from a starting path.
pub fn discover_repo(start: Option<&Path>) -> Result<Repository> {
    let start_path = match start {
        Some(path) => path.to_path_buf(),
        None => std::env::current_dir()?,
    };

    Repository::discover(&start_path).map_err(|err| {
        if err.code() == ErrorCode::NotFound {
            Error::RepoNotFound(start_path)
        } else {
            Error::Git(err)
        }
    })
}

/// Return the repository workdir, falling back to the git dir for bare repos.
pub fn workdir(repo: &Repository) -> PathBuf {
    repo.workdir()
        .map(|path| path.to_path_buf())
        .unwrap_or_else(|| repo.path().to_path_buf())
}

/// Get the path to the git common directory.
///
/// For worktrees, this returns the path to the main repository's .git directory.
/// For normal repositories, this returns the .git directory path.
pub fn common_dir(repo: &Repository) -> PathBuf {
    let git_dir = repo.path();
    let commondir_file = git_dir.join("commondir");

    if commondir_file.exists() {
        if let Ok(content) = std::fs::read_to_string(&commondir_file) {
            let rel = content.trim();
            if !rel.is_empty() {
                return git_dir.join(rel);
            }
        }
    }

    git_dir.to_path_buf()
}

/// Return `"Name <email>"` from the repository git config, if configured.
pub fn configured_user(repo: &Repository) -> Option<String> {
    let config = repo.config().ok()?;
    let name = config.get_string("user.name").ok();
    let email = config.get_string("user.email").ok();
    match (name, email) {
        (Some(name), Some(email)) => Some(format!("{name} <{email}>")),
        (Some(name), None) => Some(name),
        (None, Some(email)) => Some(format!("<{email}>")),
        (None, None) => None,
    }
}

/// Distinct `"Name <email>"` authors reachable from `HEAD`, sorted.
///
/// An unborn `HEAD` yields an empty list.
pub fn contributors(repo: &Repository) -> Result<Vec<String>> {
    let mut walk = repo.revwalk()?;
    match walk.push_head() {
        Ok(()) => {}
        Err(err) if matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
            return Ok(Vec::new());
        }
        Err(err) => return Err(Error::Git(err)),
    }

    let mut authors = BTreeSet::new();
    for oid in walk {
        let commit = repo.find_commit(oid?)?;
        let author = commit.author();
        let name = author.name().unwrap_or_default().trim();
        let email = author.email().unwrap_or_default().trim();
        if name.is_empty() && email.is_empty() {
            continue;
        }
        authors.insert(format!("{name} <{email}>"));
    }

    Ok(authors.into_iter().collect())
}

#[derive(Debug, Clone)]
enum Pending {
    Write(Vec<u8>),
    Delete,
}

enum Node {
    Blob(Oid),
    Tree(BTreeMap<String, Node>),
}

/// [`Store`] implementation over a branch of a git repository.
pub struct GitStore {
    repo: Repository,
    branch: String,
    base: Option<Oid>,
    committed: BTreeMap<String, Oid>,
    pending: BTreeMap<String, Pending>,
}

impl GitStore {
    /// Open the store on `branch` of `repo`; the branch may not exist yet.
    pub fn open(repo: Repository, branch: impl Into<String>) -> Result<Self> {
        let branch = branch.into();
        let mut store = Self {
            repo,
            branch,
            base: None,
            committed: BTreeMap::new(),
            pending: BTreeMap::new(),
        };
        store.base = store.tip()?;
        store.committed = store.read_entries(store.base)?;
        debug!(
            branch = %store.branch,
            keys = store.committed.len(),
            "opened git store"
        );
        Ok(store)
    }

    /// Discover the repository from `start` and open the store on `branch`.
    pub fn discover(start: Option<&Path>, branch: &str) -> Result<Self> {
        Self::open(discover_repo(start)?, branch)
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn ref_name(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    fn tip(&self) -> Result<Option<Oid>> {
        match self.repo.find_reference(&self.ref_name()) {
            Ok(reference) => Ok(reference.target()),
            Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
            Err(err) => Err(Error::Git(err)),
        }
    }

    fn read_entries(&self, commit: Option<Oid>) -> Result<BTreeMap<String, Oid>> {
        let mut entries = BTreeMap::new();
        let Some(tip) = commit else {
            return Ok(entries);
        };

        let tree = self.repo.find_commit(tip)?.tree()?;
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() == Some(ObjectType::Blob) {
                if let Some(name) = entry.name() {
                    entries.insert(format!("{root}{name}"), entry.id());
                }
            }
            TreeWalkResult::Ok
        })?;
        Ok(entries)
    }

    fn contains(&self, key: &str) -> bool {
        match self.pending.get(key) {
            Some(Pending::Write(_)) => true,
            Some(Pending::Delete) => false,
            None => self.committed.contains_key(key),
        }
    }

    fn signature(&self) -> Result<Signature<'static>> {
        match self.repo.signature() {
            Ok(signature) => Ok(signature),
            Err(err) if err.code() == ErrorCode::NotFound => {
                Ok(Signature::now("git-issues", "git-issues@localhost")?)
            }
            Err(err) => Err(Error::Git(err)),
        }
    }

    fn build_tree(&self) -> Result<Oid> {
        let mut root: BTreeMap<String, Node> = BTreeMap::new();

        let mut blobs: BTreeMap<String, Oid> = self.committed.clone();
        for (key, change) in &self.pending {
            match change {
                Pending::Write(data) => {
                    blobs.insert(key.clone(), self.repo.blob(data)?);
                }
                Pending::Delete => {
                    blobs.remove(key);
                }
            }
        }

        for (key, oid) in blobs {
            insert_node(&mut root, &key, oid)?;
        }

        write_tree(&self.repo, &root)
    }
}

fn insert_node(root: &mut BTreeMap<String, Node>, key: &str, oid: Oid) -> Result<()> {
    let parts: Vec<&str> = key.split('/').filter(|part| !part.is_empty()).collect();
    let Some((leaf, dirs)) = parts.split_last() else {
        return Err(Error::InvalidArgument(format!("invalid store key '{key}'")));
    };

    let mut level = root;
    for dir in dirs {
        let node = level
            .entry((*dir).to_string())
            .or_insert_with(|| Node::Tree(BTreeMap::new()));
        level = match node {
            Node::Tree(children) => children,
            Node::Blob(_) => {
                return Err(Error::InvalidArgument(format!(
                    "store key '{key}' nests under a value"
                )))
            }
        };
    }
    level.insert((*leaf).to_string(), Node::Blob(oid));
    Ok(())
}

fn write_tree(repo: &Repository, level: &BTreeMap<String, Node>) -> Result<Oid> {
    let mut builder = repo.treebuilder(None)?;
    for (name, node) in level {
        match node {
            Node::Blob(oid) => {
                builder.insert(name.as_str(), *oid, FILE_MODE)?;
            }
            Node::Tree(children) => {
                let oid = write_tree(repo, children)?;
                builder.insert(name.as_str(), oid, TREE_MODE)?;
            }
        }
    }
    Ok(builder.write()?)
}

impl Store for GitStore {
    fn get(&self, key: &str) -> Result<Vec<u8>> {
        match self.pending.get(key) {
            Some(Pending::Write(data)) => return Ok(data.clone()),
            Some(Pending::Delete) => return Err(Error::KeyNotFound(key.to_string())),
            None => {}
        }

        let oid = self
            .committed
            .get(key)
            .ok_or_else(|| Error::KeyNotFound(key.to_string()))?;
        let blob = self.repo.find_blob(*oid)?;
        Ok(blob.content().to_vec())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.pending
            .insert(key.to_string(), Pending::Write(value.to_vec()));
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        if !self.contains(key) {
            return Err(Error::KeyNotFound(key.to_string()));
        }
        if self.committed.contains_key(key) {
            self.pending.insert(key.to_string(), Pending::Delete);
        } else {
            self.pending.remove(key);
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: BTreeSet<String> = self.committed.keys().cloned().collect();
        for (key, change) in &self.pending {
            match change {
                Pending::Write(_) => {
                    keys.insert(key.clone());
                }
                Pending::Delete => {
                    keys.remove(key);
                }
            }
        }
        Ok(keys.into_iter().collect())
    }

    fn current_head(&self) -> Result<Option<String>> {
        Ok(self.base.map(|oid| oid.to_string()))
    }

    fn commit(&mut self, message: &str) -> Result<()> {
        if self.pending.is_empty() {
            debug!(branch = %self.branch, "nothing to commit");
            return Ok(());
        }

        let tree_oid = self.build_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;
        let signature = self.signature()?;

        let parent = match self.base {
            Some(oid) => Some(self.repo.find_commit(oid)?),
            None => None,
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let oid = self
            .repo
            .commit(None, &signature, &signature, message, &tree, &parents)?;

        // Compare-and-swap on the branch ref against the snapshot we read.
        let ref_name = self.ref_name();
        let log_message = format!("gi: {message}");
        let updated = match self.base {
            Some(base) => self
                .repo
                .reference_matching(&ref_name, oid, true, base, &log_message),
            None => self.repo.reference(&ref_name, oid, false, &log_message),
        };
        match updated {
            Ok(_) => {}
            Err(err) if matches!(err.code(), ErrorCode::Modified | ErrorCode::Exists) => {
                warn!(branch = %self.branch, expected = ?self.base, "issue branch moved");
                return Err(Error::BranchMoved {
                    branch: self.branch.clone(),
                });
            }
            Err(err) => return Err(Error::Git(err)),
        }

        self.pending.clear();
        self.base = Some(oid);
        self.committed = self.read_entries(self.base)?;
        info!(branch = %self.branch, commit = %oid, "committed issue changes");
        Ok(())
    }

    fn has_pending_writes(&self) -> bool {
        !self.pending.is_empty()
    }
}
