#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use git2::{IndexAddOption, Oid, Repository, Signature};
use git_issues::git::{GitStore, DEFAULT_BRANCH};
use git_issues::record::RecordContext;
use tempfile::TempDir;

pub const TEST_USER: &str = "gi-test <gi-test@example.com>";

pub struct TestRepo {
    dir: TempDir,
    repo: Repository,
}

impl TestRepo {
    pub fn init() -> Result<Self, git2::Error> {
        let dir = tempfile::tempdir().expect("failed to create tempdir");
        let repo = Repository::init(dir.path())?;
        set_identity(&repo)?;
        Ok(Self { dir, repo })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn git_dir(&self) -> PathBuf {
        self.repo.path().to_path_buf()
    }

    pub fn write_file(&self, rel_path: &str, contents: &str) -> std::io::Result<PathBuf> {
        let path = self.dir.path().join(rel_path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn write_gi_config(&self, contents: &str) -> std::io::Result<PathBuf> {
        self.write_file(".gi.toml", contents)
    }

    pub fn commit_all(&self, message: &str) -> Result<Oid, git2::Error> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let sig = Signature::now("gi-test", "gi-test@example.com")?;

        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|head| head.target())
            .and_then(|oid| self.repo.find_commit(oid).ok());

        let oid = match parent {
            Some(parent) => self
                .repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])?,
            None => self
                .repo
                .commit(Some("HEAD"), &sig, &sig, message, &tree, &[])?,
        };

        Ok(oid)
    }

    pub fn commit_file(
        &self,
        rel_path: &str,
        contents: &str,
        message: &str,
    ) -> Result<Oid, Box<dyn std::error::Error>> {
        self.write_file(rel_path, contents)?;
        Ok(self.commit_all(message)?)
    }

    /// Store on the default issue branch of this repository.
    pub fn store(&self) -> Result<GitStore, git_issues::Error> {
        GitStore::open(Repository::open(self.path())?, DEFAULT_BRANCH)
    }

    pub fn ctx(&self) -> RecordContext {
        RecordContext::new(TEST_USER)
    }

    /// Tip commit message of the issue branch, if it exists.
    pub fn last_issue_commit(&self) -> Option<String> {
        let reference = self
            .repo
            .find_reference(&format!("refs/heads/{DEFAULT_BRANCH}"))
            .ok()?;
        let commit = reference.peel_to_commit().ok()?;
        commit.message().map(|message| message.to_string())
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }
}

fn set_identity(repo: &Repository) -> Result<(), git2::Error> {
    let mut cfg = repo.config()?;
    cfg.set_str("user.name", "gi-test")?;
    cfg.set_str("user.email", "gi-test@example.com")?;
    Ok(())
}
