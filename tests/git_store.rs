mod support;

use git_issues::error::Error;
use git_issues::git::{contributors, GitStore, DEFAULT_BRANCH};
use git_issues::store::Store;
use support::TestRepo;

#[test]
fn store_survives_reopen() -> Result<(), Box<dyn std::error::Error>> {
    let repo = TestRepo::init()?;
    let mut store = repo.store()?;
    assert_eq!(store.current_head()?, None);

    store.set("abc/issue", br#"{"title": "fix crash"}"#)?;
    assert!(store.has_pending_writes());
    store.commit("Added issue abc")?;
    let head = store.current_head()?;
    assert!(head.is_some());

    let reopened = repo.store()?;
    assert_eq!(reopened.current_head()?, head);
    assert_eq!(reopened.keys()?, vec!["abc/issue".to_string()]);
    assert_eq!(repo.last_issue_commit().as_deref(), Some("Added issue abc"));
    Ok(())
}

#[test]
fn delete_hides_key_until_commit_removes_it() -> Result<(), Box<dyn std::error::Error>> {
    let repo = TestRepo::init()?;
    let mut store = repo.store()?;
    store.set("abc/issue", b"{}")?;
    store.set("abc/comments/def", b"{}")?;
    store.commit("seed")?;

    store.delete("abc/comments/def")?;
    assert!(matches!(store.get("abc/comments/def"), Err(Error::KeyNotFound(_))));
    assert!(matches!(store.delete("abc/comments/def"), Err(Error::KeyNotFound(_))));
    store.commit("drop comment")?;

    assert_eq!(repo.store()?.keys()?, vec!["abc/issue".to_string()]);
    Ok(())
}

#[test]
fn empty_commit_keeps_head() -> Result<(), Box<dyn std::error::Error>> {
    let repo = TestRepo::init()?;
    let mut store = repo.store()?;
    store.set("abc/issue", b"{}")?;
    store.commit("seed")?;
    let head = store.current_head()?;

    store.commit("nothing")?;
    assert_eq!(store.current_head()?, head);
    Ok(())
}

#[test]
fn working_tree_branch_is_untouched() -> Result<(), Box<dyn std::error::Error>> {
    let repo = TestRepo::init()?;
    let main_tip = repo.commit_file("README.md", "hello\n", "initial")?;

    let mut store = repo.store()?;
    store.set("abc/issue", b"{}")?;
    store.commit("Added issue abc")?;

    let head = repo.repo().head()?;
    assert_eq!(head.target(), Some(main_tip));
    assert!(!repo.path().join("abc").exists());
    Ok(())
}

#[test]
fn custom_branch_is_independent() -> Result<(), Box<dyn std::error::Error>> {
    let repo = TestRepo::init()?;
    let mut other = GitStore::open(git2::Repository::open(repo.path())?, "tracker")?;
    other.set("abc/issue", b"{}")?;
    other.commit("seed")?;

    let default = GitStore::open(git2::Repository::open(repo.path())?, DEFAULT_BRANCH)?;
    assert!(default.keys()?.is_empty());
    assert_eq!(other.branch(), "tracker");
    Ok(())
}

#[test]
fn contributors_come_from_head_history() -> Result<(), Box<dyn std::error::Error>> {
    let repo = TestRepo::init()?;
    repo.commit_file("a.txt", "a", "first")?;
    repo.commit_file("b.txt", "b", "second")?;
    assert_eq!(
        contributors(repo.repo())?,
        vec!["gi-test <gi-test@example.com>".to_string()]
    );
    Ok(())
}

#[test]
fn discover_finds_repo_from_subdirectory() -> Result<(), Box<dyn std::error::Error>> {
    let repo = TestRepo::init()?;
    let nested = repo.path().join("src/deep");
    std::fs::create_dir_all(&nested)?;

    let mut store = GitStore::discover(Some(&nested), DEFAULT_BRANCH)?;
    store.set("abc/issue", b"{}")?;
    store.commit("Added issue abc")?;
    assert_eq!(repo.last_issue_commit().as_deref(), Some("Added issue abc"));
    Ok(())
}

#[test]
fn concurrent_commit_does_not_drop_other_issues() -> Result<(), Box<dyn std::error::Error>> {
    let repo = TestRepo::init()?;
    let mut writer_a = repo.store()?;
    let mut writer_b = repo.store()?;

    writer_b.set("bbb/issue", b"{}")?;
    writer_b.commit("Added issue bbb")?;

    writer_a.set("aaa/issue", b"{}")?;
    assert!(matches!(
        writer_a.commit("Added issue aaa"),
        Err(Error::BranchMoved { .. })
    ));
    assert_eq!(repo.store()?.keys()?, vec!["bbb/issue".to_string()]);

    let mut retry = repo.store()?;
    retry.set("aaa/issue", b"{}")?;
    retry.commit("Added issue aaa")?;
    assert_eq!(
        repo.store()?.keys()?,
        vec!["aaa/issue".to_string(), "bbb/issue".to_string()]
    );
    Ok(())
}
