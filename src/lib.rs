//! git-issues - distributed issue tracking stored in a git branch
//!
//! This library provides the record and query layer behind the `gi` CLI:
//! typed properties, issue and comment records, and the issue manager that
//! indexes, caches, filters and resolves records by identifier prefix.
//!
//! # Core Concepts
//!
//! - **Properties**: named, validated fields (text, option, date, description, id)
//! - **Records**: issues and comments, stored as flat JSON documents
//! - **Issue Manager**: index keyed by id, cached per store head revision
//! - **Store**: key-value seam implemented over a git branch or in memory
//!
//! # Module Organization
//!
//! - `cli`: Command-line interface using clap
//! - `config`: Configuration loading from `.gi.toml`
//! - `error`: Error types and result aliases
//! - `git`: Repository discovery and the git-backed store
//! - `store`: The `Store` trait and the in-memory store
//! - `property`: Property kinds and the `Field` enum
//! - `record`, `issue`, `comment`: Record model
//! - `filter`: Filter rules
//! - `manager`: Issue index and prefix lookup
//! - `cache`: On-disk index cache
//! - `identity`: Current user resolution
//! - `prompt`: Interactive prompting seam
//! - `lock`: File locking and atomic writes for the cache
//! - `output`: Human and JSON output

pub mod cache;
pub mod cli;
pub mod comment;
pub mod config;
pub mod error;
pub mod filter;
pub mod git;
pub mod identity;
pub mod issue;
pub mod lock;
pub mod manager;
pub mod output;
pub mod prompt;
pub mod property;
pub mod record;
pub mod store;

pub use comment::Comment;
pub use error::{Error, Result};
pub use issue::Issue;
pub use manager::IssueManager;
pub use record::{Record, RecordContext};
pub use store::{MemoryStore, Store};
