//! Command-line interface for gi
//!
//! This module defines the CLI structure using clap derive macros.
//! Issue commands live in [`issue`]; they all run against a [`Session`]
//! that owns the store and the issue index.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::error::Result;
use crate::git::{self, GitStore};
use crate::identity;
use crate::manager::IssueManager;
use crate::output::OutputOptions;
use crate::prompt::TerminalPrompter;
use crate::record::RecordContext;
use crate::store::Store;

mod issue;

pub use issue::{
    parse_assignment, run_close, run_comment, run_delete, run_edit, run_list, run_my, run_new,
    run_reindex, run_show, CommentOptions, EditOptions, ListOptions, NewOptions,
};

/// gi - distributed issue tracking inside git
///
/// Issues and comments are stored as JSON documents in a dedicated branch
/// of the current repository and travel with it.
#[derive(Parser, Debug)]
#[command(name = "gi")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the repository (defaults to current directory)
    #[arg(long, global = true, env = "GI_REPO")]
    pub repo: Option<PathBuf>,

    /// Identity recorded as reporter ("Name <email>")
    #[arg(long, global = true, env = "GI_USER")]
    pub user: Option<String>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new issue
    New {
        /// Issue title
        title: Option<String>,

        /// Set a field, e.g. --set type=feature (repeatable)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        sets: Vec<String>,

        /// Do not prompt for fields
        #[arg(long)]
        no_edit: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// List issues
    List {
        /// Field to sort by
        #[arg(short, long)]
        sort: Option<String>,

        /// Filter rules, e.g. "status:new,title__not:typo"
        #[arg(short, long)]
        filter: Option<String>,

        /// Include closed and invalid issues
        #[arg(short, long)]
        all: bool,
    },

    /// List issues assigned to you
    My {
        /// Field to sort by
        #[arg(short, long)]
        sort: Option<String>,

        /// Include closed and invalid issues
        #[arg(short, long)]
        all: bool,
    },

    /// Show an issue
    Show {
        /// Issue id or unique prefix
        id: String,

        /// Also show comments
        #[arg(short, long)]
        all: bool,
    },

    /// Edit an issue
    Edit {
        /// Issue id or unique prefix
        id: String,

        /// Set a field, e.g. --set status=assigned (repeatable)
        #[arg(long = "set", value_name = "FIELD=VALUE")]
        sets: Vec<String>,

        /// Do not prompt for fields
        #[arg(long)]
        no_edit: bool,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Comment on an issue
    Comment {
        /// Issue id or unique prefix
        id: String,

        /// Comment text; prompts when omitted
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Close an issue
    Close {
        /// Issue id or unique prefix
        id: String,
    },

    /// Delete an issue and its comments
    Delete {
        /// Issue id or unique prefix
        id: String,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Rebuild the issue index from the store
    Reindex,
}

/// Store, index and output settings shared by one command run.
pub struct Session {
    pub store: Box<dyn Store>,
    pub manager: IssueManager,
    pub config: Config,
    pub output: OutputOptions,
}

impl Session {
    /// Open the repository store and index for a CLI invocation.
    pub fn open(repo: Option<PathBuf>, user: Option<&str>, output: OutputOptions) -> Result<Self> {
        let start = repo.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let repository = git::discover_repo(Some(start.as_path()))?;
        let config = Config::load_from_repo(&git::workdir(&repository));

        let user = identity::resolve_user(user, Some(&repository), &config);
        let contributors = git::contributors(&repository).unwrap_or_else(|err| {
            tracing::warn!(error = %err, "could not list contributors");
            Vec::new()
        });
        let ctx = RecordContext::new(user)
            .with_contributors(contributors)
            .with_max_id_attempts(config.ids.max_attempts);

        let cache_dir = git::common_dir(&repository);
        let store = GitStore::open(repository, config.store.branch.clone())?;
        let mut manager = IssueManager::new(ctx);
        if config.cache.enabled {
            manager = manager.with_cache_dir(cache_dir);
        }

        Ok(Self {
            store: Box::new(store),
            manager,
            config,
            output,
        })
    }

    /// Session over any store, without a disk cache.
    pub fn with_store(
        store: Box<dyn Store>,
        ctx: RecordContext,
        config: Config,
        output: OutputOptions,
    ) -> Self {
        Self {
            store,
            manager: IssueManager::new(ctx),
            config,
            output,
        }
    }

    pub fn ctx(&self) -> &RecordContext {
        self.manager.ctx()
    }
}

impl Cli {
    /// Run the CLI command
    pub fn run(self) -> Result<()> {
        let output = OutputOptions::detect(self.json, self.quiet);
        let mut session = Session::open(self.repo, self.user.as_deref(), output)?;
        let mut prompter = TerminalPrompter::stdio();

        match self.command {
            Commands::New { title, sets, no_edit, yes } => run_new(
                &mut session,
                &mut prompter,
                NewOptions { title, sets, no_edit, yes },
            ),
            Commands::List { sort, filter, all } => {
                run_list(&mut session, ListOptions { sort, filter, all })
            }
            Commands::My { sort, all } => run_my(&mut session, ListOptions { sort, filter: None, all }),
            Commands::Show { id, all } => run_show(&mut session, &id, all),
            Commands::Edit { id, sets, no_edit, yes } => run_edit(
                &mut session,
                &mut prompter,
                EditOptions { id, sets, no_edit, yes },
            ),
            Commands::Comment { id, message } => {
                run_comment(&mut session, &mut prompter, CommentOptions { id, message })
            }
            Commands::Close { id } => run_close(&mut session, &id),
            Commands::Delete { id, yes } => run_delete(&mut session, &mut prompter, &id, yes),
            Commands::Reindex => run_reindex(&mut session),
        }
    }
}
