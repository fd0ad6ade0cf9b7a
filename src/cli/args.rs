//! cli::args
//!
//! Command-line argument definitions using clap derive.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rug - manifest-driven management of many repositories
#[derive(Parser, Debug)]
#[command(name = "rug")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if rug was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new empty project
    Init {
        /// Directory to initialize (default: current directory)
        dir: Option<PathBuf>,

        /// Create a bare project (manifest only, for hosting)
        #[arg(long)]
        bare: bool,
    },

    /// Clone a published project and check out its entries
    Clone {
        /// URL of the published project
        url: String,

        /// Directory to clone into
        dir: Option<PathBuf>,

        /// Name for the source remote (default: origin)
        #[arg(long)]
        source: Option<String>,

        /// Revset to check out (default: the remote's default)
        #[arg(long)]
        revset: Option<String>,

        /// Clone only the manifest repository
        #[arg(long)]
        bare: bool,
    },

    /// Check out a revset across every entry
    Checkout {
        /// Revset to check out (default: re-check out the current one)
        revset: Option<String>,

        /// Revset to create from (with -b; default: the current one)
        src: Option<String>,

        /// Create the revset first
        #[arg(short = 'b', long)]
        create: bool,
    },

    /// Fetch the manifest sources and every entry's remote
    Fetch,

    /// Reconcile every entry with its remote
    Update {
        /// Also update nested projects
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show per-entry status against the committed manifest
    Status {
        /// Terse two-column output without the revset header
        #[arg(short, long)]
        porcelain: bool,
    },

    /// Print the current revset, or create a new one
    Revset {
        /// Revset to create (omit to print the current one)
        dst: Option<String>,

        /// Revset to create from (default: the current one)
        src: Option<String>,
    },

    /// List all local revsets
    #[command(name = "revset-list")]
    RevsetList,

    /// Add a repository to the manifest, or revise its entry
    Add {
        /// Entry path relative to the project root
        path: String,

        /// Repository name under the remote's base URL
        #[arg(long)]
        name: Option<String>,

        /// Manifest remote to associate with
        #[arg(long)]
        remote: Option<String>,

        /// Revision to record (default: the checked-out branch)
        #[arg(long)]
        revision: Option<String>,

        /// Version control kind of the entry
        #[arg(long)]
        vcs: Option<String>,

        /// Record the resolved commit sha instead of a branch name
        #[arg(short = 's', long = "sha")]
        use_sha: bool,
    },

    /// Remove an entry from the manifest (working tree is kept)
    Remove {
        /// Entry path to remove
        path: String,
    },

    /// Record the project state on the current revset
    Commit {
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,

        /// Also commit dirty entry working trees first
        #[arg(short, long)]
        all: bool,

        /// Also commit nested projects through their own manifests
        #[arg(short, long)]
        recursive: bool,
    },

    /// Publish the current revset to a source
    Push {
        /// Source to publish to (default: origin)
        source: Option<String>,

        /// Validate only; push nothing
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// List manifest remotes
    #[command(name = "remote-list")]
    RemoteList,

    /// Add or replace a manifest remote
    #[command(name = "remote-add")]
    RemoteAdd {
        /// Remote name
        name: String,

        /// Base fetch URL that entry names are joined onto
        fetch: String,
    },

    /// List sources of the manifest repository
    #[command(name = "source-list")]
    SourceList,

    /// Add a source to the manifest repository
    #[command(name = "source-add")]
    SourceAdd {
        /// Source name
        name: String,

        /// Source URL
        url: String,
    },

    /// Refresh a source's default-branch marker
    #[command(name = "source-set-head")]
    SourceSetHead {
        /// Source name
        name: String,

        /// Branch to use when the source's HEAD is ambiguous
        branch: Option<String>,
    },
}
