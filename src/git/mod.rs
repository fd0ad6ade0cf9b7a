//! git
//!
//! Single doorway to git. All repository reads and writes flow through
//! [`Git`]; no other module imports `git2` or spawns the git binary.
//!
//! Two mechanisms sit behind the one interface:
//!
//! - `git2` for everything that is a plain repository read or ref write:
//!   opening, revision resolution, ancestry queries, status, config,
//!   blob reads, ref updates.
//! - the `git` binary for operations that involve the network or the
//!   working tree (fetch, push and dry-run push, checkout, merge,
//!   rebase, stash), where the system git honors the user's credential
//!   helpers, SSH configuration, and merge machinery.
//!
//! Every spawned command is logged at debug level.

mod interface;

pub use interface::{Git, GitError, RebaseOutcome, Rev};
