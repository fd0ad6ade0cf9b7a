//! Rug - manifest-driven management of many repositories
//!
//! Rug keeps a set of repositories in sync against a declarative
//! manifest: an XML file, itself version controlled, that lists the
//! remotes, paths, and revisions of every repository in a project.
//! Checking out a branch of the manifest repository (a *revset*)
//! checks out a coherent combination of revisions across all of them;
//! publishing pushes the whole set, validated first so the remote
//! never sees a half-published state.
//!
//! # Architecture
//!
//! The codebase follows a layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates)
//! - [`project`] - Whole-project orchestration of every operation
//! - [`wrapper`] - One manifest entry bound to a working repository
//! - [`vcs`] - Capability traits and the adapter registry (git, nested)
//! - [`git`] - Single interface for all git operations
//! - [`manifest`] - Manifest reading, merging, and deterministic writes
//! - [`naming`] - The branch naming scheme for the refs rug owns
//! - [`hierarchy`] - Nesting relationships between entry paths
//! - [`config`], [`output`], [`error`] - ambient concerns
//!
//! # Correctness Invariants
//!
//! 1. Refs rug owns live under `refs/rug/`; user branches are never
//!    renamed or deleted
//! 2. Update never runs over a dirty working tree
//! 3. Publish validates every push before mutating anything
//! 4. Per-entry problems skip the entry, never the whole operation

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod hierarchy;
pub mod manifest;
pub mod naming;
pub mod output;
pub mod project;
pub mod vcs;
pub mod wrapper;
