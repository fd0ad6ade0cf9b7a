//! error
//!
//! Crate-wide error taxonomy.
//!
//! Two kinds of failure exist in rug and they propagate differently:
//!
//! - Structural errors (invalid project, malformed manifest, failed
//!   manifest commit) abort the whole invocation.
//! - Per-entry reconciliation problems during `checkout`/`update` are
//!   *not* errors: they are reported as one skip line per entry via
//!   [`crate::wrapper::ReconcileOutcome`] so the remaining entries can
//!   proceed.

use std::path::PathBuf;

use thiserror::Error;

use crate::git::GitError;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, RugError>;

/// Errors from rug operations.
#[derive(Debug, Error)]
pub enum RugError {
    /// The directory is not a recognizable rug project.
    #[error("not a valid rug project: {path}")]
    InvalidProject {
        /// The directory that was inspected
        path: PathBuf,
    },

    /// The manifest file failed structural parsing.
    #[error("malformed manifest: {message}")]
    MalformedManifest {
        /// Description of the structural problem
        message: String,
    },

    /// A requested revision does not resolve.
    #[error("unknown revision: {revision}")]
    UnknownRevision {
        /// The revision that failed to resolve
        revision: String,
    },

    /// An operation that requires a clean tree was refused.
    #[error("{message}")]
    DirtyState {
        /// What was dirty and what to do about it
        message: String,
    },

    /// Aggregated dry-run push failures from `publish`.
    ///
    /// Carries one message per failing entry (plus the manifest, if its
    /// own dry-run failed). Raised before any repository is mutated.
    #[error("publish validation failed:\n{}", failures.join("\n"))]
    PublishValidation {
        /// One line per failed dry-run push
        failures: Vec<String>,
    },

    /// A named remote does not exist where it was expected.
    #[error("unrecognized remote: {name}")]
    UnknownRemote {
        /// The remote name
        name: String,
    },

    /// Two manifest entries normalize to the same path.
    #[error("duplicate paths in manifest: {first:?} and {second:?}")]
    DuplicatePath {
        /// First path as written
        first: String,
        /// Second path as written
        second: String,
    },

    /// The operation is not available in this context (e.g. most
    /// working-tree operations on a bare project).
    #[error("unsupported operation: {message}")]
    Unsupported {
        /// What was attempted
        message: String,
    },

    /// A required argument could not be resolved from the manifest,
    /// the repository, or the command line.
    #[error("{message}")]
    MissingAttribute {
        /// Which attribute, and for which entry
        message: String,
    },

    /// Underlying git failure.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RugError {
    /// Shorthand for a malformed-manifest error.
    pub fn malformed(message: impl Into<String>) -> Self {
        RugError::MalformedManifest {
            message: message.into(),
        }
    }

    /// Shorthand for a dirty-state refusal.
    pub fn dirty(message: impl Into<String>) -> Self {
        RugError::DirtyState {
            message: message.into(),
        }
    }

    /// Shorthand for an unsupported-operation error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        RugError::Unsupported {
            message: message.into(),
        }
    }
}
