//! naming
//!
//! The branch naming scheme: the pure mapping from (revset, remote,
//! revision) to the set of ref names rug owns inside an entry's
//! repository.
//!
//! For a symbolic revision each (revset, remote, revision) triple gets
//! its own canonical and bookmark refs. For a fixed revision (a content
//! address) there is no symbolic name to branch on and the entry never
//! moves independently, so canonical and bookmark collapse to one
//! well-known ref per remote. The two index refs are always the same
//! fixed names: only one move can be pending per entry because `commit`
//! clears them before the next `add`/`update` can stage another.

/// Transient ref recording a pending canonical move, cleared by commit.
pub const CANONICAL_INDEX_REF: &str = "refs/rug/canonical_index";

/// Transient ref recording a pending bookmark move, cleared by commit.
pub const BOOKMARK_INDEX_REF: &str = "refs/rug/bookmark_index";

/// Well-known ref that fixed-revision entries are pushed onto, so the
/// pushed commit stays reachable on the remote.
pub const SHA_RIDER_REF: &str = "refs/rug/sha_rider";

/// The ref names rug owns inside one entry's repository, for one revset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchSet {
    /// What the user checks out and edits: a branch short name, or the
    /// revision itself (detached) for fixed revisions.
    pub live: String,
    /// Fully-qualified form of `live`; equal to `live` when fixed.
    pub live_ref: String,
    /// The ref rug considers authoritative for this revset.
    pub canonical: String,
    /// Last revision known to be safely reconciled with upstream.
    pub bookmark: String,
    /// Pending canonical move staged by `add`, consumed by `commit`.
    pub canonical_index: String,
    /// Pending bookmark move staged by `update`, consumed by `commit`.
    pub bookmark_index: String,
    /// What upstream says: the remote-tracking name for a symbolic
    /// revision, or the revision itself for a fixed one.
    pub remote_target: String,
    /// Whether the revision is a fixed content address.
    pub fixed: bool,
}

/// Compute the branch set for an entry.
///
/// `fixed` states whether `revision` is a content address rather than a
/// symbolic name; the caller decides this (it needs repository access,
/// which this module deliberately does not have).
pub fn branch_set(revset: &str, remote: &str, revision: &str, fixed: bool) -> BranchSet {
    if fixed {
        BranchSet {
            live: revision.to_string(),
            live_ref: revision.to_string(),
            canonical: format!("refs/rug/heads/{}/{}/sha/canonical", revset, remote),
            bookmark: format!("refs/rug/bookmarks/{}/{}/sha/bookmark", revset, remote),
            canonical_index: CANONICAL_INDEX_REF.to_string(),
            bookmark_index: BOOKMARK_INDEX_REF.to_string(),
            remote_target: revision.to_string(),
            fixed: true,
        }
    } else {
        BranchSet {
            live: revision.to_string(),
            live_ref: format!("refs/heads/{}", revision),
            canonical: format!("refs/rug/heads/{}/{}/{}", revset, remote, revision),
            bookmark: format!("refs/rug/bookmarks/{}/{}/{}", revset, remote, revision),
            canonical_index: CANONICAL_INDEX_REF.to_string(),
            bookmark_index: BOOKMARK_INDEX_REF.to_string(),
            remote_target: format!("{}/{}", remote, revision),
            fixed: false,
        }
    }
}

/// Join a remote base URL and a repository name.
pub fn remote_join(base: &str, name: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), name.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbolic_revision_gets_per_entry_refs() {
        let b = branch_set("main", "origin", "dev", false);
        assert_eq!(b.live, "dev");
        assert_eq!(b.live_ref, "refs/heads/dev");
        assert_eq!(b.canonical, "refs/rug/heads/main/origin/dev");
        assert_eq!(b.bookmark, "refs/rug/bookmarks/main/origin/dev");
        assert_eq!(b.remote_target, "origin/dev");
        assert!(!b.fixed);
    }

    #[test]
    fn fixed_revision_collapses_to_shared_refs() {
        let sha = "a94a8fe5ccb19ba61c4c0873d391e987982fbbd3";
        let b = branch_set("main", "origin", sha, true);
        assert_eq!(b.live, sha);
        assert_eq!(b.live_ref, sha);
        assert_eq!(b.canonical, "refs/rug/heads/main/origin/sha/canonical");
        assert_eq!(b.bookmark, "refs/rug/bookmarks/main/origin/sha/bookmark");
        assert_eq!(b.remote_target, sha);
        assert!(b.fixed);
    }

    #[test]
    fn index_refs_are_shared_well_known_names() {
        let a = branch_set("main", "origin", "dev", false);
        let b = branch_set("release", "mirror", "stable", false);
        assert_eq!(a.canonical_index, b.canonical_index);
        assert_eq!(a.bookmark_index, b.bookmark_index);
        assert_eq!(a.canonical_index, "refs/rug/canonical_index");
        assert_eq!(a.bookmark_index, "refs/rug/bookmark_index");
    }

    #[test]
    fn remote_join_normalizes_slashes() {
        assert_eq!(remote_join("git://h/base/", "/foo"), "git://h/base/foo");
        assert_eq!(remote_join("git://h/base", "foo"), "git://h/base/foo");
    }
}
