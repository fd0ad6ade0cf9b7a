//! Integration tests for the Git interface.
//!
//! These tests use real git repositories created via tempfile to verify
//! that the Git interface works correctly with actual git operations.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Once;

use tempfile::TempDir;

use rug::git::{Git, GitError};

static IDENTITY: Once = Once::new();

/// Commits in test repositories need an identity regardless of the
/// host's git configuration.
fn ensure_identity() {
    IDENTITY.call_once(|| {
        std::env::set_var("GIT_AUTHOR_NAME", "Test User");
        std::env::set_var("GIT_AUTHOR_EMAIL", "test@example.com");
        std::env::set_var("GIT_COMMITTER_NAME", "Test User");
        std::env::set_var("GIT_COMMITTER_EMAIL", "test@example.com");
        std::env::set_var("GIT_CONFIG_NOSYSTEM", "1");
    });
}

/// Run a git command in the given directory.
fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed");
    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Resolve a spec with the git binary, bypassing the interface.
fn sha_raw(dir: &Path, spec: &str) -> String {
    let output = Command::new("git")
        .args(["rev-parse", spec])
        .current_dir(dir)
        .output()
        .expect("git rev-parse failed");
    assert!(output.status.success(), "rev-parse {} failed", spec);
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

/// Test fixture that creates a real git repository.
struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    /// Create a new test repository with an initial commit on `master`.
    fn new() -> Self {
        ensure_identity();
        let dir = TempDir::new().expect("failed to create temp dir");
        run_git(dir.path(), &["init"]);
        // Pin the branch name regardless of init.defaultBranch.
        run_git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/master"]);
        std::fs::write(dir.path().join("README.md"), "# Test Repo\n").unwrap();
        run_git(dir.path(), &["add", "README.md"]);
        run_git(dir.path(), &["commit", "-m", "Initial commit"]);
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn git(&self) -> Git {
        Git::open(self.path()).expect("failed to open test repo")
    }

    /// Create a file and commit it, returning the new commit sha.
    fn commit_file(&self, path: &str, content: &str, message: &str) -> String {
        std::fs::write(self.dir.path().join(path), content).unwrap();
        run_git(self.path(), &["add", path]);
        run_git(self.path(), &["commit", "-m", message]);
        sha_raw(self.path(), "HEAD")
    }

    /// Bare-clone this repository into a sibling directory, with a
    /// deterministic remote HEAD, and return its path.
    fn bare_clone(&self) -> (TempDir, PathBuf) {
        let parent = TempDir::new().unwrap();
        let bare = parent.path().join("remote");
        run_git(
            parent.path(),
            &["clone", "--bare", self.path().to_str().unwrap(), "remote"],
        );
        run_git(&bare, &["symbolic-ref", "HEAD", "refs/heads/master"]);
        (parent, bare)
    }
}

// =============================================================================
// Opening
// =============================================================================

#[test]
fn open_valid_repository() {
    let repo = TestRepo::new();
    assert!(Git::open(repo.path()).is_ok());
}

#[test]
fn open_does_not_discover_upward() {
    // Entry working trees nest inside each other; opening a
    // subdirectory must not resolve to the enclosing repository.
    let repo = TestRepo::new();
    let subdir = repo.path().join("subdir");
    std::fs::create_dir(&subdir).unwrap();
    let git = Git::open(&subdir);
    assert!(matches!(git, Err(GitError::NotARepo { .. })));
}

#[test]
fn open_non_repository_fails() {
    let dir = TempDir::new().unwrap();
    assert!(matches!(
        Git::open(dir.path()),
        Err(GitError::NotARepo { .. })
    ));
}

#[test]
fn init_pins_the_initial_branch() {
    ensure_identity();
    let dir = TempDir::new().unwrap();
    let git = Git::init(&dir.path().join("repo"), Some("master")).unwrap();
    std::fs::write(git.dir().join("a.txt"), "a\n").unwrap();
    git.add(&["a.txt"]).unwrap();
    git.commit("first", false).unwrap();
    assert_eq!(git.head().unwrap().short_name(), "master");
}

// =============================================================================
// Revision resolution
// =============================================================================

#[test]
fn head_on_a_branch_is_symbolic() {
    let repo = TestRepo::new();
    let head = repo.git().head().unwrap();
    assert_eq!(head.short_name(), "master");
    assert_eq!(head.long_name(), "refs/heads/master");
    assert!(!head.is_fixed());
}

#[test]
fn detached_head_is_fixed() {
    let repo = TestRepo::new();
    let sha = sha_raw(repo.path(), "HEAD");
    run_git(repo.path(), &["checkout", "--detach", &sha]);
    let head = repo.git().head().unwrap();
    assert!(head.is_fixed());
    assert_eq!(head.sha(), sha);
}

#[test]
fn rev_distinguishes_named_and_fixed() {
    let repo = TestRepo::new();
    let git = repo.git();
    let sha = sha_raw(repo.path(), "HEAD");

    let named = git.rev("master").unwrap();
    assert!(!named.is_fixed());
    assert_eq!(named.sha(), sha);

    let fixed = git.rev(&sha).unwrap();
    assert!(fixed.is_fixed());

    assert!(!git.is_fixed_revision("master"));
    assert!(git.is_fixed_revision(&sha));
    assert!(git.named_ref_exists("master"));
    assert!(!git.named_ref_exists(&sha));
}

#[test]
fn unknown_revision_is_an_error() {
    let repo = TestRepo::new();
    assert!(matches!(
        repo.git().rev("does-not-exist"),
        Err(GitError::UnknownRevision { .. })
    ));
}

// =============================================================================
// Refs
// =============================================================================

#[test]
fn update_ref_creates_and_moves() {
    let repo = TestRepo::new();
    let git = repo.git();
    let first = sha_raw(repo.path(), "HEAD");

    git.update_ref("refs/rug/heads/main/origin/dev", "HEAD").unwrap();
    assert_eq!(sha_raw(repo.path(), "refs/rug/heads/main/origin/dev"), first);

    let second = repo.commit_file("b.txt", "b\n", "second");
    git.update_ref("refs/rug/heads/main/origin/dev", &second).unwrap();
    assert_eq!(
        sha_raw(repo.path(), "refs/rug/heads/main/origin/dev"),
        second
    );

    git.delete_ref("refs/rug/heads/main/origin/dev").unwrap();
    assert!(!git.named_ref_exists("refs/rug/heads/main/origin/dev"));
}

#[test]
fn update_ref_requires_a_qualified_name() {
    let repo = TestRepo::new();
    assert!(matches!(
        repo.git().update_ref("short-name", "HEAD"),
        Err(GitError::InvalidRefName { .. })
    ));
}

// =============================================================================
// Ancestry
// =============================================================================

#[test]
fn descendants_and_fast_forwards() {
    let repo = TestRepo::new();
    let git = repo.git();
    let first = sha_raw(repo.path(), "HEAD");
    let second = repo.commit_file("b.txt", "b\n", "second");

    assert!(git.is_descendant(&second, &first).unwrap());
    assert!(git.is_descendant(&first, &first).unwrap());
    assert!(!git.is_descendant(&first, &second).unwrap());

    assert!(git.can_fast_forward(&first, &second).unwrap());
    assert!(!git.can_fast_forward(&second, &first).unwrap());
}

// =============================================================================
// Clone
// =============================================================================

#[test]
fn clone_checks_out_the_requested_branch() {
    let repo = TestRepo::new();
    run_git(repo.path(), &["branch", "dev"]);
    repo.commit_file("master-only.txt", "m\n", "master work");
    let (_keep, bare) = repo.bare_clone();

    let dst = TempDir::new().unwrap();
    let git = Git::clone(
        bare.to_str().unwrap(),
        &dst.path().join("work"),
        "origin",
        Some("dev"),
        Some("master"),
    )
    .unwrap();
    assert_eq!(git.head().unwrap().short_name(), "dev");
    assert!(!git.dir().join("master-only.txt").exists());
}

#[test]
fn clone_of_a_fixed_revision_detaches() {
    let repo = TestRepo::new();
    let first = sha_raw(repo.path(), "HEAD");
    repo.commit_file("b.txt", "b\n", "second");
    let (_keep, bare) = repo.bare_clone();

    let dst = TempDir::new().unwrap();
    let git = Git::clone(
        bare.to_str().unwrap(),
        &dst.path().join("work"),
        "origin",
        Some(&first),
        Some("master"),
    )
    .unwrap();
    let head = git.head().unwrap();
    assert!(head.is_fixed());
    assert_eq!(head.sha(), first);
}

#[test]
fn clone_without_revision_uses_the_remote_default() {
    let repo = TestRepo::new();
    let (_keep, bare) = repo.bare_clone();

    let dst = TempDir::new().unwrap();
    let git = Git::clone(
        bare.to_str().unwrap(),
        &dst.path().join("work"),
        "origin",
        None,
        Some("master"),
    )
    .unwrap();
    assert_eq!(git.head().unwrap().short_name(), "master");
    assert_eq!(git.default_remote_branch("origin").unwrap(), "master");
}

// =============================================================================
// Push
// =============================================================================

#[test]
fn test_push_reports_without_mutating() {
    let repo = TestRepo::new();
    let (_keep, bare) = repo.bare_clone();
    let remote_before = sha_raw(&bare, "refs/heads/master");

    let dst = TempDir::new().unwrap();
    let git = Git::clone(
        bare.to_str().unwrap(),
        &dst.path().join("work"),
        "origin",
        Some("master"),
        Some("master"),
    )
    .unwrap();
    std::fs::write(git.dir().join("c.txt"), "c\n").unwrap();
    git.add(&["c.txt"]).unwrap();
    git.commit("local work", false).unwrap();

    let (ok, _) = git.test_push("origin", "refs/heads/master:refs/heads/master", false);
    assert!(ok);
    assert_eq!(sha_raw(&bare, "refs/heads/master"), remote_before);
}

#[test]
fn test_push_fails_against_a_broken_remote() {
    let repo = TestRepo::new();
    let (_keep, bare) = repo.bare_clone();

    let dst = TempDir::new().unwrap();
    let git = Git::clone(
        bare.to_str().unwrap(),
        &dst.path().join("work"),
        "origin",
        Some("master"),
        Some("master"),
    )
    .unwrap();
    git.remote_set_url("origin", "/nonexistent/nowhere").unwrap();
    let (ok, output) = git.test_push("origin", "refs/heads/master:refs/heads/master", false);
    assert!(!ok);
    assert!(!output.is_empty());
}

#[test]
fn real_push_advances_the_remote() {
    let repo = TestRepo::new();
    let (_keep, bare) = repo.bare_clone();

    let dst = TempDir::new().unwrap();
    let git = Git::clone(
        bare.to_str().unwrap(),
        &dst.path().join("work"),
        "origin",
        Some("master"),
        Some("master"),
    )
    .unwrap();
    std::fs::write(git.dir().join("c.txt"), "c\n").unwrap();
    git.add(&["c.txt"]).unwrap();
    git.commit("local work", false).unwrap();
    let local = git.head().unwrap().sha().to_string();

    git.push("origin", "refs/heads/master:refs/heads/master", false)
        .unwrap();
    assert_eq!(sha_raw(&bare, "refs/heads/master"), local);
}

// =============================================================================
// Worktree and status
// =============================================================================

#[test]
fn untracked_files_do_not_count_as_dirty() {
    let repo = TestRepo::new();
    let git = repo.git();
    assert!(!git.is_dirty().unwrap());

    std::fs::write(repo.path().join("untracked.txt"), "u\n").unwrap();
    assert!(!git.is_dirty().unwrap());

    std::fs::write(repo.path().join("README.md"), "changed\n").unwrap();
    assert!(git.is_dirty().unwrap());
}

#[test]
fn stash_round_trips_local_modifications() {
    let repo = TestRepo::new();
    let git = repo.git();
    std::fs::write(repo.path().join("README.md"), "changed\n").unwrap();
    assert!(!git.diff().unwrap().is_empty());

    git.stash().unwrap();
    assert!(!git.is_dirty().unwrap());
    assert!(git.diff().unwrap().is_empty());

    git.stash_pop().unwrap();
    assert!(git.is_dirty().unwrap());
    assert_eq!(
        std::fs::read_to_string(repo.path().join("README.md")).unwrap(),
        "changed\n"
    );
}

#[test]
fn exclude_rules_hide_nested_directories() {
    let repo = TestRepo::new();
    let git = repo.git();
    git.add_ignore("nested").unwrap();

    let nested = repo.path().join("nested");
    std::fs::create_dir(&nested).unwrap();
    std::fs::write(nested.join("inner.txt"), "i\n").unwrap();

    assert_eq!(git.status(true).unwrap(), "");
}

#[test]
fn merge_fast_forwards() {
    let repo = TestRepo::new();
    let git = repo.git();
    run_git(repo.path(), &["branch", "behind"]);
    let tip = repo.commit_file("b.txt", "b\n", "advance");

    run_git(repo.path(), &["checkout", "behind"]);
    let outcome = git.merge("master").unwrap();
    assert!(outcome.success);
    assert_eq!(sha_raw(repo.path(), "HEAD"), tip);
}

#[test]
fn conflicting_merge_reports_failure() {
    let repo = TestRepo::new();
    let git = repo.git();
    run_git(repo.path(), &["branch", "other"]);
    repo.commit_file("README.md", "ours\n", "ours");

    run_git(repo.path(), &["checkout", "other"]);
    repo.commit_file("README.md", "theirs\n", "theirs");

    let outcome = git.merge("master").unwrap();
    assert!(!outcome.success);
    assert!(!outcome.output.is_empty());
}

// =============================================================================
// Blobs and config
// =============================================================================

#[test]
fn show_blob_reads_committed_content() {
    let repo = TestRepo::new();
    let text = repo.git().show_blob("HEAD:README.md").unwrap();
    assert_eq!(text, "# Test Repo\n");
}

#[test]
fn config_round_trip() {
    let repo = TestRepo::new();
    let git = repo.git();
    assert_eq!(git.config_get("rug.test-key").unwrap(), None);
    git.config_set("rug.test-key", "value").unwrap();
    assert_eq!(
        git.config_get("rug.test-key").unwrap().as_deref(),
        Some("value")
    );
}
