//! git::interface
//!
//! The concrete git implementation behind [`Git`].

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

/// Errors from git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not a git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// A revision specification did not resolve.
    #[error("unknown revision: {spec}")]
    UnknownRevision {
        /// The spec that failed to resolve
        spec: String,
    },

    /// A named ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// A ref name is not usable for the requested operation.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// A spawned git command exited non-zero.
    #[error("{command} failed: {output}")]
    CommandFailed {
        /// The command line that was run
        command: String,
        /// Captured stderr (or stdout when stderr was empty)
        output: String,
    },

    /// Command or blob output was not valid UTF-8.
    #[error("not valid utf-8: {what}")]
    NotUtf8 {
        /// What was being decoded
        what: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => GitError::RefNotFound {
                refname: err.message().to_string(),
            },
            git2::ErrorCode::InvalidSpec => GitError::UnknownRevision {
                spec: err.message().to_string(),
            },
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

/// A resolved revision: short name, fully-qualified name, commit sha,
/// and whether the spec was a fixed content address rather than a
/// symbolic ref.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rev {
    short: String,
    long: String,
    sha: String,
    fixed: bool,
}

impl Rev {
    /// A revision that is a bare content address.
    pub fn fixed(sha: String) -> Self {
        Self {
            short: sha.clone(),
            long: sha.clone(),
            sha,
            fixed: true,
        }
    }

    /// A revision resolved through a named ref.
    pub fn named(short: String, long: String, sha: String) -> Self {
        Self {
            short,
            long,
            sha,
            fixed: false,
        }
    }

    /// Short symbolic name (branch name), or the sha when fixed.
    pub fn short_name(&self) -> &str {
        &self.short
    }

    /// Fully-qualified ref name, or the sha when fixed.
    pub fn long_name(&self) -> &str {
        &self.long
    }

    /// The commit sha this revision resolves to.
    pub fn sha(&self) -> &str {
        &self.sha
    }

    /// Whether the revision is a fixed content address.
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }
}

/// Outcome of a merge or rebase attempt.
///
/// Conflicts are not errors: the repository is left in git's native
/// conflicted state and the raw tool output is carried for reporting.
#[derive(Debug, Clone)]
pub struct RebaseOutcome {
    pub success: bool,
    pub output: String,
}

/// Run a git command, optionally in `dir`, capturing output.
fn run_git(dir: Option<&Path>, args: &[&str]) -> Result<(bool, String, String), GitError> {
    debug!(?dir, ?args, "git");
    let mut command = Command::new("git");
    command.args(args);
    if let Some(dir) = dir {
        command.current_dir(dir);
    }
    let output = command.output().map_err(|e| GitError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        output: e.to_string(),
    })?;
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    Ok((output.status.success(), stdout, stderr))
}

/// Handle to one git repository.
pub struct Git {
    repo: git2::Repository,
    dir: PathBuf,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git").field("dir", &self.dir).finish()
    }
}

impl Git {
    // =========================================================================
    // Opening, init, clone
    // =========================================================================

    /// Open the repository rooted at exactly `path`.
    ///
    /// Unlike discovery this does not walk up: entry working directories
    /// nest inside each other, and the directory itself must be the
    /// repository root.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        let dir = repo
            .workdir()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| repo.path().to_path_buf());
        Ok(Self { repo, dir })
    }

    /// Whether `path` is the root of a git repository.
    pub fn is_repo(path: &Path) -> bool {
        git2::Repository::open(path).is_ok()
    }

    /// Initialize a new repository at `path`.
    ///
    /// When `initial_branch` is given, HEAD is pointed at that (unborn)
    /// branch so the first commit lands on a deterministic name.
    pub fn init(path: &Path, initial_branch: Option<&str>) -> Result<Self, GitError> {
        fs::create_dir_all(path).map_err(|e| GitError::Internal {
            message: format!("create {}: {}", path.display(), e),
        })?;
        let repo = git2::Repository::init(path)?;
        if let Some(branch) = initial_branch {
            repo.set_head(&format!("refs/heads/{}", branch))?;
        }
        drop(repo);
        Self::open(path)
    }

    /// Clone `url` into `dir` under the given remote name.
    ///
    /// This is a manual clone (init, remote add, fetch, checkout) so it
    /// works into a directory that already exists, which `git clone`
    /// refuses. With a symbolic `revision` the matching local branch is
    /// created from the remote-tracking ref and checked out; with a
    /// fixed revision the sha is checked out detached; with no revision
    /// the remote's default branch is used.
    pub fn clone(
        url: &str,
        dir: &Path,
        remote: &str,
        revision: Option<&str>,
        default_branch: Option<&str>,
    ) -> Result<Self, GitError> {
        fs::create_dir_all(dir).map_err(|e| GitError::Internal {
            message: format!("create {}: {}", dir.display(), e),
        })?;
        let (ok, _, stderr) = run_git(Some(dir), &["init"])?;
        if !ok {
            return Err(GitError::CommandFailed {
                command: "git init".to_string(),
                output: stderr,
            });
        }
        let git = Self::open(dir)?;
        git.remote_add(remote, url)?;
        git.fetch(Some(remote))?;
        // Best effort: an explicit revision does not need the remote
        // HEAD, and bare remotes frequently have a dangling one.
        if let Err(e) = git.remote_set_head(remote, default_branch) {
            debug!(remote, error = %e, "could not set remote head");
        }

        match revision {
            Some(rev) if git.is_fixed_revision(rev) => git.checkout(rev, true)?,
            rev => {
                let branch = match rev {
                    Some(r) => r.to_string(),
                    None => git.default_remote_branch(remote)?,
                };
                let tracking = format!("refs/remotes/{}/{}", remote, branch);
                git.update_ref(&format!("refs/heads/{}", branch), &tracking)?;
                git.checkout(&branch, true)?;
            }
        }
        Ok(git)
    }

    /// Probe whether `url` looks like a reachable git repository.
    pub fn ls_remote_ok(url: &str) -> bool {
        matches!(run_git(None, &["ls-remote", url, "HEAD"]), Ok((true, _, _)))
    }

    /// Working directory of this repository.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // =========================================================================
    // Shell helpers
    // =========================================================================

    /// Run git here; non-zero exit is an error carrying stderr.
    fn run(&self, args: &[&str]) -> Result<String, GitError> {
        let (ok, stdout, stderr) = run_git(Some(&self.dir), args)?;
        if ok {
            Ok(stdout.trim_end().to_string())
        } else {
            Err(GitError::CommandFailed {
                command: format!("git {}", args.join(" ")),
                output: if stderr.trim().is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr.trim().to_string()
                },
            })
        }
    }

    /// Run git here; non-zero exit is a result, not an error.
    fn try_run(&self, args: &[&str]) -> Result<(bool, String), GitError> {
        let (ok, stdout, stderr) = run_git(Some(&self.dir), args)?;
        let mut output = stdout;
        if !stderr.is_empty() {
            if !output.is_empty() && !output.ends_with('\n') {
                output.push('\n');
            }
            output.push_str(&stderr);
        }
        Ok((ok, output.trim_end().to_string()))
    }

    // =========================================================================
    // Revision resolution
    // =========================================================================

    /// Resolve the current HEAD.
    pub fn head(&self) -> Result<Rev, GitError> {
        let head = self.repo.head().map_err(|_| GitError::UnknownRevision {
            spec: "HEAD".to_string(),
        })?;
        let sha = head.peel_to_commit()?.id().to_string();
        if self.repo.head_detached()? {
            return Ok(Rev::fixed(sha));
        }
        Ok(Rev {
            short: head.shorthand().unwrap_or("HEAD").to_string(),
            long: head.name().unwrap_or("HEAD").to_string(),
            sha,
            fixed: false,
        })
    }

    /// Resolve any revision spec (ref name, short name, or sha).
    pub fn rev(&self, spec: &str) -> Result<Rev, GitError> {
        match self.repo.revparse_ext(spec) {
            Ok((object, Some(reference))) => {
                let sha = object.peel(git2::ObjectType::Commit)?.id().to_string();
                Ok(Rev {
                    short: reference.shorthand().unwrap_or(spec).to_string(),
                    long: reference.name().unwrap_or(spec).to_string(),
                    sha,
                    fixed: false,
                })
            }
            Ok((object, None)) => {
                let sha = object.peel(git2::ObjectType::Commit)?.id().to_string();
                Ok(Rev::fixed(sha))
            }
            Err(_) => Err(GitError::UnknownRevision {
                spec: spec.to_string(),
            }),
        }
    }

    /// The commit sha a spec resolves to.
    pub fn sha(&self, spec: &str) -> Result<String, GitError> {
        Ok(self.rev(spec)?.sha().to_string())
    }

    /// Whether a spec resolves at all (named ref or fixed revision).
    pub fn ref_exists(&self, spec: &str) -> bool {
        self.rev(spec).is_ok()
    }

    /// Whether a spec resolves through an actual named ref.
    pub fn named_ref_exists(&self, spec: &str) -> bool {
        matches!(self.repo.revparse_ext(spec), Ok((_, Some(_))))
    }

    /// Whether a spec is a fixed content address: it resolves, but not
    /// through any named ref.
    pub fn is_fixed_revision(&self, spec: &str) -> bool {
        matches!(self.repo.revparse_ext(spec), Ok((_, None)))
    }

    // =========================================================================
    // Refs
    // =========================================================================

    /// Point `name` (a fully-qualified ref) at whatever `target`
    /// resolves to, creating or moving it.
    pub fn update_ref(&self, name: &str, target: &str) -> Result<(), GitError> {
        if !name.starts_with("refs/") {
            return Err(GitError::InvalidRefName {
                message: format!("{} is not fully qualified", name),
            });
        }
        let oid = self
            .repo
            .revparse_single(target)
            .map_err(|_| GitError::UnknownRevision {
                spec: target.to_string(),
            })?
            .peel(git2::ObjectType::Commit)?
            .id();
        self.repo.reference(name, oid, true, "rug: update-ref")?;
        Ok(())
    }

    /// Delete a fully-qualified ref.
    pub fn delete_ref(&self, name: &str) -> Result<(), GitError> {
        let mut reference =
            self.repo
                .find_reference(name)
                .map_err(|_| GitError::RefNotFound {
                    refname: name.to_string(),
                })?;
        reference.delete()?;
        Ok(())
    }

    /// Create (or force-move) a local branch at `target`.
    pub fn branch_create(&self, name: &str, target: Option<&str>) -> Result<(), GitError> {
        let spec = target.unwrap_or("HEAD");
        let commit = self
            .repo
            .revparse_single(spec)
            .map_err(|_| GitError::UnknownRevision {
                spec: spec.to_string(),
            })?
            .peel_to_commit()?;
        self.repo.branch(name, &commit, false)?;
        Ok(())
    }

    /// Delete a local branch.
    pub fn branch_delete(&self, name: &str) -> Result<(), GitError> {
        let mut branch = self
            .repo
            .find_branch(name, git2::BranchType::Local)
            .map_err(|_| GitError::RefNotFound {
                refname: name.to_string(),
            })?;
        branch.delete()?;
        Ok(())
    }

    /// List local branch names.
    pub fn branch_list(&self) -> Result<Vec<String>, GitError> {
        let mut names = Vec::new();
        for item in self.repo.branches(Some(git2::BranchType::Local))? {
            let (branch, _) = item?;
            if let Some(name) = branch.name()? {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    /// The symbolic target of `refs/remotes/<remote>/HEAD`, as a short
    /// branch name.
    pub fn default_remote_branch(&self, remote: &str) -> Result<String, GitError> {
        let name = format!("refs/remotes/{}/HEAD", remote);
        let reference = self
            .repo
            .find_reference(&name)
            .map_err(|_| GitError::RefNotFound {
                refname: name.clone(),
            })?;
        let target = reference
            .symbolic_target()
            .ok_or_else(|| GitError::RefNotFound {
                refname: name.clone(),
            })?;
        let prefix = format!("refs/remotes/{}/", remote);
        Ok(target
            .strip_prefix(&prefix)
            .unwrap_or(target)
            .to_string())
    }

    // =========================================================================
    // Remotes
    // =========================================================================

    /// List configured remote names.
    pub fn remote_list(&self) -> Result<Vec<String>, GitError> {
        let remotes = self.repo.remotes()?;
        Ok(remotes.iter().flatten().map(str::to_string).collect())
    }

    /// Add a remote.
    pub fn remote_add(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.repo.remote(name, url)?;
        Ok(())
    }

    /// Change a remote's fetch URL.
    pub fn remote_set_url(&self, name: &str, url: &str) -> Result<(), GitError> {
        self.repo.remote_set_url(name, url)?;
        Ok(())
    }

    /// Update `refs/remotes/<remote>/HEAD` from the remote.
    ///
    /// `git remote set-head -a` refuses when several remote branches sit
    /// at the remote HEAD sha; when a `fallback` branch is configured it
    /// is then set explicitly instead of guessing.
    pub fn remote_set_head(&self, remote: &str, fallback: Option<&str>) -> Result<(), GitError> {
        let (ok, output) = self.try_run(&["remote", "set-head", remote, "-a"])?;
        if ok {
            return Ok(());
        }
        if let Some(branch) = fallback {
            debug!(remote, branch, "remote HEAD ambiguous, using fallback");
            self.run(&["remote", "set-head", remote, branch])?;
            return Ok(());
        }
        Err(GitError::CommandFailed {
            command: format!("git remote set-head {} -a", remote),
            output,
        })
    }

    /// Fetch from a remote (or the default remote when `None`).
    pub fn fetch(&self, remote: Option<&str>) -> Result<(), GitError> {
        let mut args = vec!["fetch", "-v"];
        if let Some(remote) = remote {
            args.push(remote);
        }
        self.run(&args)?;
        Ok(())
    }

    /// Push `refspec` to `remote`.
    pub fn push(&self, remote: &str, refspec: &str, force: bool) -> Result<(), GitError> {
        let mut args = vec!["push"];
        if force {
            args.push("-f");
        }
        args.push(remote);
        args.push(refspec);
        self.run(&args)?;
        Ok(())
    }

    /// Dry-run push: report whether the real push would be accepted,
    /// with the tool output, mutating nothing.
    pub fn test_push(&self, remote: &str, refspec: &str, force: bool) -> (bool, String) {
        let mut args = vec!["push", "-n"];
        if force {
            args.push("-f");
        }
        args.push(remote);
        args.push(refspec);
        match self.try_run(&args) {
            Ok((ok, output)) => (ok, output),
            Err(e) => (false, e.to_string()),
        }
    }

    // =========================================================================
    // Worktree
    // =========================================================================

    /// Check out a branch short name or fixed revision.
    pub fn checkout(&self, refname: &str, force: bool) -> Result<(), GitError> {
        let mut args = vec!["checkout"];
        if force {
            args.push("-f");
        }
        args.push(refname);
        self.run(&args)?;
        Ok(())
    }

    /// Stage paths.
    pub fn add(&self, paths: &[&str]) -> Result<(), GitError> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.run(&args)?;
        Ok(())
    }

    /// Commit; with `all`, stage tracked modifications first.
    pub fn commit(&self, message: &str, all: bool) -> Result<(), GitError> {
        let mut args = vec!["commit"];
        if all {
            args.push("-a");
        }
        args.push("-m");
        args.push(message);
        self.run(&args)?;
        Ok(())
    }

    /// Merge `target` into the current branch.
    pub fn merge(&self, target: &str) -> Result<RebaseOutcome, GitError> {
        let (success, output) = self.try_run(&["merge", target])?;
        Ok(RebaseOutcome { success, output })
    }

    /// Rebase commits since `base` (onto `onto` when given).
    ///
    /// On conflict the repository is left in git's native mid-rebase
    /// state; the caller decides what to report.
    pub fn rebase(&self, base: &str, onto: Option<&str>) -> Result<RebaseOutcome, GitError> {
        let mut args = vec!["rebase"];
        if let Some(onto) = onto {
            args.push("--onto");
            args.push(onto);
        }
        args.push(base);
        let (success, output) = self.try_run(&args)?;
        Ok(RebaseOutcome { success, output })
    }

    /// Per-file status, porcelain or long form.
    pub fn status(&self, porcelain: bool) -> Result<String, GitError> {
        if porcelain {
            self.run(&["status", "--porcelain"])
        } else {
            self.run(&["status"])
        }
    }

    /// Unified diff of the working tree.
    pub fn diff(&self) -> Result<String, GitError> {
        self.run(&["diff"])
    }

    /// Stash local modifications, including untracked files.
    pub fn stash(&self) -> Result<(), GitError> {
        self.run(&["stash", "--include-untracked"])?;
        Ok(())
    }

    /// Re-apply and drop the most recent stash.
    pub fn stash_pop(&self) -> Result<(), GitError> {
        self.run(&["stash", "pop"])?;
        Ok(())
    }

    /// Whether a commit -a would record anything: staged or unstaged
    /// changes to tracked files. Untracked files do not count.
    pub fn is_dirty(&self) -> Result<bool, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(false).include_ignored(false);
        let statuses = self.repo.statuses(Some(&mut opts))?;
        Ok(!statuses.is_empty())
    }

    // =========================================================================
    // Ancestry
    // =========================================================================

    /// Whether `a` is `b` or a descendant of `b`.
    pub fn is_descendant(&self, a: &str, b: &str) -> Result<bool, GitError> {
        let a = git2::Oid::from_str(&self.sha(a)?)?;
        let b = git2::Oid::from_str(&self.sha(b)?)?;
        if a == b {
            return Ok(true);
        }
        Ok(self.repo.graph_descendant_of(a, b)?)
    }

    /// Whether `from` can fast-forward to `to` (`from` is an ancestor
    /// of `to`).
    pub fn can_fast_forward(&self, from: &str, to: &str) -> Result<bool, GitError> {
        let from = git2::Oid::from_str(&self.sha(from)?)?;
        let to = git2::Oid::from_str(&self.sha(to)?)?;
        Ok(self.repo.merge_base(from, to)? == from)
    }

    // =========================================================================
    // Config, blobs, ignores
    // =========================================================================

    /// Read a config key, `None` when unset.
    pub fn config_get(&self, key: &str) -> Result<Option<String>, GitError> {
        let config = self.repo.config()?;
        match config.get_string(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a config key.
    pub fn config_set(&self, key: &str, value: &str) -> Result<(), GitError> {
        let mut config = self.repo.config()?;
        config.set_str(key, value)?;
        Ok(())
    }

    /// Read a blob by revision-and-path spec, e.g. `HEAD:manifest.xml`.
    pub fn show_blob(&self, spec: &str) -> Result<String, GitError> {
        let object = self
            .repo
            .revparse_single(spec)
            .map_err(|_| GitError::UnknownRevision {
                spec: spec.to_string(),
            })?;
        let blob = object.peel(git2::ObjectType::Blob)?;
        let blob = blob.as_blob().ok_or_else(|| GitError::UnknownRevision {
            spec: spec.to_string(),
        })?;
        String::from_utf8(blob.content().to_vec()).map_err(|_| GitError::NotUtf8 {
            what: spec.to_string(),
        })
    }

    /// Add an ignore pattern to `.git/info/exclude`.
    ///
    /// Exclude rules live outside the working tree, so ignoring a
    /// nested entry never dirties the outer repository.
    pub fn add_ignore(&self, pattern: &str) -> Result<(), GitError> {
        let info = self.repo.path().join("info");
        fs::create_dir_all(&info).map_err(|e| GitError::Internal {
            message: format!("create {}: {}", info.display(), e),
        })?;
        let path = info.join("exclude");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| GitError::Internal {
                message: format!("open {}: {}", path.display(), e),
            })?;
        writeln!(file, "/{}", pattern.trim_start_matches('/')).map_err(|e| GitError::Internal {
            message: format!("write {}: {}", path.display(), e),
        })?;
        Ok(())
    }
}
