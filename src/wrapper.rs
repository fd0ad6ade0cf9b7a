//! wrapper
//!
//! One manifest entry bound to (or waiting to become) a working
//! repository.
//!
//! [`RepoWrapper`] owns everything rug knows about a single entry: the
//! merged manifest attributes, the absolute working directory, the
//! adapter for its vcs kind, the entries nested beneath it, and the
//! open [`RepoHandle`] once the directory exists. The update decision
//! tree lives here as [`reconcile_repo`], written against the handle
//! trait so the whole table is unit-testable with a scripted fake.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, RugError};
use crate::manifest::Entry;
use crate::naming::{self, BranchSet};
use crate::output::Output;
use crate::vcs::{AdapterContext, RepoHandle, VcsAdapter};

/// What `update` decided for one entry.
///
/// Only structural problems are errors; every branch of the decision
/// tree is a reportable outcome so the remaining entries proceed.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The remote has no ref for this revision yet.
    NoRemote,
    /// Local head is exactly the remote target.
    UpToDate,
    /// Local head is strictly ahead of the remote target.
    Ahead,
    /// Local head was behind and was fast-forwarded.
    FastForwarded,
    /// Local work was replayed onto the remote target.
    Rebased,
    /// Merge or rebase stopped on conflicts; raw tool output attached.
    RebaseConflict(String),
    /// Histories diverged and no bookmark records a safe base.
    NoBookmark,
    /// The checked-out branch is not the entry's recorded revision.
    ChangedBranch,
    /// Diverged in a way the tree does not recognize.
    Anomalous,
}

impl ReconcileOutcome {
    /// One report line, suitable for per-entry output.
    pub fn describe(&self) -> String {
        match self {
            ReconcileOutcome::NoRemote => "remote has no ref for this revision, skipping".into(),
            ReconcileOutcome::UpToDate => "up to date".into(),
            ReconcileOutcome::Ahead => "ahead of remote".into(),
            ReconcileOutcome::FastForwarded => "fast-forwarded to remote".into(),
            ReconcileOutcome::Rebased => "rebased onto remote".into(),
            ReconcileOutcome::RebaseConflict(output) => {
                format!("conflicts while reconciling, resolve manually:\n{}", output)
            }
            ReconcileOutcome::NoBookmark => "diverged with no bookmark, skipping".into(),
            ReconcileOutcome::ChangedBranch => "changed branches, skipping".into(),
            ReconcileOutcome::Anomalous => "diverged unexpectedly, skipping".into(),
        }
    }
}

/// The update decision tree, evaluated against one repository.
///
/// The caller guarantees the working tree is clean. Order matters:
/// cheap exact checks first, then the two safe automatic moves, then
/// the explanations for why nothing was done.
pub fn reconcile_repo(repo: &dyn RepoHandle, branches: &BranchSet) -> Result<ReconcileOutcome> {
    if !repo.ref_exists(&branches.remote_target) {
        return Ok(ReconcileOutcome::NoRemote);
    }
    let head = repo.head()?;
    let target = repo.sha(&branches.remote_target)?;

    if head.sha() == target {
        return Ok(ReconcileOutcome::UpToDate);
    }
    if repo.is_descendant(head.sha(), &target)? {
        return Ok(ReconcileOutcome::Ahead);
    }
    if repo.can_fast_forward(head.sha(), &target)? {
        let outcome = repo.merge(&branches.remote_target)?;
        if !outcome.success {
            return Ok(ReconcileOutcome::RebaseConflict(outcome.output));
        }
        repo.update_ref(&branches.bookmark_index, &branches.remote_target)?;
        return Ok(ReconcileOutcome::FastForwarded);
    }

    // Histories diverged. A pending bookmark move supersedes the
    // committed bookmark as the replay base.
    let bookmark = if repo.named_ref_exists(&branches.bookmark_index) {
        branches.bookmark_index.as_str()
    } else {
        branches.bookmark.as_str()
    };
    if !repo.named_ref_exists(bookmark) {
        return Ok(ReconcileOutcome::NoBookmark);
    }
    if repo.is_descendant(head.sha(), bookmark)? {
        let outcome = repo.rebase(bookmark, Some(&branches.remote_target))?;
        if !outcome.success {
            return Ok(ReconcileOutcome::RebaseConflict(outcome.output));
        }
        repo.update_ref(&branches.bookmark_index, &branches.remote_target)?;
        return Ok(ReconcileOutcome::Rebased);
    }
    if !branches.fixed && head.short_name() != branches.live {
        return Ok(ReconcileOutcome::ChangedBranch);
    }
    Ok(ReconcileOutcome::Anomalous)
}

/// Whether a revision string is a full content address, usable before
/// the object exists locally.
fn looks_fixed(revision: &str) -> bool {
    revision.len() == 40 && revision.chars().all(|c| c.is_ascii_hexdigit())
}

/// One manifest entry and its working repository.
pub struct RepoWrapper {
    entry: Entry,
    revset: String,
    abs_path: PathBuf,
    /// Resolved clone/fetch URL, when name and remote are both known.
    url: Option<String>,
    /// Paths of other entries nested beneath this one, relative to it.
    nested: Vec<String>,
    adapter: Arc<dyn VcsAdapter>,
    ctx: AdapterContext,
    output: Output,
    repo: Option<Box<dyn RepoHandle>>,
}

impl RepoWrapper {
    /// Build the wrapper for one merged entry. Opens the repository if
    /// the working directory already is one; otherwise the entry stays
    /// unbound until [`checkout`](Self::checkout) clones it.
    pub fn new(
        entry: Entry,
        revset: &str,
        project_dir: &Path,
        url: Option<String>,
        nested: Vec<String>,
        ctx: AdapterContext,
    ) -> Result<Self> {
        let adapter = ctx.registry.get(&entry.vcs)?;
        let mut abs_path = project_dir.to_path_buf();
        for segment in entry.path.split('/') {
            if !segment.is_empty() && segment != "." {
                abs_path.push(segment);
            }
        }
        let output = ctx.output.spawn(&format!("{}: ", entry.path));
        // Handles opened for this entry report under the entry prefix.
        let ctx = AdapterContext {
            registry: Arc::clone(&ctx.registry),
            output: output.clone(),
            default_branch: ctx.default_branch.clone(),
        };
        let repo = if adapter.is_repo(&abs_path) {
            Some(adapter.open(&abs_path, &ctx)?)
        } else {
            None
        };
        Ok(Self {
            entry,
            revset: revset.to_string(),
            abs_path,
            url,
            nested,
            adapter,
            ctx,
            output,
            repo,
        })
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn path(&self) -> &str {
        &self.entry.path
    }

    pub fn abs_path(&self) -> &Path {
        &self.abs_path
    }

    /// Whether the working directory exists as a repository.
    pub fn is_bound(&self) -> bool {
        self.repo.is_some()
    }

    pub fn output(&self) -> &Output {
        &self.output
    }

    /// The open repository handle; unbound entries have none.
    pub fn repo(&self) -> Result<&dyn RepoHandle> {
        self.repo
            .as_deref()
            .ok_or_else(|| RugError::MissingAttribute {
                message: format!("{} is not checked out", self.entry.path),
            })
    }

    fn remote_name(&self) -> Result<&str> {
        self.entry
            .remote
            .as_deref()
            .ok_or_else(|| RugError::MissingAttribute {
                message: format!("no remote for {}", self.entry.path),
            })
    }

    /// The entry's revision with `HEAD` resolved to the remote's
    /// default branch.
    fn resolved_revision(&self) -> Result<String> {
        if self.entry.revision == "HEAD" {
            let repo = self.repo()?;
            return repo.default_remote_branch(self.remote_name()?);
        }
        Ok(self.entry.revision.clone())
    }

    /// The ref names rug owns in this entry for the current revset.
    pub fn branch_set(&self) -> Result<BranchSet> {
        let revision = self.resolved_revision()?;
        let fixed = looks_fixed(&revision)
            || self
                .repo
                .as_deref()
                .map(|r| r.is_fixed_revision(&revision))
                .unwrap_or(false);
        Ok(naming::branch_set(
            &self.revset,
            self.remote_name()?,
            &revision,
            fixed,
        ))
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Bind this entry to the current revset: clone if the directory is
    /// not a repository yet, otherwise verify the remote, fetch, and
    /// move the managed refs over.
    pub fn checkout(&mut self) -> Result<()> {
        if self.repo.is_none() {
            self.clone_repo()?;
            self.output.append("cloned");
        } else {
            self.bind()?;
            self.output.append("checked out");
        }
        Ok(())
    }

    fn clone_repo(&mut self) -> Result<()> {
        let url = self.url.clone().ok_or_else(|| RugError::MissingAttribute {
            message: format!("no remote url for {}", self.entry.path),
        })?;
        let remote = self.remote_name()?.to_string();
        let revision = if self.entry.revision == "HEAD" {
            None
        } else {
            Some(self.entry.revision.as_str())
        };
        let repo = self
            .adapter
            .clone_repo(&url, &self.abs_path, &remote, revision, &self.ctx)?;

        // The project root entry must not track the reserved directory,
        // and no entry may track the entries nested inside it.
        if self.entry.path == "." || self.entry.path.is_empty() {
            repo.add_ignore(".rug")?;
        }
        for nested in &self.nested {
            repo.add_ignore(nested)?;
        }
        self.repo = Some(repo);

        let branches = self.branch_set()?;
        let repo = self.repo()?;
        repo.update_ref(&branches.canonical, &branches.remote_target)?;
        repo.update_ref(&branches.bookmark, &branches.remote_target)?;
        Ok(())
    }

    fn bind(&self) -> Result<()> {
        let remote = self.remote_name()?;
        let repo = self.repo()?;
        if !repo.remote_list()?.iter().any(|r| r == remote) {
            let url = self.url.clone().ok_or_else(|| RugError::MissingAttribute {
                message: format!("no remote url for {}", self.entry.path),
            })?;
            repo.remote_add(remote, &url)?;
        } else if let Some(base) = self.url.as_deref() {
            // The manifest owns the remote URL; correct drift before
            // fetching from the wrong place.
            let configured = repo.config_get(&format!("remote.{}.url", remote))?;
            let candidates = self.adapter.candidate_urls(base);
            let current_ok = configured
                .as_deref()
                .map(|url| candidates.iter().any(|c| c == url))
                .unwrap_or(false);
            if !current_ok {
                let url = candidates
                    .iter()
                    .find(|c| self.adapter.url_ok(c))
                    .cloned()
                    .unwrap_or_else(|| base.to_string());
                repo.remote_set_url(remote, &url)?;
                self.output.append("corrected remote url");
            }
        }
        self.fetch(None)?;

        let branches = self.branch_set()?;
        // Seed missing managed refs from the remote target, falling
        // back to the live branch when the remote has no ref yet.
        let seed = if repo.ref_exists(&branches.remote_target) {
            branches.remote_target.clone()
        } else if repo.ref_exists(&branches.live_ref) {
            branches.live_ref.clone()
        } else {
            return Err(RugError::UnknownRevision {
                revision: branches.live.clone(),
            });
        };
        if !repo.named_ref_exists(&branches.canonical) {
            repo.update_ref(&branches.canonical, &seed)?;
        }
        if !repo.named_ref_exists(&branches.bookmark) {
            repo.update_ref(&branches.bookmark, &seed)?;
        }
        // A revset switch abandons pending moves staged for the old one.
        for index in [&branches.canonical_index, &branches.bookmark_index] {
            if repo.named_ref_exists(index) {
                repo.delete_ref(index)?;
            }
        }
        if !branches.fixed {
            repo.update_ref(&branches.live_ref, &branches.canonical)?;
        }
        repo.checkout(&branches.live, false)?;
        Ok(())
    }

    // =========================================================================
    // Fetch, status, dirt
    // =========================================================================

    /// Fetch from the entry's remote (or an explicit other remote).
    pub fn fetch(&self, remote: Option<&str>) -> Result<()> {
        let remote = match remote {
            Some(r) => r,
            None => self.remote_name()?,
        };
        let repo = self.repo()?;
        repo.fetch(Some(remote))?;
        // Remote HEAD is informational; bare remotes often have a
        // dangling one.
        if let Err(e) = repo.remote_set_head(remote, self.ctx.default_branch.as_deref()) {
            debug!(path = %self.entry.path, error = %e, "could not refresh remote head");
        }
        Ok(())
    }

    /// Whether a commit would record anything here.
    pub fn dirty(&self) -> Result<bool> {
        match self.repo.as_deref() {
            Some(repo) => repo.is_dirty(),
            None => Ok(false),
        }
    }

    /// Status lines for this entry.
    ///
    /// Two flag columns: the first compares the working manifest entry
    /// against the committed one (`A` added, `R` revised, space for
    /// unchanged), the second describes the working repository (`D`
    /// missing on disk, `R` off the recorded revision, `B` pending
    /// unrecorded move, space otherwise). File-level changes show
    /// through the indented repository status in recursive mode.
    pub fn status(&self, committed: Option<&Entry>, recursive: bool) -> Result<Vec<String>> {
        let manifest_flag = match committed {
            None => 'A',
            Some(c)
                if c.revision != self.entry.revision
                    || c.remote != self.entry.remote
                    || c.name != self.entry.name =>
            {
                'R'
            }
            Some(_) => ' ',
        };
        let work_flag = self.work_flag()?;
        let mut lines = vec![format!("{}{} {}", manifest_flag, work_flag, self.entry.path)];

        if recursive {
            if let Some(repo) = self.repo.as_deref() {
                let inner = repo.status(true)?;
                for line in inner.lines() {
                    lines.push(format!("    {}", line));
                }
            }
        }
        Ok(lines)
    }

    fn work_flag(&self) -> Result<char> {
        let repo = match self.repo.as_deref() {
            Some(repo) => repo,
            None => return Ok('D'),
        };
        let branches = self.branch_set()?;
        let head = repo.head()?;
        if !branches.fixed && head.short_name() != branches.live {
            return Ok('R');
        }
        if repo.named_ref_exists(&branches.canonical_index) {
            return Ok('B');
        }
        if repo.named_ref_exists(&branches.canonical) && head.sha() != repo.sha(&branches.canonical)?
        {
            return Ok('B');
        }
        Ok(' ')
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Reconcile local state with the remote target.
    pub fn reconcile(&self) -> Result<ReconcileOutcome> {
        let repo = self.repo()?;
        let branches = self.branch_set()?;
        reconcile_repo(repo, &branches)
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Stage the entry's pending canonical move: point the canonical
    /// index at `target` (the live branch when `None`).
    pub fn mark_canonical_index(&self, target: Option<&str>) -> Result<()> {
        let repo = self.repo()?;
        let branches = self.branch_set()?;
        let target = match target {
            Some(t) => t.to_string(),
            None => branches.live_ref.clone(),
        };
        repo.update_ref(&branches.canonical_index, &target)?;
        Ok(())
    }

    /// Commit dirty work in this entry's tree (nested projects commit
    /// recursively through their own manifest).
    pub fn commit_tree(&self, message: &str) -> Result<bool> {
        let repo = self.repo()?;
        if !repo.is_dirty()? {
            return Ok(false);
        }
        repo.commit(message, true)?;
        Ok(true)
    }

    /// Collapse pending index refs into the durable refs. Canonical
    /// follows its index when one is staged, otherwise the live branch;
    /// the bookmark follows its index. Indices are then deleted.
    pub fn collapse_indices(&self) -> Result<()> {
        let repo = self.repo()?;
        let branches = self.branch_set()?;
        if repo.named_ref_exists(&branches.canonical_index) {
            repo.update_ref(&branches.canonical, &branches.canonical_index)?;
            repo.delete_ref(&branches.canonical_index)?;
        } else if !branches.fixed && repo.ref_exists(&branches.live_ref) {
            repo.update_ref(&branches.canonical, &branches.live_ref)?;
        }
        if repo.named_ref_exists(&branches.bookmark_index) {
            repo.update_ref(&branches.bookmark, &branches.bookmark_index)?;
            repo.delete_ref(&branches.bookmark_index)?;
        }
        Ok(())
    }

    // =========================================================================
    // Publish
    // =========================================================================

    /// Whether the canonical ref differs from what the remote has.
    pub fn should_push(&self) -> Result<bool> {
        let repo = match self.repo.as_deref() {
            Some(repo) => repo,
            None => return Ok(false),
        };
        let branches = self.branch_set()?;
        if !repo.named_ref_exists(&branches.canonical) {
            return Ok(false);
        }
        if !repo.ref_exists(&branches.remote_target) {
            return Ok(true);
        }
        Ok(repo.sha(&branches.canonical)? != repo.sha(&branches.remote_target)?)
    }

    /// Push (or dry-run push) the canonical ref to the remote.
    ///
    /// Symbolic revisions push onto the remote branch; fixed revisions
    /// ride the well-known sha-rider ref so the commit stays reachable.
    /// A real push that succeeds advances the bookmark.
    pub fn push(&self, test: bool) -> Result<(bool, String)> {
        let repo = self.repo()?;
        let remote = self.remote_name()?.to_string();
        let branches = self.branch_set()?;
        let (refspec, force) = if branches.fixed {
            (
                format!("{}:{}", branches.remote_target, naming::SHA_RIDER_REF),
                true,
            )
        } else {
            (
                format!("{}:refs/heads/{}", branches.canonical, branches.live),
                false,
            )
        };
        if test {
            return Ok(repo.test_push(&remote, &refspec, force));
        }
        repo.push(&remote, &refspec, force)?;
        repo.update_ref(&branches.bookmark, &branches.canonical)?;
        Ok((true, String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::{BTreeMap, BTreeSet};

    use crate::git::{RebaseOutcome, Rev};

    /// Scripted repository for exercising the decision tree.
    #[derive(Default)]
    struct FakeRepo {
        head: Option<Rev>,
        refs: BTreeMap<String, String>,
        /// (descendant, ancestor) sha pairs.
        descendants: BTreeSet<(String, String)>,
        /// (from, to) sha pairs where fast-forward is possible.
        fast_forwards: BTreeSet<(String, String)>,
        merge_conflicts: bool,
        rebase_conflicts: bool,
        merges: RefCell<Vec<String>>,
        rebases: RefCell<Vec<(String, String)>>,
        ref_updates: RefCell<Vec<(String, String)>>,
    }

    impl FakeRepo {
        fn on_branch(mut self, name: &str, sha: &str) -> Self {
            self.head = Some(Rev::named(
                name.to_string(),
                format!("refs/heads/{}", name),
                sha.to_string(),
            ));
            self
        }

        fn with_ref(mut self, name: &str, sha: &str) -> Self {
            self.refs.insert(name.to_string(), sha.to_string());
            self
        }

        fn descendant(mut self, child: &str, parent: &str) -> Self {
            self.descendants
                .insert((child.to_string(), parent.to_string()));
            self
        }

        fn fast_forward(mut self, from: &str, to: &str) -> Self {
            self.fast_forwards
                .insert((from.to_string(), to.to_string()));
            self
        }

        // Ref-shaped specs resolve through the ref table; anything else
        // is taken as a sha literal.
        fn resolve(&self, spec: &str) -> Option<String> {
            if let Some(sha) = self.refs.get(spec) {
                return Some(sha.clone());
            }
            if spec.contains('/') {
                return None;
            }
            Some(spec.to_string())
        }
    }

    impl RepoHandle for FakeRepo {
        fn head(&self) -> Result<Rev> {
            Ok(self.head.clone().expect("fake head unset"))
        }
        fn rev(&self, spec: &str) -> Result<Rev> {
            self.resolve(spec)
                .map(Rev::fixed)
                .ok_or_else(|| RugError::UnknownRevision {
                    revision: spec.to_string(),
                })
        }
        fn sha(&self, spec: &str) -> Result<String> {
            self.resolve(spec).ok_or_else(|| RugError::UnknownRevision {
                revision: spec.to_string(),
            })
        }
        fn ref_exists(&self, spec: &str) -> bool {
            self.resolve(spec).is_some()
        }
        fn named_ref_exists(&self, spec: &str) -> bool {
            self.refs.contains_key(spec)
        }
        fn is_fixed_revision(&self, spec: &str) -> bool {
            !self.refs.contains_key(spec) && self.resolve(spec).is_some()
        }
        fn update_ref(&self, name: &str, target: &str) -> Result<()> {
            self.ref_updates
                .borrow_mut()
                .push((name.to_string(), target.to_string()));
            Ok(())
        }
        fn delete_ref(&self, _name: &str) -> Result<()> {
            Ok(())
        }
        fn checkout(&self, _refname: &str, _force: bool) -> Result<()> {
            Ok(())
        }
        fn fetch(&self, _remote: Option<&str>) -> Result<()> {
            Ok(())
        }
        fn remote_list(&self) -> Result<Vec<String>> {
            Ok(vec!["origin".to_string()])
        }
        fn remote_add(&self, _name: &str, _url: &str) -> Result<()> {
            Ok(())
        }
        fn remote_set_url(&self, _name: &str, _url: &str) -> Result<()> {
            Ok(())
        }
        fn remote_set_head(&self, _remote: &str, _fallback: Option<&str>) -> Result<()> {
            Ok(())
        }
        fn default_remote_branch(&self, _remote: &str) -> Result<String> {
            Ok("master".to_string())
        }
        fn commit(&self, _message: &str, _all: bool) -> Result<()> {
            Ok(())
        }
        fn merge(&self, target: &str) -> Result<RebaseOutcome> {
            self.merges.borrow_mut().push(target.to_string());
            Ok(RebaseOutcome {
                success: !self.merge_conflicts,
                output: if self.merge_conflicts {
                    "CONFLICT (content): fake".to_string()
                } else {
                    String::new()
                },
            })
        }
        fn rebase(&self, base: &str, onto: Option<&str>) -> Result<RebaseOutcome> {
            self.rebases
                .borrow_mut()
                .push((base.to_string(), onto.unwrap_or("").to_string()));
            Ok(RebaseOutcome {
                success: !self.rebase_conflicts,
                output: if self.rebase_conflicts {
                    "CONFLICT (content): fake".to_string()
                } else {
                    String::new()
                },
            })
        }
        fn push(&self, _remote: &str, _refspec: &str, _force: bool) -> Result<()> {
            Ok(())
        }
        fn test_push(&self, _remote: &str, _refspec: &str, _force: bool) -> (bool, String) {
            (true, String::new())
        }
        fn status(&self, _porcelain: bool) -> Result<String> {
            Ok(String::new())
        }
        fn is_dirty(&self) -> Result<bool> {
            Ok(false)
        }
        fn config_get(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn add_ignore(&self, _pattern: &str) -> Result<()> {
            Ok(())
        }
        fn is_descendant(&self, a: &str, b: &str) -> Result<bool> {
            let a = self.sha(a)?;
            let b = self.sha(b)?;
            Ok(a == b || self.descendants.contains(&(a, b)))
        }
        fn can_fast_forward(&self, from: &str, to: &str) -> Result<bool> {
            let from = self.sha(from)?;
            let to = self.sha(to)?;
            Ok(self.fast_forwards.contains(&(from, to)))
        }
    }

    fn branches() -> BranchSet {
        naming::branch_set("main", "origin", "dev", false)
    }

    #[test]
    fn missing_remote_ref_is_skipped() {
        let repo = FakeRepo::default().on_branch("dev", "aaa");
        let outcome = reconcile_repo(&repo, &branches()).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::NoRemote));
    }

    #[test]
    fn equal_head_and_target_is_up_to_date() {
        let repo = FakeRepo::default()
            .on_branch("dev", "aaa")
            .with_ref("origin/dev", "aaa");
        let outcome = reconcile_repo(&repo, &branches()).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::UpToDate));
    }

    #[test]
    fn descendant_head_is_ahead() {
        let repo = FakeRepo::default()
            .on_branch("dev", "bbb")
            .with_ref("origin/dev", "aaa")
            .descendant("bbb", "aaa");
        let outcome = reconcile_repo(&repo, &branches()).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Ahead));
    }

    #[test]
    fn behind_head_fast_forwards_and_stages_bookmark() {
        let repo = FakeRepo::default()
            .on_branch("dev", "aaa")
            .with_ref("origin/dev", "bbb")
            .fast_forward("aaa", "bbb");
        let outcome = reconcile_repo(&repo, &branches()).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::FastForwarded));
        assert_eq!(repo.merges.borrow().as_slice(), ["origin/dev"]);
        assert_eq!(
            repo.ref_updates.borrow().as_slice(),
            [(
                "refs/rug/bookmark_index".to_string(),
                "origin/dev".to_string()
            )]
        );
    }

    #[test]
    fn merge_conflict_surfaces_tool_output() {
        let mut repo = FakeRepo::default()
            .on_branch("dev", "aaa")
            .with_ref("origin/dev", "bbb")
            .fast_forward("aaa", "bbb");
        repo.merge_conflicts = true;
        let outcome = reconcile_repo(&repo, &branches()).unwrap();
        match outcome {
            ReconcileOutcome::RebaseConflict(output) => assert!(output.contains("CONFLICT")),
            other => panic!("expected conflict, got {:?}", other),
        }
        assert!(repo.ref_updates.borrow().is_empty());
    }

    #[test]
    fn diverged_with_bookmark_rebases_onto_target() {
        let repo = FakeRepo::default()
            .on_branch("dev", "ccc")
            .with_ref("origin/dev", "bbb")
            .with_ref("refs/rug/bookmarks/main/origin/dev", "aaa")
            .descendant("ccc", "aaa");
        let outcome = reconcile_repo(&repo, &branches()).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Rebased));
        assert_eq!(
            repo.rebases.borrow().as_slice(),
            [(
                "refs/rug/bookmarks/main/origin/dev".to_string(),
                "origin/dev".to_string()
            )]
        );
        assert_eq!(
            repo.ref_updates.borrow().as_slice(),
            [(
                "refs/rug/bookmark_index".to_string(),
                "origin/dev".to_string()
            )]
        );
    }

    #[test]
    fn pending_bookmark_index_supersedes_bookmark() {
        let repo = FakeRepo::default()
            .on_branch("dev", "ccc")
            .with_ref("origin/dev", "bbb")
            .with_ref("refs/rug/bookmarks/main/origin/dev", "000")
            .with_ref("refs/rug/bookmark_index", "aaa")
            .descendant("ccc", "aaa");
        let outcome = reconcile_repo(&repo, &branches()).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Rebased));
        assert_eq!(repo.rebases.borrow()[0].0, "refs/rug/bookmark_index");
    }

    #[test]
    fn diverged_without_bookmark_is_skipped() {
        let repo = FakeRepo::default()
            .on_branch("dev", "ccc")
            .with_ref("origin/dev", "bbb");
        let outcome = reconcile_repo(&repo, &branches()).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::NoBookmark));
    }

    #[test]
    fn rebase_conflict_surfaces_tool_output() {
        let mut repo = FakeRepo::default()
            .on_branch("dev", "ccc")
            .with_ref("origin/dev", "bbb")
            .with_ref("refs/rug/bookmarks/main/origin/dev", "aaa")
            .descendant("ccc", "aaa");
        repo.rebase_conflicts = true;
        let outcome = reconcile_repo(&repo, &branches()).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::RebaseConflict(_)));
        assert!(repo.ref_updates.borrow().is_empty());
    }

    #[test]
    fn changed_branch_is_reported_when_nothing_applies() {
        let repo = FakeRepo::default()
            .on_branch("feature", "ccc")
            .with_ref("origin/dev", "bbb")
            .with_ref("refs/rug/bookmarks/main/origin/dev", "aaa");
        let outcome = reconcile_repo(&repo, &branches()).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::ChangedBranch));
    }

    #[test]
    fn unexplained_divergence_is_anomalous() {
        let repo = FakeRepo::default()
            .on_branch("dev", "ccc")
            .with_ref("origin/dev", "bbb")
            .with_ref("refs/rug/bookmarks/main/origin/dev", "aaa");
        let outcome = reconcile_repo(&repo, &branches()).unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Anomalous));
    }
}
