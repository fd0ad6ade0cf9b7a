//! vcs
//!
//! The capability interface between the project core and whatever
//! version control system governs an entry.
//!
//! [`RepoHandle`] is everything RepoWrapper and Project are allowed to
//! ask of a repository. [`VcsAdapter`] knows how to detect, open, and
//! clone repositories of one kind, and adapters live in a
//! [`VcsRegistry`] that is constructed once at the process entry point
//! and threaded explicitly through Project construction. Nothing here
//! is process-global, so tests can run against a registry of fakes.
//!
//! Two kinds ship: `git` (thin forwarding to [`Git`]) and `rug` — a
//! nested project, which makes the whole structure recursively
//! self-similar. The nested adapter resolves ref-level questions
//! against the child project's manifest repository and maps
//! working-tree operations onto whole-project operations.

use std::path::Path;
use std::sync::Arc;

use crate::error::{Result, RugError};
use crate::git::{Git, RebaseOutcome, Rev};
use crate::output::Output;
use crate::project::Project;

/// What the project core may ask of one repository.
pub trait RepoHandle {
    fn head(&self) -> Result<Rev>;
    fn rev(&self, spec: &str) -> Result<Rev>;
    fn sha(&self, spec: &str) -> Result<String>;
    fn ref_exists(&self, spec: &str) -> bool;
    fn named_ref_exists(&self, spec: &str) -> bool;
    fn is_fixed_revision(&self, spec: &str) -> bool;
    fn update_ref(&self, name: &str, target: &str) -> Result<()>;
    fn delete_ref(&self, name: &str) -> Result<()>;
    fn checkout(&self, refname: &str, force: bool) -> Result<()>;
    fn fetch(&self, remote: Option<&str>) -> Result<()>;
    fn remote_list(&self) -> Result<Vec<String>>;
    fn remote_add(&self, name: &str, url: &str) -> Result<()>;
    fn remote_set_url(&self, name: &str, url: &str) -> Result<()>;
    fn remote_set_head(&self, remote: &str, fallback: Option<&str>) -> Result<()>;
    fn default_remote_branch(&self, remote: &str) -> Result<String>;
    fn commit(&self, message: &str, all: bool) -> Result<()>;
    fn merge(&self, target: &str) -> Result<RebaseOutcome>;
    fn rebase(&self, base: &str, onto: Option<&str>) -> Result<RebaseOutcome>;
    fn push(&self, remote: &str, refspec: &str, force: bool) -> Result<()>;
    fn test_push(&self, remote: &str, refspec: &str, force: bool) -> (bool, String);
    fn status(&self, porcelain: bool) -> Result<String>;
    fn is_dirty(&self) -> Result<bool>;
    fn is_descendant(&self, a: &str, b: &str) -> Result<bool>;
    fn can_fast_forward(&self, from: &str, to: &str) -> Result<bool>;
    fn config_get(&self, key: &str) -> Result<Option<String>>;
    fn add_ignore(&self, pattern: &str) -> Result<()>;

    /// Whether this handle is a nested project.
    fn is_nested(&self) -> bool {
        false
    }

    /// Run the nested project's own update. Only nested handles
    /// support this.
    fn update_nested(&self, _recursive: bool) -> Result<()> {
        Err(RugError::unsupported("not a nested project"))
    }
}

/// Context adapters need when opening or cloning: the registry itself
/// (nested projects construct their own children from it), the output
/// sink, and the configured default-branch fallback.
#[derive(Clone)]
pub struct AdapterContext {
    pub registry: Arc<VcsRegistry>,
    pub output: Output,
    pub default_branch: Option<String>,
}

/// Detection, opening, and cloning for one vcs kind.
pub trait VcsAdapter: Send + Sync {
    /// The manifest `vcs` attribute value this adapter serves.
    fn kind(&self) -> &'static str;

    /// Whether `path` is the root of a repository of this kind.
    fn is_repo(&self, path: &Path) -> bool;

    /// Whether `url` looks like a reachable repository of this kind.
    fn url_ok(&self, url: &str) -> bool;

    /// Candidate clone/fetch URLs derived from the manifest URL, in
    /// preference order. First match wins.
    fn candidate_urls(&self, base: &str) -> Vec<String> {
        vec![base.to_string()]
    }

    fn open(&self, path: &Path, ctx: &AdapterContext) -> Result<Box<dyn RepoHandle>>;

    fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        remote: &str,
        revision: Option<&str>,
        ctx: &AdapterContext,
    ) -> Result<Box<dyn RepoHandle>>;
}

/// Explicit adapter registry, dependency-injected into Project.
pub struct VcsRegistry {
    adapters: Vec<Arc<dyn VcsAdapter>>,
}

impl VcsRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            adapters: Vec::new(),
        }
    }

    /// The standard registry: `git` and nested `rug` projects.
    pub fn standard() -> Arc<Self> {
        let mut registry = Self::new();
        registry.register(Arc::new(GitAdapter));
        registry.register(Arc::new(ProjectAdapter));
        Arc::new(registry)
    }

    /// Register an adapter. Registration order is detection order.
    pub fn register(&mut self, adapter: Arc<dyn VcsAdapter>) {
        self.adapters.push(adapter);
    }

    /// Look up an adapter by manifest `vcs` kind.
    pub fn get(&self, kind: &str) -> Result<Arc<dyn VcsAdapter>> {
        self.adapters
            .iter()
            .find(|a| a.kind() == kind)
            .cloned()
            .ok_or_else(|| RugError::unsupported(format!("unknown vcs kind: {}", kind)))
    }

    /// Find the first adapter claiming `path` as a repository root.
    pub fn detect(&self, path: &Path) -> Option<Arc<dyn VcsAdapter>> {
        self.adapters.iter().find(|a| a.is_repo(path)).cloned()
    }
}

impl Default for VcsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// git adapter
// =============================================================================

/// Adapter for plain git repositories.
pub struct GitAdapter;

impl VcsAdapter for GitAdapter {
    fn kind(&self) -> &'static str {
        "git"
    }

    fn is_repo(&self, path: &Path) -> bool {
        Git::is_repo(path)
    }

    fn url_ok(&self, url: &str) -> bool {
        Git::ls_remote_ok(url)
    }

    fn open(&self, path: &Path, _ctx: &AdapterContext) -> Result<Box<dyn RepoHandle>> {
        Ok(Box::new(Git::open(path)?))
    }

    fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        remote: &str,
        revision: Option<&str>,
        ctx: &AdapterContext,
    ) -> Result<Box<dyn RepoHandle>> {
        let git = Git::clone(url, path, remote, revision, ctx.default_branch.as_deref())?;
        Ok(Box::new(git))
    }
}

impl RepoHandle for Git {
    fn head(&self) -> Result<Rev> {
        Ok(Git::head(self)?)
    }

    fn rev(&self, spec: &str) -> Result<Rev> {
        Ok(Git::rev(self, spec)?)
    }

    fn sha(&self, spec: &str) -> Result<String> {
        Ok(Git::sha(self, spec)?)
    }

    fn ref_exists(&self, spec: &str) -> bool {
        Git::ref_exists(self, spec)
    }

    fn named_ref_exists(&self, spec: &str) -> bool {
        Git::named_ref_exists(self, spec)
    }

    fn is_fixed_revision(&self, spec: &str) -> bool {
        Git::is_fixed_revision(self, spec)
    }

    fn update_ref(&self, name: &str, target: &str) -> Result<()> {
        Ok(Git::update_ref(self, name, target)?)
    }

    fn delete_ref(&self, name: &str) -> Result<()> {
        Ok(Git::delete_ref(self, name)?)
    }

    fn checkout(&self, refname: &str, force: bool) -> Result<()> {
        Ok(Git::checkout(self, refname, force)?)
    }

    fn fetch(&self, remote: Option<&str>) -> Result<()> {
        Ok(Git::fetch(self, remote)?)
    }

    fn remote_list(&self) -> Result<Vec<String>> {
        Ok(Git::remote_list(self)?)
    }

    fn remote_add(&self, name: &str, url: &str) -> Result<()> {
        Ok(Git::remote_add(self, name, url)?)
    }

    fn remote_set_url(&self, name: &str, url: &str) -> Result<()> {
        Ok(Git::remote_set_url(self, name, url)?)
    }

    fn remote_set_head(&self, remote: &str, fallback: Option<&str>) -> Result<()> {
        Ok(Git::remote_set_head(self, remote, fallback)?)
    }

    fn default_remote_branch(&self, remote: &str) -> Result<String> {
        Ok(Git::default_remote_branch(self, remote)?)
    }

    fn commit(&self, message: &str, all: bool) -> Result<()> {
        Ok(Git::commit(self, message, all)?)
    }

    fn merge(&self, target: &str) -> Result<RebaseOutcome> {
        Ok(Git::merge(self, target)?)
    }

    fn rebase(&self, base: &str, onto: Option<&str>) -> Result<RebaseOutcome> {
        Ok(Git::rebase(self, base, onto)?)
    }

    fn push(&self, remote: &str, refspec: &str, force: bool) -> Result<()> {
        Ok(Git::push(self, remote, refspec, force)?)
    }

    fn test_push(&self, remote: &str, refspec: &str, force: bool) -> (bool, String) {
        Git::test_push(self, remote, refspec, force)
    }

    fn status(&self, porcelain: bool) -> Result<String> {
        Ok(Git::status(self, porcelain)?)
    }

    fn is_dirty(&self) -> Result<bool> {
        Ok(Git::is_dirty(self)?)
    }

    fn is_descendant(&self, a: &str, b: &str) -> Result<bool> {
        Ok(Git::is_descendant(self, a, b)?)
    }

    fn can_fast_forward(&self, from: &str, to: &str) -> Result<bool> {
        Ok(Git::can_fast_forward(self, from, to)?)
    }

    fn config_get(&self, key: &str) -> Result<Option<String>> {
        Ok(Git::config_get(self, key)?)
    }

    fn add_ignore(&self, pattern: &str) -> Result<()> {
        Ok(Git::add_ignore(self, pattern)?)
    }
}

// =============================================================================
// nested project adapter
// =============================================================================

/// Adapter for entries whose vcs kind is a nested rug project.
pub struct ProjectAdapter;

impl VcsAdapter for ProjectAdapter {
    fn kind(&self) -> &'static str {
        "rug"
    }

    fn is_repo(&self, path: &Path) -> bool {
        Project::valid_project(path)
    }

    fn url_ok(&self, url: &str) -> bool {
        Git::ls_remote_ok(url)
    }

    /// A published rug project may expose its manifest repository at
    /// the base URL itself, under the reserved directory, or as a bare
    /// sibling. First reachable candidate wins.
    fn candidate_urls(&self, base: &str) -> Vec<String> {
        vec![
            base.to_string(),
            format!("{}/.rug/manifest", base),
            format!("{}/manifest", base),
        ]
    }

    fn open(&self, path: &Path, ctx: &AdapterContext) -> Result<Box<dyn RepoHandle>> {
        let project = Project::open(path, Arc::clone(&ctx.registry), ctx.output.clone())?;
        Ok(Box::new(ProjectHandle { project }))
    }

    fn clone_repo(
        &self,
        url: &str,
        path: &Path,
        remote: &str,
        revision: Option<&str>,
        ctx: &AdapterContext,
    ) -> Result<Box<dyn RepoHandle>> {
        let url = self
            .candidate_urls(url)
            .into_iter()
            .find(|candidate| self.url_ok(candidate))
            .ok_or_else(|| {
                RugError::unsupported(format!("{} does not look like a rug project", url))
            })?;
        let project = Project::clone(
            &url,
            path,
            Some(remote),
            revision,
            false,
            Arc::clone(&ctx.registry),
            ctx.output.clone(),
        )?;
        Ok(Box::new(ProjectHandle { project }))
    }
}

/// A nested project seen through the repository capability interface.
///
/// Revision-level questions (head, refs, ancestry inputs) are answered
/// by the child's manifest repository: the manifest revision *is* the
/// nested project's version. Working-tree operations map onto whole-
/// project operations.
pub struct ProjectHandle {
    project: Project,
}

impl RepoHandle for ProjectHandle {
    fn head(&self) -> Result<Rev> {
        Ok(self.project.manifest_repo().head()?)
    }

    fn rev(&self, spec: &str) -> Result<Rev> {
        Ok(self.project.manifest_repo().rev(spec)?)
    }

    fn sha(&self, spec: &str) -> Result<String> {
        Ok(self.project.manifest_repo().sha(spec)?)
    }

    fn ref_exists(&self, spec: &str) -> bool {
        self.project.manifest_repo().ref_exists(spec)
    }

    fn named_ref_exists(&self, spec: &str) -> bool {
        self.project.manifest_repo().named_ref_exists(spec)
    }

    fn is_fixed_revision(&self, spec: &str) -> bool {
        self.project.manifest_repo().is_fixed_revision(spec)
    }

    fn update_ref(&self, name: &str, target: &str) -> Result<()> {
        Ok(self.project.manifest_repo().update_ref(name, target)?)
    }

    fn delete_ref(&self, name: &str) -> Result<()> {
        Ok(self.project.manifest_repo().delete_ref(name)?)
    }

    fn checkout(&self, refname: &str, _force: bool) -> Result<()> {
        self.project.checkout(Some(refname))
    }

    fn fetch(&self, _remote: Option<&str>) -> Result<()> {
        self.project.fetch()
    }

    fn remote_list(&self) -> Result<Vec<String>> {
        Ok(self.project.manifest_repo().remote_list()?)
    }

    fn remote_add(&self, name: &str, url: &str) -> Result<()> {
        Ok(self.project.manifest_repo().remote_add(name, url)?)
    }

    fn remote_set_url(&self, name: &str, url: &str) -> Result<()> {
        Ok(self.project.manifest_repo().remote_set_url(name, url)?)
    }

    fn remote_set_head(&self, remote: &str, fallback: Option<&str>) -> Result<()> {
        Ok(self
            .project
            .manifest_repo()
            .remote_set_head(remote, fallback)?)
    }

    fn default_remote_branch(&self, remote: &str) -> Result<String> {
        Ok(self.project.manifest_repo().default_remote_branch(remote)?)
    }

    fn commit(&self, message: &str, all: bool) -> Result<()> {
        self.project.commit(Some(message), all, true)
    }

    fn merge(&self, _target: &str) -> Result<RebaseOutcome> {
        Err(RugError::unsupported("merge of a nested project"))
    }

    fn rebase(&self, _base: &str, _onto: Option<&str>) -> Result<RebaseOutcome> {
        Err(RugError::unsupported("rebase of a nested project"))
    }

    fn push(&self, remote: &str, _refspec: &str, _force: bool) -> Result<()> {
        self.project.publish(Some(remote), false).map(|_| ())
    }

    fn test_push(&self, remote: &str, _refspec: &str, _force: bool) -> (bool, String) {
        match self.project.publish(Some(remote), true) {
            Ok(ok) => (ok, String::new()),
            Err(e) => (false, e.to_string()),
        }
    }

    fn status(&self, porcelain: bool) -> Result<String> {
        self.project.status(porcelain)
    }

    fn is_dirty(&self) -> Result<bool> {
        self.project.is_dirty()
    }

    fn is_descendant(&self, a: &str, b: &str) -> Result<bool> {
        Ok(self.project.manifest_repo().is_descendant(a, b)?)
    }

    fn can_fast_forward(&self, from: &str, to: &str) -> Result<bool> {
        Ok(self.project.manifest_repo().can_fast_forward(from, to)?)
    }

    fn config_get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.project.manifest_repo().config_get(key)?)
    }

    fn add_ignore(&self, _pattern: &str) -> Result<()> {
        // The nested project manages its own entries' ignore rules
        // during its own checkout.
        Ok(())
    }

    fn is_nested(&self) -> bool {
        true
    }

    fn update_nested(&self, recursive: bool) -> Result<()> {
        self.project.update(recursive)
    }
}
