//! project
//!
//! The whole-project orchestrator: the manifest checkout, the entry
//! wrappers built from it, and every multi-repository operation
//! (`init`, `clone`, `checkout`, `fetch`, `update`, `status`, `add`,
//! `remove`, `commit`, `publish`, remote and source management).
//!
//! A working project keeps its manifest repository under the reserved
//! `.rug/manifest` directory next to the entry working trees; a bare
//! project is the manifest repository alone, for hosting. Working-tree
//! operations refuse to run on a bare project.
//!
//! Per-entry problems during `checkout`, `fetch`, and `update` are
//! reported as skip lines and never abort the remaining entries; only
//! structural problems (bad manifest, dirty refusal, failed manifest
//! commit, publish validation) abort the invocation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::ProjectConfig;
use crate::error::{Result, RugError};
use crate::git::Git;
use crate::hierarchy;
use crate::manifest::{self, Entry, Manifest, ManifestDefault, RawEntry, RawManifest, MANIFEST_FILE};
use crate::naming;
use crate::output::Output;
use crate::vcs::{AdapterContext, RepoHandle, VcsRegistry};
use crate::wrapper::RepoWrapper;

/// Name of the reserved directory holding the manifest repository and
/// project configuration.
pub const RUG_DIR: &str = ".rug";

/// Arguments to [`Project::add`], resolved by precedence: explicit
/// argument, then live repository state, then the existing entry.
#[derive(Debug, Default)]
pub struct AddOptions<'a> {
    pub path: &'a str,
    pub name: Option<&'a str>,
    pub remote: Option<&'a str>,
    pub revision: Option<&'a str>,
    pub vcs: Option<&'a str>,
    /// Record the resolved commit sha instead of a symbolic name.
    pub use_fixed: bool,
}

/// One rug project: a manifest checkout plus the entries it describes.
pub struct Project {
    dir: PathBuf,
    bare: bool,
    manifest_repo: Git,
    registry: Arc<VcsRegistry>,
    output: Output,
    config: ProjectConfig,
}

impl std::fmt::Debug for Project {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Project")
            .field("dir", &self.dir)
            .field("bare", &self.bare)
            .finish()
    }
}

impl Project {
    // =========================================================================
    // Construction and discovery
    // =========================================================================

    /// Whether `dir` is a valid project of either shape.
    pub fn valid_project(dir: &Path) -> bool {
        Self::valid_working(dir) || Self::valid_bare(dir)
    }

    fn valid_working(dir: &Path) -> bool {
        let manifest_dir = dir.join(RUG_DIR).join("manifest");
        Git::is_repo(&manifest_dir) && manifest_dir.join(MANIFEST_FILE).exists()
    }

    fn valid_bare(dir: &Path) -> bool {
        let manifest_dir = dir.join("manifest");
        Git::is_repo(&manifest_dir) && manifest_dir.join(MANIFEST_FILE).exists()
    }

    /// Open the project rooted at exactly `dir`.
    pub fn open(dir: &Path, registry: Arc<VcsRegistry>, output: Output) -> Result<Self> {
        let (bare, rug_dir) = if Self::valid_working(dir) {
            (false, dir.join(RUG_DIR))
        } else if Self::valid_bare(dir) {
            (true, dir.to_path_buf())
        } else {
            return Err(RugError::InvalidProject {
                path: dir.to_path_buf(),
            });
        };
        let manifest_repo = Git::open(&rug_dir.join("manifest"))?;
        let config = ProjectConfig::load(&rug_dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            bare,
            manifest_repo,
            registry,
            output,
            config,
        })
    }

    /// Walk up from `start` to the nearest enclosing project.
    pub fn find(start: &Path, registry: Arc<VcsRegistry>, output: Output) -> Result<Self> {
        let mut dir = start;
        loop {
            if Self::valid_project(dir) {
                return Self::open(dir, registry, output);
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => {
                    return Err(RugError::InvalidProject {
                        path: start.to_path_buf(),
                    })
                }
            }
        }
    }

    /// Create a new empty project at `dir`.
    pub fn init(
        dir: &Path,
        bare: bool,
        registry: Arc<VcsRegistry>,
        output: Output,
    ) -> Result<Self> {
        if Self::valid_project(dir) {
            return Err(RugError::unsupported(format!(
                "already a rug project: {}",
                dir.display()
            )));
        }
        info!(dir = %dir.display(), bare, "initializing project");
        let rug_dir = if bare {
            dir.to_path_buf()
        } else {
            dir.join(RUG_DIR)
        };
        fs::create_dir_all(&rug_dir)?;
        let config = ProjectConfig::default();
        let manifest_repo = Git::init(&rug_dir.join("manifest"), Some(&config.default_branch))?;
        manifest::write(
            &manifest_repo.dir().join(MANIFEST_FILE),
            &RawManifest::default(),
        )?;
        manifest_repo.add(&[MANIFEST_FILE])?;
        manifest_repo.commit("Initial commit", false)?;
        config.save(&rug_dir)?;
        Self::open(dir, registry, output)
    }

    /// Clone the project published at `url` into `dir` and check out
    /// its entries (bare clones take only the manifest repository).
    pub fn clone(
        url: &str,
        dir: &Path,
        source: Option<&str>,
        revset: Option<&str>,
        bare: bool,
        registry: Arc<VcsRegistry>,
        output: Output,
    ) -> Result<Self> {
        let source = source.unwrap_or("origin");
        info!(url, dir = %dir.display(), source, "cloning project");
        let rug_dir = if bare {
            dir.to_path_buf()
        } else {
            dir.join(RUG_DIR)
        };
        fs::create_dir_all(&rug_dir)?;
        let config = ProjectConfig::default();
        Git::clone(
            url,
            &rug_dir.join("manifest"),
            source,
            revset,
            Some(&config.default_branch),
        )?;
        config.save(&rug_dir)?;
        let project = Self::open(dir, registry, output)?;
        if !project.bare {
            project.checkout(None)?;
        }
        Ok(project)
    }

    /// Project root directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether this is a bare (manifest-only) project.
    pub fn is_bare(&self) -> bool {
        self.bare
    }

    /// The manifest repository.
    pub fn manifest_repo(&self) -> &Git {
        &self.manifest_repo
    }

    fn rug_dir(&self) -> PathBuf {
        if self.bare {
            self.dir.clone()
        } else {
            self.dir.join(RUG_DIR)
        }
    }

    fn manifest_path(&self) -> PathBuf {
        self.rug_dir().join("manifest").join(MANIFEST_FILE)
    }

    fn require_working(&self, what: &str) -> Result<()> {
        if self.bare {
            return Err(RugError::unsupported(format!(
                "{} on a bare project",
                what
            )));
        }
        Ok(())
    }

    // =========================================================================
    // Manifest access
    // =========================================================================

    /// The manifest with defaults merged into every entry.
    pub fn read_manifest(&self) -> Result<Manifest> {
        manifest::read(&self.manifest_path(), &ManifestDefault::fallback())
    }

    /// The manifest exactly as written, for editing.
    pub fn read_raw(&self) -> Result<RawManifest> {
        manifest::read_raw(&self.manifest_path())
    }

    fn write_raw(&self, raw: &RawManifest) -> Result<()> {
        manifest::write(&self.manifest_path(), raw)
    }

    /// The committed manifest at the manifest repository's HEAD, or an
    /// empty one before the first commit.
    fn committed_manifest(&self) -> Result<Manifest> {
        match self.manifest_repo.show_blob(&format!("HEAD:{}", MANIFEST_FILE)) {
            Ok(text) => Ok(manifest::read_raw_str(&text)?.merge(&ManifestDefault::fallback())),
            Err(e) => {
                debug!(error = %e, "no committed manifest");
                Ok(Manifest::default())
            }
        }
    }

    // =========================================================================
    // Revsets
    // =========================================================================

    /// The currently checked-out revset (the manifest repository HEAD).
    pub fn revset(&self) -> Result<String> {
        Ok(self.manifest_repo.head()?.short_name().to_string())
    }

    /// All local revsets.
    pub fn revset_list(&self) -> Result<Vec<String>> {
        Ok(self.manifest_repo.branch_list()?)
    }

    /// Create a new revset at `start`, or at the current manifest
    /// revision when none is given.
    pub fn revset_create(&self, name: &str, start: Option<&str>) -> Result<()> {
        Ok(self.manifest_repo.branch_create(name, start)?)
    }

    /// Delete a revset.
    pub fn revset_delete(&self, name: &str) -> Result<()> {
        Ok(self.manifest_repo.branch_delete(name)?)
    }

    // =========================================================================
    // Wrappers
    // =========================================================================

    fn adapter_ctx(&self) -> AdapterContext {
        AdapterContext {
            registry: Arc::clone(&self.registry),
            output: self.output.clone(),
            default_branch: Some(self.config.default_branch.clone()),
        }
    }

    fn entry_url(&self, manifest: &Manifest, entry: &Entry) -> Option<String> {
        let name = entry.name.as_deref()?;
        let remote = entry.remote.as_deref()?;
        let base = manifest.remotes.get(remote)?;
        Some(naming::remote_join(&base.fetch, name))
    }

    fn build_wrappers(&self, manifest: &Manifest) -> Result<BTreeMap<String, RepoWrapper>> {
        self.require_working("entry operations")?;
        let revset = self.revset()?;
        let nested_map = hierarchy::resolve(manifest.entries.keys().map(String::as_str))?;
        let ctx = self.adapter_ctx();

        let mut wrappers = BTreeMap::new();
        for (path, entry) in &manifest.entries {
            let nested = nested_map[path]
                .iter()
                .map(|n| hierarchy::relative_to(path, n))
                .collect();
            let url = self.entry_url(manifest, entry);
            let wrapper =
                RepoWrapper::new(entry.clone(), &revset, &self.dir, url, nested, ctx.clone())?;
            wrappers.insert(path.clone(), wrapper);
        }
        Ok(wrappers)
    }

    fn wrappers(&self) -> Result<BTreeMap<String, RepoWrapper>> {
        let manifest = self.read_manifest()?;
        self.build_wrappers(&manifest)
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Check out a revset (the current one when `None`): force the
    /// manifest checkout over, then bring every entry onto the revset's
    /// refs, cloning entries that do not exist yet.
    pub fn checkout(&self, revset: Option<&str>) -> Result<()> {
        self.require_working("checkout")?;
        info!(revset = revset.unwrap_or("<current>"), "checkout");
        let revset = match revset {
            Some(revset) => {
                if !self.manifest_repo.ref_exists(revset) {
                    return Err(RugError::UnknownRevision {
                        revision: revset.to_string(),
                    });
                }
                revset.to_string()
            }
            None => self.revset()?,
        };
        // Forced: uncommitted manifest edits are discarded.
        self.manifest_repo.checkout(&revset, true)?;
        for (path, wrapper) in self.wrappers()?.iter_mut() {
            if let Err(e) = wrapper.checkout() {
                self.output.append(&format!("{}: skipped: {}", path, e));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    /// Fetch the manifest repository's sources and every checked-out
    /// entry's remote.
    pub fn fetch(&self) -> Result<()> {
        for source in self.manifest_repo.remote_list()? {
            self.manifest_repo.fetch(Some(&source))?;
        }
        if self.bare {
            return Ok(());
        }
        for (path, wrapper) in self.wrappers()? {
            if !wrapper.is_bound() {
                continue;
            }
            if let Err(e) = wrapper.fetch(None) {
                self.output.append(&format!("{}: fetch failed: {}", path, e));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Update
    // =========================================================================

    /// Refuse if any working tree would lose work to an update.
    fn refuse_dirty(&self, wrappers: &BTreeMap<String, RepoWrapper>) -> Result<()> {
        let mut dirty = Vec::new();
        if self.manifest_repo.is_dirty()? {
            dirty.push("manifest".to_string());
        }
        for (path, wrapper) in wrappers {
            if wrapper.dirty()? {
                dirty.push(path.clone());
            }
        }
        if dirty.is_empty() {
            return Ok(());
        }
        Err(RugError::dirty(format!(
            "dirty working trees: {}; commit or stash before updating",
            dirty.join(", ")
        )))
    }

    /// Fast-forward the manifest checkout from its first source, when
    /// that is possible without touching local work.
    fn update_manifest_repo(&self) -> Result<()> {
        let sources = self.manifest_repo.remote_list()?;
        let Some(source) = sources.first() else {
            return Ok(());
        };
        self.manifest_repo.fetch(Some(source))?;
        let head = self.manifest_repo.head()?;
        if head.is_fixed() {
            return Ok(());
        }
        let target = format!("{}/{}", source, head.short_name());
        if !self.manifest_repo.ref_exists(&target) {
            return Ok(());
        }
        let target_sha = self.manifest_repo.sha(&target)?;
        if head.sha() != target_sha
            && self.manifest_repo.can_fast_forward(head.sha(), &target_sha)?
        {
            let outcome = self.manifest_repo.merge(&target)?;
            if outcome.success {
                self.output.append("manifest: fast-forwarded");
            } else {
                self.output
                    .append(&format!("manifest: merge failed:\n{}", outcome.output));
            }
        }
        Ok(())
    }

    /// Bring every entry up to date with its remote: fetch, then walk
    /// the reconciliation decision tree per entry. Entries that do not
    /// exist yet are checked out. Nested projects update only with
    /// `recursive`.
    pub fn update(&self, recursive: bool) -> Result<()> {
        self.require_working("update")?;
        info!(recursive, "update");
        let wrappers = self.wrappers()?;
        self.refuse_dirty(&wrappers)?;
        self.update_manifest_repo()?;

        // The manifest may have moved; rebuild against the new revision.
        let mut wrappers = self.wrappers()?;
        for (path, wrapper) in wrappers.iter_mut() {
            let result = self.update_entry(wrapper, recursive);
            if let Err(e) = result {
                self.output.append(&format!("{}: skipped: {}", path, e));
            }
        }
        Ok(())
    }

    fn update_entry(&self, wrapper: &mut RepoWrapper, recursive: bool) -> Result<()> {
        if !wrapper.is_bound() {
            return wrapper.checkout();
        }
        let repo = wrapper.repo()?;
        if repo.is_nested() {
            if recursive {
                repo.update_nested(recursive)?;
            } else {
                wrapper.output().append("nested project, pass -r to update");
            }
            return Ok(());
        }
        wrapper.fetch(None)?;
        let outcome = wrapper.reconcile()?;
        wrapper.output().append(&outcome.describe());
        Ok(())
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Per-entry status report; see [`RepoWrapper::status`] for the
    /// flag columns. Entries deleted from the working manifest are
    /// listed with `D`.
    pub fn status(&self, porcelain: bool) -> Result<String> {
        self.require_working("status")?;
        let committed = self.committed_manifest()?;
        let wrappers = self.wrappers()?;

        let mut lines = Vec::new();
        if !porcelain {
            lines.push(format!("revset: {}", self.revset()?));
        }
        for (path, wrapper) in &wrappers {
            lines.extend(wrapper.status(committed.entries.get(path), !porcelain)?);
        }
        for path in committed.entries.keys() {
            if !wrappers.contains_key(path) {
                lines.push(format!("D  {}", path));
            }
        }
        Ok(lines.join("\n"))
    }

    /// Whether any working tree (manifest included) has uncommitted
    /// changes.
    pub fn is_dirty(&self) -> Result<bool> {
        if self.manifest_repo.is_dirty()? {
            return Ok(true);
        }
        if self.bare {
            return Ok(false);
        }
        for wrapper in self.wrappers()?.values() {
            if wrapper.dirty()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // =========================================================================
    // Add / remove
    // =========================================================================

    /// Add a repository to the manifest, or revise its entry.
    ///
    /// Attribute precedence is explicit argument, then live repository
    /// state, then the existing entry; attributes that the defaults
    /// already produce are left off the entry so the file diff stays
    /// minimal. The new revision is staged on the canonical index and
    /// the entry is flagged unpublished until `publish` clears it.
    /// A path with no working copy yet can still be added when name,
    /// remote, and revision all resolve; nothing is staged for it.
    pub fn add(&self, opts: &AddOptions) -> Result<()> {
        self.require_working("add")?;
        let manifest = self.read_manifest()?;
        let mut raw = self.read_raw()?;

        let abs_path = self.dir.join(opts.path);
        let adapter = self.registry.detect(&abs_path);
        let handle = match adapter.as_deref() {
            Some(adapter) => Some(adapter.open(&abs_path, &self.adapter_ctx())?),
            None => None,
        };

        let existing = raw.entries.get(opts.path).cloned().unwrap_or(RawEntry {
            path: opts.path.to_string(),
            ..RawEntry::default()
        });
        let revision = match handle.as_deref() {
            Some(handle) => self.resolve_add_revision(opts, handle)?,
            // Nothing on disk to inspect: the revision must come from
            // the arguments or the existing entry.
            None => opts
                .revision
                .map(str::to_string)
                .or_else(|| existing.revision.clone())
                .ok_or_else(|| RugError::MissingAttribute {
                    message: format!("revision required to add unmaterialized {}", opts.path),
                })?,
        };

        let (inferred_remote, inferred_name) =
            match (&existing.remote, &existing.name, handle.as_deref()) {
                (Some(_), Some(_), _) | (_, _, None) => (None, None),
                (_, _, Some(handle)) => self
                    .infer_origin(handle, &manifest)?
                    .map(|(r, n)| (Some(r), Some(n)))
                    .unwrap_or((None, None)),
            };

        let default = raw.default.over(&ManifestDefault::fallback());
        let vcs = opts
            .vcs
            .map(str::to_string)
            .or_else(|| adapter.as_ref().map(|a| a.kind().to_string()))
            .or_else(|| existing.vcs.clone());
        let entry = RawEntry {
            path: opts.path.to_string(),
            name: opts
                .name
                .map(str::to_string)
                .or(existing.name)
                .or(inferred_name),
            remote: opts
                .remote
                .map(str::to_string)
                .or(existing.remote)
                .or(inferred_remote)
                .and_then(|r| minimize(r, default.remote.as_deref())),
            revision: minimize(revision.clone(), default.revision.as_deref()),
            vcs: vcs.and_then(|v| minimize(v, default.vcs.as_deref())),
            unpublished: true,
        };
        if handle.is_none()
            && (entry.name.is_none() || (entry.remote.is_none() && default.remote.is_none()))
        {
            return Err(RugError::MissingAttribute {
                message: format!("name and remote required to add unmaterialized {}", opts.path),
            });
        }
        raw.entries.insert(entry.path.clone(), entry);
        self.write_raw(&raw)?;

        if handle.is_some() {
            // Stage the recorded revision as the pending canonical move.
            let manifest = self.read_manifest()?;
            let wrappers = self.build_wrappers(&manifest)?;
            wrappers[opts.path].mark_canonical_index(Some(&revision))?;
        }
        self.output
            .append(&format!("{}: added at {}", opts.path, revision));
        Ok(())
    }

    fn resolve_add_revision(&self, opts: &AddOptions, handle: &dyn RepoHandle) -> Result<String> {
        if let Some(spec) = opts.revision {
            if opts.use_fixed {
                return handle.sha(spec);
            }
            return Ok(spec.to_string());
        }
        let head = handle.head()?;
        if opts.use_fixed || head.is_fixed() {
            return Ok(head.sha().to_string());
        }
        Ok(head.short_name().to_string())
    }

    /// Match one of the repository's configured remote URLs against the
    /// manifest remotes' fetch bases, yielding `(remote, name)`.
    fn infer_origin(
        &self,
        handle: &dyn RepoHandle,
        manifest: &Manifest,
    ) -> Result<Option<(String, String)>> {
        for remote in handle.remote_list()? {
            let Some(url) = handle.config_get(&format!("remote.{}.url", remote))? else {
                continue;
            };
            for (name, manifest_remote) in &manifest.remotes {
                let base = manifest_remote.fetch.trim_end_matches('/');
                if let Some(rest) = url.strip_prefix(base) {
                    let repo_name = rest.trim_start_matches('/');
                    if !repo_name.is_empty() {
                        return Ok(Some((name.clone(), repo_name.to_string())));
                    }
                }
            }
        }
        Ok(None)
    }

    /// Remove an entry from the manifest. The working tree is left in
    /// place; deleting it is the user's decision.
    pub fn remove(&self, path: &str) -> Result<()> {
        self.require_working("remove")?;
        let mut raw = self.read_raw()?;
        if raw.entries.remove(path).is_none() {
            return Err(RugError::MissingAttribute {
                message: format!("no manifest entry at {}", path),
            });
        }
        self.write_raw(&raw)?;
        self.output.append(&format!("{}: removed", path));
        Ok(())
    }

    // =========================================================================
    // Commit
    // =========================================================================

    /// Record the project state on the current revset.
    ///
    /// Entries checked out on an unrecorded revision are re-added
    /// first, then every entry's pending index refs are collapsed into
    /// the durable canonical and bookmark refs (the canonical follows
    /// the live branch when nothing was staged), then the manifest
    /// change is committed. With `all`, dirty entry trees are committed
    /// first; with `recursive`, nested projects commit through their
    /// own manifests.
    pub fn commit(&self, message: Option<&str>, all: bool, recursive: bool) -> Result<()> {
        self.require_working("commit")?;
        let wrappers = self.wrappers()?;

        for (path, wrapper) in &wrappers {
            if !wrapper.is_bound() {
                continue;
            }
            let repo = wrapper.repo()?;
            if repo.is_nested() {
                if recursive {
                    let message = message.ok_or_else(|| RugError::MissingAttribute {
                        message: format!("commit message required for nested project {}", path),
                    })?;
                    repo.commit(message, all)?;
                }
                continue;
            }
            if all && wrapper.dirty()? {
                let message = message.ok_or_else(|| RugError::MissingAttribute {
                    message: format!("commit message required for dirty entry {}", path),
                })?;
                wrapper.commit_tree(message)?;
                wrapper.output().append("committed");
            }
            // An entry checked out on something other than its recorded
            // revision is re-recorded through the add path.
            let head = repo.head()?;
            let branches = wrapper.branch_set()?;
            let drifted = if branches.fixed {
                head.sha() != branches.live
            } else {
                head.short_name() != branches.live
            };
            if drifted {
                self.add(&AddOptions {
                    path: path.as_str(),
                    ..AddOptions::default()
                })?;
            }
        }

        // The auto-adds may have rewritten entries; collapse against
        // the manifest as it now stands.
        for wrapper in self.wrappers()?.values() {
            if wrapper.is_bound() {
                wrapper.collapse_indices()?;
            }
        }

        if self.manifest_repo.is_dirty()? {
            let message = message.ok_or_else(|| RugError::MissingAttribute {
                message: "commit message required".to_string(),
            })?;
            self.manifest_repo.add(&[MANIFEST_FILE])?;
            self.manifest_repo.commit(message, true)?;
            self.output.append("manifest: committed");
        }
        Ok(())
    }

    // =========================================================================
    // Publish
    // =========================================================================

    /// Publish the current revset to `source` (default `origin`).
    ///
    /// Two phases: every candidate entry and the manifest are dry-run
    /// pushed first, and any failure aborts with the full failure list
    /// before anything is mutated. Only then are the real pushes made,
    /// unpublished flags cleared, and the manifest committed and
    /// pushed. With `test`, the dry-run phase is the whole operation.
    pub fn publish(&self, source: Option<&str>, test: bool) -> Result<bool> {
        self.require_working("publish")?;
        let source = source.unwrap_or("origin");
        info!(source, test, "publish");
        if !self
            .manifest_repo
            .remote_list()?
            .iter()
            .any(|r| r == source)
        {
            return Err(RugError::UnknownRemote {
                name: source.to_string(),
            });
        }

        let wrappers = self.wrappers()?;
        let mut candidates = Vec::new();
        for (path, wrapper) in &wrappers {
            if wrapper.is_bound() && (wrapper.entry().unpublished || wrapper.should_push()?) {
                candidates.push(path.clone());
            }
        }

        let mut failures = Vec::new();
        for path in &candidates {
            let (ok, output) = wrappers[path].push(true)?;
            if !ok {
                failures.push(format!("{}: {}", path, output));
            }
        }
        let head = self.manifest_repo.head()?;
        let manifest_refspec = format!("{0}:{0}", head.long_name());
        let (ok, output) = self
            .manifest_repo
            .test_push(source, &manifest_refspec, false);
        if !ok {
            failures.push(format!("manifest: {}", output));
        }
        if !failures.is_empty() {
            return Err(RugError::PublishValidation { failures });
        }
        if test {
            return Ok(true);
        }

        for path in &candidates {
            wrappers[path].push(false)?;
            wrappers[path].output().append("pushed");
        }

        let mut raw = self.read_raw()?;
        let mut cleared = false;
        for path in &candidates {
            if let Some(entry) = raw.entries.get_mut(path) {
                if entry.unpublished {
                    entry.unpublished = false;
                    cleared = true;
                }
            }
        }
        if cleared {
            self.write_raw(&raw)?;
        }
        if self.manifest_repo.is_dirty()? {
            self.manifest_repo.add(&[MANIFEST_FILE])?;
            self.manifest_repo.commit("Publish manifest", true)?;
        }
        self.manifest_repo.push(source, &manifest_refspec, false)?;
        self.output.append("manifest: pushed");
        Ok(true)
    }

    // =========================================================================
    // Remotes and sources
    // =========================================================================

    /// Manifest remotes as `(name, fetch)` pairs.
    pub fn remote_list(&self) -> Result<Vec<(String, String)>> {
        let raw = self.read_raw()?;
        Ok(raw
            .remotes
            .values()
            .map(|r| (r.name.clone(), r.fetch.clone()))
            .collect())
    }

    /// Add or replace a manifest remote.
    pub fn remote_add(&self, name: &str, fetch: &str) -> Result<()> {
        let mut raw = self.read_raw()?;
        raw.remotes.insert(
            name.to_string(),
            manifest::Remote {
                name: name.to_string(),
                fetch: fetch.to_string(),
            },
        );
        self.write_raw(&raw)
    }

    /// Sources (git remotes of the manifest repository) as
    /// `(name, url)` pairs.
    pub fn source_list(&self) -> Result<Vec<(String, String)>> {
        let mut sources = Vec::new();
        for name in self.manifest_repo.remote_list()? {
            let url = self
                .manifest_repo
                .config_get(&format!("remote.{}.url", name))?
                .unwrap_or_default();
            sources.push((name, url));
        }
        Ok(sources)
    }

    /// Add a source to the manifest repository.
    pub fn source_add(&self, name: &str, url: &str) -> Result<()> {
        Ok(self.manifest_repo.remote_add(name, url)?)
    }

    /// Change a source's URL.
    pub fn source_set_url(&self, name: &str, url: &str) -> Result<()> {
        Ok(self.manifest_repo.remote_set_url(name, url)?)
    }

    /// Refresh a source's default-branch marker, falling back to
    /// `fallback` when the source's HEAD is ambiguous.
    pub fn source_set_head(&self, name: &str, fallback: Option<&str>) -> Result<()> {
        Ok(self.manifest_repo.remote_set_head(name, fallback)?)
    }
}

/// Drop an attribute that the merged defaults would reproduce anyway.
fn minimize(value: String, default: Option<&str>) -> Option<String> {
    if default == Some(value.as_str()) {
        None
    } else {
        Some(value)
    }
}
