//! cli::commands
//!
//! Command handlers. Each handler resolves its arguments, calls into
//! [`crate::project`], and prints the results; no repository mutation
//! happens in this layer.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context as _, Result};

use crate::output::Output;
use crate::project::{AddOptions, Project};
use crate::vcs::VcsRegistry;

/// Open the nearest enclosing project.
fn open_project(cwd: &Path) -> Result<Project> {
    Project::find(cwd, VcsRegistry::standard(), Output::stdout())
        .context("not inside a rug project")
}

pub fn init(cwd: &Path, dir: Option<&Path>, bare: bool) -> Result<()> {
    let dir = match dir {
        Some(dir) => cwd.join(dir),
        None => cwd.to_path_buf(),
    };
    let project = Project::init(&dir, bare, VcsRegistry::standard(), Output::stdout())?;
    println!(
        "Initialized {}rug project in {}",
        if bare { "bare " } else { "" },
        project.dir().display()
    );
    Ok(())
}

pub fn clone(
    cwd: &Path,
    url: &str,
    dir: Option<&Path>,
    source: Option<&str>,
    revset: Option<&str>,
    bare: bool,
) -> Result<()> {
    let dir = match dir {
        Some(dir) => cwd.join(dir),
        None => cwd.join(default_clone_dir(url)?),
    };
    Project::clone(
        url,
        &dir,
        source,
        revset,
        bare,
        VcsRegistry::standard(),
        Output::stdout(),
    )?;
    println!("Cloned into {}", dir.display());
    Ok(())
}

/// Directory name implied by a project URL, like git's own default.
fn default_clone_dir(url: &str) -> Result<PathBuf> {
    let name = url
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .map(|n| n.trim_end_matches(".git"))
        .filter(|n| !n.is_empty())
        .with_context(|| format!("cannot derive a directory name from {}", url))?;
    Ok(PathBuf::from(name))
}

pub fn checkout(cwd: &Path, revset: Option<&str>, src: Option<&str>, create: bool) -> Result<()> {
    let project = open_project(cwd)?;
    if create {
        let Some(revset) = revset else {
            bail!("-b requires a revset name");
        };
        project.revset_create(revset, src)?;
    } else if src.is_some() {
        bail!("a source revset only makes sense with -b");
    }
    project.checkout(revset)?;
    Ok(())
}

pub fn fetch(cwd: &Path) -> Result<()> {
    open_project(cwd)?.fetch()?;
    Ok(())
}

pub fn update(cwd: &Path, recursive: bool) -> Result<()> {
    open_project(cwd)?.update(recursive)?;
    Ok(())
}

pub fn status(cwd: &Path, porcelain: bool) -> Result<()> {
    let report = open_project(cwd)?.status(porcelain)?;
    if !report.is_empty() {
        println!("{}", report);
    }
    Ok(())
}

pub fn revset(cwd: &Path, dst: Option<&str>, src: Option<&str>) -> Result<()> {
    let project = open_project(cwd)?;
    match dst {
        Some(dst) => project.revset_create(dst, src)?,
        None => println!("{}", project.revset()?),
    }
    Ok(())
}

pub fn revset_list(cwd: &Path) -> Result<()> {
    let project = open_project(cwd)?;
    let current = project.revset()?;
    for name in project.revset_list()? {
        let marker = if name == current { "* " } else { "  " };
        println!("{}{}", marker, name);
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn add(
    cwd: &Path,
    path: &str,
    name: Option<&str>,
    remote: Option<&str>,
    revision: Option<&str>,
    vcs: Option<&str>,
    use_sha: bool,
) -> Result<()> {
    let project = open_project(cwd)?;
    project.add(&AddOptions {
        path,
        name,
        remote,
        revision,
        vcs,
        use_fixed: use_sha,
    })?;
    Ok(())
}

pub fn remove(cwd: &Path, path: &str) -> Result<()> {
    open_project(cwd)?.remove(path)?;
    Ok(())
}

pub fn commit(cwd: &Path, message: Option<&str>, all: bool, recursive: bool) -> Result<()> {
    open_project(cwd)?.commit(message, all, recursive)?;
    Ok(())
}

pub fn push(cwd: &Path, source: Option<&str>, dry_run: bool) -> Result<()> {
    let project = open_project(cwd)?;
    project.publish(source, dry_run)?;
    if dry_run {
        println!("all pushes would succeed");
    }
    Ok(())
}

pub fn remote_list(cwd: &Path) -> Result<()> {
    for (name, fetch) in open_project(cwd)?.remote_list()? {
        println!("{}\t{}", name, fetch);
    }
    Ok(())
}

pub fn remote_add(cwd: &Path, name: &str, fetch: &str) -> Result<()> {
    open_project(cwd)?.remote_add(name, fetch)?;
    Ok(())
}

pub fn source_list(cwd: &Path) -> Result<()> {
    for (name, url) in open_project(cwd)?.source_list()? {
        println!("{}\t{}", name, url);
    }
    Ok(())
}

pub fn source_add(cwd: &Path, name: &str, url: &str) -> Result<()> {
    open_project(cwd)?.source_add(name, url)?;
    Ok(())
}

pub fn source_set_head(cwd: &Path, name: &str, branch: Option<&str>) -> Result<()> {
    open_project(cwd)?.source_set_head(name, branch)?;
    Ok(())
}
