//! cli
//!
//! Command-line interface layer for rug.
//!
//! The CLI layer is thin: it parses arguments via clap, sets up
//! logging, and dispatches to the handlers in [`commands`], which in
//! turn call [`crate::project`]. All repository state changes flow
//! through the project layer.

pub mod args;
pub mod commands;

pub use args::{Cli, Command};

use anyhow::Result;

/// Run the CLI application.
///
/// This is the main entry point called from `main.rs`.
pub fn run() -> Result<()> {
    let cli = Cli::parse_args();
    init_tracing(cli.debug);

    let cwd = match cli.cwd.clone() {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };

    match cli.command {
        Command::Init { dir, bare } => commands::init(&cwd, dir.as_deref(), bare),
        Command::Clone {
            url,
            dir,
            source,
            revset,
            bare,
        } => commands::clone(
            &cwd,
            &url,
            dir.as_deref(),
            source.as_deref(),
            revset.as_deref(),
            bare,
        ),
        Command::Checkout {
            revset,
            src,
            create,
        } => commands::checkout(&cwd, revset.as_deref(), src.as_deref(), create),
        Command::Fetch => commands::fetch(&cwd),
        Command::Update { recursive } => commands::update(&cwd, recursive),
        Command::Status { porcelain } => commands::status(&cwd, porcelain),
        Command::Revset { dst, src } => commands::revset(&cwd, dst.as_deref(), src.as_deref()),
        Command::RevsetList => commands::revset_list(&cwd),
        Command::Add {
            path,
            name,
            remote,
            revision,
            vcs,
            use_sha,
        } => commands::add(
            &cwd,
            &path,
            name.as_deref(),
            remote.as_deref(),
            revision.as_deref(),
            vcs.as_deref(),
            use_sha,
        ),
        Command::Remove { path } => commands::remove(&cwd, &path),
        Command::Commit {
            message,
            all,
            recursive,
        } => commands::commit(&cwd, message.as_deref(), all, recursive),
        Command::Push { source, dry_run } => commands::push(&cwd, source.as_deref(), dry_run),
        Command::RemoteList => commands::remote_list(&cwd),
        Command::RemoteAdd { name, fetch } => commands::remote_add(&cwd, &name, &fetch),
        Command::SourceList => commands::source_list(&cwd),
        Command::SourceAdd { name, url } => commands::source_add(&cwd, &name, &url),
        Command::SourceSetHead { name, branch } => {
            commands::source_set_head(&cwd, &name, branch.as_deref())
        }
    }
}

/// Diagnostic logging to stderr; user-facing results go through
/// [`crate::output`] instead.
fn init_tracing(debug: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if debug { "rug=debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
