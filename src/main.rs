mod actions;
mod app;
mod board;
mod config;
mod db;
mod detail;
mod error;
mod exec;
mod filter;
mod git;
mod github;
mod model;
mod msg;
mod outline;
mod palette;
mod reconcile;
mod sweep;
#[cfg(test)]
mod testutil;
mod tmux;
mod tui;

use crate::app::{App, Exit, Seed};
use crate::config::{Overrides, Settings, load_config};
use crate::exec::Executor;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "mctl",
    version,
    about = "Live dashboard for a workspace of repositories and their worktree capsules"
)]
struct CliArgs {
    /// Workspace root (one directory per repository).
    #[arg(long)]
    root: Option<PathBuf>,

    /// GitHub owner for repositories without an override.
    #[arg(long)]
    org: Option<String>,

    /// Branch capsules are compared against.
    #[arg(long)]
    base_branch: Option<String>,

    /// Never open tmux windows; always print the chosen path instead.
    #[arg(long)]
    no_tmux: bool,

    /// Print the effective configuration and exit.
    #[arg(long)]
    print_config: bool,
}

fn init_file_logging() -> Option<PathBuf> {
    let dir = db::data_dir()?;
    std::fs::create_dir_all(&dir).ok()?;
    let path = dir.join("mctl.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .ok()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("MCTL_LOG").unwrap_or_else(|_| "info".into()),
        )
        .with_ansi(false)
        .with_writer(std::sync::Mutex::new(log_file))
        .init();
    Some(path)
}

fn seed(settings: &Settings, conn: Option<&rusqlite::Connection>) -> Seed {
    let root = &settings.root;
    let boarded = board::load_boarded(root).unwrap_or_else(|e| {
        tracing::warn!("cannot read boarded set: {e}");
        board::Boarded::default()
    });
    let mut seed = Seed::new(root.clone(), outline::scan(root, &boarded));

    let canonical_root = root.canonicalize().unwrap_or_else(|_| root.clone());
    seed.here = std::env::current_dir()
        .ok()
        .and_then(|cwd| outline::locate(&canonical_root, &cwd).or_else(|| outline::locate(root, &cwd)));
    seed.detail_delay = settings.detail_delay;
    seed.in_tmux = settings.tmux && tmux::in_session();

    // Fast startup: last session's PR lists, branches and login render before any fetch returns.
    if let Some(conn) = conn {
        match db::load_prs(conn) {
            Ok(prs) => seed.cached_prs = prs,
            Err(e) => tracing::warn!("cannot read cached PR lists: {e}"),
        }
        match db::load_branches(conn) {
            Ok(b) => seed.branch_hints = b,
            Err(e) => tracing::warn!("cannot read cached branches: {e}"),
        }
        match db::get_kv(conn, db::LOGIN_KEY) {
            Ok(login) => seed.identity = login.filter(|l| !l.is_empty()),
            Err(e) => tracing::warn!("cannot read cached login: {e}"),
        }
    }
    seed
}

fn open_cache() -> Option<rusqlite::Connection> {
    let path = db::db_path()?;
    db::open_db(&path)
        .map_err(|e| tracing::warn!(path = %path.display(), "cache unavailable: {e}"))
        .ok()
}

fn print_go(path: &Path) {
    println!("{}", path.display());
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = CliArgs::parse();
    let settings = Settings::resolve(
        load_config(),
        Overrides {
            root: args.root,
            org: args.org,
            base_branch: args.base_branch,
            no_tmux: args.no_tmux,
        },
    );

    if args.print_config {
        print!("{}", settings.describe());
        return;
    }

    if !settings.root.is_dir() {
        eprintln!("workspace root {} is not a directory", settings.root.display());
        std::process::exit(1);
    }

    if let Some(path) = init_file_logging() {
        tracing::info!(log = %path.display(), root = %settings.root.display(), "starting");
    }

    let conn = open_cache();
    let seed = seed(&settings, conn.as_ref());
    let in_tmux = seed.in_tmux;
    let (app, tasks) = App::new(seed);

    let octo = github::client()
        .map_err(|e| tracing::warn!("GitHub disabled: {e}"))
        .ok();

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let exec = Executor::new(tx, Arc::new(settings), octo, conn, in_tmux);
    exec.run_all(tasks);

    match tui::run_tui(app, &exec, rx) {
        Ok(Exit::Go(path)) => print_go(&path),
        Ok(Exit::Quit) => {}
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
