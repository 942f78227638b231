//! Runs [`Task`]s off the UI loop and sends each result back as a [`Msg`].

use crate::board;
use crate::config::Settings;
use crate::db;
use crate::error::{Error, Result};
use crate::git;
use crate::github;
use crate::model::{DetailData, GROUND};
use crate::msg::{DetailTarget, Msg, Task};
use crate::sweep;
use crate::tmux;
use crate::tui::open_in_browser;
use octocrab::Octocrab;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;

const DETAIL_COMMITS: usize = 10;

pub struct Executor {
    tx: UnboundedSender<Msg>,
    settings: Arc<Settings>,
    octo: Option<Octocrab>,
    /// Cache writes run inline; they are small and local.
    conn: Option<Connection>,
    in_tmux: bool,
}

impl Executor {
    pub fn new(
        tx: UnboundedSender<Msg>,
        settings: Arc<Settings>,
        octo: Option<Octocrab>,
        conn: Option<Connection>,
        in_tmux: bool,
    ) -> Self {
        Executor {
            tx,
            settings,
            octo,
            conn,
            in_tmux,
        }
    }

    pub fn run_all(&self, tasks: Vec<Task>) {
        for task in tasks {
            self.run(task);
        }
    }

    pub fn run(&self, task: Task) {
        let tx = self.tx.clone();
        let settings = self.settings.clone();
        match task {
            Task::Status {
                repo,
                capsule,
                path,
            } => blocking(tx, move || Msg::Status {
                result: git::status(&path).map_err(|e| e.to_string()),
                repo,
                capsule,
            }),
            Task::PrList { repo } => {
                let octo = self.octo.clone();
                tokio::spawn(async move {
                    let result = match octo {
                        Some(octo) => list_prs(&octo, &settings, &repo).await,
                        None => Err(Error::NoCredentials),
                    };
                    let _ = tx.send(Msg::PrList {
                        repo,
                        result: result.map_err(|e| e.to_string()),
                    });
                });
            }
            Task::Merged { repo } => blocking(tx, move || {
                let ground = settings.root.join(&repo).join(GROUND);
                let base = settings.base_branch_for(&repo);
                Msg::Merged {
                    result: git::merged_branches(&ground, base).map_err(|e| e.to_string()),
                    repo,
                }
            }),
            Task::Identity => {
                let octo = self.octo.clone();
                tokio::spawn(async move {
                    let login = match octo {
                        Some(octo) => github::viewer_login(&octo).await.unwrap_or_else(|e| {
                            tracing::warn!("identity query failed: {e}");
                            String::new()
                        }),
                        None => String::new(),
                    };
                    let _ = tx.send(Msg::Identity { login });
                });
            }
            Task::Windows => {
                if !self.in_tmux {
                    let _ = tx.send(Msg::Windows {
                        result: Ok(Default::default()),
                    });
                    return;
                }
                blocking(tx, || Msg::Windows {
                    result: tmux::list_windows().map_err(|e| e.to_string()),
                });
            }
            Task::DetailTimer { seq, delay } => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(Msg::DetailTick { seq });
                });
            }
            Task::Detail { index, seq, target } => {
                let octo = self.octo.clone();
                tokio::spawn(async move {
                    let data = fetch_detail(octo.as_ref(), &settings, target).await;
                    let _ = tx.send(Msg::Detail { index, seq, data });
                });
            }
            Task::Remove {
                repo,
                capsule,
                path,
                window,
            } => blocking(tx, move || {
                let result = remove_capsule(&settings.root, &repo, &capsule, &path, window.as_deref())
                    .map_err(|e| e.to_string());
                Msg::Removed {
                    repo,
                    capsule,
                    result,
                }
            }),
            Task::Create { repo, branch } => blocking(tx, move || {
                let repo_dir = settings.root.join(&repo);
                let result = existing_capsules(&repo_dir)
                    .and_then(|existing| git::worktree_add(&repo_dir, &branch, &existing))
                    .map_err(|e| e.to_string());
                Msg::Created {
                    repo,
                    branch,
                    result,
                }
            }),
            Task::Sweep => blocking(tx, move || {
                let (removed, outline) = sweep::run(&settings);
                Msg::Swept { removed, outline }
            }),
            Task::OpenWindow { name, path, window } => blocking(tx, move || Msg::Opened {
                result: tmux::open(&name, &path, window.as_deref(), settings.split_panes)
                    .map_err(|e| e.to_string()),
            }),
            Task::OpenUrl(url) => {
                let result = open_in_browser(&url).map_err(|e| e.to_string());
                let _ = tx.send(Msg::Opened { result });
            }
            Task::Board { repo, capsule, on } => {
                tokio::task::spawn_blocking(move || {
                    if let Err(e) = board::set_boarded(&settings.root, &repo, &capsule, on) {
                        tracing::warn!(%repo, %capsule, on, "board update failed: {e}");
                    }
                });
            }
            Task::CacheBranch {
                repo,
                capsule,
                branch,
            } => self.cache("branch", |c| db::save_branch(c, &repo, &capsule, &branch)),
            Task::CachePrs { repo, prs } => self.cache("prs", |c| db::save_prs(c, &repo, &prs)),
            Task::CacheLogin(login) => self.cache("login", |c| db::set_kv(c, db::LOGIN_KEY, &login)),
        }
    }

    fn cache(&self, what: &str, write: impl FnOnce(&Connection) -> Result<()>) {
        let Some(conn) = &self.conn else {
            return;
        };
        if let Err(e) = write(conn) {
            tracing::warn!(what, "cache write failed: {e}");
        }
    }
}

fn blocking(tx: UnboundedSender<Msg>, job: impl FnOnce() -> Msg + Send + 'static) {
    tokio::task::spawn_blocking(move || {
        let _ = tx.send(job());
    });
}

/// GitHub `(owner, name)` for a workspace repo.
pub fn resolve_slug(settings: &Settings, repo: &str) -> Result<(String, String)> {
    if let Some(org) = settings.org_for(repo) {
        return Ok((org.to_string(), repo.to_string()));
    }
    let url = git::origin_url(&settings.root.join(repo).join(GROUND))?;
    git::parse_github_remote(&url).ok_or_else(|| Error::NoOwner(repo.to_string()))
}

async fn slug(settings: &Arc<Settings>, repo: &str) -> Result<(String, String)> {
    let settings = settings.clone();
    let name = repo.to_string();
    tokio::task::spawn_blocking(move || resolve_slug(&settings, &name))
        .await
        .unwrap_or_else(|_| Err(Error::NoOwner(repo.to_string())))
}

async fn list_prs(octo: &Octocrab, settings: &Arc<Settings>, repo: &str) -> Result<Vec<crate::model::Pr>> {
    let (owner, name) = slug(settings, repo).await?;
    github::list_prs(octo, &owner, &name).await
}

fn existing_capsules(repo_dir: &Path) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(repo_dir).map_err(|e| Error::io(repo_dir, e))?;
    Ok(entries
        .flatten()
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect())
}

fn remove_capsule(
    root: &Path,
    repo: &str,
    capsule: &str,
    path: &Path,
    window: Option<&str>,
) -> Result<()> {
    git::worktree_remove(&root.join(repo), path)?;
    if let Some(id) = window {
        if let Err(e) = tmux::kill_window(id) {
            tracing::warn!(window = id, "kill window failed: {e}");
        }
    }
    let boarded = board::load_boarded(root).unwrap_or_default();
    if boarded.contains(repo, capsule) {
        if let Err(e) = board::set_boarded(root, repo, capsule, false) {
            tracing::warn!(%repo, %capsule, "unboard failed: {e}");
        }
    }
    Ok(())
}

/// Each piece fails independently; a failed piece stays empty.
async fn fetch_detail(octo: Option<&Octocrab>, settings: &Arc<Settings>, target: DetailTarget) -> DetailData {
    let mut data = DetailData::default();

    if let Some(path) = target.capsule.clone() {
        let base = settings.base_branch_for(&target.repo).to_string();
        let local = tokio::task::spawn_blocking(move || local_detail(&path, &base)).await;
        if let Ok((commits, diff_stat, stash_count)) = local {
            data.commits = commits;
            data.diff_stat = diff_stat;
            data.stash_count = stash_count;
        }
    }

    let Some(octo) = octo else {
        return data;
    };
    let (owner, name) = match slug(settings, &target.repo).await {
        Ok(s) => s,
        Err(e) => {
            tracing::debug!(repo = %target.repo, "detail without GitHub: {e}");
            return data;
        }
    };

    if let Some(number) = target.pr {
        match github::pr_detail(octo, &owner, &name, number).await {
            Ok(pr) => {
                data.pr_title = pr.title;
                data.pr_body = pr.body;
                data.checks = pr.checks;
                if data.commits.is_empty() {
                    data.commits = pr.commits;
                }
            }
            Err(e) => tracing::debug!(number, "pr detail failed: {e}"),
        }
    }
    if !target.branch.is_empty() {
        match github::workflow_runs(octo, &owner, &name, &target.branch).await {
            Ok(runs) => data.runs = runs,
            Err(e) => tracing::debug!(branch = %target.branch, "workflow runs failed: {e}"),
        }
    }
    match github::merged_history(octo, &owner, &name).await {
        Ok(h) => data.merged_history = h,
        Err(e) => tracing::debug!(repo = %target.repo, "merged history failed: {e}"),
    }
    data
}

fn local_detail(path: &Path, base: &str) -> (Vec<String>, String, usize) {
    (
        git::recent_commits(path, DETAIL_COMMITS).unwrap_or_default(),
        git::diff_stat(path, base).unwrap_or_default(),
        git::stash_count(path).unwrap_or_default(),
    )
}
