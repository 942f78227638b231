//! Workspace-wide cleanup of abandoned capsules, run by Refresh.

use crate::board;
use crate::config::Settings;
use crate::db::now_unix;
use crate::git;
use crate::model::GROUND;
use crate::outline::{self, RepoOutline};
use crate::tmux;
use std::collections::HashMap;

const DAY_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub dirty: bool,
    pub merged: bool,
    pub last_commit_unix: Option<i64>,
}

/// Not ground, not dirty, and either merged or idle for `inactive_days`.
pub fn is_abandoned(c: &Candidate, now: i64, inactive_days: u64) -> bool {
    if c.name == GROUND || c.dirty {
        return false;
    }
    let cutoff = now - inactive_days as i64 * DAY_SECS;
    c.merged || c.last_commit_unix.is_some_and(|t| t < cutoff)
}

/// Removes every abandoned capsule and returns them with a fresh outline.
/// Individual failures are logged and skipped.
pub fn run(settings: &Settings) -> (Vec<(String, String)>, Vec<RepoOutline>) {
    let root = &settings.root;
    let boarded = board::load_boarded(root).unwrap_or_else(|e| {
        tracing::warn!("cannot read boarded set: {e}");
        board::Boarded::default()
    });
    let windows: HashMap<String, String> = if settings.tmux && tmux::in_session() {
        tmux::list_windows().unwrap_or_default()
    } else {
        HashMap::new()
    };
    let now = now_unix();

    let mut removed = Vec::new();
    for repo in outline::scan(root, &boarded) {
        if repo.error.is_some() {
            continue;
        }
        let repo_dir = root.join(&repo.name);
        let base = settings.base_branch_for(&repo.name);
        let merged = git::merged_branches(&repo_dir.join(GROUND), base).unwrap_or_else(|e| {
            tracing::debug!(repo = %repo.name, "merged query failed: {e}");
            Vec::new()
        });

        for name in repo.capsules.iter().filter(|c| c.as_str() != GROUND) {
            let path = repo_dir.join(name);
            let status = match git::status(&path) {
                Ok(s) => s,
                Err(e) => {
                    tracing::debug!(repo = %repo.name, capsule = %name, "skipping: {e}");
                    continue;
                }
            };
            let candidate = Candidate {
                name: name.clone(),
                dirty: status.dirty,
                merged: !status.branch.is_empty() && merged.contains(&status.branch),
                last_commit_unix: git::last_commit_unix(&path).ok(),
            };
            if !is_abandoned(&candidate, now, settings.inactive_days) {
                continue;
            }

            if let Some(id) = windows.get(&tmux::window_name(&repo.name, name)) {
                if let Err(e) = tmux::kill_window(id) {
                    tracing::warn!(window = %id, "kill window failed: {e}");
                }
            }
            if boarded.contains(&repo.name, name) {
                if let Err(e) = board::set_boarded(root, &repo.name, name, false) {
                    tracing::warn!(repo = %repo.name, capsule = %name, "unboard failed: {e}");
                }
            }
            match git::worktree_remove(&repo_dir, &path) {
                Ok(()) => {
                    tracing::info!(repo = %repo.name, capsule = %name, "removed abandoned capsule");
                    removed.push((repo.name.clone(), name.clone()));
                }
                Err(e) => tracing::warn!(repo = %repo.name, capsule = %name, "worktree remove failed: {e}"),
            }
        }
    }

    let boarded = board::load_boarded(root).unwrap_or_default();
    (removed, outline::scan(root, &boarded))
}
