//! Merging background results into the row model, including the
//! pull-request / ghost-row lifecycle.

use crate::app::App;
use crate::git::GitStatus;
use crate::model::{GhostRow, Pr, Row, RowKey};
use crate::msg::Task;
use crate::tmux;
use std::collections::{HashMap, HashSet};

impl App {
    pub(crate) fn on_status(
        &mut self,
        repo: String,
        capsule: String,
        result: Result<GitStatus, String>,
    ) -> Vec<Task> {
        let status = match result {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!(%repo, %capsule, "status query failed: {e}");
                return Vec::new();
            }
        };
        let Some(i) = self.find(&RowKey::Capsule(repo.clone(), capsule.clone())) else {
            tracing::debug!(%repo, %capsule, "status for a capsule no longer shown");
            return Vec::new();
        };
        let merged = self
            .repo(&repo)
            .is_some_and(|d| d.merged.contains(&status.branch));

        if let Row::Capsule(c) = &mut self.rows[i] {
            if !c.loaded {
                self.loaded += 1;
            }
            c.branch = status.branch.clone();
            c.dirty = status.dirty;
            c.ahead = status.ahead;
            c.behind = status.behind;
            c.loaded = true;
            if merged {
                c.merged = true;
            }
        }
        self.rematch(&repo);

        if status.branch.is_empty() {
            return Vec::new();
        }
        vec![Task::CacheBranch {
            repo,
            capsule,
            branch: status.branch,
        }]
    }

    pub(crate) fn on_pr_list(&mut self, repo: String, result: Result<Vec<Pr>, String>) -> Vec<Task> {
        match result {
            Ok(prs) => {
                let Some(data) = self.repo_mut(&repo) else {
                    return Vec::new();
                };
                if data.error.is_some() {
                    return Vec::new();
                }
                data.set_prs(prs.clone(), true);
                self.rematch(&repo);
                vec![Task::CachePrs { repo, prs }]
            }
            Err(e) => {
                self.pr_errors += 1;
                tracing::warn!(%repo, "pull request list failed: {e}");
                Vec::new()
            }
        }
    }

    /// Monotonic: never clears a merged flag.
    pub(crate) fn on_merged(&mut self, repo: String, result: Result<Vec<String>, String>) -> Vec<Task> {
        let branches = match result {
            Ok(b) => b,
            Err(e) => {
                tracing::debug!(%repo, "merged-branch query failed: {e}");
                return Vec::new();
            }
        };
        let Some(data) = self.repo_mut(&repo) else {
            return Vec::new();
        };
        data.merged.extend(branches);
        let merged = data.merged.clone();
        for row in &mut self.rows {
            if let Row::Capsule(c) = row {
                if c.repo == repo && !c.branch.is_empty() && merged.contains(&c.branch) {
                    c.merged = true;
                }
            }
        }
        Vec::new()
    }

    pub(crate) fn on_identity(&mut self, login: String) -> Vec<Task> {
        if login.is_empty() {
            return Vec::new();
        }
        let changed = self.identity.as_deref() != Some(login.as_str());
        self.identity = Some(login.clone());
        if self.presets.contains(crate::filter::Preset::Mine) {
            self.snap_cursor();
        }
        if changed {
            vec![Task::CacheLogin(login)]
        } else {
            Vec::new()
        }
    }

    pub(crate) fn on_windows(&mut self, result: Result<HashMap<String, String>, String>) -> Vec<Task> {
        let windows = match result {
            Ok(w) => w,
            Err(e) => {
                tracing::debug!("window list failed: {e}");
                return Vec::new();
            }
        };
        for row in &mut self.rows {
            if let Row::Capsule(c) = row {
                c.live = windows.contains_key(&tmux::window_name(&c.repo, &c.name));
            }
        }
        self.windows = windows;
        Vec::new()
    }

    /// Clear-then-rematch for one repo: drop its ghosts, detach every
    /// capsule's PR, reattach from the current map, and re-append a ghost
    /// for each PR no capsule claimed. The cursor follows its row by identity.
    pub(crate) fn rematch(&mut self, repo: &str) {
        let Some(ri) = self.repos.iter().position(|d| d.name == repo) else {
            return;
        };
        let key = self.cursor_key();
        let fallback = self.cursor;

        self.rows
            .retain(|r| !matches!(r, Row::Ghost(g) if g.repo == repo));

        let data = &self.repos[ri];
        let mut claimed: HashSet<String> = HashSet::new();
        // Branch matches first so a name fallback never takes a PR from
        // the capsule actually on that branch.
        for row in self.rows.iter_mut() {
            if let Row::Capsule(c) = row {
                if c.repo == repo {
                    c.pr = data
                        .branch_match(c)
                        .filter(|pr| claimed.insert(pr.branch.clone()))
                        .cloned();
                }
            }
        }
        for row in self.rows.iter_mut() {
            if let Row::Capsule(c) = row {
                if c.repo == repo && c.pr.is_none() {
                    c.pr = data
                        .name_match(c)
                        .filter(|pr| claimed.insert(pr.branch.clone()))
                        .cloned();
                }
            }
        }

        let ghosts: Vec<Row> = data
            .prs_in_order()
            .filter(|pr| !claimed.contains(&pr.branch))
            .map(|pr| {
                Row::Ghost(GhostRow {
                    repo: repo.to_string(),
                    branch: pr.branch.clone(),
                    pr: pr.clone(),
                    loaded: data.prs_loaded,
                })
            })
            .collect();
        let at = self.repo_end(repo);
        self.rows.splice(at..at, ghosts);

        self.restore_cursor(key, fallback);
    }

    /// Index just past the last row belonging to `repo`.
    pub(crate) fn repo_end(&self, repo: &str) -> usize {
        let Some(h) = self
            .rows
            .iter()
            .position(|r| matches!(r, Row::Header { repo: name } if name == repo))
        else {
            return self.rows.len();
        };
        let mut i = h + 1;
        while i < self.rows.len() && !self.rows[i].is_header() && self.rows[i].repo() == repo {
            i += 1;
        }
        i
    }
}
