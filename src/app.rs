//! Dashboard state and the single-writer message handler.
//!
//! `App::update` is the only place the row model changes. Background work is
//! returned as [`Task`] descriptions; the runtime executes them and feeds the
//! resulting [`Msg`] back in, in whatever order they finish.

use crate::filter::Presets;
use crate::model::{DetailData, Pr, RepoData, Row, RowKey};
use crate::msg::{Msg, Task};
use crate::outline::{self, RepoOutline};
use crate::palette::PaletteState;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DETAIL_DELAY: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirm {
    pub index: usize,
    pub key: RowKey,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Mode {
    #[default]
    Normal,
    Filter,
    Palette(PaletteState),
    Confirm(Confirm),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exit {
    Quit,
    /// Leave the dashboard and hand this path to the invoking shell.
    Go(PathBuf),
}

/// Everything known before the first background result arrives.
#[derive(Debug, Clone)]
pub struct Seed {
    pub root: PathBuf,
    pub outline: Vec<RepoOutline>,
    pub here: Option<(String, String)>,
    pub identity: Option<String>,
    pub cached_prs: HashMap<String, Vec<Pr>>,
    /// repo -> capsule -> branch, from the previous session.
    pub branch_hints: HashMap<String, HashMap<String, String>>,
    pub in_tmux: bool,
    pub detail_delay: Duration,
}

impl Seed {
    pub fn new(root: PathBuf, outline: Vec<RepoOutline>) -> Self {
        Seed {
            root,
            outline,
            here: None,
            identity: None,
            cached_prs: HashMap::new(),
            branch_hints: HashMap::new(),
            in_tmux: false,
            detail_delay: DEFAULT_DETAIL_DELAY,
        }
    }
}

#[derive(Debug)]
pub struct App {
    pub root: PathBuf,
    pub rows: Vec<Row>,
    pub repos: Vec<RepoData>,
    pub cursor: usize,
    pub filter: String,
    pub presets: Presets,
    pub identity: Option<String>,

    pub detail: DetailData,
    pub detail_seq: u64,
    pub detail_delay: Duration,
    focused: Option<(usize, RowKey)>,

    /// Capsule rows whose status has arrived, out of `total`.
    pub loaded: usize,
    pub total: usize,
    pub pr_errors: usize,

    pub windows: HashMap<String, String>,
    pub in_tmux: bool,

    pub mode: Mode,
    pub busy: Option<String>,
    pub flash: Option<String>,
    pub exit: Option<Exit>,
}

impl App {
    pub fn new(mut seed: Seed) -> (App, Vec<Task>) {
        let (rows, mut repos) = outline::build(&seed.outline);
        for data in &mut repos {
            if let Some(hints) = seed.branch_hints.remove(&data.name) {
                data.branch_hints = hints;
            }
        }
        let cursor = outline::initial_cursor(&rows, seed.here.as_ref());

        let mut app = App {
            root: seed.root,
            rows,
            repos,
            cursor,
            filter: String::new(),
            presets: Presets::default(),
            identity: seed.identity,
            detail: DetailData::default(),
            detail_seq: 0,
            detail_delay: seed.detail_delay,
            focused: None,
            loaded: 0,
            total: 0,
            pr_errors: 0,
            windows: HashMap::new(),
            in_tmux: seed.in_tmux,
            mode: Mode::Normal,
            busy: None,
            flash: None,
            exit: None,
        };
        app.total = app.capsule_count();

        // Cached PR lists render immediately but stay non-authoritative.
        for (repo, prs) in seed.cached_prs {
            let Some(data) = app.repo_mut(&repo) else {
                continue;
            };
            if data.error.is_some() {
                continue;
            }
            data.set_prs(prs, false);
            app.rematch(&repo);
        }

        let mut tasks = app.dispatch_all();
        tasks.extend(app.refocus());
        (app, tasks)
    }

    pub fn update(&mut self, msg: Msg) -> Vec<Task> {
        let mut tasks = match msg {
            Msg::Status {
                repo,
                capsule,
                result,
            } => self.on_status(repo, capsule, result),
            Msg::PrList { repo, result } => self.on_pr_list(repo, result),
            Msg::Merged { repo, result } => self.on_merged(repo, result),
            Msg::Identity { login } => self.on_identity(login),
            Msg::Windows { result } => self.on_windows(result),
            Msg::DetailTick { seq } => self.on_detail_tick(seq),
            Msg::Detail { index, seq, data } => self.on_detail(index, seq, data),
            Msg::Removed {
                repo,
                capsule,
                result,
            } => self.on_removed(repo, capsule, result),
            Msg::Created {
                repo,
                branch,
                result,
            } => self.on_created(repo, branch, result),
            Msg::Swept { removed, outline } => self.on_swept(removed, outline),
            Msg::Opened { result } => {
                if let Err(e) = result {
                    self.flash = Some(format!("open failed: {e}"));
                }
                Vec::new()
            }
            Msg::Action(action) => self.on_action(action),
        };
        tasks.extend(self.refocus());
        tasks
    }

    /// One status task per capsule, PR list and merged set per healthy repo,
    /// then the two global queries.
    pub fn dispatch_all(&self) -> Vec<Task> {
        let mut tasks = Vec::new();
        for data in self.repos.iter().filter(|d| d.error.is_none()) {
            for capsule in &data.capsules {
                tasks.push(Task::Status {
                    repo: data.name.clone(),
                    capsule: capsule.clone(),
                    path: self.capsule_path(&data.name, capsule),
                });
            }
            tasks.push(Task::PrList {
                repo: data.name.clone(),
            });
            tasks.push(Task::Merged {
                repo: data.name.clone(),
            });
        }
        tasks.push(Task::Identity);
        tasks.push(Task::Windows);
        tasks
    }

    /// Discards the row model and builds a fresh one from `outline`.
    pub(crate) fn rebuild(&mut self, outline: Vec<RepoOutline>) -> Vec<Task> {
        let key = self.cursor_key();
        let (rows, mut repos) = outline::build(&outline);
        for data in &mut repos {
            if let Some(old) = self.repo(&data.name) {
                data.prs = old.prs.clone();
                data.pr_order = old.pr_order.clone();
                data.merged = old.merged.clone();
                data.branch_hints = old.branch_hints.clone();
            }
        }
        self.rows = rows;
        self.repos = repos;
        self.total = self.capsule_count();
        self.loaded = 0;
        self.mode = Mode::Normal;

        let names: Vec<String> = self.repos.iter().map(|d| d.name.clone()).collect();
        for name in &names {
            self.rematch(name);
        }
        self.restore_cursor(key, outline::initial_cursor(&self.rows, None));
        self.dispatch_all()
    }

    /// Starts a new debounce window whenever the focused row changes.
    fn refocus(&mut self) -> Vec<Task> {
        let now = self.rows.get(self.cursor).map(|r| (self.cursor, r.key()));
        if now == self.focused {
            return Vec::new();
        }
        self.focused = now;
        self.detail = DetailData::default();
        self.detail_seq += 1;
        if self.focused.is_none() {
            return Vec::new();
        }
        vec![Task::DetailTimer {
            seq: self.detail_seq,
            delay: self.detail_delay,
        }]
    }

    pub fn capsule_path(&self, repo: &str, capsule: &str) -> PathBuf {
        self.root.join(repo).join(capsule)
    }

    pub fn repo(&self, name: &str) -> Option<&RepoData> {
        self.repos.iter().find(|d| d.name == name)
    }

    pub fn repo_mut(&mut self, name: &str) -> Option<&mut RepoData> {
        self.repos.iter_mut().find(|d| d.name == name)
    }

    pub fn current_row(&self) -> Option<&Row> {
        self.rows.get(self.cursor)
    }

    pub fn cursor_key(&self) -> Option<RowKey> {
        self.current_row().map(Row::key)
    }

    /// Exact-identity lookup.
    pub fn find(&self, key: &RowKey) -> Option<usize> {
        self.rows.iter().position(|r| &r.key() == key)
    }

    fn capsule_count(&self) -> usize {
        self.rows
            .iter()
            .filter(|r| matches!(r, Row::Capsule(_)))
            .count()
    }

    /// Puts the cursor back on the row `key` names, or near `fallback`.
    pub(crate) fn restore_cursor(&mut self, key: Option<RowKey>, fallback: usize) {
        if let Some(key) = key {
            if let Some(i) = self.rows.iter().position(|r| r.answers_to(&key)) {
                self.cursor = i;
                self.snap_cursor();
                return;
            }
        }
        self.cursor = fallback.min(self.rows.len().saturating_sub(1));
        self.snap_cursor();
    }
}
