//! Configuration file support for mctl.
//!
//! Loads settings from `~/.config/mctl/config.toml` (or platform equivalent).
//! CLI arguments take precedence over config file values.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

/// Per-repository overrides, `[repos.<name>]`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RepoConfig {
    /// GitHub owner for this repo.
    pub org: Option<String>,
    pub base_branch: Option<String>,
}

/// Configuration loaded from TOML file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Workspace root holding one directory per repository.
    pub root: Option<PathBuf>,

    /// GitHub owner used when a repo has no override.
    pub org: Option<String>,

    /// Branch capsules are compared and merged against. Default: main.
    pub base_branch: Option<String>,

    /// Delay before fetching detail for the focused row. Default: 200.
    pub detail_delay_ms: Option<u64>,

    /// Days without commits before a clean capsule counts as abandoned. Default: 30.
    pub inactive_days: Option<u64>,

    /// Open capsules in tmux windows when running inside tmux. Default: true.
    pub tmux: Option<bool>,

    /// Split a newly created capsule window into two side-by-side panes. Default: false.
    pub split_panes: Option<bool>,

    pub repos: HashMap<String, RepoConfig>,
}

/// Values given on the command line; `None` defers to the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub root: Option<PathBuf>,
    pub org: Option<String>,
    pub base_branch: Option<String>,
    pub no_tmux: bool,
}

/// Effective settings after merging defaults, config file and CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub root: PathBuf,
    pub org: Option<String>,
    pub base_branch: String,
    pub detail_delay: Duration,
    pub inactive_days: u64,
    pub tmux: bool,
    pub split_panes: bool,
    pub repos: HashMap<String, RepoConfig>,
}

pub const DEFAULT_BASE_BRANCH: &str = "main";
pub const DEFAULT_INACTIVE_DAYS: u64 = 30;
const DEFAULT_DETAIL_DELAY_MS: u64 = 200;

impl Settings {
    pub fn resolve(config: Config, cli: Overrides) -> Settings {
        let root = cli
            .root
            .or(config.root)
            .map(expand_home)
            .unwrap_or_else(default_root);
        Settings {
            root,
            org: cli.org.or(config.org),
            base_branch: cli
                .base_branch
                .or(config.base_branch)
                .unwrap_or_else(|| DEFAULT_BASE_BRANCH.to_string()),
            detail_delay: Duration::from_millis(
                config.detail_delay_ms.unwrap_or(DEFAULT_DETAIL_DELAY_MS),
            ),
            inactive_days: config.inactive_days.unwrap_or(DEFAULT_INACTIVE_DAYS),
            tmux: !cli.no_tmux && config.tmux.unwrap_or(true),
            split_panes: config.split_panes.unwrap_or(false),
            repos: config.repos,
        }
    }

    /// Explicit owner for `repo`, if configured.
    pub fn org_for(&self, repo: &str) -> Option<&str> {
        self.repos
            .get(repo)
            .and_then(|r| r.org.as_deref())
            .or(self.org.as_deref())
    }

    pub fn base_branch_for(&self, repo: &str) -> &str {
        self.repos
            .get(repo)
            .and_then(|r| r.base_branch.as_deref())
            .unwrap_or(&self.base_branch)
    }

    /// Human-readable dump for `--print-config`.
    pub fn describe(&self) -> String {
        let mut out = format!(
            "root = {}\norg = {}\nbase_branch = {}\ndetail_delay_ms = {}\ninactive_days = {}\ntmux = {}\nsplit_panes = {}\n",
            self.root.display(),
            self.org.as_deref().unwrap_or("(from origin remote)"),
            self.base_branch,
            self.detail_delay.as_millis(),
            self.inactive_days,
            self.tmux,
            self.split_panes,
        );
        let mut names: Vec<&String> = self.repos.keys().collect();
        names.sort();
        for name in names {
            out.push_str(&format!(
                "[repos.{name}] org = {} base_branch = {}\n",
                self.org_for(name).unwrap_or("-"),
                self.base_branch_for(name),
            ));
        }
        out
    }
}

fn expand_home(path: PathBuf) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map(|h| h.join(rest)).unwrap_or(path),
        Err(_) => path,
    }
}

fn default_root() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join("mission"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the path to the config file.
/// Platform-specific: `~/.config/mctl/config.toml` on Linux,
/// `%APPDATA%\mctl\config.toml` on Windows.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("mctl").join("config.toml"))
}

/// Load configuration from the config file.
/// Returns default config if the file doesn't exist or can't be parsed.
pub fn load_config() -> Config {
    let Some(path) = config_path() else {
        return Config::default();
    };

    if !path.exists() {
        return Config::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                eprintln!(
                    "Warning: Failed to parse config file at {}: {}",
                    path.display(),
                    e
                );
                Config::default()
            }
        },
        Err(e) => {
            eprintln!(
                "Warning: Failed to read config file at {}: {}",
                path.display(),
                e
            );
            Config::default()
        }
    }
}
