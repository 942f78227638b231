use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Directory name of the capsule that tracks a repo's default branch.
pub const GROUND: &str = ".ground";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CiState {
    Success,
    Failure,
    Running,
    None,
}

impl CiState {
    pub fn glyph(&self) -> &'static str {
        match self {
            CiState::Success => "✓",
            CiState::Failure => "✗",
            CiState::Running => "●",
            CiState::None => " ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Required,
    None,
}

impl ReviewState {
    pub fn from_decision(s: Option<&str>) -> Self {
        match s {
            Some("APPROVED") => ReviewState::Approved,
            Some("CHANGES_REQUESTED") => ReviewState::ChangesRequested,
            Some("REVIEW_REQUIRED") => ReviewState::Required,
            _ => ReviewState::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::Approved => "approved",
            ReviewState::ChangesRequested => "changes",
            ReviewState::Required => "review",
            ReviewState::None => "",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiCheckState {
    Success,
    Failure,
    Running,
    Neutral,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CiCheck {
    pub name: String,
    pub state: CiCheckState,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pr {
    pub number: i64,
    pub title: String,
    /// Head branch name.
    pub branch: String,
    pub state: String,
    pub review: ReviewState,
    pub ci: CiState,
    pub url: String,
    pub author: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapsuleRow {
    pub repo: String,
    pub name: String,
    /// Empty until the first status result arrives.
    pub branch: String,
    pub dirty: bool,
    pub ahead: u32,
    pub behind: u32,
    pub loaded: bool,
    pub boarded: bool,
    pub merged: bool,
    pub live: bool,
    pub pr: Option<Pr>,
}

impl CapsuleRow {
    pub fn new(repo: &str, name: &str, boarded: bool) -> Self {
        CapsuleRow {
            repo: repo.to_string(),
            name: name.to_string(),
            branch: String::new(),
            dirty: false,
            ahead: 0,
            behind: 0,
            loaded: false,
            boarded,
            merged: false,
            live: false,
            pr: None,
        }
    }

    pub fn is_ground(&self) -> bool {
        self.name == GROUND
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GhostRow {
    pub repo: String,
    pub branch: String,
    pub pr: Pr,
    pub loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row {
    Header { repo: String },
    Capsule(CapsuleRow),
    Ghost(GhostRow),
}

/// Stable identity of a row, independent of its index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowKey {
    Header(String),
    Capsule(String, String),
    Ghost(String, String),
}

impl Row {
    pub fn repo(&self) -> &str {
        match self {
            Row::Header { repo } => repo,
            Row::Capsule(c) => &c.repo,
            Row::Ghost(g) => &g.repo,
        }
    }

    pub fn is_header(&self) -> bool {
        matches!(self, Row::Header { .. })
    }

    pub fn key(&self) -> RowKey {
        match self {
            Row::Header { repo } => RowKey::Header(repo.clone()),
            Row::Capsule(c) => RowKey::Capsule(c.repo.clone(), c.name.clone()),
            Row::Ghost(g) => RowKey::Ghost(g.repo.clone(), g.branch.clone()),
        }
    }

    /// Whether this row stands for `key`. A ghost key also resolves to the
    /// capsule that took over its branch.
    pub fn answers_to(&self, key: &RowKey) -> bool {
        match (self, key) {
            (Row::Capsule(c), RowKey::Ghost(repo, branch)) => {
                &c.repo == repo
                    && (&c.branch == branch || c.pr.as_ref().is_some_and(|p| &p.branch == branch))
            }
            _ => &self.key() == key,
        }
    }

    pub fn pr(&self) -> Option<&Pr> {
        match self {
            Row::Header { .. } => None,
            Row::Capsule(c) => c.pr.as_ref(),
            Row::Ghost(g) => Some(&g.pr),
        }
    }

    /// Text the free-text filter is matched against.
    pub fn label(&self) -> &str {
        match self {
            Row::Header { repo } => repo,
            Row::Capsule(c) if c.branch.is_empty() => &c.name,
            Row::Capsule(c) => &c.branch,
            Row::Ghost(g) => &g.branch,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RepoData {
    pub name: String,
    pub capsules: Vec<String>,
    pub boarded: Vec<String>,
    /// Keyed by head branch; rebuilt wholesale on every PR refresh.
    pub prs: HashMap<String, Pr>,
    /// Branches of `prs` in PR-list order.
    pub pr_order: Vec<String>,
    pub prs_loaded: bool,
    pub merged: HashSet<String>,
    /// Cached capsule -> branch mapping from an earlier session.
    pub branch_hints: HashMap<String, String>,
    pub error: Option<String>,
}

impl RepoData {
    pub fn set_prs(&mut self, prs: Vec<Pr>, loaded: bool) {
        self.prs.clear();
        self.pr_order.clear();
        for pr in prs {
            if !self.prs.contains_key(&pr.branch) {
                self.pr_order.push(pr.branch.clone());
            }
            self.prs.insert(pr.branch.clone(), pr);
        }
        self.prs_loaded = loaded;
    }

    pub fn prs_in_order(&self) -> impl Iterator<Item = &Pr> {
        self.pr_order.iter().filter_map(|b| self.prs.get(b))
    }

    /// PR on the capsule's branch, or on its cached hint while unknown.
    pub fn branch_match(&self, capsule: &CapsuleRow) -> Option<&Pr> {
        let branch = if capsule.branch.is_empty() {
            self.branch_hints.get(&capsule.name)?
        } else {
            &capsule.branch
        };
        self.prs.get(branch)
    }

    /// Fallback for capsules named after a PR branch they are not on.
    pub fn name_match(&self, capsule: &CapsuleRow) -> Option<&Pr> {
        self.prs.get(&capsule.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowRun {
    pub name: String,
    pub status: String,
    pub conclusion: Option<String>,
    pub url: String,
}

/// Tier-2 content for the focused row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailData {
    pub row: Option<usize>,
    pub commits: Vec<String>,
    pub diff_stat: String,
    pub stash_count: usize,
    pub pr_title: String,
    pub pr_body: String,
    pub checks: Vec<CiCheck>,
    pub merged_history: Vec<String>,
    pub runs: Vec<WorkflowRun>,
    pub loaded: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::pr;

    #[test]
    fn branch_match_ignores_capsule_name() {
        let mut data = RepoData::default();
        data.set_prs(vec![pr(1, "feat/a", "me"), pr(2, "wt", "me")], true);

        let mut c = CapsuleRow::new("r", "wt", false);
        assert_eq!(data.branch_match(&c), None);
        assert_eq!(data.name_match(&c).map(|p| p.number), Some(2));

        c.branch = "feat/a".to_string();
        assert_eq!(data.branch_match(&c).map(|p| p.number), Some(1));
    }

    #[test]
    fn branch_match_uses_hint_while_branch_unknown() {
        let mut data = RepoData::default();
        data.set_prs(vec![pr(7, "deps/upgrade", "bot")], false);
        data.branch_hints
            .insert("upgrade".to_string(), "deps/upgrade".to_string());
        let c = CapsuleRow::new("r", "upgrade", false);
        assert_eq!(data.branch_match(&c).map(|p| p.number), Some(7));
    }

    #[test]
    fn set_prs_keeps_list_order_and_dedupes_branches() {
        let mut data = RepoData::default();
        data.set_prs(vec![pr(3, "b", "x"), pr(1, "a", "x"), pr(4, "b", "y")], true);
        let order: Vec<i64> = data.prs_in_order().map(|p| p.number).collect();
        assert_eq!(order, vec![4, 1]);
    }

    #[test]
    fn ghost_key_resolves_to_promoted_capsule() {
        let mut c = CapsuleRow::new("r", "upgrade", false);
        c.pr = Some(pr(7, "deps/upgrade", "bot"));
        let row = Row::Capsule(c);
        assert!(row.answers_to(&RowKey::Ghost("r".into(), "deps/upgrade".into())));
        assert!(!row.answers_to(&RowKey::Ghost("other".into(), "deps/upgrade".into())));
    }
}
