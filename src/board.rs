//! Persisted boarded set and the IDE workspace file derived from it.
//!
//! The boarded set lives in `<root>/.mctl/boarded.toml`; every change
//! regenerates `<root>/mission.code-workspace`.

use crate::error::{Error, Result};
use crate::model::GROUND;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Boarded {
    pub boarded: BTreeMap<String, Vec<String>>,
}

impl Boarded {
    pub fn for_repo(&self, repo: &str) -> Vec<String> {
        self.boarded.get(repo).cloned().unwrap_or_default()
    }

    pub fn contains(&self, repo: &str, capsule: &str) -> bool {
        self.boarded
            .get(repo)
            .is_some_and(|v| v.iter().any(|c| c == capsule))
    }

    /// Returns whether the set changed.
    pub fn set(&mut self, repo: &str, capsule: &str, on: bool) -> bool {
        let entry = self.boarded.entry(repo.to_string()).or_default();
        let present = entry.iter().any(|c| c == capsule);
        let changed = match (on, present) {
            (true, false) => {
                entry.push(capsule.to_string());
                entry.sort();
                true
            }
            (false, true) => {
                entry.retain(|c| c != capsule);
                true
            }
            _ => false,
        };
        if entry.is_empty() {
            self.boarded.remove(repo);
        }
        changed
    }
}

pub fn board_path(root: &Path) -> PathBuf {
    root.join(".mctl").join("boarded.toml")
}

pub fn workspace_file_path(root: &Path) -> PathBuf {
    root.join("mission.code-workspace")
}

pub fn load_boarded(root: &Path) -> Result<Boarded> {
    let path = board_path(root);
    if !path.exists() {
        return Ok(Boarded::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| Error::io(&path, e))?;
    toml::from_str(&contents).map_err(|source| Error::Toml { path, source })
}

pub fn save_boarded(root: &Path, boarded: &Boarded) -> Result<()> {
    let path = board_path(root);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    let contents = toml::to_string_pretty(boarded)?;
    std::fs::write(&path, contents).map_err(|e| Error::io(&path, e))
}

/// Toggle one capsule and regenerate the IDE file.
pub fn set_boarded(root: &Path, repo: &str, capsule: &str, on: bool) -> Result<()> {
    let mut boarded = load_boarded(root)?;
    if boarded.set(repo, capsule, on) {
        save_boarded(root, &boarded)?;
    }
    write_workspace_file(root, &boarded)
}

#[derive(Debug, Serialize)]
struct WorkspaceFolder {
    name: String,
    path: String,
}

#[derive(Debug, Serialize)]
struct WorkspaceFile {
    folders: Vec<WorkspaceFolder>,
}

/// Every repo's ground capsule plus each boarded capsule.
pub fn write_workspace_file(root: &Path, boarded: &Boarded) -> Result<()> {
    let mut repos: Vec<String> = Vec::new();
    let entries = std::fs::read_dir(root).map_err(|e| Error::io(root, e))?;
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || !entry.path().join(GROUND).is_dir() {
            continue;
        }
        repos.push(name);
    }
    repos.sort();

    let mut folders = Vec::new();
    for repo in &repos {
        folders.push(WorkspaceFolder {
            name: repo.clone(),
            path: format!("{repo}/{GROUND}"),
        });
        for capsule in boarded.for_repo(repo) {
            folders.push(WorkspaceFolder {
                name: format!("{repo}/{capsule}"),
                path: format!("{repo}/{capsule}"),
            });
        }
    }

    let path = workspace_file_path(root);
    let json = serde_json::to_string_pretty(&WorkspaceFile { folders })?;
    std::fs::write(&path, json).map_err(|e| Error::io(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_nothing_boarded() {
        let dir = tempfile::tempdir().unwrap();
        let b = load_boarded(dir.path()).unwrap();
        assert!(b.boarded.is_empty());
    }

    #[test]
    fn set_boarded_persists_and_writes_workspace_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("frontend").join(GROUND)).unwrap();
        std::fs::create_dir_all(dir.path().join("frontend").join("feat-auth")).unwrap();

        set_boarded(dir.path(), "frontend", "feat-auth", true).unwrap();
        let b = load_boarded(dir.path()).unwrap();
        assert!(b.contains("frontend", "feat-auth"));

        let ws = std::fs::read_to_string(workspace_file_path(dir.path())).unwrap();
        let v: serde_json::Value = serde_json::from_str(&ws).unwrap();
        let paths: Vec<&str> = v["folders"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["path"].as_str().unwrap())
            .collect();
        assert_eq!(paths, vec!["frontend/.ground", "frontend/feat-auth"]);

        set_boarded(dir.path(), "frontend", "feat-auth", false).unwrap();
        let b = load_boarded(dir.path()).unwrap();
        assert!(!b.contains("frontend", "feat-auth"));
        assert!(b.boarded.is_empty());
    }

    #[test]
    fn set_reports_changes_only() {
        let mut b = Boarded::default();
        assert!(b.set("r", "a", true));
        assert!(!b.set("r", "a", true));
        assert!(b.set("r", "a", false));
        assert!(!b.set("r", "a", false));
    }
}
