//! Cheap filesystem-only snapshot of the workspace, and the rows seeded from it.

use crate::board::Boarded;
use crate::model::{CapsuleRow, GROUND, RepoData, Row};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoOutline {
    pub name: String,
    /// Ground first, then lexical order.
    pub capsules: Vec<String>,
    pub boarded: Vec<String>,
    pub error: Option<String>,
}

fn list_dirs(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut out = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            out.push(entry.file_name().to_string_lossy().to_string());
        }
    }
    Ok(out)
}

fn order_capsules(mut names: Vec<String>) -> Vec<String> {
    names.retain(|n| n == GROUND || !n.starts_with('.'));
    names.sort_by(|a, b| (a != GROUND).cmp(&(b != GROUND)).then_with(|| a.cmp(b)));
    names
}

pub fn scan(root: &Path, boarded: &Boarded) -> Vec<RepoOutline> {
    let mut repos = match list_dirs(root) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(root = %root.display(), "cannot list workspace root: {e}");
            return Vec::new();
        }
    };
    repos.retain(|r| !r.starts_with('.'));
    repos.sort();

    repos
        .into_iter()
        .map(|name| match list_dirs(&root.join(&name)) {
            Ok(capsules) => {
                let capsules = order_capsules(capsules);
                let boarded = boarded
                    .for_repo(&name)
                    .into_iter()
                    .filter(|b| capsules.contains(b))
                    .collect();
                RepoOutline {
                    name,
                    capsules,
                    boarded,
                    error: None,
                }
            }
            Err(e) => RepoOutline {
                name,
                capsules: Vec::new(),
                boarded: Vec::new(),
                error: Some(e.to_string()),
            },
        })
        .collect()
}

/// One header per repo (even on error), then one capsule row per capsule.
pub fn build(outline: &[RepoOutline]) -> (Vec<Row>, Vec<RepoData>) {
    let mut rows = Vec::new();
    let mut repos = Vec::new();
    for repo in outline {
        rows.push(Row::Header {
            repo: repo.name.clone(),
        });
        let mut data = RepoData {
            name: repo.name.clone(),
            error: repo.error.clone(),
            ..RepoData::default()
        };
        if repo.error.is_none() {
            for capsule in &repo.capsules {
                let boarded = repo.boarded.contains(capsule);
                rows.push(Row::Capsule(CapsuleRow::new(&repo.name, capsule, boarded)));
            }
            data.capsules = repo.capsules.clone();
            data.boarded = repo.boarded.clone();
        }
        repos.push(data);
    }
    (rows, repos)
}

/// Resolves `cwd` (or an ancestor of it) to a `(repo, capsule)` pair under `root`.
pub fn locate(root: &Path, cwd: &Path) -> Option<(String, String)> {
    let rel = cwd.strip_prefix(root).ok()?;
    let mut parts = rel.components().map(|c| c.as_os_str().to_string_lossy().to_string());
    let repo = parts.next()?;
    let capsule = parts.next()?;
    Some((repo, capsule))
}

pub fn initial_cursor(rows: &[Row], here: Option<&(String, String)>) -> usize {
    if let Some((repo, capsule)) = here {
        let found = rows.iter().position(|r| match r {
            Row::Capsule(c) => &c.repo == repo && &c.name == capsule,
            _ => false,
        });
        if let Some(i) = found {
            return i;
        }
    }
    rows.iter().position(|r| !r.is_header()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mkdirs(root: &Path, paths: &[&str]) {
        for p in paths {
            std::fs::create_dir_all(root.join(p)).unwrap();
        }
    }

    #[test]
    fn scan_orders_ground_first_and_skips_hidden() {
        let dir = tempfile::tempdir().unwrap();
        mkdirs(
            dir.path(),
            &[
                "frontend/.ground",
                "frontend/zeta",
                "frontend/feat-auth",
                "frontend/.cache",
                "backend/.ground",
                ".mctl",
            ],
        );
        std::fs::write(dir.path().join("frontend").join("notes.txt"), "x").unwrap();

        let mut boarded = Boarded::default();
        boarded.set("frontend", "zeta", true);
        boarded.set("frontend", "gone", true);

        let outline = scan(dir.path(), &boarded);
        let names: Vec<&str> = outline.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["backend", "frontend"]);
        assert_eq!(outline[1].capsules, vec![".ground", "feat-auth", "zeta"]);
        assert_eq!(outline[1].boarded, vec!["zeta"]);
    }

    #[test]
    fn errored_repo_contributes_only_its_header() {
        let outline = vec![
            RepoOutline {
                name: "broken".into(),
                capsules: vec![],
                boarded: vec![],
                error: Some("permission denied".into()),
            },
            RepoOutline {
                name: "frontend".into(),
                capsules: vec![GROUND.into(), "feat-auth".into()],
                boarded: vec!["feat-auth".into()],
                error: None,
            },
        ];
        let (rows, repos) = build(&outline);
        assert_eq!(rows.len(), 4);
        assert!(rows[0].is_header());
        assert!(rows[1].is_header());
        match &rows[3] {
            Row::Capsule(c) => {
                assert_eq!(c.name, "feat-auth");
                assert!(c.boarded);
                assert!(!c.loaded);
            }
            other => panic!("unexpected row {other:?}"),
        }
        assert_eq!(repos[0].error.as_deref(), Some("permission denied"));
    }

    #[test]
    fn cursor_starts_at_invoking_capsule_or_first_row() {
        let outline = vec![RepoOutline {
            name: "frontend".into(),
            capsules: vec![GROUND.into(), "feat-auth".into()],
            boarded: vec![],
            error: None,
        }];
        let (rows, _) = build(&outline);
        let root = Path::new("/ws");
        let here = locate(root, Path::new("/ws/frontend/feat-auth/src/lib"));
        assert_eq!(here, Some(("frontend".into(), "feat-auth".into())));
        assert_eq!(initial_cursor(&rows, here.as_ref()), 2);
        assert_eq!(initial_cursor(&rows, None), 1);
        assert_eq!(locate(root, Path::new("/elsewhere")), None);
    }
}
