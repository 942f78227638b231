//! Blocking git subprocess calls. Run these off the UI loop.

use crate::error::{Error, Result};
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitStatus {
    pub branch: String,
    pub dirty: bool,
    pub ahead: u32,
    pub behind: u32,
}

fn git(dir: &Path, args: &[&str]) -> Result<String> {
    let out = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .map_err(|source| Error::Spawn {
            program: "git",
            source,
        })?;
    if !out.status.success() {
        return Err(Error::Git {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&out.stdout).to_string())
}

/// Parses `git status --porcelain=v2 --branch`.
pub fn parse_status_v2(out: &str) -> GitStatus {
    let mut status = GitStatus::default();
    for line in out.lines() {
        if let Some(head) = line.strip_prefix("# branch.head ") {
            if head != "(detached)" {
                status.branch = head.to_string();
            }
        } else if let Some(ab) = line.strip_prefix("# branch.ab ") {
            for part in ab.split_whitespace() {
                if let Some(n) = part.strip_prefix('+') {
                    status.ahead = n.parse().unwrap_or(0);
                } else if let Some(n) = part.strip_prefix('-') {
                    status.behind = n.parse().unwrap_or(0);
                }
            }
        } else if !line.starts_with('#') && !line.trim().is_empty() {
            status.dirty = true;
        }
    }
    status
}

pub fn status(capsule: &Path) -> Result<GitStatus> {
    git(capsule, &["status", "--porcelain=v2", "--branch"]).map(|s| parse_status_v2(&s))
}

/// Local branches merged into `base`, queried from the ground capsule.
pub fn merged_branches(ground: &Path, base: &str) -> Result<Vec<String>> {
    let out = git(
        ground,
        &["branch", "--format=%(refname:short)", "--merged", base],
    )?;
    Ok(out
        .lines()
        .map(str::trim)
        .filter(|b| !b.is_empty() && *b != base)
        .map(str::to_string)
        .collect())
}

pub fn recent_commits(capsule: &Path, n: usize) -> Result<Vec<String>> {
    let limit = n.to_string();
    let out = git(capsule, &["log", "-n", &limit, "--format=%h %s"])?;
    Ok(out.lines().map(str::to_string).collect())
}

/// Summary line of `git diff --stat base...HEAD`.
pub fn diff_stat(capsule: &Path, base: &str) -> Result<String> {
    let range = format!("{base}...HEAD");
    let out = git(capsule, &["diff", "--stat", &range])?;
    Ok(out.lines().last().unwrap_or("").trim().to_string())
}

pub fn stash_count(capsule: &Path) -> Result<usize> {
    Ok(git(capsule, &["stash", "list"])?.lines().count())
}

pub fn last_commit_unix(capsule: &Path) -> Result<i64> {
    let out = git(capsule, &["log", "-1", "--format=%ct"])?;
    out.trim().parse().map_err(|_| Error::Git {
        args: "log -1 --format=%ct".to_string(),
        stderr: format!("unexpected output {:?}", out.trim()),
    })
}

pub fn origin_url(capsule: &Path) -> Result<String> {
    Ok(git(capsule, &["remote", "get-url", "origin"])?.trim().to_string())
}

/// `(owner, repo)` from an https or ssh GitHub remote.
pub fn parse_github_remote(url: &str) -> Option<(String, String)> {
    let rest = url
        .strip_prefix("git@github.com:")
        .or_else(|| url.strip_prefix("ssh://git@github.com/"))
        .or_else(|| url.strip_prefix("https://github.com/"))
        .or_else(|| url.strip_prefix("http://github.com/"))?;
    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let (owner, repo) = rest.split_once('/')?;
    if owner.is_empty() || repo.is_empty() || repo.contains('/') {
        return None;
    }
    Some((owner.to_string(), repo.to_string()))
}

/// Last path segment of `branch`, suffixed `-2`, `-3`... until it is free.
pub fn capsule_name_for(branch: &str, existing: &[String]) -> String {
    let base = branch
        .rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or("capsule");
    let base = base.trim_start_matches('.');
    let base = if base.is_empty() { "capsule" } else { base };
    if !existing.iter().any(|e| e == base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}-{n}"))
        .find(|candidate| !existing.iter().any(|e| e == candidate))
        .unwrap_or_else(|| base.to_string())
}

/// Checks out the remote `branch` as a new worktree `<repo_dir>/<name>`.
pub fn worktree_add(repo_dir: &Path, branch: &str, existing: &[String]) -> Result<String> {
    let ground = repo_dir.join(crate::model::GROUND);
    git(&ground, &["fetch", "origin", branch])?;
    let name = capsule_name_for(branch, existing);
    let target = repo_dir.join(&name);
    let target = target.to_string_lossy();
    let remote = format!("origin/{branch}");
    let local_exists = git(&ground, &["rev-parse", "--verify", "--quiet", branch]).is_ok();
    if local_exists {
        git(&ground, &["worktree", "add", &target, branch])?;
    } else {
        git(
            &ground,
            &["worktree", "add", "--track", "-b", branch, &target, &remote],
        )?;
    }
    tracing::info!(branch, capsule = %name, "worktree added");
    Ok(name)
}

pub fn worktree_remove(repo_dir: &Path, capsule: &Path) -> Result<()> {
    let ground = repo_dir.join(crate::model::GROUND);
    let target = capsule.to_string_lossy();
    git(&ground, &["worktree", "remove", &target])?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_branch_ahead_behind_and_dirty() {
        let out = "\
# branch.oid 1234abcd
# branch.head feat/auth
# branch.upstream origin/feat/auth
# branch.ab +2 -1
1 .M N... 100644 100644 100644 abc def src/lib.rs
";
        assert_eq!(
            parse_status_v2(out),
            GitStatus {
                branch: "feat/auth".into(),
                dirty: true,
                ahead: 2,
                behind: 1,
            }
        );
    }

    #[test]
    fn clean_detached_tree() {
        let out = "# branch.oid 1234\n# branch.head (detached)\n";
        assert_eq!(parse_status_v2(out), GitStatus::default());
    }

    #[test]
    fn untracked_files_count_as_dirty() {
        let out = "# branch.head main\n? notes.txt\n";
        let s = parse_status_v2(out);
        assert!(s.dirty);
        assert_eq!(s.branch, "main");
    }

    #[test]
    fn parses_github_remotes() {
        let want = Some(("acme".to_string(), "frontend".to_string()));
        assert_eq!(parse_github_remote("git@github.com:acme/frontend.git"), want);
        assert_eq!(parse_github_remote("https://github.com/acme/frontend"), want);
        assert_eq!(parse_github_remote("https://github.com/acme/frontend.git/"), want);
        assert_eq!(parse_github_remote("ssh://git@github.com/acme/frontend.git"), want);
        assert_eq!(parse_github_remote("https://gitlab.com/acme/frontend"), None);
        assert_eq!(parse_github_remote("https://github.com/acme"), None);
    }

    #[test]
    fn capsule_names_avoid_collisions() {
        let existing = vec![".ground".to_string(), "upgrade".to_string(), "upgrade-2".to_string()];
        assert_eq!(capsule_name_for("deps/upgrade", &existing), "upgrade-3");
        assert_eq!(capsule_name_for("feat-auth", &existing), "feat-auth");
        assert_eq!(capsule_name_for("release/", &existing), "release");
    }
}
