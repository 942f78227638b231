use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

pub fn in_session() -> bool {
    std::env::var_os("TMUX").is_some_and(|v| !v.is_empty())
}

/// Canonical window name for a capsule.
pub fn window_name(repo: &str, capsule: &str) -> String {
    format!("{repo}/{capsule}")
}

fn tmux(args: &[&str]) -> Result<String> {
    let out = Command::new("tmux")
        .args(args)
        .output()
        .map_err(|source| Error::Spawn {
            program: "tmux",
            source,
        })?;
    if !out.status.success() {
        return Err(Error::Tmux {
            args: args.join(" "),
            stderr: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&out.stdout).to_string())
}

/// Lines of `#{window_name}\t#{window_id}`; a later duplicate name wins.
pub fn parse_windows(out: &str) -> HashMap<String, String> {
    out.lines()
        .filter_map(|line| line.split_once('\t'))
        .filter(|(name, id)| !name.is_empty() && !id.is_empty())
        .map(|(name, id)| (name.to_string(), id.trim().to_string()))
        .collect()
}

pub fn list_windows() -> Result<HashMap<String, String>> {
    tmux(&["list-windows", "-F", "#{window_name}\t#{window_id}"]).map(|s| parse_windows(&s))
}

pub fn select_window(id: &str) -> Result<()> {
    tmux(&["select-window", "-t", id]).map(|_| ())
}

/// Creates a window and returns its id.
pub fn new_window(name: &str, path: &Path) -> Result<String> {
    let dir = path.to_string_lossy();
    tmux(&["new-window", "-P", "-F", "#{window_id}", "-n", name, "-c", &dir])
        .map(|id| id.trim().to_string())
}

fn split_args<'a>(target: &'a str, dir: &'a str) -> [&'a str; 6] {
    ["split-window", "-h", "-t", target, "-c", dir]
}

/// Adds a second pane beside the first, in the same directory.
pub fn split_window(target: &str, path: &Path) -> Result<()> {
    let dir = path.to_string_lossy();
    tmux(&split_args(target, &dir)).map(|_| ())
}

pub fn kill_window(id: &str) -> Result<()> {
    tmux(&["kill-window", "-t", id]).map(|_| ())
}

/// Selects the known window, or creates one when it is gone.
pub fn open(name: &str, path: &Path, window: Option<&str>, split: bool) -> Result<()> {
    if let Some(id) = window {
        match select_window(id) {
            Ok(()) => return Ok(()),
            Err(e) => tracing::debug!(window = id, "select failed, creating a new window: {e}"),
        }
    }
    let id = new_window(name, path)?;
    if split && !id.is_empty() {
        split_window(&id, path)?;
    }
    Ok(())
}
