//! Messages consumed by the dashboard loop and the deferred work it asks for.
//!
//! Every [`Task`] runs off the loop and produces at most one [`Msg`] back.

use crate::filter::Preset;
use crate::git::GitStatus;
use crate::model::{DetailData, Pr};
use crate::outline::RepoOutline;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Up,
    Down,
    First,
    Last,
    Open,
    OpenPr,
    Board,
    Unboard,
    ToggleBoard,
    Delete,
    Confirm,
    Cancel,
    CreateFromGhost,
    Refresh,
    TogglePreset(Preset),
    ClearPresets,
    StartFilter,
    FilterChar(char),
    FilterBackspace,
    ClearFilter,
    EndFilter,
    OpenPalette,
    PaletteChar(char),
    PaletteBackspace,
    PaletteUp,
    PaletteDown,
    PaletteRun,
    ClosePalette,
    Quit,
}

#[derive(Debug, Clone)]
pub enum Msg {
    Status {
        repo: String,
        capsule: String,
        result: Result<GitStatus, String>,
    },
    PrList {
        repo: String,
        result: Result<Vec<Pr>, String>,
    },
    Merged {
        repo: String,
        result: Result<Vec<String>, String>,
    },
    /// Empty when the login could not be resolved.
    Identity { login: String },
    /// Canonical window name -> window handle.
    Windows {
        result: Result<HashMap<String, String>, String>,
    },
    DetailTick { seq: u64 },
    Detail {
        index: usize,
        seq: u64,
        data: DetailData,
    },
    Removed {
        repo: String,
        capsule: String,
        result: Result<(), String>,
    },
    Created {
        repo: String,
        branch: String,
        result: Result<String, String>,
    },
    Swept {
        removed: Vec<(String, String)>,
        outline: Vec<RepoOutline>,
    },
    Opened { result: Result<(), String> },
    Action(Action),
}

/// What the detail fetch needs to know about the focused row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailTarget {
    pub repo: String,
    pub capsule: Option<PathBuf>,
    pub branch: String,
    pub pr: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Task {
    Status {
        repo: String,
        capsule: String,
        path: PathBuf,
    },
    PrList { repo: String },
    Merged { repo: String },
    Identity,
    Windows,
    DetailTimer { seq: u64, delay: Duration },
    Detail {
        index: usize,
        seq: u64,
        target: DetailTarget,
    },
    Remove {
        repo: String,
        capsule: String,
        path: PathBuf,
        window: Option<String>,
    },
    Create { repo: String, branch: String },
    Sweep,
    OpenWindow {
        name: String,
        path: PathBuf,
        window: Option<String>,
    },
    OpenUrl(String),
    Board {
        repo: String,
        capsule: String,
        on: bool,
    },
    CacheBranch {
        repo: String,
        capsule: String,
        branch: String,
    },
    CachePrs { repo: String, prs: Vec<Pr> },
    CacheLogin(String),
}
