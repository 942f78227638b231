//! Fixtures shared by the unit tests.

use crate::app::{App, Seed};
use crate::model::{CiState, Pr, ReviewState};
use crate::msg::Task;
use crate::outline::RepoOutline;
use std::path::PathBuf;

pub fn pr(number: i64, branch: &str, author: &str) -> Pr {
    Pr {
        number,
        title: format!("PR {number}"),
        branch: branch.to_string(),
        state: "OPEN".to_string(),
        review: ReviewState::None,
        ci: CiState::None,
        url: format!("https://github.com/acme/repo/pull/{number}"),
        author: author.to_string(),
    }
}

pub fn outline(repos: &[(&str, &[&str])]) -> Vec<RepoOutline> {
    repos
        .iter()
        .map(|(name, capsules)| RepoOutline {
            name: name.to_string(),
            capsules: capsules.iter().map(|c| c.to_string()).collect(),
            boarded: Vec::new(),
            error: None,
        })
        .collect()
}

pub fn seed(repos: &[(&str, &[&str])]) -> Seed {
    Seed::new(PathBuf::from("/ws"), outline(repos))
}

pub fn app_with(repos: &[(&str, &[&str])]) -> App {
    App::new(seed(repos)).0
}

pub fn app_and_tasks(repos: &[(&str, &[&str])]) -> (App, Vec<Task>) {
    App::new(seed(repos))
}
