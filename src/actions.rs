//! User-triggered operations on the row model.

use crate::app::{App, Confirm, Exit, Mode};
use crate::model::{CapsuleRow, Row, RowKey};
use crate::msg::{Action, Task};
use crate::outline::RepoOutline;
use crate::palette::PaletteState;
use crate::tmux;

impl App {
    pub(crate) fn on_action(&mut self, action: Action) -> Vec<Task> {
        match action {
            Action::Up => {
                self.step(-1);
                Vec::new()
            }
            Action::Down => {
                self.step(1);
                Vec::new()
            }
            Action::First => {
                self.jump_first();
                Vec::new()
            }
            Action::Last => {
                self.jump_last();
                Vec::new()
            }
            Action::Open => self.open(),
            Action::OpenPr => match self.current_row().and_then(Row::pr) {
                Some(pr) => vec![Task::OpenUrl(pr.url.clone())],
                None => Vec::new(),
            },
            Action::Board => self.set_board(true),
            Action::Unboard => self.set_board(false),
            Action::ToggleBoard => match self.current_row() {
                Some(Row::Capsule(c)) => {
                    let on = !c.boarded;
                    self.set_board(on)
                }
                _ => Vec::new(),
            },
            Action::Delete => {
                self.request_delete();
                Vec::new()
            }
            Action::Confirm => self.confirm(),
            Action::Cancel => {
                if matches!(self.mode, Mode::Confirm(_)) {
                    self.mode = Mode::Normal;
                }
                Vec::new()
            }
            Action::CreateFromGhost => self.create_from_ghost(),
            Action::Refresh => {
                if self.refuse_if_busy() {
                    return Vec::new();
                }
                self.busy = Some("sweeping abandoned capsules".to_string());
                vec![Task::Sweep]
            }
            Action::TogglePreset(p) => {
                self.presets.toggle(p);
                self.snap_cursor();
                Vec::new()
            }
            Action::ClearPresets => {
                self.presets.clear();
                self.snap_cursor();
                Vec::new()
            }
            Action::StartFilter => {
                self.mode = Mode::Filter;
                Vec::new()
            }
            Action::FilterChar(ch) => {
                self.filter.push(ch);
                self.snap_cursor();
                Vec::new()
            }
            Action::FilterBackspace => {
                self.filter.pop();
                self.snap_cursor();
                Vec::new()
            }
            Action::ClearFilter => {
                self.filter.clear();
                self.mode = Mode::Normal;
                self.snap_cursor();
                Vec::new()
            }
            Action::EndFilter => {
                self.mode = Mode::Normal;
                Vec::new()
            }
            Action::OpenPalette => {
                self.mode = Mode::Palette(PaletteState::default());
                Vec::new()
            }
            Action::PaletteChar(_)
            | Action::PaletteBackspace
            | Action::PaletteUp
            | Action::PaletteDown
            | Action::PaletteRun
            | Action::ClosePalette => self.on_palette(action),
            Action::Quit => {
                self.exit = Some(Exit::Quit);
                Vec::new()
            }
        }
    }

    /// One long-running action at a time.
    fn refuse_if_busy(&mut self) -> bool {
        match &self.busy {
            Some(busy) => {
                self.flash = Some(format!("busy: {busy}"));
                true
            }
            None => false,
        }
    }

    fn open(&mut self) -> Vec<Task> {
        let (repo, name) = match self.current_row() {
            Some(Row::Capsule(c)) => (c.repo.clone(), c.name.clone()),
            Some(Row::Ghost(_)) => {
                self.flash = Some("no local capsule yet; create it first".to_string());
                return Vec::new();
            }
            _ => return Vec::new(),
        };
        let path = self.capsule_path(&repo, &name);
        if !self.in_tmux {
            self.exit = Some(Exit::Go(path));
            return Vec::new();
        }
        let name = tmux::window_name(&repo, &name);
        let window = self.windows.get(&name).cloned();
        vec![Task::OpenWindow { name, path, window }]
    }

    fn set_board(&mut self, on: bool) -> Vec<Task> {
        let Some(Row::Capsule(c)) = self.rows.get_mut(self.cursor) else {
            return Vec::new();
        };
        if c.is_ground() {
            self.flash = Some("the ground capsule is always on board".to_string());
            return Vec::new();
        }
        if c.boarded == on {
            return Vec::new();
        }
        c.boarded = on;
        let (repo, capsule) = (c.repo.clone(), c.name.clone());
        if let Some(data) = self.repo_mut(&repo) {
            data.boarded.retain(|b| b != &capsule);
            if on {
                data.boarded.push(capsule.clone());
                data.boarded.sort();
            }
        }
        vec![Task::Board { repo, capsule, on }]
    }

    fn request_delete(&mut self) {
        match self.current_row() {
            Some(Row::Capsule(c)) if c.is_ground() => {
                self.flash = Some("the ground capsule cannot be undocked".to_string());
            }
            Some(row @ Row::Capsule(_)) => {
                self.mode = Mode::Confirm(Confirm {
                    index: self.cursor,
                    key: row.key(),
                });
            }
            _ => {}
        }
    }

    fn confirm(&mut self) -> Vec<Task> {
        if !matches!(self.mode, Mode::Confirm(_)) || self.refuse_if_busy() {
            return Vec::new();
        }
        let Mode::Confirm(pending) = std::mem::take(&mut self.mode) else {
            return Vec::new();
        };
        let (repo, capsule) = match self.rows.get(pending.index) {
            Some(row @ Row::Capsule(c)) if row.key() == pending.key => (c.repo.clone(), c.name.clone()),
            _ => {
                self.flash = Some("rows changed; undock cancelled".to_string());
                return Vec::new();
            }
        };
        self.busy = Some(format!("undocking {repo}/{capsule}"));
        let window = self.windows.get(&tmux::window_name(&repo, &capsule)).cloned();
        vec![Task::Remove {
            path: self.capsule_path(&repo, &capsule),
            repo,
            capsule,
            window,
        }]
    }

    pub(crate) fn on_removed(
        &mut self,
        repo: String,
        capsule: String,
        result: Result<(), String>,
    ) -> Vec<Task> {
        self.busy = None;
        if let Err(e) = result {
            self.flash = Some(format!("undock {repo}/{capsule} failed: {e}"));
            return Vec::new();
        }
        let Some(i) = self.find(&RowKey::Capsule(repo.clone(), capsule.clone())) else {
            return Vec::new();
        };
        if let Row::Capsule(c) = self.rows.remove(i) {
            self.total = self.total.saturating_sub(1);
            if c.loaded {
                self.loaded = self.loaded.saturating_sub(1);
            }
        }
        if let Some(data) = self.repo_mut(&repo) {
            data.capsules.retain(|c| c != &capsule);
            data.boarded.retain(|c| c != &capsule);
            data.branch_hints.remove(&capsule);
        }
        if i < self.cursor {
            self.cursor -= 1;
        }
        self.snap_cursor();
        // Its PR, if any, goes back to being a ghost.
        self.rematch(&repo);
        Vec::new()
    }

    fn create_from_ghost(&mut self) -> Vec<Task> {
        let Some(Row::Ghost(g)) = self.current_row() else {
            self.flash = Some("create needs a pull request without a capsule".to_string());
            return Vec::new();
        };
        let (repo, branch) = (g.repo.clone(), g.branch.clone());
        if self.refuse_if_busy() {
            return Vec::new();
        }
        self.busy = Some(format!("docking {branch}"));
        vec![Task::Create { repo, branch }]
    }

    /// Promotes the ghost in place, keeping its PR, and asks for its status.
    pub(crate) fn on_created(
        &mut self,
        repo: String,
        branch: String,
        result: Result<String, String>,
    ) -> Vec<Task> {
        self.busy = None;
        let name = match result {
            Ok(name) => name,
            Err(e) => {
                self.flash = Some(format!("dock {branch} failed: {e}"));
                return Vec::new();
            }
        };

        let mut capsule = CapsuleRow::new(&repo, &name, false);
        match self.find(&RowKey::Ghost(repo.clone(), branch.clone())) {
            Some(i) => {
                if let Row::Ghost(g) = &self.rows[i] {
                    capsule.pr = Some(g.pr.clone());
                }
                self.rows[i] = Row::Capsule(capsule);
            }
            None => {
                capsule.pr = self.repo(&repo).and_then(|d| d.prs.get(&branch)).cloned();
                let at = self
                    .rows
                    .iter()
                    .rposition(|r| matches!(r, Row::Capsule(c) if c.repo == repo))
                    .map(|i| i + 1)
                    .unwrap_or_else(|| self.repo_end(&repo));
                self.rows.insert(at, Row::Capsule(capsule));
                if at <= self.cursor {
                    self.cursor += 1;
                }
            }
        }
        if let Some(data) = self.repo_mut(&repo) {
            data.capsules.push(name.clone());
            data.branch_hints.insert(name.clone(), branch.clone());
        }
        self.total += 1;

        vec![
            Task::Status {
                path: self.capsule_path(&repo, &name),
                repo: repo.clone(),
                capsule: name.clone(),
            },
            Task::CacheBranch {
                repo,
                capsule: name,
                branch,
            },
        ]
    }

    pub(crate) fn on_swept(
        &mut self,
        removed: Vec<(String, String)>,
        outline: Vec<RepoOutline>,
    ) -> Vec<Task> {
        self.busy = None;
        for (repo, capsule) in &removed {
            tracing::info!(%repo, %capsule, "swept abandoned capsule");
        }
        self.flash = Some(format!("swept {} abandoned capsule(s)", removed.len()));
        self.rebuild(outline)
    }
}

#[cfg(test)]
mod tests {
    use crate::app::{App, Exit, Mode};
    use crate::model::{Row, RowKey};
    use crate::msg::{Action, Msg, Task};
    use crate::testutil::{app_with, outline, pr};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn act(app: &mut App, a: Action) -> Vec<Task> {
        app.update(Msg::Action(a))
    }

    fn frontend_with_prs() -> App {
        let mut app = app_with(&[("frontend", &[".ground", "feat-auth"])]);
        app.update(Msg::PrList {
            repo: "frontend".into(),
            result: Ok(vec![pr(1, "feat-auth", "me"), pr(2, "deps/upgrade", "bot")]),
        });
        app
    }

    #[test]
    fn open_outside_tmux_exits_with_path() {
        let mut app = app_with(&[("frontend", &[".ground", "feat-auth"])]);
        act(&mut app, Action::Down);
        act(&mut app, Action::Open);
        assert_eq!(
            app.exit,
            Some(Exit::Go(PathBuf::from("/ws/frontend/feat-auth")))
        );
    }

    #[test]
    fn open_inside_tmux_reuses_known_window() {
        let mut app = app_with(&[("frontend", &[".ground", "feat-auth"])]);
        app.in_tmux = true;
        let mut w = HashMap::new();
        w.insert("frontend/feat-auth".to_string(), "@7".to_string());
        app.update(Msg::Windows { result: Ok(w) });
        act(&mut app, Action::Down);
        let tasks = act(&mut app, Action::Open);
        assert!(tasks.contains(&Task::OpenWindow {
            name: "frontend/feat-auth".into(),
            path: PathBuf::from("/ws/frontend/feat-auth"),
            window: Some("@7".into()),
        }));
        assert_eq!(app.exit, None);
    }

    #[test]
    fn board_toggles_and_refuses_ground() {
        let mut app = app_with(&[("frontend", &[".ground", "feat-auth"])]);
        assert!(act(&mut app, Action::ToggleBoard).is_empty());
        assert!(app.flash.is_some());

        act(&mut app, Action::Down);
        let tasks = act(&mut app, Action::ToggleBoard);
        assert_eq!(
            tasks,
            vec![Task::Board {
                repo: "frontend".into(),
                capsule: "feat-auth".into(),
                on: true
            }]
        );
        assert_eq!(app.repo("frontend").unwrap().boarded, vec!["feat-auth"]);
        assert!(matches!(&app.rows[2], Row::Capsule(c) if c.boarded));

        assert!(act(&mut app, Action::Board).is_empty(), "already boarded");
        act(&mut app, Action::Unboard);
        assert!(app.repo("frontend").unwrap().boarded.is_empty());
    }

    #[test]
    fn delete_needs_confirmation_and_refuses_ground() {
        let mut app = app_with(&[("frontend", &[".ground", "feat-auth"])]);
        act(&mut app, Action::Delete);
        assert_eq!(app.mode, Mode::Normal);

        act(&mut app, Action::Down);
        act(&mut app, Action::Delete);
        assert!(matches!(app.mode, Mode::Confirm(_)));
        act(&mut app, Action::Cancel);
        assert_eq!(app.mode, Mode::Normal);

        act(&mut app, Action::Delete);
        let tasks = act(&mut app, Action::Confirm);
        assert_eq!(
            tasks,
            vec![Task::Remove {
                repo: "frontend".into(),
                capsule: "feat-auth".into(),
                path: PathBuf::from("/ws/frontend/feat-auth"),
                window: None,
            }]
        );
        assert!(app.busy.is_some());
    }

    #[test]
    fn deleting_the_last_row_moves_cursor_to_previous_visible_row() {
        let mut app = app_with(&[("api", &[".ground"]), ("web", &[".ground", "a", "b"])]);
        act(&mut app, Action::Last);
        assert_eq!(app.cursor, 5);
        act(&mut app, Action::Delete);
        act(&mut app, Action::Confirm);
        app.update(Msg::Removed {
            repo: "web".into(),
            capsule: "b".into(),
            result: Ok(()),
        });
        assert_eq!(app.rows.len(), 5);
        assert_eq!(app.cursor, 4);
        assert_eq!(app.cursor_key(), Some(RowKey::Capsule("web".into(), "a".into())));
        assert!(app.busy.is_none());
        assert_eq!(app.total, 3);
    }

    #[test]
    fn deleting_only_capsule_of_last_repo_skips_its_header() {
        let mut app = app_with(&[("api", &[".ground", "x"]), ("web", &[".ground", "solo"])]);
        app.update(Msg::Removed {
            repo: "web".into(),
            capsule: ".ground".into(),
            result: Ok(()),
        });
        act(&mut app, Action::Last);
        act(&mut app, Action::Delete);
        act(&mut app, Action::Confirm);
        app.update(Msg::Removed {
            repo: "web".into(),
            capsule: "solo".into(),
            result: Ok(()),
        });
        assert!(!app.rows[app.cursor].is_header());
        assert_eq!(app.cursor_key(), Some(RowKey::Capsule("api".into(), "x".into())));
    }

    #[test]
    fn failed_removal_leaves_row_for_retry() {
        let mut app = app_with(&[("frontend", &[".ground", "feat-auth"])]);
        act(&mut app, Action::Down);
        act(&mut app, Action::Delete);
        act(&mut app, Action::Confirm);
        let before = app.rows.clone();
        app.update(Msg::Removed {
            repo: "frontend".into(),
            capsule: "feat-auth".into(),
            result: Err("worktree is dirty".into()),
        });
        assert_eq!(app.rows, before);
        assert!(app.busy.is_none());
        assert!(app.flash.as_deref().unwrap_or("").contains("dirty"));
    }

    #[test]
    fn removed_capsule_with_pr_becomes_a_ghost() {
        let mut app = frontend_with_prs();
        app.update(Msg::Removed {
            repo: "frontend".into(),
            capsule: "feat-auth".into(),
            result: Ok(()),
        });
        let ghosts: Vec<&str> = app
            .rows
            .iter()
            .filter_map(|r| match r {
                Row::Ghost(g) => Some(g.branch.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(ghosts, vec!["feat-auth", "deps/upgrade"]);
    }

    #[test]
    fn create_from_ghost_promotes_row_in_place() {
        let mut app = frontend_with_prs();
        act(&mut app, Action::Last);
        assert!(matches!(app.current_row(), Some(Row::Ghost(_))));
        let tasks = act(&mut app, Action::CreateFromGhost);
        assert!(tasks.contains(&Task::Create {
            repo: "frontend".into(),
            branch: "deps/upgrade".into()
        }));

        let tasks = app.update(Msg::Created {
            repo: "frontend".into(),
            branch: "deps/upgrade".into(),
            result: Ok("upgrade".into()),
        });
        assert_eq!(app.rows.len(), 4);
        match &app.rows[3] {
            Row::Capsule(c) => {
                assert_eq!(c.name, "upgrade");
                assert_eq!(c.pr.as_ref().map(|p| p.number), Some(2));
                assert!(!c.loaded);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(tasks.contains(&Task::Status {
            repo: "frontend".into(),
            capsule: "upgrade".into(),
            path: PathBuf::from("/ws/frontend/upgrade"),
        }));
        assert_eq!(app.cursor, 3);
        assert_eq!(app.total, 3);

        // A PR refresh before the first status must not resurrect the ghost.
        app.update(Msg::PrList {
            repo: "frontend".into(),
            result: Ok(vec![pr(1, "feat-auth", "me"), pr(2, "deps/upgrade", "bot")]),
        });
        assert!(!app.rows.iter().any(|r| matches!(r, Row::Ghost(_))));
    }

    #[test]
    fn failed_create_keeps_the_ghost() {
        let mut app = frontend_with_prs();
        act(&mut app, Action::Last);
        act(&mut app, Action::CreateFromGhost);
        app.update(Msg::Created {
            repo: "frontend".into(),
            branch: "deps/upgrade".into(),
            result: Err("branch not found on origin".into()),
        });
        assert!(matches!(&app.rows[3], Row::Ghost(_)));
        assert!(app.busy.is_none());
    }

    #[test]
    fn create_is_refused_on_capsule_rows() {
        let mut app = frontend_with_prs();
        assert!(act(&mut app, Action::CreateFromGhost).is_empty());
        assert!(app.busy.is_none());
    }

    #[test]
    fn refresh_sweeps_then_rebuilds() {
        let mut app = frontend_with_prs();
        assert_eq!(act(&mut app, Action::Refresh), vec![Task::Sweep]);
        assert!(act(&mut app, Action::Refresh).is_empty(), "already sweeping");

        let tasks = app.update(Msg::Swept {
            removed: vec![("frontend".into(), "feat-auth".into())],
            outline: outline(&[("frontend", &[".ground"])]),
        });
        assert!(app.busy.is_none());
        assert!(tasks.iter().any(|t| matches!(t, Task::Status { .. })));
        assert!(tasks.contains(&Task::Identity));
        let ghosts = app
            .rows
            .iter()
            .filter(|r| matches!(r, Row::Ghost(_)))
            .count();
        assert_eq!(ghosts, 2, "known PRs stay visible until the refetch lands");
    }

    #[test]
    fn filter_typing_keeps_cursor_on_visible_rows() {
        let mut app = frontend_with_prs();
        act(&mut app, Action::StartFilter);
        assert_eq!(app.mode, Mode::Filter);
        for ch in "upg".chars() {
            act(&mut app, Action::FilterChar(ch));
        }
        assert_eq!(app.cursor, 3);
        act(&mut app, Action::ClearFilter);
        assert_eq!(app.mode, Mode::Normal);
        assert!(app.filter.is_empty());
    }

    #[test]
    fn open_pr_uses_row_url() {
        let mut app = frontend_with_prs();
        act(&mut app, Action::Down);
        assert_eq!(
            act(&mut app, Action::OpenPr),
            vec![Task::OpenUrl("https://github.com/acme/repo/pull/1".into())]
        );
    }
}
