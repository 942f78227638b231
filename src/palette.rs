//! Command palette: the same actions as the key bindings, filtered by the
//! kind of row under the cursor and a fuzzy query.

use crate::app::{App, Mode};
use crate::filter::{Preset, fuzzy_match};
use crate::model::Row;
use crate::msg::{Action, Task};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Always,
    Capsule,
    Ghost,
    WithPr,
    /// Any non-header row.
    AnyRow,
}

impl Scope {
    fn admits(self, row: Option<&Row>) -> bool {
        match self {
            Scope::Always => true,
            Scope::Capsule => matches!(row, Some(Row::Capsule(_))),
            Scope::Ghost => matches!(row, Some(Row::Ghost(_))),
            Scope::WithPr => row.and_then(Row::pr).is_some(),
            Scope::AnyRow => row.is_some_and(|r| !r.is_header()),
        }
    }
}

#[derive(Debug)]
pub struct Command {
    pub name: &'static str,
    /// Key binding shown next to the name.
    pub key: &'static str,
    pub scope: Scope,
    pub action: Action,
}

pub const COMMANDS: &[Command] = &[
    Command {
        name: "open",
        key: "enter",
        scope: Scope::Capsule,
        action: Action::Open,
    },
    Command {
        name: "open pull request",
        key: "o",
        scope: Scope::WithPr,
        action: Action::OpenPr,
    },
    Command {
        name: "board",
        key: "b",
        scope: Scope::Capsule,
        action: Action::Board,
    },
    Command {
        name: "unboard",
        key: "b",
        scope: Scope::Capsule,
        action: Action::Unboard,
    },
    Command {
        name: "undock",
        key: "d",
        scope: Scope::Capsule,
        action: Action::Delete,
    },
    Command {
        name: "create capsule",
        key: "c",
        scope: Scope::Ghost,
        action: Action::CreateFromGhost,
    },
    Command {
        name: "filter",
        key: "/",
        scope: Scope::Always,
        action: Action::StartFilter,
    },
    Command {
        name: "toggle local only",
        key: "1",
        scope: Scope::Always,
        action: Action::TogglePreset(Preset::Local),
    },
    Command {
        name: "toggle mine",
        key: "2",
        scope: Scope::Always,
        action: Action::TogglePreset(Preset::Mine),
    },
    Command {
        name: "toggle review requested",
        key: "3",
        scope: Scope::Always,
        action: Action::TogglePreset(Preset::Review),
    },
    Command {
        name: "toggle dirty",
        key: "4",
        scope: Scope::Always,
        action: Action::TogglePreset(Preset::Dirty),
    },
    Command {
        name: "clear presets",
        key: "0",
        scope: Scope::Always,
        action: Action::ClearPresets,
    },
    Command {
        name: "jump to top",
        key: "g",
        scope: Scope::AnyRow,
        action: Action::First,
    },
    Command {
        name: "jump to bottom",
        key: "G",
        scope: Scope::AnyRow,
        action: Action::Last,
    },
    Command {
        name: "refresh and sweep",
        key: "R",
        scope: Scope::Always,
        action: Action::Refresh,
    },
    Command {
        name: "quit",
        key: "q",
        scope: Scope::Always,
        action: Action::Quit,
    },
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaletteState {
    pub query: String,
    pub selected: usize,
}

/// Commands applicable to `row` whose name matches `query`, in registry order.
pub fn entries(row: Option<&Row>, query: &str) -> Vec<&'static Command> {
    let boarded = match row {
        Some(Row::Capsule(c)) => Some(c.boarded),
        _ => None,
    };
    COMMANDS
        .iter()
        .filter(|c| c.scope.admits(row))
        .filter(|c| match c.action {
            Action::Board => boarded == Some(false),
            Action::Unboard => boarded == Some(true),
            _ => true,
        })
        .filter(|c| fuzzy_match(query, c.name))
        .collect()
}

impl App {
    pub fn palette_entries(&self) -> Vec<&'static Command> {
        match &self.mode {
            Mode::Palette(p) => entries(self.current_row(), &p.query),
            _ => Vec::new(),
        }
    }

    pub(crate) fn on_palette(&mut self, action: Action) -> Vec<Task> {
        let count = self.palette_entries().len();
        let Mode::Palette(state) = &mut self.mode else {
            return Vec::new();
        };
        match action {
            Action::PaletteChar(ch) => {
                state.query.push(ch);
                state.selected = 0;
            }
            Action::PaletteBackspace => {
                state.query.pop();
                state.selected = 0;
            }
            Action::PaletteUp => state.selected = state.selected.saturating_sub(1),
            Action::PaletteDown => {
                if state.selected + 1 < count {
                    state.selected += 1;
                }
            }
            Action::PaletteRun => {
                let chosen = self
                    .palette_entries()
                    .get(self.palette_selected())
                    .map(|c| c.action);
                self.mode = Mode::Normal;
                if let Some(action) = chosen {
                    return self.on_action(action);
                }
            }
            Action::ClosePalette => self.mode = Mode::Normal,
            _ => {}
        }
        Vec::new()
    }

    fn palette_selected(&self) -> usize {
        match &self.mode {
            Mode::Palette(p) => p.selected,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CapsuleRow, GhostRow};
    use crate::msg::Msg;
    use crate::testutil::{app_with, pr};

    fn names(row: Option<&Row>, query: &str) -> Vec<&'static str> {
        entries(row, query).iter().map(|c| c.name).collect()
    }

    #[test]
    fn scope_follows_row_kind() {
        let capsule = Row::Capsule(CapsuleRow::new("r", "wip", false));
        let ghost = Row::Ghost(GhostRow {
            repo: "r".into(),
            branch: "b".into(),
            pr: pr(1, "b", "me"),
            loaded: true,
        });
        let header = Row::Header { repo: "r".into() };

        let on_capsule = names(Some(&capsule), "");
        assert!(on_capsule.contains(&"open"));
        assert!(on_capsule.contains(&"undock"));
        assert!(!on_capsule.contains(&"create capsule"));
        assert!(!on_capsule.contains(&"open pull request"));

        let on_ghost = names(Some(&ghost), "");
        assert!(on_ghost.contains(&"create capsule"));
        assert!(on_ghost.contains(&"open pull request"));
        assert!(!on_ghost.contains(&"open"));
        assert!(!on_ghost.contains(&"board"));

        let on_header = names(Some(&header), "");
        assert!(!on_header.contains(&"jump to top"));
        assert!(on_header.contains(&"quit"));
    }

    #[test]
    fn board_and_unboard_are_mutually_exclusive() {
        let mut c = CapsuleRow::new("r", "wip", false);
        let off = names(Some(&Row::Capsule(c.clone())), "board");
        assert_eq!(off, vec!["board"]);
        c.boarded = true;
        let on = names(Some(&Row::Capsule(c)), "board");
        assert_eq!(on, vec!["unboard"]);
    }

    #[test]
    fn query_is_fuzzy_on_the_name() {
        assert_eq!(names(None, "quit"), vec!["quit"]);
        assert_eq!(names(None, "tgdrt"), vec!["toggle dirty"]);
        assert!(names(None, "zzz").is_empty());
    }

    #[test]
    fn running_an_entry_dispatches_its_action() {
        let mut app = app_with(&[("frontend", &[".ground", "feat-auth"])]);
        app.update(Msg::Action(Action::Down));
        app.update(Msg::Action(Action::OpenPalette));
        for ch in "boa".chars() {
            app.update(Msg::Action(Action::PaletteChar(ch)));
        }
        let tasks = app.update(Msg::Action(Action::PaletteRun));
        assert_eq!(app.mode, Mode::Normal);
        assert!(tasks.contains(&Task::Board {
            repo: "frontend".into(),
            capsule: "feat-auth".into(),
            on: true,
        }));
    }

    #[test]
    fn selection_stays_within_entries() {
        let mut app = app_with(&[("frontend", &[".ground"])]);
        app.update(Msg::Action(Action::OpenPalette));
        for ch in "toggle".chars() {
            app.update(Msg::Action(Action::PaletteChar(ch)));
        }
        let count = app.palette_entries().len();
        for _ in 0..count + 3 {
            app.update(Msg::Action(Action::PaletteDown));
        }
        match &app.mode {
            Mode::Palette(p) => assert_eq!(p.selected, count - 1),
            other => panic!("unexpected {other:?}"),
        }
        app.update(Msg::Action(Action::ClosePalette));
        assert_eq!(app.mode, Mode::Normal);
    }
}
