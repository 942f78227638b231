//! Row visibility (free-text filter AND preset filters) and cursor movement.

use crate::app::App;
use crate::model::{ReviewState, Row};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Local,
    Mine,
    Review,
    Dirty,
}

impl Preset {
    pub const ALL: [Preset; 4] = [Preset::Local, Preset::Mine, Preset::Review, Preset::Dirty];

    fn bit(self) -> u8 {
        match self {
            Preset::Local => 1,
            Preset::Mine => 1 << 1,
            Preset::Review => 1 << 2,
            Preset::Dirty => 1 << 3,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Preset::Local => "local",
            Preset::Mine => "mine",
            Preset::Review => "review",
            Preset::Dirty => "dirty",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presets(u8);

impl Presets {
    pub fn contains(self, p: Preset) -> bool {
        self.0 & p.bit() != 0
    }

    pub fn toggle(&mut self, p: Preset) {
        self.0 ^= p.bit();
    }

    pub fn clear(&mut self) {
        self.0 = 0;
    }

    pub fn active(self) -> impl Iterator<Item = Preset> {
        Preset::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

/// Case-insensitive ordered-subsequence match.
pub fn fuzzy_match(query: &str, text: &str) -> bool {
    let mut chars = text.chars().flat_map(char::to_lowercase);
    query
        .chars()
        .flat_map(char::to_lowercase)
        .all(|q| chars.any(|c| c == q))
}

/// Headers are never independently visible.
pub fn row_visible(row: &Row, query: &str, presets: Presets, identity: Option<&str>) -> bool {
    if row.is_header() || !fuzzy_match(query, row.label()) {
        return false;
    }
    presets.active().all(|p| match p {
        Preset::Local => !matches!(row, Row::Ghost(_)),
        Preset::Mine => match identity {
            None => true,
            Some(me) => row.pr().is_some_and(|pr| pr.author == me),
        },
        Preset::Review => row
            .pr()
            .is_some_and(|pr| pr.review == ReviewState::Required),
        Preset::Dirty => match row {
            Row::Capsule(c) => c.dirty || c.ahead > 0,
            _ => false,
        },
    })
}

impl App {
    pub fn is_visible(&self, index: usize) -> bool {
        self.rows.get(index).is_some_and(|r| {
            row_visible(r, &self.filter, self.presets, self.identity.as_deref())
        })
    }

    /// Indices to render: visible rows plus the header of every repo that
    /// has at least one visible row.
    pub fn shown_rows(&self) -> Vec<usize> {
        let mut out = Vec::new();
        let mut header: Option<usize> = None;
        for (i, row) in self.rows.iter().enumerate() {
            if row.is_header() {
                header = Some(i);
                continue;
            }
            if self.is_visible(i) {
                if let Some(h) = header.take() {
                    out.push(h);
                }
                out.push(i);
            }
        }
        out
    }

    /// Moves one visible row up or down; stops at the ends.
    pub fn step(&mut self, delta: isize) {
        if !self.is_visible(self.cursor) {
            self.snap_cursor();
        }
        let next = if delta < 0 {
            (0..self.cursor).rev().find(|&i| self.is_visible(i))
        } else {
            (self.cursor + 1..self.rows.len()).find(|&i| self.is_visible(i))
        };
        if let Some(i) = next {
            self.cursor = i;
        }
    }

    pub fn jump_first(&mut self) {
        if let Some(i) = (0..self.rows.len()).find(|&i| self.is_visible(i)) {
            self.cursor = i;
        }
    }

    pub fn jump_last(&mut self) {
        if let Some(i) = (0..self.rows.len()).rev().find(|&i| self.is_visible(i)) {
            self.cursor = i;
        }
    }

    fn nearest(&self, from: usize, ok: impl Fn(usize) -> bool) -> Option<usize> {
        let len = self.rows.len();
        (0..len).find_map(|d| {
            if let Some(up) = from.checked_sub(d) {
                if up < len && ok(up) {
                    return Some(up);
                }
            }
            let down = from + d;
            (down < len && ok(down)).then_some(down)
        })
    }

    /// Keeps the cursor in bounds and off headers, preferring visible rows.
    pub fn snap_cursor(&mut self) {
        if self.rows.is_empty() {
            self.cursor = 0;
            return;
        }
        self.cursor = self.cursor.min(self.rows.len() - 1);
        if self.is_visible(self.cursor) {
            return;
        }
        let target = self
            .nearest(self.cursor, |i| self.is_visible(i))
            .or_else(|| self.nearest(self.cursor, |i| !self.rows[i].is_header()));
        if let Some(i) = target {
            self.cursor = i;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CapsuleRow, GhostRow};
    use crate::testutil::{app_with, pr};

    fn capsule(branch: &str, dirty: bool, ahead: u32) -> Row {
        let mut c = CapsuleRow::new("r", branch, false);
        c.branch = branch.to_string();
        c.dirty = dirty;
        c.ahead = ahead;
        Row::Capsule(c)
    }

    #[test]
    fn fuzzy_is_ordered_subsequence_ignoring_case() {
        assert!(fuzzy_match("fa", "Feat-Auth"));
        assert!(fuzzy_match("", "anything"));
        assert!(fuzzy_match("fth", "feat-auth"));
        assert!(!fuzzy_match("af", "fa"));
        assert!(!fuzzy_match("x", "feat-auth"));
    }

    #[test]
    fn visibility_is_conjunctive() {
        let mut dirty = Presets::default();
        dirty.toggle(Preset::Dirty);

        let dirty_row = capsule("feat-auth", true, 0);
        assert!(row_visible(&dirty_row, "auth", dirty, None));
        assert!(!row_visible(&dirty_row, "billing", dirty, None));

        let clean_row = capsule("feat-auth", false, 0);
        assert!(row_visible(&clean_row, "auth", Presets::default(), None));
        assert!(!row_visible(&clean_row, "auth", dirty, None));

        let ahead_row = capsule("feat-auth", false, 2);
        assert!(row_visible(&ahead_row, "auth", dirty, None));
    }

    #[test]
    fn presets_local_mine_review() {
        let ghost = Row::Ghost(GhostRow {
            repo: "r".into(),
            branch: "deps/upgrade".into(),
            pr: pr(2, "deps/upgrade", "bot"),
            loaded: true,
        });
        let mut local = Presets::default();
        local.toggle(Preset::Local);
        assert!(!row_visible(&ghost, "", local, None));

        let mut mine = Presets::default();
        mine.toggle(Preset::Mine);
        assert!(row_visible(&ghost, "", mine, None), "no-op until identity is known");
        assert!(!row_visible(&ghost, "", mine, Some("me")));
        assert!(row_visible(&ghost, "", mine, Some("bot")));
        assert!(!row_visible(&capsule("wip", false, 0), "", mine, Some("me")));

        let mut review = Presets::default();
        review.toggle(Preset::Review);
        assert!(!row_visible(&ghost, "", review, None));
        let mut wanted = pr(3, "x", "me");
        wanted.review = ReviewState::Required;
        let mut c = CapsuleRow::new("r", "x", false);
        c.pr = Some(wanted);
        assert!(row_visible(&Row::Capsule(c), "", review, None));
    }

    #[test]
    fn headers_render_only_with_visible_children() {
        let mut app = app_with(&[("api", &[".ground", "fix-db"]), ("web", &[".ground", "feat-ui"])]);
        app.filter = "ui".into();
        app.snap_cursor();
        assert_eq!(app.shown_rows(), vec![3, 5]);
        assert_eq!(app.cursor, 5);
    }

    #[test]
    fn step_skips_hidden_rows_and_does_not_wrap() {
        let mut app = app_with(&[("api", &[".ground", "fix-db"]), ("web", &[".ground", "feat-ui"])]);
        assert_eq!(app.cursor, 1);
        app.step(-1);
        assert_eq!(app.cursor, 1);
        app.step(1);
        assert_eq!(app.cursor, 2);
        app.step(1);
        assert_eq!(app.cursor, 4, "header at 3 is skipped");
        app.step(1);
        app.step(1);
        assert_eq!(app.cursor, 5);
    }

    #[test]
    fn cursor_never_rests_on_a_header_after_filter_change() {
        let mut app = app_with(&[("api", &[".ground", "fix-db"]), ("web", &[".ground", "feat-ui"])]);
        app.cursor = 2;
        for q in ["f", "fe", "fea", "feat", "zzz", ""] {
            app.filter = q.to_string();
            app.snap_cursor();
            assert!(!app.rows[app.cursor].is_header(), "filter {q:?}");
            if !app.shown_rows().is_empty() {
                assert!(app.is_visible(app.cursor), "filter {q:?}");
            }
        }
    }
}
