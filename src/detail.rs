//! Debounced tier-2 detail fetch for the focused row.
//!
//! Each focus change bumps `detail_seq` and schedules a timer tagged with it.
//! A tick whose tag is no longer current does nothing; a fetch result is
//! applied only if both its row index and its tag still match.

use crate::app::App;
use crate::model::{DetailData, Row};
use crate::msg::{DetailTarget, Task};

impl App {
    pub(crate) fn on_detail_tick(&mut self, seq: u64) -> Vec<Task> {
        if seq != self.detail_seq {
            tracing::debug!(seq, current = self.detail_seq, "stale detail tick");
            return Vec::new();
        }
        let Some(target) = self.detail_target(self.cursor) else {
            return Vec::new();
        };
        vec![Task::Detail {
            index: self.cursor,
            seq,
            target,
        }]
    }

    pub(crate) fn on_detail(&mut self, index: usize, seq: u64, mut data: DetailData) -> Vec<Task> {
        if index != self.cursor || seq != self.detail_seq {
            tracing::debug!(index, seq, cursor = self.cursor, "dropping stale detail");
            return Vec::new();
        }
        data.row = Some(index);
        data.loaded = true;
        self.detail = data;
        Vec::new()
    }

    pub fn detail_target(&self, index: usize) -> Option<DetailTarget> {
        match self.rows.get(index)? {
            Row::Header { .. } => None,
            Row::Capsule(c) => Some(DetailTarget {
                repo: c.repo.clone(),
                capsule: Some(self.capsule_path(&c.repo, &c.name)),
                branch: c.branch.clone(),
                pr: c.pr.as_ref().map(|p| p.number),
            }),
            Row::Ghost(g) => Some(DetailTarget {
                repo: g.repo.clone(),
                capsule: None,
                branch: g.branch.clone(),
                pr: Some(g.pr.number),
            }),
        }
    }

    /// Detail is trusted only while it belongs to the row under the cursor.
    pub fn detail_is_current(&self) -> bool {
        self.detail.loaded && self.detail.row == Some(self.cursor)
    }
}

#[cfg(test)]
mod tests {
    use crate::model::DetailData;
    use crate::msg::{Action, Msg, Task};
    use crate::testutil::app_with;

    fn timers(tasks: &[Task]) -> Vec<u64> {
        tasks
            .iter()
            .filter_map(|t| match t {
                Task::DetailTimer { seq, .. } => Some(*seq),
                _ => None,
            })
            .collect()
    }

    fn demo() -> crate::app::App {
        app_with(&[("web", &[".ground", "a", "b", "c", "d", "e"])])
    }

    #[test]
    fn only_the_latest_tick_fetches() {
        let mut app = demo();
        let mut seqs = Vec::new();
        for target in [2usize, 5, 2] {
            app.cursor = target;
            let tasks = app.update(Msg::Action(Action::Cancel));
            seqs.extend(timers(&tasks));
        }
        assert_eq!(seqs.len(), 3);
        assert!(seqs.windows(2).all(|w| w[0] < w[1]));

        let first = app.update(Msg::DetailTick { seq: seqs[0] });
        let second = app.update(Msg::DetailTick { seq: seqs[1] });
        assert!(first.is_empty());
        assert!(second.is_empty());

        let third = app.update(Msg::DetailTick { seq: seqs[2] });
        match third.as_slice() {
            [Task::Detail { index, seq, target }] => {
                assert_eq!(*index, 2);
                assert_eq!(*seq, seqs[2]);
                assert_eq!(target.repo, "web");
                assert_eq!(
                    target.capsule.as_deref(),
                    Some(std::path::Path::new("/ws/web/b"))
                );
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn moving_clears_loaded_detail() {
        let mut app = demo();
        let seq = app.detail_seq;
        app.update(Msg::Detail {
            index: app.cursor,
            seq,
            data: DetailData {
                commits: vec!["abc fix".into()],
                ..DetailData::default()
            },
        });
        assert!(app.detail_is_current());
        assert_eq!(app.detail.commits, vec!["abc fix".to_string()]);

        app.update(Msg::Action(Action::Down));
        assert!(!app.detail.loaded);
        assert!(!app.detail_is_current());
    }

    #[test]
    fn stale_result_for_revisited_index_is_rejected() {
        let mut app = demo();
        app.cursor = 2;
        app.update(Msg::Action(Action::Cancel));
        let old = app.detail_seq;
        let fetch = app.update(Msg::DetailTick { seq: old });
        assert_eq!(fetch.len(), 1);

        app.update(Msg::Action(Action::Down));
        app.update(Msg::Action(Action::Up));
        assert_eq!(app.cursor, 2);

        app.update(Msg::Detail {
            index: 2,
            seq: old,
            data: DetailData::default(),
        });
        assert!(!app.detail.loaded, "result from an earlier visit must not be shown");

        let current = app.detail_seq;
        app.update(Msg::Detail {
            index: 2,
            seq: current,
            data: DetailData::default(),
        });
        assert!(app.detail_is_current());
    }
}
