use crate::model::TaskList;
use chrono::{DateTime, Utc};

const HISTORY_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub tasks: TaskList,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    fn new(tasks: TaskList) -> Self {
        HistoryEntry {
            tasks,
            recorded_at: Utc::now(),
        }
    }
}

/// Linear undo log of whole-collection snapshots.
///
/// `cursor` always indexes a live entry and the log is never empty. Recording
/// while the cursor sits behind the tail discards the redo branch.
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<HistoryEntry>,
    cursor: usize,
}

impl History {
    pub fn new(initial: TaskList) -> Self {
        History {
            entries: vec![HistoryEntry::new(initial)],
            cursor: 0,
        }
    }

    /// Push a snapshot after a committed mutation. Clears the redo branch.
    pub fn record(&mut self, tasks: TaskList) {
        self.entries.truncate(self.cursor + 1);
        self.entries.push(HistoryEntry::new(tasks));
        if self.entries.len() > HISTORY_LIMIT {
            self.entries.drain(..self.entries.len() - HISTORY_LIMIT);
        }
        self.cursor = self.entries.len() - 1;
    }

    /// Step back one entry and return the snapshot there.
    pub fn undo(&mut self) -> Option<&TaskList> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(&self.entries[self.cursor].tasks)
    }

    /// Step forward one entry and return the snapshot there.
    pub fn redo(&mut self) -> Option<&TaskList> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(&self.entries[self.cursor].tasks)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len()
    }

    pub fn current(&self) -> &HistoryEntry {
        &self.entries[self.cursor]
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Task;
    use pretty_assertions::assert_eq;

    fn list(ids: &[u64]) -> TaskList {
        ids.iter()
            .map(|&id| Task {
                id,
                text: format!("task {}", id),
                completed: false,
            })
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn starts_with_single_entry() {
        let history = History::new(list(&[1]));
        assert_eq!(history.len(), 1);
        assert_eq!(history.cursor(), 0);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn undo_and_redo_walk_the_log() {
        let mut history = History::new(list(&[]));
        history.record(list(&[1]));
        history.record(list(&[1, 2]));

        assert_eq!(history.undo(), Some(&list(&[1])));
        assert_eq!(history.undo(), Some(&list(&[])));
        assert_eq!(history.undo(), None);
        assert_eq!(history.cursor(), 0);

        assert_eq!(history.redo(), Some(&list(&[1])));
        assert_eq!(history.redo(), Some(&list(&[1, 2])));
        assert_eq!(history.redo(), None);
        assert_eq!(history.cursor(), 2);
    }

    #[test]
    fn record_after_undo_drops_redo_branch() {
        let mut history = History::new(list(&[]));
        history.record(list(&[1]));
        history.record(list(&[1, 2]));
        history.undo();
        history.undo();

        history.record(list(&[3]));
        assert_eq!(history.len(), 2);
        assert!(!history.can_redo());
        assert_eq!(history.redo(), None);
        assert_eq!(history.current().tasks, list(&[3]));
        assert_eq!(history.undo(), Some(&list(&[])));
    }

    #[test]
    fn flags_track_cursor_position() {
        let mut history = History::new(list(&[]));
        history.record(list(&[1]));
        assert!(history.can_undo());
        assert!(!history.can_redo());
        history.undo();
        assert!(!history.can_undo());
        assert!(history.can_redo());
    }

    #[test]
    fn oldest_entries_fall_off_past_the_limit() {
        let mut history = History::new(list(&[]));
        for id in 1..=(HISTORY_LIMIT as u64 + 10) {
            history.record(list(&[id]));
        }
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.cursor(), HISTORY_LIMIT - 1);
        assert_eq!(history.current().tasks, list(&[HISTORY_LIMIT as u64 + 10]));
        while history.undo().is_some() {}
        assert_eq!(history.current().tasks, list(&[11]));
    }
}
