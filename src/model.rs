use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Deref;
use std::rc::Rc;

pub type TaskId = u64;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub text: String,
    pub completed: bool,
}

/// Ordered task collection. Every operation returns a new list, so a clone
/// held by the history log never observes later changes.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(from = "Vec<Task>", into = "Vec<Task>")]
pub struct TaskList {
    tasks: Rc<[Task]>,
}

impl TaskList {
    pub fn new() -> Self {
        Vec::new().into()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.position(id).is_some()
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn max_id(&self) -> Option<TaskId> {
        self.tasks.iter().map(|t| t.id).max()
    }

    pub fn add_task(&self, id: TaskId, text: &str) -> TaskList {
        let text = text.trim();
        if text.is_empty() || self.contains(id) {
            return self.clone();
        }
        let mut tasks = self.tasks.to_vec();
        tasks.push(Task {
            id,
            text: text.to_string(),
            completed: false,
        });
        tasks.into()
    }

    pub fn toggle_task(&self, id: TaskId) -> TaskList {
        self.update(id, |task| task.completed = !task.completed)
    }

    pub fn edit_task(&self, id: TaskId, text: &str) -> TaskList {
        let text = text.trim();
        if text.is_empty() {
            return self.clone();
        }
        self.update(id, |task| task.text = text.to_string())
    }

    pub fn remove_task(&self, id: TaskId) -> TaskList {
        if !self.contains(id) {
            return self.clone();
        }
        self.tasks
            .iter()
            .filter(|t| t.id != id)
            .cloned()
            .collect::<Vec<_>>()
            .into()
    }

    /// Build the collection restored from storage, replacing whatever came
    /// before. Records whose id was already seen are dropped (first kept);
    /// the second value is how many.
    pub fn replace_all(records: Vec<Task>) -> (TaskList, usize) {
        let before = records.len();
        let mut seen = HashSet::new();
        let kept: Vec<Task> = records.into_iter().filter(|t| seen.insert(t.id)).collect();
        let dropped = before - kept.len();
        (kept.into(), dropped)
    }

    fn update<F>(&self, id: TaskId, f: F) -> TaskList
    where
        F: FnOnce(&mut Task),
    {
        let Some(idx) = self.position(id) else {
            return self.clone();
        };
        let mut tasks = self.tasks.to_vec();
        f(&mut tasks[idx]);
        tasks.into()
    }

    fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == id)
    }
}

impl Default for TaskList {
    fn default() -> Self {
        TaskList::new()
    }
}

impl Deref for TaskList {
    type Target = [Task];

    fn deref(&self) -> &[Task] {
        &self.tasks
    }
}

impl From<Vec<Task>> for TaskList {
    fn from(tasks: Vec<Task>) -> Self {
        TaskList {
            tasks: tasks.into(),
        }
    }
}

impl From<TaskList> for Vec<Task> {
    fn from(list: TaskList) -> Self {
        list.tasks.to_vec()
    }
}

/// Hands out task ids. Never moves backwards, so an id freed by removal or
/// undo is not handed out again. `next` is `None` once the id space is used up.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: Option<TaskId>,
}

impl IdAllocator {
    /// Start above the highest id in `tasks` and at or above `mark`, the
    /// high-water mark left by an earlier session.
    pub fn seeded_from(tasks: &TaskList, mark: Option<TaskId>) -> Self {
        let after_max = match tasks.max_id() {
            Some(max) => max.checked_add(1),
            None => Some(1),
        };
        let next = after_max.map(|id| mark.map_or(id, |mark| id.max(mark)));
        IdAllocator { next }
    }

    /// Next id not present in `in_use`, or `None` when none is left.
    pub fn allocate(&mut self, in_use: &TaskList) -> Option<TaskId> {
        while let Some(id) = self.next {
            self.next = id.checked_add(1);
            if !in_use.contains(id) {
                return Some(id);
            }
        }
        None
    }

    /// The id the next allocation starts from.
    pub fn mark(&self) -> Option<TaskId> {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn task(id: TaskId, text: &str, completed: bool) -> Task {
        Task {
            id,
            text: text.into(),
            completed,
        }
    }

    fn sample() -> TaskList {
        vec![
            task(1, "Brush teeth", true),
            task(2, "Buy groceries", false),
            task(3, "Pay rent", false),
        ]
        .into()
    }

    #[test]
    fn add_appends_incomplete_task() {
        let list = sample().add_task(4, "  Clean room ");
        assert_eq!(list.len(), 4);
        assert_eq!(list[3], task(4, "Clean room", false));
    }

    #[test]
    fn add_rejects_blank_text() {
        let list = sample();
        assert_eq!(list.add_task(4, "   \t"), list);
    }

    #[test]
    fn add_refuses_duplicate_id() {
        let list = sample();
        assert_eq!(list.add_task(2, "again"), list);
    }

    #[test]
    fn toggle_flips_only_the_target() {
        let list = sample().toggle_task(2);
        assert_eq!(
            &*list,
            &[
                task(1, "Brush teeth", true),
                task(2, "Buy groceries", true),
                task(3, "Pay rent", false),
            ]
        );
    }

    #[test]
    fn edit_replaces_text_and_keeps_status() {
        let list = sample().edit_task(1, "Floss");
        assert_eq!(list[0], task(1, "Floss", true));
    }

    #[test]
    fn remove_keeps_relative_order() {
        let list = sample().remove_task(2);
        let ids: Vec<_> = list.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn unknown_id_is_a_no_op() {
        let list = sample();
        assert_eq!(list.toggle_task(99), list);
        assert_eq!(list.edit_task(99, "x"), list);
        assert_eq!(list.remove_task(99), list);
    }

    #[test]
    fn previous_list_is_untouched_by_operations() {
        let before = sample();
        let snapshot = before.clone();
        let _ = before.toggle_task(1).remove_task(2).add_task(9, "new");
        assert_eq!(before, snapshot);
        assert!(before[0].completed);
    }

    #[test]
    fn replace_all_keeps_restored_records() {
        let (list, dropped) = TaskList::replace_all(vec![task(7, "restored", false)]);
        assert_eq!(dropped, 0);
        assert_eq!(&*list, &[task(7, "restored", false)]);
    }

    #[test]
    fn replace_all_drops_duplicate_ids() {
        let (list, dropped) = TaskList::replace_all(vec![
            task(1, "a", false),
            task(2, "b", false),
            task(1, "c", true),
        ]);
        assert_eq!(dropped, 1);
        assert_eq!(&*list, &[task(1, "a", false), task(2, "b", false)]);
    }

    #[test]
    fn allocator_starts_after_highest_id() {
        let tasks = sample();
        let mut ids = IdAllocator::seeded_from(&tasks, None);
        assert_eq!(ids.allocate(&tasks), Some(4));
        assert_eq!(ids.allocate(&tasks), Some(5));
        assert_eq!(ids.mark(), Some(6));
        let empty = TaskList::new();
        assert_eq!(IdAllocator::seeded_from(&empty, None).allocate(&empty), Some(1));
    }

    #[test]
    fn allocator_honours_high_water_mark() {
        let tasks = sample();
        let mut ids = IdAllocator::seeded_from(&tasks, Some(10));
        assert_eq!(ids.allocate(&tasks), Some(10));
        let mut ids = IdAllocator::seeded_from(&tasks, Some(2));
        assert_eq!(ids.allocate(&tasks), Some(4));
    }

    #[test]
    fn allocator_skips_ids_in_use() {
        let tasks: TaskList = vec![task(5, "five", false), task(6, "six", false)].into();
        let mut ids = IdAllocator::seeded_from(&TaskList::new(), Some(5));
        assert_eq!(ids.allocate(&tasks), Some(7));
    }

    #[test]
    fn allocator_is_exhausted_after_max_id() {
        let tasks: TaskList = vec![task(TaskId::MAX, "last", false)].into();
        let mut ids = IdAllocator::seeded_from(&tasks, None);
        assert_eq!(ids.mark(), None);
        assert_eq!(ids.allocate(&tasks), None);

        let below: TaskList = vec![task(TaskId::MAX - 1, "almost", false)].into();
        let mut ids = IdAllocator::seeded_from(&below, None);
        assert_eq!(ids.allocate(&below), Some(TaskId::MAX));
        assert_eq!(ids.allocate(&below), None);
    }

    #[test]
    fn serializes_as_plain_records() {
        let yaml = serde_yaml::to_string(&TaskList::from(vec![task(1, "a", true)])).unwrap();
        assert_eq!(yaml, "- id: 1\n  text: a\n  completed: true\n");
        let back: TaskList = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back[0], task(1, "a", true));
    }
}
