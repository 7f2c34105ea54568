//! In-memory store shared by the session and TUI tests.

use crate::model::{Task, TaskId};
use crate::session::Persistence;
use anyhow::{bail, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Clones share the same backing state, so a test can keep a handle while the
/// session owns another.
#[derive(Default, Clone)]
pub struct MemoryStore {
    pub saved: Rc<RefCell<Option<Vec<Task>>>>,
    pub mark: Rc<Cell<Option<TaskId>>>,
    pub saves: Rc<Cell<usize>>,
    pub fail_load: bool,
    pub fail_save: bool,
}

impl MemoryStore {
    pub fn with(tasks: Vec<Task>) -> Self {
        let store = MemoryStore::default();
        *store.saved.borrow_mut() = Some(tasks);
        store
    }

    pub fn saved(&self) -> Option<Vec<Task>> {
        self.saved.borrow().clone()
    }
}

impl Persistence for MemoryStore {
    fn load(&self) -> Result<Option<Vec<Task>>> {
        if self.fail_load {
            bail!("corrupt store");
        }
        Ok(self.saved())
    }

    fn save(&self, tasks: &[Task]) -> Result<()> {
        if self.fail_save {
            bail!("quota exceeded");
        }
        *self.saved.borrow_mut() = Some(tasks.to_vec());
        self.saves.set(self.saves.get() + 1);
        Ok(())
    }

    fn load_id_mark(&self) -> Result<Option<TaskId>> {
        Ok(self.mark.get())
    }

    fn save_id_mark(&self, next: TaskId) -> Result<()> {
        self.mark.set(Some(next));
        Ok(())
    }
}

pub fn task(id: TaskId, text: &str, completed: bool) -> Task {
    Task {
        id,
        text: text.into(),
        completed,
    }
}
