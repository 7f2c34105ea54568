use crate::history::History;
use crate::model::{IdAllocator, Task, TaskId, TaskList};
use crate::view::{self, Filter};
use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Durable home of the canonical task collection.
pub trait Persistence {
    /// Last saved collection, or `None` when nothing was ever saved.
    fn load(&self) -> Result<Option<Vec<Task>>>;
    fn save(&self, tasks: &[Task]) -> Result<()>;

    /// Lowest id a new task may take, as left by an earlier session.
    fn load_id_mark(&self) -> Result<Option<TaskId>> {
        Ok(None)
    }

    fn save_id_mark(&self, _next: TaskId) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    AddTask { text: String },
    ToggleTask { id: TaskId },
    EditTask { id: TaskId, text: String },
    RemoveTask { id: TaskId },
    SetFilter(Filter),
    SetSearch(String),
    Undo,
    Redo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Added(TaskId),
    Updated,
    Restored,
    ViewChanged,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejected {
    #[error("task text is empty")]
    BlankText,
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("nothing to undo")]
    NothingToUndo,
    #[error("nothing to redo")]
    NothingToRedo,
    #[error("no task ids left")]
    IdsExhausted,
}

/// Owns the canonical collection, its history and the view settings. All
/// changes go through [`Session::dispatch`].
pub struct Session<P: Persistence> {
    store: P,
    tasks: TaskList,
    history: History,
    ids: IdAllocator,
    filter: Filter,
    search: String,
    last_saved: Option<DateTime<Utc>>,
    save_error: Option<String>,
}

impl<P: Persistence> Session<P> {
    /// Restore the last saved collection. Unreadable storage starts empty.
    pub fn open(store: P) -> Self {
        let tasks = match store.load() {
            Ok(Some(records)) => {
                let (tasks, dropped) = TaskList::replace_all(records);
                if dropped > 0 {
                    warn!(dropped, "dropped stored tasks with duplicate ids");
                }
                tasks
            }
            Ok(None) => TaskList::new(),
            Err(err) => {
                let message = format!("{:#}", err);
                warn!(error = %message, "could not load tasks, starting empty");
                TaskList::new()
            }
        };
        let mark = store.load_id_mark().unwrap_or_else(|err| {
            let message = format!("{:#}", err);
            warn!(error = %message, "could not load id mark");
            None
        });
        debug!(count = tasks.len(), ?mark, "session opened");
        Session {
            ids: IdAllocator::seeded_from(&tasks, mark),
            store,
            history: History::new(tasks.clone()),
            tasks,
            filter: Filter::All,
            search: String::new(),
            last_saved: None,
            save_error: None,
        }
    }

    pub fn dispatch(&mut self, action: Action) -> Result<Applied, Rejected> {
        debug!(?action, "dispatch");
        match action {
            Action::AddTask { text } => {
                if text.trim().is_empty() {
                    return Err(Rejected::BlankText);
                }
                let id = self.ids.allocate(&self.tasks).ok_or(Rejected::IdsExhausted)?;
                let next = self.tasks.add_task(id, &text);
                self.commit(next);
                Ok(Applied::Added(id))
            }
            Action::ToggleTask { id } => {
                self.ensure_exists(id)?;
                let next = self.tasks.toggle_task(id);
                self.commit(next);
                Ok(Applied::Updated)
            }
            Action::EditTask { id, text } => {
                if text.trim().is_empty() {
                    return Err(Rejected::BlankText);
                }
                self.ensure_exists(id)?;
                let next = self.tasks.edit_task(id, &text);
                self.commit(next);
                Ok(Applied::Updated)
            }
            Action::RemoveTask { id } => {
                self.ensure_exists(id)?;
                let next = self.tasks.remove_task(id);
                self.commit(next);
                Ok(Applied::Updated)
            }
            Action::SetFilter(filter) => {
                self.set_filter(filter);
                Ok(Applied::ViewChanged)
            }
            Action::SetSearch(term) => {
                self.set_search_term(term);
                Ok(Applied::ViewChanged)
            }
            Action::Undo => {
                let snapshot = self.history.undo().ok_or(Rejected::NothingToUndo)?.clone();
                self.restore(snapshot);
                Ok(Applied::Restored)
            }
            Action::Redo => {
                let snapshot = self.history.redo().ok_or(Rejected::NothingToRedo)?.clone();
                self.restore(snapshot);
                Ok(Applied::Restored)
            }
        }
    }

    pub fn add_task(&mut self, text: impl Into<String>) -> Result<Applied, Rejected> {
        self.dispatch(Action::AddTask { text: text.into() })
    }

    pub fn toggle_complete(&mut self, id: TaskId) -> Result<Applied, Rejected> {
        self.dispatch(Action::ToggleTask { id })
    }

    pub fn edit_task(&mut self, id: TaskId, text: impl Into<String>) -> Result<Applied, Rejected> {
        self.dispatch(Action::EditTask {
            id,
            text: text.into(),
        })
    }

    pub fn remove_task(&mut self, id: TaskId) -> Result<Applied, Rejected> {
        self.dispatch(Action::RemoveTask { id })
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search = term.into();
    }

    pub fn undo(&mut self) -> Result<Applied, Rejected> {
        self.dispatch(Action::Undo)
    }

    pub fn redo(&mut self) -> Result<Applied, Rejected> {
        self.dispatch(Action::Redo)
    }

    pub fn visible(&self) -> Vec<&Task> {
        view::project(&self.tasks, self.filter, &self.search)
    }

    pub fn tasks(&self) -> &TaskList {
        &self.tasks
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    pub fn last_saved(&self) -> Option<DateTime<Utc>> {
        self.last_saved
    }

    pub fn save_error(&self) -> Option<&str> {
        self.save_error.as_deref()
    }

    fn ensure_exists(&self, id: TaskId) -> Result<(), Rejected> {
        if self.tasks.contains(id) {
            Ok(())
        } else {
            Err(Rejected::TaskNotFound(id))
        }
    }

    fn commit(&mut self, tasks: TaskList) {
        self.tasks = tasks.clone();
        self.history.record(tasks);
        self.persist();
    }

    fn restore(&mut self, tasks: TaskList) {
        self.tasks = tasks;
        self.persist();
    }

    fn persist(&mut self) {
        let saved = self.store.save(&self.tasks).and_then(|()| match self.ids.mark() {
            Some(next) => self.store.save_id_mark(next),
            None => Ok(()),
        });
        match saved {
            Ok(()) => {
                self.last_saved = Some(Utc::now());
                self.save_error = None;
            }
            Err(err) => {
                let message = format!("{:#}", err);
                warn!(error = %message, "could not save tasks");
                self.save_error = Some(message);
            }
        }
    }
}
