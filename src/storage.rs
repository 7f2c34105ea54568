use crate::model::{Task, TaskId};
use crate::session::Persistence;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::env;
use std::fs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const PROJECT_DIR: &str = ".taskpad";
const STORE_FILE: &str = "tasks.yml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreScope {
    Explicit,
    Project,
    Global,
}

impl StoreScope {
    pub fn label(self) -> &'static str {
        match self {
            StoreScope::Explicit => "file",
            StoreScope::Project => "project",
            StoreScope::Global => "global",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreLocation {
    pub path: PathBuf,
    pub scope: StoreScope,
}

impl StoreLocation {
    /// Sibling file for the TUI log.
    pub fn log_path(&self) -> PathBuf {
        self.path.with_file_name("taskpad.log")
    }

    /// Sidecar holding the id high-water mark, e.g. `tasks.yml.ids`.
    pub fn ids_path(&self) -> PathBuf {
        with_suffix(&self.path, ".ids")
    }

    /// Where an unreadable store is moved before it gets overwritten.
    pub fn backup_path(&self) -> PathBuf {
        with_suffix(&self.path, ".bak")
    }
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

#[derive(Debug, Serialize, Deserialize)]
struct IdMark {
    next_id: TaskId,
}

/// Task collection stored as a YAML sequence of `{id, text, completed}`.
#[derive(Debug, Clone)]
pub struct TaskFile {
    location: StoreLocation,
}

impl TaskFile {
    pub fn new(location: StoreLocation) -> Self {
        TaskFile { location }
    }
}

impl Persistence for TaskFile {
    fn load(&self) -> Result<Option<Vec<Task>>> {
        let path = &self.location.path;
        if !path.exists() {
            debug!(path = %path.display(), "no saved tasks");
            return Ok(None);
        }
        let data = fs::read_to_string(path).with_context(|| format!("reading {:?}", path))?;
        if data.trim().is_empty() {
            return Ok(None);
        }
        let tasks: Vec<Task> = match serde_yaml::from_str(&data) {
            Ok(tasks) => tasks,
            Err(err) => {
                let backup = self.location.backup_path();
                fs::rename(path, &backup)
                    .with_context(|| format!("moving unreadable {:?} aside", path))?;
                warn!(backup = %backup.display(), "unreadable task file moved aside");
                return Err(err).with_context(|| {
                    format!("parsing task file {:?} (kept as {:?})", path, backup)
                });
            }
        };
        debug!(path = %path.display(), count = tasks.len(), "loaded tasks");
        Ok(Some(tasks))
    }

    fn save(&self, tasks: &[Task]) -> Result<()> {
        let path = &self.location.path;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
        }
        let serialized = serde_yaml::to_string(tasks).context("serializing tasks")?;
        fs::write(path, serialized).with_context(|| format!("writing {:?}", path))?;
        debug!(path = %path.display(), count = tasks.len(), "saved tasks");
        Ok(())
    }

    fn load_id_mark(&self) -> Result<Option<TaskId>> {
        let path = self.location.ids_path();
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read_to_string(&path).with_context(|| format!("reading {:?}", path))?;
        let mark: IdMark =
            serde_yaml::from_str(&data).with_context(|| format!("parsing id mark {:?}", path))?;
        Ok(Some(mark.next_id))
    }

    fn save_id_mark(&self, next: TaskId) -> Result<()> {
        let path = self.location.ids_path();
        let serialized = serde_yaml::to_string(&IdMark { next_id: next })?;
        fs::write(&path, serialized).with_context(|| format!("writing {:?}", path))?;
        Ok(())
    }
}

pub fn init_project_store(start: &Path) -> Result<StoreLocation> {
    let dir = start.join(PROJECT_DIR);
    fs::create_dir_all(&dir).with_context(|| format!("creating {:?}", dir))?;
    let location = StoreLocation {
        path: dir.join(STORE_FILE),
        scope: StoreScope::Project,
    };
    if !location.path.exists() {
        TaskFile::new(location.clone()).save(&[])?;
    }
    Ok(location)
}

/// Explicit path first, then the nearest project store, then the global one.
pub fn locate_store(explicit: Option<PathBuf>, start: &Path) -> Result<StoreLocation> {
    if let Some(path) = explicit {
        return Ok(StoreLocation {
            path,
            scope: StoreScope::Explicit,
        });
    }
    if let Some(project_path) = find_project_store(start) {
        return Ok(StoreLocation {
            path: project_path,
            scope: StoreScope::Project,
        });
    }
    Ok(StoreLocation {
        path: global_store_path()?,
        scope: StoreScope::Global,
    })
}

pub fn locate_current_store(explicit: Option<PathBuf>) -> Result<StoreLocation> {
    let cwd = env::current_dir()?;
    locate_store(explicit, &cwd)
}

fn find_project_store(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        let candidate = current.join(PROJECT_DIR).join(STORE_FILE);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = current.parent();
    }
    None
}

fn global_store_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "taskpad").context("locating data directory")?;
    Ok(dirs.data_dir().join(STORE_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn file_in(dir: &TempDir) -> TaskFile {
        TaskFile::new(StoreLocation {
            path: dir.path().join("nested").join(STORE_FILE),
            scope: StoreScope::Explicit,
        })
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        assert!(file_in(&dir).load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_returns_same_records() {
        let dir = TempDir::new().unwrap();
        let store = file_in(&dir);
        let tasks = vec![
            Task {
                id: 1,
                text: "Pay rent".into(),
                completed: false,
            },
            Task {
                id: 5,
                text: "Buy milk: 2%".into(),
                completed: true,
            },
        ];
        store.save(&tasks).unwrap();
        assert_eq!(store.load().unwrap(), Some(tasks));
    }

    #[test]
    fn corrupt_file_is_an_error_and_kept_aside() {
        let dir = TempDir::new().unwrap();
        let store = file_in(&dir);
        let nested = dir.path().join("nested");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(STORE_FILE), "not: [valid").unwrap();

        assert!(store.load().is_err());
        assert!(!nested.join(STORE_FILE).exists());
        assert_eq!(
            fs::read_to_string(nested.join("tasks.yml.bak")).unwrap(),
            "not: [valid"
        );
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn id_mark_is_stored_beside_tasks() {
        let dir = TempDir::new().unwrap();
        let store = file_in(&dir);
        assert_eq!(store.load_id_mark().unwrap(), None);

        store.save(&[]).unwrap();
        store.save_id_mark(7).unwrap();
        assert_eq!(store.load_id_mark().unwrap(), Some(7));
        assert_eq!(
            fs::read_to_string(dir.path().join("nested").join("tasks.yml.ids")).unwrap(),
            "next_id: 7\n"
        );
    }

    #[test]
    fn explicit_path_wins() {
        let dir = TempDir::new().unwrap();
        init_project_store(dir.path()).unwrap();
        let explicit = dir.path().join("elsewhere.yml");
        let location = locate_store(Some(explicit.clone()), dir.path()).unwrap();
        assert_eq!(location.path, explicit);
        assert_eq!(location.scope, StoreScope::Explicit);
    }

    #[test]
    fn project_store_is_found_from_subdirectory() {
        let dir = TempDir::new().unwrap();
        let created = init_project_store(dir.path()).unwrap();
        let nested = dir.path().join("a").join("b");
        fs::create_dir_all(&nested).unwrap();

        let location = locate_store(None, &nested).unwrap();
        assert_eq!(location.path, created.path);
        assert_eq!(location.scope, StoreScope::Project);
        assert_eq!(TaskFile::new(location).load().unwrap(), Some(vec![]));
    }

    #[test]
    fn log_sits_next_to_store() {
        let location = StoreLocation {
            path: PathBuf::from("/tmp/x/tasks.yml"),
            scope: StoreScope::Explicit,
        };
        assert_eq!(location.log_path(), PathBuf::from("/tmp/x/taskpad.log"));
    }
}
