use crate::logging;
use crate::model::{Task, TaskId};
use crate::session::{Applied, Rejected, Session};
use crate::storage::{init_project_store, locate_current_store, StoreLocation, TaskFile};
use crate::ui;
use crate::view::Filter;
use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;

pub fn init() -> Result<()> {
    logging::init_stderr();
    let location = init_project_store(&env::current_dir()?)?;
    println!("Initialized task store at {}", location.path.display());
    Ok(())
}

pub fn list(file: Option<PathBuf>, filter: Filter, search: String) -> Result<()> {
    logging::init_stderr();
    let (mut session, location) = open_session(file)?;
    session.set_filter(filter);
    session.set_search_term(search);
    println!(
        "Tasks ({}: {}) [{}]",
        location.scope.label(),
        location.path.display(),
        session.filter()
    );
    let visible = session.visible();
    if visible.is_empty() {
        println!("  (no tasks)");
    }
    for task in visible {
        print_task(task);
    }
    Ok(())
}

pub fn add(file: Option<PathBuf>, text: String) -> Result<()> {
    run_action(file, |session| session.add_task(text), |session, applied| {
        if let Applied::Added(id) = applied {
            println!("Added task {}", id);
            if let Some(task) = session.tasks().get(id) {
                print_task(task);
            }
        }
    })
}

pub fn toggle(file: Option<PathBuf>, id: TaskId) -> Result<()> {
    run_action(file, |session| session.toggle_complete(id), |session, _| {
        if let Some(task) = session.tasks().get(id) {
            let state = if task.completed { "done" } else { "not done" };
            println!("Marked task {} {}", id, state);
        }
    })
}

pub fn edit(file: Option<PathBuf>, id: TaskId, text: String) -> Result<()> {
    run_action(file, |session| session.edit_task(id, text), |session, _| {
        println!("Updated task {}", id);
        if let Some(task) = session.tasks().get(id) {
            print_task(task);
        }
    })
}

pub fn remove(file: Option<PathBuf>, id: TaskId) -> Result<()> {
    run_action(file, |session| session.remove_task(id), |_, _| {
        println!("Removed task {}", id);
    })
}

pub fn tui(file: Option<PathBuf>) -> Result<()> {
    let location = locate_current_store(file)?;
    logging::init_file(&location.log_path())?;
    let session = Session::open(TaskFile::new(location.clone()));
    ui::run(session, location)
}

/// Apply one action to the stored collection. A rejected action is reported
/// and leaves the store as it was.
fn run_action<A, R>(file: Option<PathBuf>, act: A, report: R) -> Result<()>
where
    A: FnOnce(&mut Session<TaskFile>) -> Result<Applied, Rejected>,
    R: FnOnce(&Session<TaskFile>, Applied),
{
    logging::init_stderr();
    let (mut session, _) = open_session(file)?;
    match act(&mut session) {
        Ok(applied) => {
            if let Some(err) = session.save_error() {
                bail!("could not save tasks: {}", err);
            }
            report(&session, applied);
        }
        Err(rejected) => eprintln!("Nothing changed: {}", rejected),
    }
    Ok(())
}

fn open_session(file: Option<PathBuf>) -> Result<(Session<TaskFile>, StoreLocation)> {
    let location = locate_current_store(file)?;
    let session = Session::open(TaskFile::new(location.clone()));
    Ok((session, location))
}

fn print_task(task: &Task) {
    let mark = if task.completed { "x" } else { " " };
    println!("  [{}] {:>3}  {}", mark, task.id, task.text);
}
