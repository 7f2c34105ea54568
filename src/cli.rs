use crate::model::TaskId;
use crate::view::Filter;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "taskpad", version, about = "Task list editor with undo and redo")]
pub struct Cli {
    /// Task file to use instead of the project or global store
    #[arg(long, global = true, env = "TASKPAD_FILE")]
    pub file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a project task store in the current directory
    Init,
    /// List tasks
    List {
        /// Only show tasks with this status
        #[arg(long, value_enum, default_value_t = Filter::All)]
        filter: Filter,
        /// Only show tasks whose text contains this (case-insensitive)
        #[arg(long, short = 's', default_value = "")]
        search: String,
    },
    /// Add a new task
    Add {
        /// Task text
        text: String,
    },
    /// Flip a task between done and not done
    Toggle {
        /// Task id
        id: TaskId,
    },
    /// Replace the text of a task
    Edit {
        /// Task id
        id: TaskId,
        /// New text
        text: String,
    },
    /// Remove a task
    Remove {
        /// Task id
        id: TaskId,
    },
    /// Launch the interactive TUI
    Tui,
}
