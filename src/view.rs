use crate::model::Task;
use clap::ValueEnum;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Filter {
    #[default]
    All,
    Completed,
    Incomplete,
}

impl Filter {
    pub const ALL: [Filter; 3] = [Filter::All, Filter::Completed, Filter::Incomplete];

    pub fn matches(self, task: &Task) -> bool {
        match self {
            Filter::All => true,
            Filter::Completed => task.completed,
            Filter::Incomplete => !task.completed,
        }
    }

    pub fn next(self) -> Filter {
        match self {
            Filter::All => Filter::Completed,
            Filter::Completed => Filter::Incomplete,
            Filter::Incomplete => Filter::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Filter::All => "All",
            Filter::Completed => "Completed",
            Filter::Incomplete => "Incomplete",
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label().to_lowercase())
    }
}

/// Visible subset of `tasks` under the status filter and a case-insensitive
/// substring search. Keeps the collection order.
pub fn project<'a>(tasks: &'a [Task], filter: Filter, search: &str) -> Vec<&'a Task> {
    let needle = search.to_lowercase();
    tasks
        .iter()
        .filter(|task| filter.matches(task))
        .filter(|task| needle.is_empty() || task.text.to_lowercase().contains(&needle))
        .collect()
}
