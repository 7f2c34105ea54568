mod cli;
mod commands;
mod history;
mod logging;
mod model;
mod session;
mod storage;
#[cfg(test)]
mod test_helpers;
mod ui;
mod view;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let file = args.file;
    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Init => commands::init(),
        cli::Command::List { filter, search } => commands::list(file, filter, search),
        cli::Command::Add { text } => commands::add(file, text),
        cli::Command::Toggle { id } => commands::toggle(file, id),
        cli::Command::Edit { id, text } => commands::edit(file, id, text),
        cli::Command::Remove { id } => commands::remove(file, id),
        cli::Command::Tui => commands::tui(file),
    }
}
