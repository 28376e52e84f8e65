//! Command-line front end for the task lists.
//!
//! # Responsibility
//! - Construct the store and manager explicitly for one invocation.
//! - Apply a single mutation, wait for its writes, print both lists.
//!
//! # Invariants
//! - Every mutation goes through `TaskListManager`.
//! - The process does not exit before queued writes were attempted.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tasklist_core::{
    core_version, init_logging, CoreConfig, SqliteListStore, TaskListError, TaskListManager,
    TaskLists, MAX_TASK_CHARS,
};

#[derive(Debug, Parser)]
#[command(name = "tasklist", about = "Track todo and completed tasks")]
struct Cli {
    /// Database file; overrides TASKLIST_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// trace|debug|info|warn|error; overrides TASKLIST_LOG_LEVEL.
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Absolute directory for log files; overrides TASKLIST_LOG_DIR.
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
enum Command {
    /// Print both lists.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Add a task to the todo list.
    Add {
        #[arg(required = true, num_args = 1..)]
        text: Vec<String>,
    },
    /// Move a todo task to the completed list.
    Done { index: usize },
    /// Delete a todo task.
    Rm { index: usize },
    /// Delete a completed task.
    RmDone { index: usize },
    /// Print the core version.
    Version,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if err.downcast_ref::<TaskListError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = resolve_config(&cli)?;

    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir).context("failed to initialize logging")?;
    }

    if cli.command == Command::Version {
        println!("tasklist_core version={}", core_version());
        return Ok(());
    }

    let store = SqliteListStore::open(&config.db_path)
        .await
        .with_context(|| format!("failed to open `{}`", config.db_path.display()))?;
    let manager = TaskListManager::initialize(Arc::new(store), config.manager).await;
    let mut failures = manager.persistence_failures();

    let mut json = false;
    match cli.command {
        Command::List { json: as_json } => json = as_json,
        Command::Add { text } => {
            if manager.add_task(&text.join(" ")).is_none() {
                eprintln!("nothing added: task text must be 1-{MAX_TASK_CHARS} characters");
            }
        }
        Command::Done { index } => {
            manager.complete_task(index)?;
        }
        Command::Rm { index } => {
            manager.delete_task(index)?;
        }
        Command::RmDone { index } => {
            manager.delete_completed_task(index)?;
        }
        Command::Version => {}
    }

    manager.flush().await;
    if let Ok(failure) = failures.try_recv() {
        bail!(
            "failed to save {} after {} attempt(s): {}",
            failure.key,
            failure.attempts,
            failure.message
        );
    }

    let lists = manager.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&lists)?);
    } else {
        print!("{}", render_lists(&lists));
    }
    Ok(())
}

fn resolve_config(cli: &Cli) -> anyhow::Result<CoreConfig> {
    let mut config = CoreConfig::from_env().context("invalid environment configuration")?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(log_dir) = &cli.log_dir {
        config.log_dir = Some(log_dir.clone());
    }
    Ok(config)
}

fn render_lists(lists: &TaskLists) -> String {
    let mut out = String::new();
    for (title, tasks) in [("Todo", &lists.todo), ("Completed", &lists.completed)] {
        out.push_str(&format!("{title} ({})\n", tasks.len()));
        for (index, task) in tasks.iter().enumerate() {
            out.push_str(&format!("  {index}. {task}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{render_lists, Cli, Command};
    use clap::Parser;
    use tasklist_core::{Task, TaskLists};

    #[test]
    fn add_joins_words_and_global_flags_parse_after_subcommand() {
        let cli =
            Cli::try_parse_from(["tasklist", "add", "buy", "milk", "--db", "/tmp/t.db"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Add {
                text: vec!["buy".to_string(), "milk".to_string()]
            }
        );
        assert_eq!(cli.db.unwrap().to_str(), Some("/tmp/t.db"));
    }

    #[test]
    fn index_commands_require_numbers() {
        assert!(Cli::try_parse_from(["tasklist", "done", "first"]).is_err());
        let cli = Cli::try_parse_from(["tasklist", "rm-done", "2"]).unwrap();
        assert_eq!(cli.command, Command::RmDone { index: 2 });
    }

    #[test]
    fn render_lists_numbers_from_zero() {
        let lists = TaskLists {
            todo: vec![Task::parse("B").unwrap()],
            completed: vec![Task::parse("A").unwrap()],
        };
        assert_eq!(
            render_lists(&lists),
            "Todo (1)\n  0. B\nCompleted (1)\n  0. A\n"
        );
    }
}
