//! Command-line interface for task
//!
//! This module defines the CLI structure using clap derive macros.
//! Command bodies live in submodules and take an explicit options struct.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::Result;

mod stats;
mod task;

/// task - a local TODO list
///
/// Tasks live in an embedded database under `$HOME/task`. Ids are renumbered
/// after every delete so they always run 1..N.
#[derive(Parser, Debug)]
#[command(name = "task")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory (defaults to $HOME/task)
    #[arg(long, global = true, env = "TASK_DIR")]
    pub dir: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Add a new task; `+word` sets its tag
    Add {
        /// Task description
        #[arg(required = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },

    /// Mark tasks as complete
    Do {
        /// Task ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Also move the completed tasks to the archive
        #[arg(short, long)]
        finish: bool,
    },

    /// Change a task's description or flip its status
    Update {
        /// Task id
        id: String,

        /// New description; a `+tag` in it replaces the current tag
        #[arg(short = 'd', long = "des", allow_hyphen_values = true)]
        description: Option<String>,

        /// Flip the completion status
        #[arg(short, long)]
        status: bool,
    },

    /// List tasks, optionally filtered by `+tag` (use `+none` for untagged)
    List {
        /// Tags to include, written as `+tag`
        tags: Vec<String>,

        /// Show the tag of each task
        #[arg(short = 't', long = "tag")]
        show_tags: bool,

        /// Comma separated tags to leave out
        #[arg(short, long, value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// Move all completed tasks to the archive
    Finish,

    /// Delete tasks
    Delete {
        /// Task ids
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete all tasks
    Clear,

    /// Show finished tasks
    Archive {
        /// Delete all archive entries
        #[arg(short, long)]
        clear: bool,
    },

    /// Completion statistics over the archive
    Stats {
        /// Start date (mm/dd/yyyy)
        #[arg(short, long, conflicts_with = "on")]
        start: Option<String>,

        /// End date (mm/dd/yyyy); requires --start
        #[arg(short, long, conflicts_with = "on")]
        end: Option<String>,

        /// Single day (mm/dd/yyyy)
        #[arg(short, long)]
        on: Option<String>,

        /// List the completed tasks
        #[arg(short, long)]
        verbose: bool,

        /// Show the average number of tasks completed per day
        #[arg(short, long)]
        average: bool,
    },

    /// Print the number of tasks
    Count,

    /// Print the tags in use
    Tags,
}

impl Cli {
    /// Execute the CLI command
    pub fn run(self) -> Result<()> {
        let common = task::CommonOptions {
            dir: self.dir,
            json: self.json,
            quiet: self.quiet,
        };

        match self.command {
            Commands::Add { text } => task::run_add(task::AddOptions { text, common }),
            Commands::Do { ids, finish } => task::run_do(task::DoOptions {
                ids,
                finish,
                common,
            }),
            Commands::Update {
                id,
                description,
                status,
            } => task::run_update(task::UpdateCmdOptions {
                id,
                description,
                flip_status: status,
                common,
            }),
            Commands::List {
                tags,
                show_tags,
                exclude,
            } => task::run_list(task::ListOptions {
                tags,
                show_tags,
                exclude,
                common,
            }),
            Commands::Finish => task::run_finish(common),
            Commands::Delete { ids } => task::run_delete(task::DeleteOptions { ids, common }),
            Commands::Clear => task::run_clear(common),
            Commands::Archive { clear } => {
                task::run_archive(task::ArchiveOptions { clear, common })
            }
            Commands::Stats {
                start,
                end,
                on,
                verbose,
                average,
            } => stats::run(stats::StatsOptions {
                start,
                end,
                on,
                verbose,
                average,
                common,
            }),
            Commands::Count => task::run_count(common),
            Commands::Tags => task::run_tags(common),
        }
    }
}
