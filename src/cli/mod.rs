//! CLI command definitions for rudo.
//!
//! `Cli` is parsed with clap's derive macros; `main` dispatches on
//! [`Command`].

pub mod export;

use clap::{Args, Parser, Subcommand};
use export::ExportArgs;
use std::path::PathBuf;

use crate::report::OutputFormat;

/// Command line task manager with recurrent tasks
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a task: description words plus key:value attributes and +tags
    Add {
        #[arg(required = true, num_args = 1..)]
        args: Vec<String>,
    },

    /// Complete the tasks matching a filter
    Do(CloseArgs),

    /// Delete the tasks matching a filter
    Rm(CloseArgs),

    /// Modify the attributes of a task
    Mod {
        /// Task id or short id
        id: String,

        /// key:value attributes, +tag, -tag; `key:` clears a field.
        /// Flags must come before these words.
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        args: Vec<String>,

        /// Modify the parent of the task instead
        #[arg(short, long)]
        parent: bool,
    },

    /// Freeze a task, stopping a recurrent parent from breeding children
    Freeze(StateArgs),

    /// Unfreeze a task
    Unfreeze(StateArgs),

    /// Open tasks
    Open(ReportArgs),

    /// Open recurring parents
    Recurring(ReportArgs),

    /// Open repeating parents
    Repeating(ReportArgs),

    /// Frozen tasks
    Frozen(ReportArgs),

    /// Projects with open tasks
    Projects(ReportArgs),

    /// Tags with open tasks
    Tags(ReportArgs),

    /// Export the database as JSON
    Export(ExportArgs),
}

#[derive(Args, Debug)]
pub struct CloseArgs {
    /// Task ids, short ids, or key:value conditions
    #[arg(required = true, num_args = 1..)]
    pub filter: Vec<String>,

    /// When the tasks were closed, as a date expression
    #[arg(short = 'd', long, default_value = "now")]
    pub close_date: String,

    /// Close the parent of the tasks as well
    #[arg(short, long)]
    pub parent: bool,
}

#[derive(Args, Debug)]
pub struct StateArgs {
    /// Task id or short id
    pub id: String,

    /// Apply to the parent of the task instead
    #[arg(short, long)]
    pub parent: bool,
}

#[derive(Args, Debug)]
pub struct ReportArgs {
    /// Output format: text or json
    #[arg(long, default_value = "text")]
    pub format: OutputFormat,
}
