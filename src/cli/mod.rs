//! Hierarchical CLI for mdbase-tasknotes.
//!
//! Argument parsing lives here (clap derive); execution lives in
//! [`run`]. Commands never print directly: they return a [`CliOutput`]
//! with stdout lines, stderr lines, and an exit code, which keeps every
//! command testable without capturing process output.

mod report;
mod run;
mod tasks;

#[cfg(test)]
mod tests;

pub use run::{run, CliOutput};

use clap::{Parser, Subcommand};

/// Task management over markdown documents.
///
/// Tasks are plain markdown files with YAML frontmatter in a collection
/// folder. Commands accept a task reference: a path, an exact title, an
/// exact filename, or a fragment of either.
#[derive(Parser, Debug)]
#[command(name = "mtn")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Collection root to operate on (overrides env and config).
    #[arg(long, global = true, value_name = "PATH")]
    pub collection: Option<String>,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a collection: schema config, task type, tasks folder.
    Init {
        /// Overwrite existing schema files.
        #[arg(long)]
        force: bool,
    },

    /// Capture a task from one line of text.
    ///
    /// Trigger words are extracted: #tag @context +project *status
    /// !priority, "due <date>", "scheduled <date>", recurrence phrases
    /// ("daily", "every monday", "every 2 weeks"), ~30m / ~2h estimates.
    /// Text after "//" becomes the task body.
    #[command(alias = "c")]
    Create {
        /// The capture line.
        #[arg(required = true)]
        text: Vec<String>,

        /// Body text, in addition to any "//" details.
        #[arg(long)]
        body: Option<String>,
    },

    /// List tasks.
    ///
    /// By default shows open tasks ordered by due date. Status filters are
    /// overlay-aware: a recurring task counts as done on a date only when
    /// that date's instance was completed.
    #[command(alias = "ls")]
    List {
        /// Filter by effective status (open, in-progress, done, cancelled).
        #[arg(long)]
        status: Option<String>,

        /// Filter by priority.
        #[arg(long)]
        priority: Option<String>,

        /// Filter by tag.
        #[arg(long)]
        tag: Option<String>,

        /// Filter by project name.
        #[arg(long)]
        project: Option<String>,

        /// Filter by exact due date (YYYY-MM-DD).
        #[arg(long)]
        due: Option<String>,

        /// Only tasks past their due date and still open.
        #[arg(long)]
        overdue: bool,

        /// As-of date for recurring-instance states (default today).
        #[arg(long, value_name = "DATE")]
        on: Option<String>,

        /// Include completed and cancelled tasks.
        #[arg(long)]
        all: bool,

        /// Maximum number of rows.
        #[arg(long)]
        limit: Option<usize>,

        /// Emit JSON instead of text rows.
        #[arg(long)]
        json: bool,
    },

    /// Show one task in detail.
    Show {
        /// Task reference (path, title, filename, or fragment).
        reference: String,

        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Complete a task (or one instance of a recurring task).
    #[command(alias = "done")]
    Complete {
        /// Task reference.
        reference: String,

        /// Instance date for recurring tasks (default today).
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },

    /// Update fields on a task.
    ///
    /// An empty value clears the field (e.g. --due "").
    Update {
        /// Task reference.
        reference: String,

        /// New title.
        #[arg(long)]
        title: Option<String>,

        /// New status.
        #[arg(long)]
        status: Option<String>,

        /// New priority.
        #[arg(long)]
        priority: Option<String>,

        /// New due date (YYYY-MM-DD), empty to clear.
        #[arg(long)]
        due: Option<String>,

        /// New scheduled date (YYYY-MM-DD), empty to clear.
        #[arg(long)]
        scheduled: Option<String>,

        /// New recurrence rule, empty to clear.
        #[arg(long)]
        recurrence: Option<String>,

        /// New time estimate in minutes, 0 to clear.
        #[arg(long)]
        estimate: Option<i64>,

        /// Add a tag.
        #[arg(long = "add-tag", value_name = "TAG")]
        add_tag: Vec<String>,

        /// Remove a tag.
        #[arg(long = "remove-tag", value_name = "TAG")]
        remove_tag: Vec<String>,

        /// Add a context.
        #[arg(long = "add-context", value_name = "CONTEXT")]
        add_context: Vec<String>,

        /// Remove a context.
        #[arg(long = "remove-context", value_name = "CONTEXT")]
        remove_context: Vec<String>,

        /// Add a project.
        #[arg(long = "add-project", value_name = "PROJECT")]
        add_project: Vec<String>,

        /// Remove a project.
        #[arg(long = "remove-project", value_name = "PROJECT")]
        remove_project: Vec<String>,
    },

    /// Skip one instance of a recurring task.
    Skip {
        /// Task reference.
        reference: String,

        /// Instance date (default today).
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },

    /// Un-skip a previously skipped instance.
    Unskip {
        /// Task reference.
        reference: String,

        /// Instance date (default today).
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },

    /// Tag a task as archived.
    Archive {
        /// Task reference.
        reference: String,
    },

    /// Delete a task file.
    #[command(alias = "rm")]
    Delete {
        /// Task reference.
        reference: String,

        /// Actually delete; without this the command refuses.
        #[arg(long)]
        force: bool,
    },

    /// Full-text search across titles, tags, contexts, projects, bodies.
    Search {
        /// Search text.
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Time tracking.
    #[command(subcommand)]
    Timer(TimerCommand),

    /// Project aggregations.
    #[command(subcommand)]
    Projects(ProjectsCommand),

    /// Collection statistics.
    Stats {
        /// Emit JSON instead of text.
        #[arg(long)]
        json: bool,
    },

    /// Show or edit CLI configuration.
    Config {
        /// Set a config key (currently: collection).
        #[arg(long, num_args = 2, value_names = ["KEY", "VALUE"])]
        set: Option<Vec<String>>,
    },
}

/// `mtn timer` subcommands.
#[derive(Subcommand, Debug)]
pub enum TimerCommand {
    /// Start tracking time on a task.
    Start {
        /// Task reference.
        reference: String,

        /// Note on what the time is spent on.
        #[arg(long)]
        description: Option<String>,
    },

    /// Stop the running timer.
    Stop,

    /// Show the running timer, if any.
    Status,

    /// List time entries for a task, or all tasks with entries.
    Log {
        /// Task reference; omit for all tasks.
        reference: Option<String>,
    },
}

/// `mtn projects` subcommands.
#[derive(Subcommand, Debug)]
pub enum ProjectsCommand {
    /// List project names with open/done task counts.
    List,

    /// List the tasks of one project.
    Show {
        /// Project name.
        name: String,
    },
}
