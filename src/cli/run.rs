//! Command execution for the CLI.

use std::process::ExitCode;

use serde::Serialize;

use crate::cli::{report, tasks, Cli, Command, ProjectsCommand, TimerCommand};
use crate::config::{resolve_collection_path, CliConfig};
use crate::error::Result;
use crate::fields::FieldMapping;
use crate::format;
use crate::schema;
use crate::store::FolderCollection;

/// Output from running the CLI, with separate stdout and stderr messages.
#[derive(Debug)]
pub struct CliOutput {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Messages to print to stdout.
    pub stdout: Vec<String>,
    /// Messages to print to stderr.
    pub stderr: Vec<String>,
}

/// Default result limit for list/search operations.
pub(crate) const DEFAULT_RESULT_LIMIT: usize = 50;

/// An opened collection plus its field mapping; built once per command.
pub(crate) struct CommandContext {
    /// The collection being operated on.
    pub collection: FolderCollection,
    /// Role/field mapping from the collection's task type.
    pub mapping: FieldMapping,
}

/// Run a parsed CLI invocation.
#[must_use]
pub fn run(cli: Cli) -> CliOutput {
    let collection_flag = cli.collection.as_deref();
    match cli.command {
        // Commands that work without an opened collection.
        Command::Init { force } => run_init(collection_flag, force),
        Command::Config { set } => run_config(set),
        command => match open_context(collection_flag) {
            Ok((context, warnings)) => {
                let mut output = respond(dispatch(&context, command));
                let mut stderr: Vec<String> =
                    warnings.iter().map(|w| format::warning(w)).collect();
                stderr.append(&mut output.stderr);
                output.stderr = stderr;
                output
            }
            Err(e) => error_output(e.to_string()),
        },
    }
}

fn dispatch(context: &CommandContext, command: Command) -> Result<CliOutput> {
    match command {
        Command::Create { text, body } => {
            tasks::run_create(context, &text.join(" "), body.as_deref())
        }
        Command::List {
            status,
            priority,
            tag,
            project,
            due,
            overdue,
            on,
            all,
            limit,
            json,
        } => report::run_list(
            context,
            &report::ListFilter {
                status,
                priority,
                tag,
                project,
                due,
                overdue,
                on,
                all,
                limit,
            },
            json,
        ),
        Command::Show { reference, json } => tasks::run_show(context, &reference, json),
        Command::Complete { reference, date } => {
            tasks::run_complete(context, &reference, date.as_deref())
        }
        Command::Update { reference, title, status, priority, due, scheduled, recurrence, estimate, add_tag, remove_tag, add_context, remove_context, add_project, remove_project } => {
            tasks::run_update(
                context,
                &reference,
                &tasks::UpdateFields {
                    title,
                    status,
                    priority,
                    due,
                    scheduled,
                    recurrence,
                    estimate,
                    add_tag,
                    remove_tag,
                    add_context,
                    remove_context,
                    add_project,
                    remove_project,
                },
            )
        }
        Command::Skip { reference, date } => {
            tasks::run_skip(context, &reference, date.as_deref())
        }
        Command::Unskip { reference, date } => {
            tasks::run_unskip(context, &reference, date.as_deref())
        }
        Command::Archive { reference } => tasks::run_archive(context, &reference),
        Command::Delete { reference, force } => tasks::run_delete(context, &reference, force),
        Command::Search { text } => report::run_search(context, &text.join(" ")),
        Command::Timer(timer) => match timer {
            TimerCommand::Start { reference, description } => {
                report::run_timer_start(context, &reference, description.as_deref())
            }
            TimerCommand::Stop => report::run_timer_stop(context),
            TimerCommand::Status => report::run_timer_status(context),
            TimerCommand::Log { reference } => {
                report::run_timer_log(context, reference.as_deref())
            }
        },
        Command::Projects(projects) => match projects {
            ProjectsCommand::List => report::run_projects_list(context),
            ProjectsCommand::Show { name } => report::run_projects_show(context, &name),
        },
        Command::Stats { json } => report::run_stats(context, json),
        // Handled in `run` before a context exists.
        Command::Init { .. } | Command::Config { .. } => unreachable!("dispatched early"),
    }
}

fn open_context(collection_flag: Option<&str>) -> Result<(CommandContext, Vec<String>)> {
    let config = CliConfig::load()?;
    let root = resolve_collection_path(collection_flag, &config)?;
    let collection = FolderCollection::open(&root)?;
    let (mapping, warnings) = FieldMapping::load(&root);
    Ok((CommandContext { collection, mapping }, warnings))
}

fn run_init(collection_flag: Option<&str>, force: bool) -> CliOutput {
    let result = CliConfig::load()
        .and_then(|config| resolve_collection_path(collection_flag, &config))
        .and_then(|target| {
            let created = schema::init_collection(&target, force)?;
            let mut lines = vec![format::success(&format!(
                "Initialized collection at {}",
                target.display()
            ))];
            lines.extend(created.iter().map(|entry| format!("  created {entry}")));
            Ok(lines)
        });
    respond(result.map(lines_output))
}

fn run_config(set: Option<Vec<String>>) -> CliOutput {
    let result = (|| {
        let mut config = CliConfig::load()?;
        let Some(pair) = set else {
            let dir = crate::config::default_config_dir()?;
            let collection = config.collection.as_deref().unwrap_or("(not set)");
            return Ok(lines_output(vec![
                format!("Config file: {}", dir.join("config.json").display()),
                format!("collection = {collection}"),
            ]));
        };
        // clap enforces exactly two values.
        let (key, value) = (pair[0].as_str(), pair[1].as_str());
        match key {
            "collection" => {
                config.collection = Some(value.to_string()).filter(|v| !v.is_empty());
                config.save()?;
                Ok(success_output(format::success(&format!(
                    "Set collection = {value}"
                ))))
            }
            _ => Ok(error_output(format!("Unknown config key \"{key}\""))),
        }
    })();
    respond(result)
}

pub(crate) fn respond(result: Result<CliOutput>) -> CliOutput {
    match result {
        Ok(output) => output,
        Err(e) => error_output(e.to_string()),
    }
}

pub(crate) fn json_output<T: Serialize>(value: &T) -> CliOutput {
    match serde_json::to_string_pretty(value) {
        Ok(json) => CliOutput {
            exit_code: ExitCode::SUCCESS,
            stdout: vec![json],
            stderr: vec![],
        },
        Err(e) => error_output(e.to_string()),
    }
}

pub(crate) fn success_output(message: String) -> CliOutput {
    CliOutput {
        exit_code: ExitCode::SUCCESS,
        stdout: vec![message],
        stderr: vec![],
    }
}

pub(crate) fn lines_output(lines: Vec<String>) -> CliOutput {
    CliOutput {
        exit_code: ExitCode::SUCCESS,
        stdout: lines,
        stderr: vec![],
    }
}

pub(crate) fn error_output(message: String) -> CliOutput {
    CliOutput {
        exit_code: ExitCode::from(1),
        stdout: vec![],
        stderr: vec![format::failure(&message)],
    }
}
