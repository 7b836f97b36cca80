//! Task lifecycle commands: create, show, complete, update, skip,
//! archive, delete.

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::capture;
use crate::cli::run::{
    error_output, json_output, lines_output, success_output, CliOutput, CommandContext,
};
use crate::collection::{Collection, Document};
use crate::dates::{
    current_date_string, get_date_part, local_iso_string, resolve_date_or_today,
    validate_date_string,
};
use crate::error::Result;
use crate::format;
use crate::overlay::{self, EffectiveState};
use crate::recurrence;
use crate::resolve::{display_title, resolve_task};
use crate::task::TaskFrontmatter;

/// A resolved task: the raw document, its typed view, and display title.
pub(crate) struct TaskDoc {
    pub doc: Document,
    pub task: TaskFrontmatter,
    pub title: String,
}

pub(crate) fn load_task(context: &CommandContext, reference: &str) -> Result<TaskDoc> {
    let doc = resolve_task(&context.collection, &context.mapping, reference)?;
    let normalized = context.mapping.normalize(&doc.frontmatter);
    let task = TaskFrontmatter::from_normalized(&normalized)?;
    let title = display_title(&doc, &context.mapping);
    Ok(TaskDoc { doc, task, title })
}

/// Write a role-keyed patch to a document, stamping `dateModified`.
pub(crate) fn apply_patch(context: &CommandContext, path: &str, mut patch: Mapping) -> Result<()> {
    patch.insert(Value::from("dateModified"), Value::from(local_iso_string()));
    let denormalized = context.mapping.denormalize(&patch);
    context.collection.update(path, &denormalized)
}

fn string_list(values: &[String]) -> Value {
    Value::Sequence(values.iter().map(|v| Value::from(v.as_str())).collect())
}

pub(crate) fn run_create(
    context: &CommandContext,
    text: &str,
    body_flag: Option<&str>,
) -> Result<CliOutput> {
    let parsed = capture::parse(text);
    let (fields, mut body) = capture::to_frontmatter(&parsed);
    if let Some(extra) = body_flag {
        if !extra.is_empty() {
            body.push_str(&format!("\n{extra}\n"));
        }
    }
    if let Some(due) = &parsed.due {
        validate_date_string(due)?;
    }
    if let Some(scheduled) = &parsed.scheduled {
        validate_date_string(scheduled)?;
    }

    let denormalized = context.mapping.denormalize(&fields);
    let path = context.collection.create("task", &denormalized, &body)?;

    let title = fields
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("Untitled task");
    let mut lines = vec![format::success(&format!("Created \"{title}\" ({path})"))];
    if let Some(due) = &parsed.due {
        lines.push(format!("  due {due}"));
    }
    if let Some(recurrence) = &parsed.recurrence {
        lines.push(format!("  recurs {recurrence}"));
    }
    Ok(lines_output(lines))
}

/// JSON view of a task for `show --json`.
#[derive(Debug, Serialize)]
struct TaskView {
    path: String,
    title: String,
    status: Option<String>,
    effective_status: String,
    priority: Option<String>,
    due: Option<String>,
    scheduled: Option<String>,
    recurrence: Option<String>,
    tags: Vec<String>,
    contexts: Vec<String>,
    projects: Vec<String>,
    time_estimate: Option<i64>,
    complete_instances: Vec<String>,
    skipped_instances: Vec<String>,
}

pub(crate) fn run_show(
    context: &CommandContext,
    reference: &str,
    json: bool,
) -> Result<CliOutput> {
    let loaded = load_task(context, reference)?;
    let today = current_date_string();
    let effective = overlay::effective_status_value(&loaded.task, &context.mapping, &today);

    if json {
        let task = &loaded.task;
        return Ok(json_output(&TaskView {
            path: loaded.doc.path.clone(),
            title: loaded.title.clone(),
            status: task.status.clone(),
            effective_status: effective,
            priority: task.priority.clone(),
            due: task.due.clone(),
            scheduled: task.scheduled.clone(),
            recurrence: task.recurrence.clone(),
            tags: task.tags.clone(),
            contexts: task.contexts.clone(),
            projects: task.projects.clone(),
            time_estimate: task.time_estimate,
            complete_instances: task.complete_instances.clone(),
            skipped_instances: task.skipped_instances.clone(),
        }));
    }

    let instance = loaded
        .task
        .is_recurring()
        .then(|| (today.as_str(), effective.as_str()));
    Ok(lines_output(format::task_detail(
        &loaded.task,
        &loaded.title,
        &loaded.doc.path,
        instance,
    )))
}

pub(crate) fn run_complete(
    context: &CommandContext,
    reference: &str,
    date: Option<&str>,
) -> Result<CliOutput> {
    let loaded = load_task(context, reference)?;
    let date = resolve_date_or_today(date)?;

    if !loaded.task.is_recurring() {
        if context
            .mapping
            .is_completed_status(loaded.task.status.as_deref())
        {
            return Ok(success_output(format!(
                "\"{}\" is already completed",
                loaded.title
            )));
        }
        let mut patch = Mapping::new();
        patch.insert(
            Value::from("status"),
            Value::from(context.mapping.default_completed_status()),
        );
        patch.insert(Value::from("completedDate"), Value::from(date.as_str()));
        apply_patch(context, &loaded.doc.path, patch)?;
        return Ok(success_output(format::success(&format!(
            "Completed \"{}\"",
            loaded.title
        ))));
    }

    let day = get_date_part(&date)?;
    if loaded
        .task
        .complete_instances
        .iter()
        .any(|d| get_date_part(d).is_ok_and(|existing| existing == day))
    {
        return Ok(success_output(format!(
            "\"{}\" was already completed on {day}",
            loaded.title
        )));
    }

    let outcome = recurrence::advance_on_completion(&loaded.task, &date);
    let mut patch = Mapping::new();
    patch.insert(
        Value::from("completeInstances"),
        string_list(&outcome.complete_instances),
    );
    patch.insert(
        Value::from("skippedInstances"),
        string_list(&outcome.skipped_instances),
    );
    patch.insert(
        Value::from("recurrence"),
        Value::from(outcome.schedule.updated_recurrence.as_str()),
    );
    if let Some(next_scheduled) = &outcome.schedule.next_scheduled {
        patch.insert(Value::from("scheduled"), Value::from(next_scheduled.as_str()));
    }
    if let Some(next_due) = &outcome.schedule.next_due {
        patch.insert(Value::from("due"), Value::from(next_due.as_str()));
    }
    apply_patch(context, &loaded.doc.path, patch)?;

    let mut lines = vec![format::success(&format!(
        "Completed \"{}\" for {day}",
        loaded.title
    ))];
    match &outcome.schedule.next_scheduled {
        Some(next) => lines.push(format!("  Next occurrence: {next}")),
        None => lines.push("  No further occurrences scheduled".to_string()),
    }
    Ok(lines_output(lines))
}

/// Field changes requested by `mtn update`.
#[derive(Debug, Default)]
pub(crate) struct UpdateFields {
    pub title: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due: Option<String>,
    pub scheduled: Option<String>,
    pub recurrence: Option<String>,
    pub estimate: Option<i64>,
    pub add_tag: Vec<String>,
    pub remove_tag: Vec<String>,
    pub add_context: Vec<String>,
    pub remove_context: Vec<String>,
    pub add_project: Vec<String>,
    pub remove_project: Vec<String>,
}

impl UpdateFields {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.status.is_none()
            && self.priority.is_none()
            && self.due.is_none()
            && self.scheduled.is_none()
            && self.recurrence.is_none()
            && self.estimate.is_none()
            && self.add_tag.is_empty()
            && self.remove_tag.is_empty()
            && self.add_context.is_empty()
            && self.remove_context.is_empty()
            && self.add_project.is_empty()
            && self.remove_project.is_empty()
    }
}

/// A scalar set: empty input clears the field, anything else sets it.
fn scalar_patch(value: &str) -> Value {
    if value.is_empty() {
        Value::Null
    } else {
        Value::from(value)
    }
}

fn edit_list(current: &[String], add: &[String], remove: &[String]) -> Option<Vec<String>> {
    if add.is_empty() && remove.is_empty() {
        return None;
    }
    let mut next: Vec<String> = current
        .iter()
        .filter(|v| !remove.contains(v))
        .cloned()
        .collect();
    for value in add {
        if !next.contains(value) {
            next.push(value.clone());
        }
    }
    Some(next)
}

pub(crate) fn run_update(
    context: &CommandContext,
    reference: &str,
    fields: &UpdateFields,
) -> Result<CliOutput> {
    if fields.is_empty() {
        return Ok(error_output("No fields to update. See mtn update --help.".to_string()));
    }
    let loaded = load_task(context, reference)?;

    for date in [&fields.due, &fields.scheduled].into_iter().flatten() {
        if !date.is_empty() {
            validate_date_string(date)?;
        }
    }

    let mut patch = Mapping::new();
    if let Some(title) = &fields.title {
        patch.insert(Value::from("title"), Value::from(title.as_str()));
    }
    if let Some(status) = &fields.status {
        patch.insert(Value::from("status"), scalar_patch(status));
    }
    if let Some(priority) = &fields.priority {
        patch.insert(Value::from("priority"), scalar_patch(priority));
    }
    if let Some(due) = &fields.due {
        patch.insert(Value::from("due"), scalar_patch(due));
    }
    if let Some(scheduled) = &fields.scheduled {
        patch.insert(Value::from("scheduled"), scalar_patch(scheduled));
    }
    if let Some(recurrence) = &fields.recurrence {
        patch.insert(Value::from("recurrence"), scalar_patch(recurrence));
    }
    if let Some(estimate) = fields.estimate {
        let value = if estimate <= 0 { Value::Null } else { Value::from(estimate) };
        patch.insert(Value::from("timeEstimate"), value);
    }
    if let Some(tags) = edit_list(&loaded.task.tags, &fields.add_tag, &fields.remove_tag) {
        patch.insert(Value::from("tags"), string_list(&tags));
    }
    if let Some(contexts) =
        edit_list(&loaded.task.contexts, &fields.add_context, &fields.remove_context)
    {
        patch.insert(Value::from("contexts"), string_list(&contexts));
    }
    if let Some(projects) =
        edit_list(&loaded.task.projects, &fields.add_project, &fields.remove_project)
    {
        patch.insert(Value::from("projects"), string_list(&projects));
    }

    apply_patch(context, &loaded.doc.path, patch)?;
    Ok(success_output(format::success(&format!(
        "Updated \"{}\"",
        loaded.title
    ))))
}

pub(crate) fn run_skip(
    context: &CommandContext,
    reference: &str,
    date: Option<&str>,
) -> Result<CliOutput> {
    let loaded = load_task(context, reference)?;
    if !loaded.task.is_recurring() {
        return Ok(error_output(format!(
            "\"{}\" is not recurring; use complete or delete instead",
            loaded.title
        )));
    }
    let date = resolve_date_or_today(date)?;
    let day = get_date_part(&date)?;

    let mut skipped = loaded.task.skipped_instances.clone();
    if !skipped.contains(&day) {
        skipped.push(day.clone());
    }
    // An instance is never both skipped and completed.
    let complete: Vec<String> = loaded
        .task
        .complete_instances
        .iter()
        .filter(|d| **d != day)
        .cloned()
        .collect();

    let schedule = recurrence::recalculate_schedule(&loaded.task, &complete, &skipped, &day);
    apply_instance_patch(context, &loaded, &complete, &skipped, &schedule)?;

    let mut lines = vec![format::success(&format!(
        "Skipped \"{}\" for {day}",
        loaded.title
    ))];
    if let Some(next) = &schedule.next_scheduled {
        lines.push(format!("  Next occurrence: {next}"));
    }
    Ok(lines_output(lines))
}

pub(crate) fn run_unskip(
    context: &CommandContext,
    reference: &str,
    date: Option<&str>,
) -> Result<CliOutput> {
    let loaded = load_task(context, reference)?;
    if !loaded.task.is_recurring() {
        return Ok(error_output(format!("\"{}\" is not recurring", loaded.title)));
    }
    let date = resolve_date_or_today(date)?;
    let day = get_date_part(&date)?;

    if !loaded.task.skipped_instances.iter().any(|d| *d == day) {
        return Ok(success_output(format!(
            "\"{}\" was not skipped on {day}",
            loaded.title
        )));
    }
    let skipped: Vec<String> = loaded
        .task
        .skipped_instances
        .iter()
        .filter(|d| **d != day)
        .cloned()
        .collect();
    let complete = loaded.task.complete_instances.clone();

    let schedule = recurrence::recalculate_schedule(&loaded.task, &complete, &skipped, &day);
    apply_instance_patch(context, &loaded, &complete, &skipped, &schedule)?;

    Ok(success_output(format::success(&format!(
        "Restored \"{}\" for {day}",
        loaded.title
    ))))
}

fn apply_instance_patch(
    context: &CommandContext,
    loaded: &TaskDoc,
    complete: &[String],
    skipped: &[String],
    schedule: &recurrence::ScheduleOutcome,
) -> Result<()> {
    let mut patch = Mapping::new();
    patch.insert(Value::from("completeInstances"), string_list(complete));
    patch.insert(Value::from("skippedInstances"), string_list(skipped));
    patch.insert(
        Value::from("recurrence"),
        Value::from(schedule.updated_recurrence.as_str()),
    );
    if let Some(next_scheduled) = &schedule.next_scheduled {
        patch.insert(Value::from("scheduled"), Value::from(next_scheduled.as_str()));
    }
    if let Some(next_due) = &schedule.next_due {
        patch.insert(Value::from("due"), Value::from(next_due.as_str()));
    }
    apply_patch(context, &loaded.doc.path, patch)
}

pub(crate) fn run_archive(context: &CommandContext, reference: &str) -> Result<CliOutput> {
    let loaded = load_task(context, reference)?;
    if loaded.task.tags.iter().any(|t| t == "archive") {
        return Ok(success_output(format!(
            "\"{}\" is already archived",
            loaded.title
        )));
    }
    let mut tags = loaded.task.tags.clone();
    tags.push("archive".to_string());

    let mut patch = Mapping::new();
    patch.insert(Value::from("tags"), string_list(&tags));
    apply_patch(context, &loaded.doc.path, patch)?;
    Ok(success_output(format::success(&format!(
        "Archived \"{}\"",
        loaded.title
    ))))
}

pub(crate) fn run_delete(
    context: &CommandContext,
    reference: &str,
    force: bool,
) -> Result<CliOutput> {
    let loaded = load_task(context, reference)?;
    if !force {
        return Ok(error_output(format!(
            "Refusing to delete \"{}\" ({}). Re-run with --force.",
            loaded.title, loaded.doc.path
        )));
    }
    context.collection.delete(&loaded.doc.path)?;
    Ok(success_output(format::success(&format!(
        "Deleted \"{}\" ({})",
        loaded.title, loaded.doc.path
    ))))
}

/// Effective state of a task on a date, for listings.
pub(crate) fn state_on(
    context: &CommandContext,
    task: &TaskFrontmatter,
    date: &str,
) -> EffectiveState {
    overlay::effective_state(task, &context.mapping, date)
}
