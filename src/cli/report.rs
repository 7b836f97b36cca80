//! Read-mostly commands: list, search, stats, projects, and the timer.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::cli::run::{
    error_output, json_output, lines_output, success_output, CliOutput, CommandContext,
    DEFAULT_RESULT_LIMIT,
};
use crate::cli::tasks::{apply_patch, load_task, state_on};
use crate::collection::{Collection, Document, OrderBy};
use crate::dates::{
    current_date_string, is_before_date_safe, is_same_date_safe, local_iso_string,
    parse_date_to_utc, resolve_date_or_today,
};
use crate::error::Result;
use crate::format;
use crate::overlay::{effective_status_value, EffectiveState};
use crate::query::escape_quotes;
use crate::resolve::display_title;
use crate::task::{extract_project_names, TaskFrontmatter};

/// Maximum rows returned by `search`.
const SEARCH_LIMIT: usize = 20;

/// A task pulled from the collection with its typed view and title.
struct Row {
    doc: Document,
    task: TaskFrontmatter,
    title: String,
}

fn all_tasks(context: &CommandContext) -> Result<Vec<Row>> {
    fetch_tasks(context, None)
}

fn fetch_tasks(context: &CommandContext, where_expr: Option<&str>) -> Result<Vec<Row>> {
    let due_field = context.mapping.resolve("due").to_string();
    let docs = context.collection.query(
        "task",
        where_expr,
        None,
        Some(&OrderBy::asc(&due_field)),
    )?;
    let mut rows = Vec::with_capacity(docs.len());
    for doc in docs {
        let normalized = context.mapping.normalize(&doc.frontmatter);
        let task = TaskFrontmatter::from_normalized(&normalized)?;
        let title = display_title(&doc, &context.mapping);
        rows.push(Row { doc, task, title });
    }
    Ok(rows)
}

/// Filters for `mtn list`.
#[derive(Debug, Default)]
pub(crate) struct ListFilter {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub tag: Option<String>,
    pub project: Option<String>,
    pub due: Option<String>,
    pub overdue: bool,
    pub on: Option<String>,
    pub all: bool,
    pub limit: Option<usize>,
}

/// One row of `list --json` output.
#[derive(Debug, Serialize)]
struct ListRow {
    path: String,
    title: String,
    status: String,
    priority: Option<String>,
    due: Option<String>,
    scheduled: Option<String>,
    recurring: bool,
    tags: Vec<String>,
    projects: Vec<String>,
}

pub(crate) fn run_list(
    context: &CommandContext,
    filter: &ListFilter,
    json: bool,
) -> Result<CliOutput> {
    let on_date = resolve_date_or_today(filter.on.as_deref())?;

    let mut clauses: Vec<String> = Vec::new();
    if let Some(priority) = &filter.priority {
        clauses.push(format!(
            "{} == \"{}\"",
            context.mapping.resolve("priority"),
            escape_quotes(priority)
        ));
    }
    if let Some(tag) = &filter.tag {
        clauses.push(format!(
            "{}.contains(\"{}\")",
            context.mapping.resolve("tags"),
            escape_quotes(tag)
        ));
    }
    if filter.overdue {
        clauses.push(format!("{} != null", context.mapping.resolve("due")));
    }
    let where_expr = if clauses.is_empty() {
        None
    } else {
        Some(clauses.join(" && "))
    };

    let rows = fetch_tasks(context, where_expr.as_deref())?;
    let showing_archived = filter.all || filter.tag.as_deref() == Some("archive");

    let mut kept: Vec<Row> = Vec::new();
    for row in rows {
        if !showing_archived && row.task.tags.iter().any(|t| t == "archive") {
            continue;
        }
        if let Some(project) = &filter.project {
            let names = extract_project_names(&row.task.projects);
            if !names.iter().any(|n| n.eq_ignore_ascii_case(project)) {
                continue;
            }
        }
        if let Some(due_filter) = &filter.due {
            let matches = row
                .task
                .due
                .as_deref()
                .is_some_and(|due| is_same_date_safe(due, due_filter));
            if !matches {
                continue;
            }
        }

        let state = state_on(context, &row.task, &on_date);
        if filter.overdue {
            let overdue = row
                .task
                .due
                .as_deref()
                .is_some_and(|due| is_before_date_safe(due, &on_date));
            if !overdue || state != EffectiveState::Open {
                continue;
            }
        } else if let Some(wanted) = &filter.status {
            let effective = effective_status_value(&row.task, &context.mapping, &on_date);
            if effective != *wanted {
                continue;
            }
        } else if !filter.all && state != EffectiveState::Open {
            continue;
        }
        kept.push(row);
    }
    kept.truncate(filter.limit.unwrap_or(DEFAULT_RESULT_LIMIT));

    if json {
        let out: Vec<ListRow> = kept
            .iter()
            .map(|row| ListRow {
                path: row.doc.path.clone(),
                title: row.title.clone(),
                status: effective_status_value(&row.task, &context.mapping, &on_date),
                priority: row.task.priority.clone(),
                due: row.task.due.clone(),
                scheduled: row.task.scheduled.clone(),
                recurring: row.task.is_recurring(),
                tags: row.task.tags.clone(),
                projects: extract_project_names(&row.task.projects),
            })
            .collect();
        return Ok(json_output(&out));
    }

    if kept.is_empty() {
        return Ok(success_output("No tasks found".to_string()));
    }
    let lines = kept
        .iter()
        .map(|row| {
            let effective = effective_status_value(&row.task, &context.mapping, &on_date);
            format::task_line(&row.task, &row.title, &effective)
        })
        .collect();
    Ok(lines_output(lines))
}

pub(crate) fn run_search(context: &CommandContext, text: &str) -> Result<CliOutput> {
    let query = text.trim().to_lowercase();
    if query.is_empty() {
        return Ok(error_output("Search text cannot be empty".to_string()));
    }

    let mut scored: Vec<(i64, Row)> = all_tasks(context)?
        .into_iter()
        .filter_map(|row| {
            let mut score = 0;
            if row.title.to_lowercase().contains(&query) {
                score += 10;
            }
            let in_lists = row
                .task
                .tags
                .iter()
                .chain(&row.task.contexts)
                .chain(&row.task.projects)
                .any(|v| v.to_lowercase().contains(&query));
            if in_lists {
                score += 5;
            }
            if row.doc.body.to_lowercase().contains(&query) {
                score += 2;
            }
            (score > 0).then_some((score, row))
        })
        .collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.doc.path.cmp(&b.1.doc.path)));
    scored.truncate(SEARCH_LIMIT);

    if scored.is_empty() {
        return Ok(success_output(format!("No tasks matching \"{text}\"")));
    }
    let today = current_date_string();
    let lines = scored
        .iter()
        .map(|(_, row)| {
            let effective = effective_status_value(&row.task, &context.mapping, &today);
            format!(
                "{} [{}]",
                format::task_line(&row.task, &row.title, &effective),
                row.doc.path
            )
        })
        .collect();
    Ok(lines_output(lines))
}

// === Timer ===

fn running_timer(context: &CommandContext) -> Result<Option<Row>> {
    Ok(all_tasks(context)?
        .into_iter()
        .find(|row| row.task.running_entry().is_some()))
}

fn raw_time_entries(context: &CommandContext, doc: &Document) -> Vec<Value> {
    context
        .mapping
        .normalize(&doc.frontmatter)
        .get("timeEntries")
        .and_then(Value::as_sequence)
        .cloned()
        .unwrap_or_default()
}

fn patch_time_entries(
    context: &CommandContext,
    path: &str,
    entries: Vec<Value>,
) -> Result<()> {
    let mut patch = Mapping::new();
    patch.insert(Value::from("timeEntries"), Value::Sequence(entries));
    apply_patch(context, path, patch)
}

pub(crate) fn run_timer_start(
    context: &CommandContext,
    reference: &str,
    description: Option<&str>,
) -> Result<CliOutput> {
    if let Some(running) = running_timer(context)? {
        return Ok(error_output(format!(
            "A timer is already running on \"{}\". Stop it first.",
            running.title
        )));
    }
    let loaded = load_task(context, reference)?;

    let mut entry = Mapping::new();
    entry.insert(Value::from("startTime"), Value::from(local_iso_string()));
    if let Some(description) = description {
        entry.insert(Value::from("description"), Value::from(description));
    }
    let mut entries = raw_time_entries(context, &loaded.doc);
    entries.push(Value::Mapping(entry));
    patch_time_entries(context, &loaded.doc.path, entries)?;

    Ok(success_output(format::success(&format!(
        "Timer started on \"{}\"",
        loaded.title
    ))))
}

pub(crate) fn run_timer_stop(context: &CommandContext) -> Result<CliOutput> {
    let Some(running) = running_timer(context)? else {
        return Ok(error_output("No timer is running".to_string()));
    };

    let stop_stamp = local_iso_string();
    let minutes = running
        .task
        .running_entry()
        .map(|entry| elapsed_minutes(&entry.start_time, &stop_stamp))
        .unwrap_or(0);

    let mut entries = raw_time_entries(context, &running.doc);
    for value in &mut entries {
        let Some(entry) = value.as_mapping_mut() else {
            continue;
        };
        let is_running = entry.get("startTime").is_some() && entry.get("endTime").is_none();
        if is_running {
            entry.insert(Value::from("endTime"), Value::from(stop_stamp.as_str()));
            entry.insert(Value::from("duration"), Value::from(minutes));
            break;
        }
    }
    patch_time_entries(context, &running.doc.path, entries)?;

    Ok(success_output(format::success(&format!(
        "Timer stopped on \"{}\" ({})",
        running.title,
        format::duration(minutes)
    ))))
}

pub(crate) fn run_timer_status(context: &CommandContext) -> Result<CliOutput> {
    let Some(running) = running_timer(context)? else {
        return Ok(success_output("No timer running".to_string()));
    };
    let entry = running.task.running_entry();
    let minutes = entry
        .map(|e| elapsed_minutes(&e.start_time, &local_iso_string()))
        .unwrap_or(0);
    let mut line = format!(
        "Timer running on \"{}\" for {}",
        running.title,
        format::duration(minutes)
    );
    if let Some(description) = entry.and_then(|e| e.description.as_deref()) {
        line.push_str(&format!(" ({description})"));
    }
    Ok(success_output(line))
}

pub(crate) fn run_timer_log(
    context: &CommandContext,
    reference: Option<&str>,
) -> Result<CliOutput> {
    let rows = match reference {
        Some(reference) => {
            let loaded = load_task(context, reference)?;
            vec![Row {
                doc: loaded.doc,
                task: loaded.task,
                title: loaded.title,
            }]
        }
        None => all_tasks(context)?,
    };

    let mut lines = Vec::new();
    for row in &rows {
        if row.task.time_entries.is_empty() {
            continue;
        }
        lines.push(format!("{}:", row.title));
        for entry in &row.task.time_entries {
            let line = match (&entry.end_time, entry.duration) {
                (Some(end), Some(minutes)) => format!(
                    "  {} \u{2192} {} ({})",
                    entry.start_time,
                    end,
                    format::duration(minutes)
                ),
                (Some(end), None) => format!("  {} \u{2192} {}", entry.start_time, end),
                (None, _) => format!("  {} \u{2192} (running)", entry.start_time),
            };
            match &entry.description {
                Some(description) => lines.push(format!("{line} {description}")),
                None => lines.push(line),
            }
        }
    }
    if lines.is_empty() {
        return Ok(success_output("No time entries recorded".to_string()));
    }
    Ok(lines_output(lines))
}

fn elapsed_minutes(start: &str, end: &str) -> i64 {
    match (parse_date_to_utc(start), parse_date_to_utc(end)) {
        (Ok(start), Ok(end)) => (end - start).num_minutes().max(0),
        _ => 0,
    }
}

// === Projects ===

pub(crate) fn run_projects_list(context: &CommandContext) -> Result<CliOutput> {
    let today = current_date_string();
    let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for row in all_tasks(context)? {
        let state = state_on(context, &row.task, &today);
        for name in extract_project_names(&row.task.projects) {
            let entry = counts.entry(name).or_default();
            match state {
                EffectiveState::Done | EffectiveState::Skipped => entry.1 += 1,
                EffectiveState::Open => entry.0 += 1,
            }
        }
    }
    if counts.is_empty() {
        return Ok(success_output("No projects found".to_string()));
    }
    let lines = counts
        .iter()
        .map(|(name, (open, done))| format!("{name}: {open} open, {done} done"))
        .collect();
    Ok(lines_output(lines))
}

pub(crate) fn run_projects_show(context: &CommandContext, name: &str) -> Result<CliOutput> {
    let today = current_date_string();
    let rows: Vec<Row> = all_tasks(context)?
        .into_iter()
        .filter(|row| {
            extract_project_names(&row.task.projects)
                .iter()
                .any(|n| n.eq_ignore_ascii_case(name))
        })
        .collect();
    if rows.is_empty() {
        return Ok(success_output(format!("No tasks in project \"{name}\"")));
    }
    let lines = rows
        .iter()
        .map(|row| {
            let effective = effective_status_value(&row.task, &context.mapping, &today);
            format::task_line(&row.task, &row.title, &effective)
        })
        .collect();
    Ok(lines_output(lines))
}

// === Stats ===

/// `stats --json` payload.
#[derive(Debug, Serialize)]
struct Stats {
    total: usize,
    by_status: BTreeMap<String, usize>,
    by_priority: BTreeMap<String, usize>,
    overdue: usize,
    completion_rate: f64,
    tracked_minutes: i64,
}

pub(crate) fn run_stats(context: &CommandContext, json: bool) -> Result<CliOutput> {
    let today = current_date_string();
    let rows = all_tasks(context)?;

    let mut by_status: BTreeMap<String, usize> = BTreeMap::new();
    let mut by_priority: BTreeMap<String, usize> = BTreeMap::new();
    let mut overdue = 0;
    let mut done = 0;
    let mut tracked_minutes = 0;

    for row in &rows {
        let effective = effective_status_value(&row.task, &context.mapping, &today);
        *by_status.entry(effective).or_default() += 1;
        if let Some(priority) = &row.task.priority {
            *by_priority.entry(priority.clone()).or_default() += 1;
        }
        let state = state_on(context, &row.task, &today);
        if state != EffectiveState::Open {
            done += 1;
        }
        let is_overdue = row
            .task
            .due
            .as_deref()
            .is_some_and(|due| is_before_date_safe(due, &today));
        if is_overdue && state == EffectiveState::Open {
            overdue += 1;
        }
        tracked_minutes += row
            .task
            .time_entries
            .iter()
            .filter_map(|e| e.duration)
            .sum::<i64>();
    }

    let total = rows.len();
    #[allow(clippy::cast_precision_loss)]
    let completion_rate = if total == 0 {
        0.0
    } else {
        done as f64 / total as f64 * 100.0
    };

    let stats = Stats {
        total,
        by_status,
        by_priority,
        overdue,
        completion_rate,
        tracked_minutes,
    };
    if json {
        return Ok(json_output(&stats));
    }

    let mut lines = vec![format!("Tasks: {}", stats.total)];
    for (status, count) in &stats.by_status {
        lines.push(format!("  {} {status}: {count}", format::status_icon(status)));
    }
    if !stats.by_priority.is_empty() {
        lines.push("Priorities:".to_string());
        for (priority, count) in &stats.by_priority {
            lines.push(format!("  {priority}: {count}"));
        }
    }
    lines.push(format!("Overdue: {}", stats.overdue));
    lines.push(format!("Completion rate: {:.0}%", stats.completion_rate));
    if stats.tracked_minutes > 0 {
        lines.push(format!("Tracked: {}", format::duration(stats.tracked_minutes)));
    }
    Ok(lines_output(lines))
}
