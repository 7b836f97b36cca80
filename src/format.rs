//! Plain-text rendering for CLI output.
//!
//! Everything here returns strings; the CLI layer decides where they go.
//! No color codes: output is expected to be piped and grepped.

use crate::task::{extract_project_names, TaskFrontmatter};

/// Icon for a status value.
#[must_use]
pub fn status_icon(status: &str) -> &'static str {
    match status {
        "open" => "\u{2610}",        // ☐
        "in-progress" => "\u{25d0}", // ◐
        "done" => "\u{2611}",        // ☑
        "cancelled" => "\u{2612}",   // ☒
        _ => "\u{2022}",             // •
    }
}

/// Prefix a success line.
#[must_use]
pub fn success(message: &str) -> String {
    format!("\u{2713} {message}")
}

/// Prefix an error line.
#[must_use]
pub fn failure(message: &str) -> String {
    format!("\u{2717} {message}")
}

/// Prefix a warning line.
#[must_use]
pub fn warning(message: &str) -> String {
    format!("\u{26a0} {message}")
}

/// Render minutes as `1h 30m` / `45m` / `2h`.
#[must_use]
pub fn duration(minutes: i64) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    match (hours, rest) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

/// One list row: `icon title (meta, meta)`. `effective_status` is the
/// overlay-aware status value for the listing's as-of date.
#[must_use]
pub fn task_line(task: &TaskFrontmatter, title: &str, effective_status: &str) -> String {
    let mut meta: Vec<String> = Vec::new();
    if let Some(due) = &task.due {
        meta.push(format!("due {due}"));
    }
    if let Some(scheduled) = &task.scheduled {
        meta.push(format!("scheduled {scheduled}"));
    }
    if let Some(priority) = &task.priority {
        if priority != "normal" {
            meta.push(priority.clone());
        }
    }
    if task.is_recurring() {
        meta.push("recurring".to_string());
    }
    if let Some(estimate) = task.time_estimate {
        meta.push(format!("~{}", duration(estimate)));
    }

    let icon = status_icon(effective_status);
    if meta.is_empty() {
        format!("{icon} {title}")
    } else {
        format!("{icon} {title} ({})", meta.join(", "))
    }
}

/// Multi-line detail view for `show`.
#[must_use]
pub fn task_detail(
    task: &TaskFrontmatter,
    title: &str,
    path: &str,
    instance: Option<(&str, &str)>,
) -> Vec<String> {
    let mut lines = vec![format!("{title}"), format!("  Path: {path}")];
    let mut field = |label: &str, value: Option<&str>| {
        if let Some(value) = value {
            lines.push(format!("  {label}: {value}"));
        }
    };
    field("Status", task.status.as_deref());
    field("Priority", task.priority.as_deref());
    field("Due", task.due.as_deref());
    field("Scheduled", task.scheduled.as_deref());
    field("Recurrence", task.recurrence.as_deref());
    field("Completed", task.completed_date.as_deref());

    if !task.tags.is_empty() {
        lines.push(format!("  Tags: {}", task.tags.join(", ")));
    }
    if !task.contexts.is_empty() {
        lines.push(format!("  Contexts: {}", task.contexts.join(", ")));
    }
    if !task.projects.is_empty() {
        lines.push(format!(
            "  Projects: {}",
            extract_project_names(&task.projects).join(", ")
        ));
    }
    if let Some(estimate) = task.time_estimate {
        lines.push(format!("  Estimate: {}", duration(estimate)));
    }
    let tracked: i64 = task.time_entries.iter().filter_map(|e| e.duration).sum();
    if tracked > 0 {
        lines.push(format!("  Tracked: {}", duration(tracked)));
    }
    if let Some((date, state)) = instance {
        lines.push(format!("  Instance ({date}): {state}"));
    }
    lines
}
