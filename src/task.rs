//! Typed view of task frontmatter.
//!
//! Commands and the scheduler read tasks through [`TaskFrontmatter`], built
//! from role-keyed (normalized) frontmatter. Writes never go through this
//! struct: they are role-keyed patch mappings handed to
//! [`crate::fields::FieldMapping::denormalize`], so unknown frontmatter
//! keys survive untouched.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_yaml::{Mapping, Value};

use crate::error::Result;

/// How a recurring task's series re-anchors as instances are resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorMode {
    /// The series stays anchored to the scheduled date.
    #[default]
    Scheduled,
    /// The series re-originates at every completion.
    Completion,
}

/// One time-tracking record inside a task's `timeEntries`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeEntry {
    /// When tracking started, local ISO timestamp.
    pub start_time: String,
    /// When tracking stopped; absent while the entry is running.
    pub end_time: Option<String>,
    /// Optional note on what the time was spent on.
    pub description: Option<String>,
    /// Tracked minutes, computed at stop time.
    pub duration: Option<i64>,
}

impl TimeEntry {
    /// Whether this entry is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.start_time.is_empty() && self.end_time.is_none()
    }
}

/// Role-keyed task fields. Every field is optional or defaulted: documents
/// may be sparse (filename-based titles, no status yet).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TaskFrontmatter {
    /// Task title.
    pub title: Option<String>,
    /// Base status value (not authoritative per-date for recurring tasks).
    pub status: Option<String>,
    /// Priority value.
    pub priority: Option<String>,
    /// Due date, date-only or date-time.
    pub due: Option<String>,
    /// Scheduled date, date-only or date-time.
    pub scheduled: Option<String>,
    /// Tags, including the `task` marker tag.
    pub tags: Vec<String>,
    /// Contexts (`@home`, ...), stored without the trigger character.
    pub contexts: Vec<String>,
    /// Projects, possibly as wikilinks.
    pub projects: Vec<String>,
    /// Estimated minutes.
    pub time_estimate: Option<i64>,
    /// Recurrence rule string (frequency + embedded anchor).
    pub recurrence: Option<String>,
    /// Raw anchor mode value (`scheduled` | `completion`).
    pub recurrence_anchor: Option<String>,
    /// Dates on which an instance was completed, `YYYY-MM-DD`.
    pub complete_instances: Vec<String>,
    /// Dates on which an instance was skipped, `YYYY-MM-DD`.
    pub skipped_instances: Vec<String>,
    /// When a non-recurring task was completed.
    pub completed_date: Option<String>,
    /// Creation stamp.
    pub date_created: Option<String>,
    /// Last modification stamp.
    pub date_modified: Option<String>,
    /// Time-tracking records.
    pub time_entries: Vec<TimeEntry>,
}

impl TaskFrontmatter {
    /// Build the typed view from role-keyed frontmatter.
    ///
    /// # Errors
    ///
    /// Returns a YAML error when a field has an incompatible shape (for
    /// example a scalar where a list is stored).
    pub fn from_normalized(normalized: &Mapping) -> Result<Self> {
        Ok(serde_yaml::from_value(Value::Mapping(normalized.clone()))?)
    }

    /// Whether the task carries a recurrence rule at all. Whether the rule
    /// actually produces occurrences is the scheduler's concern.
    #[must_use]
    pub fn is_recurring(&self) -> bool {
        self.recurrence
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty())
    }

    /// The task's anchor mode; anything but `completion` is `Scheduled`.
    #[must_use]
    pub fn anchor_mode(&self) -> AnchorMode {
        match self.recurrence_anchor.as_deref() {
            Some("completion") => AnchorMode::Completion,
            _ => AnchorMode::Scheduled,
        }
    }

    /// The running time entry, if any.
    #[must_use]
    pub fn running_entry(&self) -> Option<&TimeEntry> {
        self.time_entries.iter().find(|e| e.is_running())
    }
}

static WIKILINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[\[(?:.*/)?([^\]]+)\]\]").unwrap());

/// Extract display names from project values, unwrapping wikilinks
/// (`[[projects/Roadmap]]` becomes `Roadmap`).
#[must_use]
pub fn extract_project_names(projects: &[String]) -> Vec<String> {
    projects
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| {
            WIKILINK
                .captures(p)
                .map_or_else(|| p.clone(), |caps| caps[1].to_string())
        })
        .collect()
}
