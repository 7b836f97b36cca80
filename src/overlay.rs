//! Per-date effective state of a task.
//!
//! A recurring task's stored `status` field is not authoritative: the
//! instance sets (`completeInstances` / `skippedInstances`) decide what
//! the task looks like on a given calendar day. Non-recurring tasks fall
//! through to their base status. Every listing, report, and filter that
//! cares about "is this done" goes through this module so recurring and
//! plain tasks read consistently.

use crate::dates::get_date_part;
use crate::fields::FieldMapping;
use crate::task::TaskFrontmatter;

/// What a task effectively is on a specific date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectiveState {
    /// Outstanding on this date.
    Open,
    /// Completed on this date (or base status counts as done).
    Done,
    /// This date's instance was skipped.
    Skipped,
}

/// Compute the task's effective state on `date` (`YYYY-MM-DD` or a
/// date-time whose day part is used).
///
/// Recurring tasks consult only the instance sets; the base status is
/// ignored. Non-recurring tasks map their base status through the
/// schema's completed-status set.
#[must_use]
pub fn effective_state(task: &TaskFrontmatter, mapping: &FieldMapping, date: &str) -> EffectiveState {
    let day = normalize_day(date);
    if task.is_recurring() {
        if task.complete_instances.iter().any(|d| normalize_day(d) == day) {
            return EffectiveState::Done;
        }
        if task.skipped_instances.iter().any(|d| normalize_day(d) == day) {
            return EffectiveState::Skipped;
        }
        return EffectiveState::Open;
    }
    if mapping.is_completed_status(task.status.as_deref()) {
        EffectiveState::Done
    } else {
        EffectiveState::Open
    }
}

/// The status value a listing shows for a task on `date`. Recurring tasks
/// report a synthesized `done` / `cancelled` / `open`; non-recurring tasks
/// report their stored status (defaulting to `open`).
#[must_use]
pub fn effective_status_value(
    task: &TaskFrontmatter,
    mapping: &FieldMapping,
    date: &str,
) -> String {
    if task.is_recurring() {
        return match effective_state(task, mapping, date) {
            EffectiveState::Done => "done".to_string(),
            EffectiveState::Skipped => "cancelled".to_string(),
            EffectiveState::Open => "open".to_string(),
        };
    }
    task.status.clone().unwrap_or_else(|| "open".to_string())
}

fn normalize_day(date: &str) -> String {
    get_date_part(date).unwrap_or_else(|_| date.to_string())
}
