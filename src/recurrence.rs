//! Recurrence rule engine.
//!
//! A recurrence rule is an RFC-5545-like token string (`FREQ=WEEKLY;
//! INTERVAL=2;BYDAY=MO`) with the series' anchor embedded in the same
//! string as a `DTSTART:` field (`DTSTART:20240101;FREQ=WEEKLY`). The
//! engine answers "what is the next occurrence after date X" with a
//! bounded forward search, and drives the completion/skip workflows:
//! occurrence dates already recorded as completed or skipped are never
//! offered again, and the rule's frequency portion is never mutated by
//! scheduling — only the anchor is rewritten.
//!
//! Supported constraints: DAILY/WEEKLY/MONTHLY/YEARLY frequencies,
//! `INTERVAL`, `BYDAY` (weekly), `BYMONTHDAY` (monthly). Other RFC-5545
//! tokens are ignored. A rule without a recognized `FREQ=` value is inert:
//! the task simply does not recur further.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dates::{format_date_for_storage, get_date_part, has_time_component, parse_date_to_utc};
use crate::task::{AnchorMode, TaskFrontmatter};

/// Hard iteration cap for occurrence searches. Exceeding it is treated the
/// same as "no next occurrence".
pub const SEARCH_CAP: u32 = 1000;

static DTSTART: Lazy<Regex> = Lazy::new(|| Regex::new(r"DTSTART:(\d{8}(?:T\d{6}Z?)?);?").unwrap());

static DTSTART_TIME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})T(\d{2})(\d{2})(\d{2})Z?$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone)]
struct Rule {
    freq: Frequency,
    interval: u32,
    /// Weekday constraint, weekly rules only.
    by_weekday: Vec<Weekday>,
    /// Day-of-month constraint, monthly rules only.
    by_monthday: Option<u32>,
    /// Anchor embedded in the rule string, when present.
    dtstart: Option<DateTime<Utc>>,
}

fn parse_rule(recurrence: &str) -> Option<Rule> {
    let dtstart = DTSTART
        .captures(recurrence)
        .and_then(|caps| parse_dtstart_value(&caps[1]));
    let body = DTSTART.replace(recurrence, "");
    let body = body.trim().trim_start_matches(';').trim();

    let mut freq = None;
    let mut interval = 1;
    let mut by_weekday = Vec::new();
    let mut by_monthday = None;

    for token in body.split(';') {
        let Some((key, value)) = token.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_uppercase().as_str() {
            "FREQ" => {
                freq = match value.trim().to_ascii_uppercase().as_str() {
                    "DAILY" => Some(Frequency::Daily),
                    "WEEKLY" => Some(Frequency::Weekly),
                    "MONTHLY" => Some(Frequency::Monthly),
                    "YEARLY" => Some(Frequency::Yearly),
                    _ => None,
                };
            }
            "INTERVAL" => {
                if let Ok(n) = value.trim().parse::<u32>() {
                    interval = n.max(1);
                }
            }
            "BYDAY" => {
                by_weekday = value
                    .split(',')
                    .filter_map(|day| parse_weekday(day.trim()))
                    .collect();
            }
            "BYMONTHDAY" => {
                by_monthday = value
                    .split(',')
                    .next()
                    .and_then(|d| d.trim().parse::<u32>().ok())
                    .filter(|d| (1..=31).contains(d));
            }
            _ => {}
        }
    }

    freq.map(|freq| Rule { freq, interval, by_weekday, by_monthday, dtstart })
}

fn parse_weekday(token: &str) -> Option<Weekday> {
    match token.to_ascii_uppercase().as_str() {
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        "SU" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_dtstart_value(value: &str) -> Option<DateTime<Utc>> {
    if value.len() == 8 {
        let y: i32 = value[0..4].parse().ok()?;
        let m: u32 = value[4..6].parse().ok()?;
        let d: u32 = value[6..8].parse().ok()?;
        let date = NaiveDate::from_ymd_opt(y, m, d)?;
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    let caps = DTSTART_TIME.captures(value)?;
    let date = NaiveDate::from_ymd_opt(
        caps[1].parse().ok()?,
        caps[2].parse().ok()?,
        caps[3].parse().ok()?,
    )?;
    let time = date.and_hms_opt(
        caps[4].parse().ok()?,
        caps[5].parse().ok()?,
        caps[6].parse().ok()?,
    )?;
    Some(Utc.from_utc_datetime(&time))
}

fn format_dtstart_value(date_string: &str) -> Option<String> {
    let parsed = parse_date_to_utc(date_string).ok()?;
    if has_time_component(date_string) {
        Some(parsed.format("%Y%m%dT%H%M%SZ").to_string())
    } else {
        Some(parsed.format("%Y%m%d").to_string())
    }
}

/// Prefix the rule with a `DTSTART:` anchor derived from `source_date`,
/// unless one is already embedded (an existing anchor is never moved).
#[must_use]
pub fn add_anchor(recurrence: &str, source_date: &str) -> String {
    if recurrence.is_empty() || recurrence.contains("DTSTART:") {
        return recurrence.to_string();
    }
    match format_dtstart_value(source_date) {
        Some(value) => format!("DTSTART:{value};{recurrence}"),
        None => recurrence.to_string(),
    }
}

/// Rewrite the rule's embedded anchor to `date_string`, adding one when
/// absent. The frequency portion is untouched.
#[must_use]
pub fn rewrite_anchor(recurrence: &str, date_string: &str) -> String {
    let Some(value) = format_dtstart_value(date_string) else {
        return recurrence.to_string();
    };
    if recurrence.contains("DTSTART:") {
        DTSTART
            .replace(recurrence, format!("DTSTART:{value};"))
            .into_owned()
    } else {
        format!("DTSTART:{value};{recurrence}")
    }
}

/// The first occurrence of `recurrence` at or after (`inclusive`) /
/// strictly after (`!inclusive`) `after`. The series originates at the
/// rule's embedded anchor, falling back to `source_date`. Returns `None`
/// for an inert rule or when the bounded search finds nothing within
/// [`SEARCH_CAP`] steps.
#[must_use]
pub fn next_occurrence(
    recurrence: &str,
    source_date: &str,
    after: DateTime<Utc>,
    inclusive: bool,
) -> Option<DateTime<Utc>> {
    let rule = parse_rule(recurrence)?;
    let origin = match rule.dtstart {
        Some(origin) => origin,
        None => parse_date_to_utc(source_date).ok()?,
    };
    let accepts = |candidate: DateTime<Utc>| {
        if inclusive {
            candidate >= after
        } else {
            candidate > after
        }
    };

    if rule.freq == Frequency::Weekly && !rule.by_weekday.is_empty() {
        return next_weekly_byday(&rule, origin, after, accepts);
    }

    for step in 0..SEARCH_CAP {
        let candidate = nth_step(&rule, origin, step)?;
        if candidate >= origin && accepts(candidate) {
            return Some(candidate);
        }
    }
    None
}

fn nth_step(rule: &Rule, origin: DateTime<Utc>, step: u32) -> Option<DateTime<Utc>> {
    let span = i64::from(step) * i64::from(rule.interval);
    match rule.freq {
        Frequency::Daily => origin.checked_add_signed(Duration::days(span)),
        Frequency::Weekly => origin.checked_add_signed(Duration::days(span * 7)),
        Frequency::Monthly => {
            let shifted = add_months(origin, span)?;
            match rule.by_monthday {
                Some(day) => with_clamped_day(shifted, day),
                None => Some(shifted),
            }
        }
        Frequency::Yearly => add_months(origin, span * 12),
    }
}

/// Day-by-day walk for weekly rules with a `BYDAY` constraint. Interval
/// alignment counts whole weeks (Monday-based) from the origin's week.
fn next_weekly_byday(
    rule: &Rule,
    origin: DateTime<Utc>,
    after: DateTime<Utc>,
    accepts: impl Fn(DateTime<Utc>) -> bool,
) -> Option<DateTime<Utc>> {
    let origin_week = week_start(origin.date_naive());
    // Start near the bound so a far-future reference stays within the cap,
    // but never before the origin.
    let lower = after - Duration::days(7 * i64::from(rule.interval));
    let mut day = if lower > origin { lower.date_naive() } else { origin.date_naive() };

    for _ in 0..SEARCH_CAP {
        if rule.by_weekday.contains(&day.weekday()) {
            let weeks = (week_start(day) - origin_week).num_days() / 7;
            if weeks % i64::from(rule.interval) == 0 {
                let candidate = Utc.from_utc_datetime(&day.and_time(origin.time()));
                if candidate >= origin && accepts(candidate) {
                    return Some(candidate);
                }
            }
        }
        day = day.succ_opt()?;
    }
    None
}

fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

fn add_months(value: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let naive = value.naive_utc();
    let total = i64::from(naive.date().year()) * 12 + i64::from(naive.date().month0()) + months;
    let year = i32::try_from(total.div_euclid(12)).ok()?;
    let month = u32::try_from(total.rem_euclid(12)).ok()? + 1;

    let day = naive.date().day().min(days_in_month(year, month)).max(1);
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    let next = date.and_hms_opt(naive.time().hour(), naive.time().minute(), naive.time().second())?;
    Some(Utc.from_utc_datetime(&next))
}

fn with_clamped_day(value: DateTime<Utc>, day: u32) -> Option<DateTime<Utc>> {
    let naive = value.naive_utc();
    let year = naive.date().year();
    let month = naive.date().month();
    let clamped = day.min(days_in_month(year, month)).max(1);
    let date = NaiveDate::from_ymd_opt(year, month, clamped)?;
    let next = date.and_hms_opt(naive.time().hour(), naive.time().minute(), naive.time().second())?;
    Some(Utc.from_utc_datetime(&next))
}

fn days_in_month(year: i32, month: u32) -> u32 {
    for day in (28..=31).rev() {
        if NaiveDate::from_ymd_opt(year, month, day).is_some() {
            return day;
        }
    }
    28
}

/// Next scheduled/due values computed by a search, plus the rule with its
/// possibly-rewritten anchor. `next_scheduled == None` means the series
/// produced no further occurrence and the task is not rescheduled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    /// Rule string with the anchor normalized or rewritten.
    pub updated_recurrence: String,
    /// Next scheduled value, shape-matched to the original `scheduled`.
    pub next_scheduled: Option<String>,
    /// Next due value, present only when both original `due` and
    /// `scheduled` were present; preserves their offset.
    pub next_due: Option<String>,
}

/// Outcome of completing one recurring instance: the schedule plus the
/// updated instance sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// Recomputed schedule.
    pub schedule: ScheduleOutcome,
    /// `completeInstances` with the completion date added (idempotent).
    pub complete_instances: Vec<String>,
    /// `skippedInstances` with the completion date removed.
    pub skipped_instances: Vec<String>,
}

/// Record a completed instance and advance the schedule.
///
/// The completion date joins `completeInstances` (no duplicate) and leaves
/// `skippedInstances` (the two sets are mutually exclusive per date). With
/// anchor mode `completion` the series re-originates at the completion
/// date; with `scheduled` the anchor is derived from the current
/// `scheduled` (or `dateCreated`) value without moving an existing one.
/// The search then finds the first occurrence at or after the completion
/// date that is not already resolved.
#[must_use]
pub fn advance_on_completion(task: &TaskFrontmatter, completion_date: &str) -> CompletionOutcome {
    let day = instance_day(completion_date);

    let mut complete_instances = task.complete_instances.clone();
    if !complete_instances.contains(&day) {
        complete_instances.push(day.clone());
    }
    let skipped_instances: Vec<String> = task
        .skipped_instances
        .iter()
        .filter(|d| instance_day(d) != day)
        .cloned()
        .collect();

    let schedule = recalculate(
        task,
        &complete_instances,
        &skipped_instances,
        completion_date,
        Some(completion_date),
    );

    CompletionOutcome { schedule, complete_instances, skipped_instances }
}

/// Recompute the schedule from an explicit reference date, against
/// caller-supplied instance sets (skip/unskip update the sets first, then
/// realign scheduling with this).
#[must_use]
pub fn recalculate_schedule(
    task: &TaskFrontmatter,
    complete_instances: &[String],
    skipped_instances: &[String],
    reference_date: &str,
) -> ScheduleOutcome {
    recalculate(task, complete_instances, skipped_instances, reference_date, None)
}

fn recalculate(
    task: &TaskFrontmatter,
    complete_instances: &[String],
    skipped_instances: &[String],
    reference_date: &str,
    completion_anchor: Option<&str>,
) -> ScheduleOutcome {
    let recurrence = task.recurrence.as_deref().unwrap_or_default();
    let scheduled = task.scheduled.as_deref();
    let source_date = scheduled
        .or(task.date_created.as_deref())
        .unwrap_or(reference_date);

    let updated_recurrence = match (task.anchor_mode(), completion_anchor) {
        (AnchorMode::Completion, Some(completion)) => rewrite_anchor(recurrence, completion),
        (AnchorMode::Completion, None) => recurrence.to_string(),
        (AnchorMode::Scheduled, _) => add_anchor(recurrence, source_date),
    };

    let inert = ScheduleOutcome {
        updated_recurrence: updated_recurrence.clone(),
        next_scheduled: None,
        next_due: None,
    };

    // The search starts from the scheduled date when the series is anchored
    // there, otherwise from the reference event itself.
    let reference = match task.anchor_mode() {
        AnchorMode::Scheduled => scheduled.and_then(|s| parse_date_to_utc(s).ok()),
        AnchorMode::Completion => None,
    }
    .or_else(|| parse_date_to_utc(reference_date).ok());
    let Some(reference) = reference else {
        return inert;
    };

    let reference_day = parse_date_to_utc(&instance_day(reference_date)).ok();
    let resolved: BTreeSet<String> = complete_instances
        .iter()
        .chain(skipped_instances)
        .map(|d| instance_day(d))
        .collect();

    let mut next = next_occurrence(&updated_recurrence, source_date, reference, true);

    // Catch a scheduled-anchored series up to the event day first.
    if let Some(day) = reference_day {
        let mut guard = 0;
        while let Some(candidate) = next {
            if candidate >= day || guard >= SEARCH_CAP {
                break;
            }
            next = next_occurrence(&updated_recurrence, source_date, candidate, false);
            guard += 1;
        }
    }

    // Never re-offer an instance date that is already resolved.
    let mut guard = 0;
    while let Some(candidate) = next {
        if !resolved.contains(&format_date_for_storage(candidate)) || guard >= SEARCH_CAP {
            break;
        }
        next = next_occurrence(&updated_recurrence, source_date, candidate, false);
        guard += 1;
    }

    let Some(next) = next else {
        return inert;
    };

    ScheduleOutcome {
        updated_recurrence,
        next_scheduled: Some(format_like_existing(scheduled, next)),
        next_due: compute_next_due(task.due.as_deref(), scheduled, next),
    }
}

fn compute_next_due(
    due: Option<&str>,
    scheduled: Option<&str>,
    next_scheduled: DateTime<Utc>,
) -> Option<String> {
    let due = due?;
    let scheduled = scheduled?;
    let original_due = parse_date_to_utc(due).ok()?;
    let original_scheduled = parse_date_to_utc(scheduled).ok()?;
    let next_due = next_scheduled + (original_due - original_scheduled);
    Some(format_like_existing(Some(due), next_due))
}

/// Format an occurrence preserving the date-only vs date-time shape of the
/// field's existing value: date-time values keep their original `T` suffix
/// on the new calendar day.
fn format_like_existing(existing: Option<&str>, date: DateTime<Utc>) -> String {
    let day = format_date_for_storage(date);
    match existing.and_then(|e| e.split_once('T')) {
        Some((_, time)) => format!("{day}T{time}"),
        None => day,
    }
}

fn instance_day(date_string: &str) -> String {
    get_date_part(date_string).unwrap_or_else(|_| date_string.to_string())
}
