//! Date parsing, formatting, and comparison helpers.
//!
//! Task fields carry dates in one of two shapes: date-only (`YYYY-MM-DD`)
//! or ISO-8601 with a `T` time component. All comparisons happen on
//! UTC-normalized values so that two representations of the same calendar
//! day compare equal regardless of the machine's timezone. Which shape a
//! field originally had is preserved by callers across recomputation.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static DATE_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").unwrap());

static TIME_COMPONENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"T\d{2}:\d{2}").unwrap());

/// Parse a date string into a UTC instant.
///
/// Date-only strings become UTC midnight of that calendar day. Date-time
/// strings are parsed as ISO-8601; an explicit offset is honored, a missing
/// offset is read as UTC.
///
/// # Errors
///
/// Returns [`Error::EmptyDate`] for empty input and [`Error::InvalidDate`]
/// when the string is not a valid date in either shape.
pub fn parse_date_to_utc(date_string: &str) -> Result<DateTime<Utc>> {
    let trimmed = date_string.trim();
    if trimmed.is_empty() {
        return Err(Error::EmptyDate);
    }

    if let Some(caps) = DATE_ONLY.captures(trimmed) {
        // The regex guarantees digit groups; range validity (e.g. month 13,
        // Feb 31) is checked by chrono.
        let y: i32 = caps[1].parse().map_err(|_| invalid(date_string))?;
        let m: u32 = caps[2].parse().map_err(|_| invalid(date_string))?;
        let d: u32 = caps[3].parse().map_err(|_| invalid(date_string))?;
        let date = NaiveDate::from_ymd_opt(y, m, d).ok_or_else(|| invalid(date_string))?;
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(|| invalid(date_string))?;
        return Ok(Utc.from_utc_datetime(&midnight));
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }

    Err(invalid(date_string))
}

fn invalid(date_string: &str) -> Error {
    Error::InvalidDate(date_string.to_string())
}

/// Validate that a user-supplied date string is `YYYY-MM-DD` and names a
/// real calendar day. Runs before any collection I/O.
///
/// # Errors
///
/// Returns [`Error::InvalidDateFormat`] when the shape is wrong and
/// [`Error::InvalidDate`] when the shape is right but the day does not
/// exist.
pub fn validate_date_string(date: &str) -> Result<()> {
    if !DATE_ONLY.is_match(date) {
        return Err(Error::InvalidDateFormat(date.to_string()));
    }
    parse_date_to_utc(date)?;
    Ok(())
}

/// Return `date` validated, or today's local date when absent.
///
/// # Errors
///
/// Propagates validation errors from [`validate_date_string`].
pub fn resolve_date_or_today(date: Option<&str>) -> Result<String> {
    match date {
        Some(d) => {
            validate_date_string(d)?;
            Ok(d.to_string())
        }
        None => Ok(current_date_string()),
    }
}

/// Today's calendar date in the machine's local timezone, `YYYY-MM-DD`.
#[must_use]
pub fn current_date_string() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// The current instant as a local ISO-8601 timestamp with offset, used for
/// `dateCreated` / `dateModified` stamps.
#[must_use]
pub fn local_iso_string() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Whether a date string carries a time component (`T` followed by
/// hours and minutes).
#[must_use]
pub fn has_time_component(date_string: &str) -> bool {
    TIME_COMPONENT.is_match(date_string)
}

/// Extract the `YYYY-MM-DD` part of a date or date-time string.
///
/// # Errors
///
/// Returns [`Error::InvalidDate`] when the input has no `T` separator and
/// cannot be parsed as a date.
pub fn get_date_part(date_string: &str) -> Result<String> {
    if DATE_ONLY.is_match(date_string) {
        return Ok(date_string.to_string());
    }
    if let Some(t_index) = date_string.find('T') {
        return Ok(date_string[..t_index].to_string());
    }
    Ok(format_date_for_storage(parse_date_to_utc(date_string)?))
}

/// Format a UTC instant as a date-only storage string (`YYYY-MM-DD`).
#[must_use]
pub fn format_date_for_storage(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Whether two date strings name the same calendar day. Unparseable input
/// compares as not-same rather than erroring.
#[must_use]
pub fn is_same_date_safe(date1: &str, date2: &str) -> bool {
    match (day_instant(date1), day_instant(date2)) {
        (Some(d1), Some(d2)) => d1 == d2,
        _ => false,
    }
}

/// Whether `date1` names a strictly earlier calendar day than `date2`.
/// Unparseable input compares as not-before rather than erroring.
#[must_use]
pub fn is_before_date_safe(date1: &str, date2: &str) -> bool {
    match (day_instant(date1), day_instant(date2)) {
        (Some(d1), Some(d2)) => d1 < d2,
        _ => false,
    }
}

fn day_instant(date_string: &str) -> Option<DateTime<Utc>> {
    let day = get_date_part(date_string).ok()?;
    parse_date_to_utc(&day).ok()
}
