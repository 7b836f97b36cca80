//! Quick-capture parsing: one free-text line into structured task fields.
//!
//! `mtn c "Water plants @home #garden due tomorrow daily ~15m // back
//! porch first"` extracts tags, contexts, projects, dates, a recurrence
//! rule, and a time estimate, leaving the rest as the title. Unrecognized
//! text is never dropped silently: anything that does not parse stays in
//! the title.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_yaml::{Mapping, Value};

use crate::dates::{current_date_string, local_iso_string};

/// Result of parsing one capture line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    /// Title assembled from unconsumed words.
    pub title: String,
    /// Free-text details after `//`, if any.
    pub details: Option<String>,
    /// Tags from `#word` triggers.
    pub tags: Vec<String>,
    /// Contexts from `@word` triggers.
    pub contexts: Vec<String>,
    /// Projects from `+word` triggers.
    pub projects: Vec<String>,
    /// Status from a `*word` trigger.
    pub status: Option<String>,
    /// Priority from a `!word` trigger.
    pub priority: Option<String>,
    /// Due date, `YYYY-MM-DD`.
    pub due: Option<String>,
    /// Scheduled date, `YYYY-MM-DD`.
    pub scheduled: Option<String>,
    /// Recurrence rule string.
    pub recurrence: Option<String>,
    /// Estimated minutes from a `~` trigger.
    pub time_estimate: Option<i64>,
}

static DATE_LITERAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

static ESTIMATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^~(\d+)([mh])$").unwrap());

/// Parse a capture line against today's local date.
#[must_use]
pub fn parse(input: &str) -> Capture {
    let today = current_date_string()
        .parse::<NaiveDate>()
        .unwrap_or_default();
    parse_with_today(input, today)
}

/// Parse a capture line with an explicit "today", for deterministic
/// relative-date resolution.
#[must_use]
pub fn parse_with_today(input: &str, today: NaiveDate) -> Capture {
    let (head, details) = match input.split_once("//") {
        Some((head, tail)) => (head, Some(tail.trim().to_string()).filter(|d| !d.is_empty())),
        None => (input, None),
    };

    let mut capture = Capture {
        details,
        ..Capture::default()
    };

    let words: Vec<&str> = head.split_whitespace().collect();
    let mut title_words: Vec<&str> = Vec::new();
    let mut index = 0;

    while index < words.len() {
        let word = words[index];

        if let Some(tag) = trigger_value(word, '#') {
            push_unique(&mut capture.tags, tag);
        } else if let Some(context) = trigger_value(word, '@') {
            push_unique(&mut capture.contexts, context);
        } else if let Some(project) = trigger_value(word, '+') {
            push_unique(&mut capture.projects, project);
        } else if let Some(status) = trigger_value(word, '*') {
            capture.status.get_or_insert(status);
        } else if let Some(priority) = trigger_value(word, '!') {
            capture.priority.get_or_insert(priority);
        } else if let Some(caps) = ESTIMATE.captures(word) {
            if let Ok(amount) = caps[1].parse::<i64>() {
                let minutes = if &caps[2] == "h" { amount * 60 } else { amount };
                capture.time_estimate.get_or_insert(minutes);
            }
        } else if let Some(consumed) = try_date_keyword(&words, index, today, &mut capture) {
            index += consumed;
            continue;
        } else if let Some(consumed) = try_recurrence(&words, index, &mut capture) {
            index += consumed;
            continue;
        } else {
            title_words.push(word);
        }
        index += 1;
    }

    capture.title = title_words.join(" ");
    capture
}

fn trigger_value(word: &str, trigger: char) -> Option<String> {
    let value = word.strip_prefix(trigger)?;
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

fn push_unique(values: &mut Vec<String>, value: String) {
    if !values.contains(&value) {
        values.push(value);
    }
}

/// `due <date>` / `scheduled <date>`. Returns how many words were
/// consumed, or `None` when the keyword (or its date) does not parse.
fn try_date_keyword(
    words: &[&str],
    index: usize,
    today: NaiveDate,
    capture: &mut Capture,
) -> Option<usize> {
    let keyword = words[index].to_lowercase();
    if keyword != "due" && keyword != "scheduled" {
        return None;
    }
    let date = resolve_date_word(words.get(index + 1)?, today)?;
    if keyword == "due" {
        capture.due.get_or_insert(date);
    } else {
        capture.scheduled.get_or_insert(date);
    }
    Some(2)
}

fn resolve_date_word(word: &str, today: NaiveDate) -> Option<String> {
    let lower = word.to_lowercase();
    if DATE_LITERAL.is_match(&lower) {
        // Shape check only here; real validation happens downstream.
        return lower.parse::<NaiveDate>().ok().map(|d| d.to_string());
    }
    match lower.as_str() {
        "today" => Some(today.to_string()),
        "tomorrow" => Some((today + Duration::days(1)).to_string()),
        _ => weekday_from_name(&lower).map(|target| next_weekday(today, target).to_string()),
    }
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

/// The next occurrence of `target` strictly after `today`.
fn next_weekday(today: NaiveDate, target: Weekday) -> NaiveDate {
    let ahead = (7 + i64::from(target.num_days_from_monday())
        - i64::from(today.weekday().num_days_from_monday()))
        % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today + Duration::days(ahead)
}

const BYDAY_CODES: [(Weekday, &str); 7] = [
    (Weekday::Mon, "MO"),
    (Weekday::Tue, "TU"),
    (Weekday::Wed, "WE"),
    (Weekday::Thu, "TH"),
    (Weekday::Fri, "FR"),
    (Weekday::Sat, "SA"),
    (Weekday::Sun, "SU"),
];

fn byday_code(day: Weekday) -> &'static str {
    BYDAY_CODES
        .iter()
        .find(|(d, _)| *d == day)
        .map_or("MO", |(_, code)| code)
}

/// Recurrence phrases. Single words (`daily`, `weekly`, ...) and `every
/// <unit>` / `every <n> <unit>s` / `every <weekday>` forms.
fn try_recurrence(words: &[&str], index: usize, capture: &mut Capture) -> Option<usize> {
    let word = words[index].to_lowercase();

    let single = match word.as_str() {
        "daily" => Some("FREQ=DAILY"),
        "weekly" => Some("FREQ=WEEKLY"),
        "monthly" => Some("FREQ=MONTHLY"),
        "yearly" | "annually" => Some("FREQ=YEARLY"),
        _ => None,
    };
    if let Some(rule) = single {
        capture.recurrence.get_or_insert(rule.to_string());
        return Some(1);
    }

    if word != "every" {
        return None;
    }
    let next = words.get(index + 1)?.to_lowercase();

    if let Some(rule) = unit_rule(&next, 1) {
        capture.recurrence.get_or_insert(rule);
        return Some(2);
    }
    if let Some(day) = weekday_from_name(&next) {
        capture
            .recurrence
            .get_or_insert(format!("FREQ=WEEKLY;BYDAY={}", byday_code(day)));
        return Some(2);
    }
    if let Ok(interval) = next.parse::<u32>() {
        let unit = words.get(index + 2)?.to_lowercase();
        if let Some(rule) = unit_rule(unit.trim_end_matches('s'), interval) {
            capture.recurrence.get_or_insert(rule);
            return Some(3);
        }
    }
    None
}

fn unit_rule(unit: &str, interval: u32) -> Option<String> {
    let freq = match unit {
        "day" => "DAILY",
        "week" => "WEEKLY",
        "month" => "MONTHLY",
        "year" => "YEARLY",
        _ => return None,
    };
    if interval <= 1 {
        Some(format!("FREQ={freq}"))
    } else {
        Some(format!("FREQ={freq};INTERVAL={interval}"))
    }
}

/// Convert a capture into role-keyed frontmatter plus a body. The `task`
/// marker tag is always present and creation/modification stamps are
/// applied.
#[must_use]
pub fn to_frontmatter(capture: &Capture) -> (Mapping, String) {
    let mut fields = Mapping::new();
    let title = if capture.title.is_empty() {
        "Untitled task".to_string()
    } else {
        capture.title.clone()
    };
    fields.insert(Value::from("title"), Value::from(title));

    let mut tags = vec!["task".to_string()];
    for tag in &capture.tags {
        push_unique(&mut tags, tag.clone());
    }
    fields.insert(
        Value::from("tags"),
        Value::Sequence(tags.into_iter().map(Value::from).collect()),
    );

    if !capture.contexts.is_empty() {
        fields.insert(
            Value::from("contexts"),
            Value::Sequence(capture.contexts.iter().map(|c| Value::from(c.as_str())).collect()),
        );
    }
    if !capture.projects.is_empty() {
        fields.insert(
            Value::from("projects"),
            Value::Sequence(capture.projects.iter().map(|p| Value::from(p.as_str())).collect()),
        );
    }
    if let Some(status) = &capture.status {
        fields.insert(Value::from("status"), Value::from(status.as_str()));
    }
    if let Some(priority) = &capture.priority {
        fields.insert(Value::from("priority"), Value::from(priority.as_str()));
    }
    if let Some(due) = &capture.due {
        fields.insert(Value::from("due"), Value::from(due.as_str()));
    }
    if let Some(scheduled) = &capture.scheduled {
        fields.insert(Value::from("scheduled"), Value::from(scheduled.as_str()));
    }
    if let Some(recurrence) = &capture.recurrence {
        fields.insert(Value::from("recurrence"), Value::from(recurrence.as_str()));
    }
    if let Some(estimate) = capture.time_estimate {
        fields.insert(Value::from("timeEstimate"), Value::from(estimate));
    }

    let stamp = local_iso_string();
    fields.insert(Value::from("dateCreated"), Value::from(stamp.clone()));
    fields.insert(Value::from("dateModified"), Value::from(stamp));

    let body = capture
        .details
        .as_ref()
        .map_or_else(String::new, |d| format!("\n{d}\n"));
    (fields, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wednesday() -> NaiveDate {
        // 2024-01-03 was a Wednesday.
        NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
    }

    #[test]
    fn test_plain_title() {
        let capture = parse_with_today("Water the plants", wednesday());
        assert_eq!(capture.title, "Water the plants");
        assert_eq!(capture, Capture { title: "Water the plants".to_string(), ..Capture::default() });
    }

    #[test]
    fn test_trigger_words_extracted() {
        let capture = parse_with_today(
            "Fix leak @home #plumbing #urgent +house-maintenance *in-progress !high",
            wednesday(),
        );
        assert_eq!(capture.title, "Fix leak");
        assert_eq!(capture.contexts, vec!["home"]);
        assert_eq!(capture.tags, vec!["plumbing", "urgent"]);
        assert_eq!(capture.projects, vec!["house-maintenance"]);
        assert_eq!(capture.status.as_deref(), Some("in-progress"));
        assert_eq!(capture.priority.as_deref(), Some("high"));
    }

    #[test]
    fn test_duplicate_triggers_collapse() {
        let capture = parse_with_today("x #a #a @h @h", wednesday());
        assert_eq!(capture.tags, vec!["a"]);
        assert_eq!(capture.contexts, vec!["h"]);
    }

    #[test]
    fn test_bare_trigger_characters_stay_in_title() {
        let capture = parse_with_today("pick up # and @ signs", wednesday());
        assert_eq!(capture.title, "pick up # and @ signs");
        assert!(capture.tags.is_empty());
    }

    #[test]
    fn test_due_and_scheduled_literals() {
        let capture =
            parse_with_today("Pay rent due 2024-02-01 scheduled 2024-01-28", wednesday());
        assert_eq!(capture.title, "Pay rent");
        assert_eq!(capture.due.as_deref(), Some("2024-02-01"));
        assert_eq!(capture.scheduled.as_deref(), Some("2024-01-28"));
    }

    #[test]
    fn test_relative_dates() {
        let capture = parse_with_today("a due today", wednesday());
        assert_eq!(capture.due.as_deref(), Some("2024-01-03"));
        let capture = parse_with_today("a due tomorrow", wednesday());
        assert_eq!(capture.due.as_deref(), Some("2024-01-04"));
        // Next Wednesday, not today.
        let capture = parse_with_today("a due wednesday", wednesday());
        assert_eq!(capture.due.as_deref(), Some("2024-01-10"));
        let capture = parse_with_today("a scheduled friday", wednesday());
        assert_eq!(capture.scheduled.as_deref(), Some("2024-01-05"));
    }

    #[test]
    fn test_due_without_parseable_date_stays_in_title() {
        let capture = parse_with_today("review due diligence report", wednesday());
        assert_eq!(capture.title, "review due diligence report");
        assert_eq!(capture.due, None);
    }

    #[test]
    fn test_recurrence_phrases() {
        let cases = [
            ("water daily", "FREQ=DAILY"),
            ("report weekly", "FREQ=WEEKLY"),
            ("rent monthly", "FREQ=MONTHLY"),
            ("taxes yearly", "FREQ=YEARLY"),
            ("backup every day", "FREQ=DAILY"),
            ("standup every monday", "FREQ=WEEKLY;BYDAY=MO"),
            ("sprint every 2 weeks", "FREQ=WEEKLY;INTERVAL=2"),
            ("review every 3 months", "FREQ=MONTHLY;INTERVAL=3"),
        ];
        for (input, rule) in cases {
            let capture = parse_with_today(input, wednesday());
            assert_eq!(capture.recurrence.as_deref(), Some(rule), "input: {input}");
            assert_eq!(capture.title, input.split_whitespace().next().unwrap());
        }
    }

    #[test]
    fn test_every_without_unit_stays_in_title() {
        let capture = parse_with_today("check every drawer", wednesday());
        assert_eq!(capture.title, "check every drawer");
        assert_eq!(capture.recurrence, None);
    }

    #[test]
    fn test_time_estimate() {
        assert_eq!(parse_with_today("a ~15m", wednesday()).time_estimate, Some(15));
        assert_eq!(parse_with_today("a ~2h", wednesday()).time_estimate, Some(120));
        // Malformed estimate is title text.
        let capture = parse_with_today("a ~soon", wednesday());
        assert_eq!(capture.time_estimate, None);
        assert_eq!(capture.title, "a ~soon");
    }

    #[test]
    fn test_details_after_separator() {
        let capture =
            parse_with_today("Water plants @home // back porch first, then windowsills", wednesday());
        assert_eq!(capture.title, "Water plants");
        assert_eq!(
            capture.details.as_deref(),
            Some("back porch first, then windowsills")
        );
        // Triggers after the separator are not parsed.
        let capture = parse_with_today("x // do it @home", wednesday());
        assert!(capture.contexts.is_empty());
        assert_eq!(capture.details.as_deref(), Some("do it @home"));
    }

    #[test]
    fn test_to_frontmatter_always_carries_task_tag() {
        let capture = parse_with_today("Water plants #garden daily ~15m @home", wednesday());
        let (fields, body) = to_frontmatter(&capture);
        assert_eq!(fields.get("title"), Some(&Value::from("Water plants")));
        let tags: Vec<&str> = fields
            .get("tags")
            .and_then(Value::as_sequence)
            .unwrap()
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(tags, vec!["task", "garden"]);
        assert_eq!(fields.get("timeEstimate"), Some(&Value::from(15)));
        assert_eq!(fields.get("recurrence"), Some(&Value::from("FREQ=DAILY")));
        assert!(fields.get("dateCreated").and_then(Value::as_str).is_some());
        assert!(body.is_empty());
    }

    #[test]
    fn test_to_frontmatter_untitled_fallback_and_body() {
        let capture = parse_with_today("#inbox // just a thought", wednesday());
        let (fields, body) = to_frontmatter(&capture);
        assert_eq!(fields.get("title"), Some(&Value::from("Untitled task")));
        assert_eq!(body, "\njust a thought\n");
    }
}
