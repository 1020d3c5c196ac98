//! iCalendar export: one recurring VEVENT per habit.
//!
//! Notes:
//! - Lines end in CRLF and are folded at 75 octets (RFC 5545 3.1).
//! - DTSTART is date-only, so importing clients show an all-day event.
//! - UID is derived from the habit id, so re-importing updates instead of duplicating.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;

use crate::date::{add_days, weekday_code, weekday_of};
use crate::habit::Habit;
use crate::schedule::Frequency;

const MAX_LINE_OCTETS: usize = 75;
const DEFAULT_EXPORT_STEM: &str = "habit";

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern compiles"));

/// Render a habit's schedule as a calendar document.
pub fn encode_calendar(habit: &Habit, now: DateTime<Utc>) -> String {
    let schedule = &habit.schedule;
    let start = schedule.effective_start().unwrap_or_else(|| now.date_naive());
    let stamp = now.format("%Y%m%dT%H%M%SZ").to_string();

    let mut lines: Vec<String> = vec![
        "BEGIN:VCALENDAR".into(),
        "VERSION:2.0".into(),
        "PRODID:-//Habit Spark//EN".into(),
        "CALSCALE:GREGORIAN".into(),
        "BEGIN:VEVENT".into(),
        format!("UID:habit-{}@habit-spark", habit.id),
        format!("DTSTAMP:{stamp}"),
    ];

    if let Ok(created) = DateTime::parse_from_rfc3339(&habit.created_at) {
        lines.push(format!(
            "CREATED:{}",
            created.with_timezone(&Utc).format("%Y%m%dT%H%M%SZ")
        ));
    }

    lines.push(format!("SUMMARY:{}", escape_ics(&habit.name)));
    lines.push(format!("DTSTART;VALUE=DATE:{}", ics_date(start)));

    match schedule.effective_frequency() {
        Frequency::Daily => lines.push("RRULE:FREQ=DAILY".into()),
        Frequency::Weekly => {
            let mut days: Vec<&str> = schedule.weekdays.iter().map(|d| weekday_code(*d)).collect();
            if days.is_empty() {
                days.push(weekday_code(weekday_of(start)));
            }
            lines.push(format!("RRULE:FREQ=WEEKLY;BYDAY={}", days.join(",")));
        }
        Frequency::Once => {
            lines.push(format!("DTEND;VALUE=DATE:{}", ics_date(add_days(start, 1))));
        }
    }

    if let Some(description) = describe(habit) {
        lines.push(format!("DESCRIPTION:{}", escape_ics(&description)));
    }

    lines.push("END:VEVENT".into());
    lines.push("END:VCALENDAR".into());

    let mut out = String::new();
    for line in &lines {
        out.push_str(&fold_line(line));
        out.push_str("\r\n");
    }
    out
}

/// Motivation text followed by tips, if there is anything to say.
fn describe(habit: &Habit) -> Option<String> {
    let mut parts = Vec::new();
    if let Some(m) = habit.motivation.as_deref().map(str::trim).filter(|m| !m.is_empty()) {
        parts.push(m.to_string());
    }
    let tips: Vec<&str> = habit
        .tips
        .iter()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    if !tips.is_empty() {
        let mut block = String::from("Tips:");
        for tip in tips {
            block.push_str("\n- ");
            block.push_str(tip);
        }
        parts.push(block);
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n"))
    }
}

fn ics_date(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// TEXT escaping; backslashes go first so later escapes are not doubled.
pub fn escape_ics(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\n', "\\n")
        .replace(',', "\\,")
        .replace(';', "\\;")
}

/// Split a content line into 75-octet chunks joined by CRLF + space,
/// never breaking inside a UTF-8 sequence.
pub fn fold_line(line: &str) -> String {
    if line.len() <= MAX_LINE_OCTETS {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + line.len() / MAX_LINE_OCTETS * 3);
    let mut budget = MAX_LINE_OCTETS;
    let mut used = 0;
    for ch in line.chars() {
        let width = ch.len_utf8();
        if used + width > budget {
            out.push_str("\r\n ");
            // continuation lines spend one octet on the leading space
            budget = MAX_LINE_OCTETS - 1;
            used = 0;
        }
        out.push(ch);
        used += width;
    }
    out
}

/// Download filename: slugified name plus `.ics`.
pub fn export_filename(name: &str) -> String {
    let lower = name.to_lowercase();
    let slug = NON_SLUG.replace_all(&lower, "-");
    let slug = slug.trim_matches('-');
    let stem = if slug.is_empty() { DEFAULT_EXPORT_STEM } else { slug };
    format!("{stem}.ics")
}
