//! Date utilities: ISO calendar dates, weekday codes, and "today" on the user's clock.
//!
//! Everything here works on `NaiveDate`, so stepping a day never crosses a
//! daylight-saving boundary the way wall-clock arithmetic does.

use std::sync::LazyLock;

use anyhow::Result;
use chrono::{Datelike, Days, Local, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;

static ISO_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})").expect("ISO prefix pattern compiles"));

/// Weekday codes in Sunday-first order, as used by calendar recurrence rules.
pub const WEEKDAY_CODES: [&str; 7] = ["SU", "MO", "TU", "WE", "TH", "FR", "SA"];

/// Extract a strict `YYYY-MM-DD` prefix from arbitrary input.
///
/// Returns an empty string when the input does not start with one.
pub fn normalize_date_string(value: &str) -> String {
    ISO_PREFIX
        .captures(value.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Parse the ISO prefix of `value` into a real calendar date.
///
/// `2025-02-30T00:00` has a well-formed prefix but is still rejected.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    let prefix = normalize_date_string(value);
    if prefix.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(&prefix, "%Y-%m-%d").ok()
}

pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Step `n` calendar days forward (negative steps backward). Saturates at the
/// ends of chrono's supported range.
pub fn add_days(date: NaiveDate, n: i64) -> NaiveDate {
    let step = Days::new(n.unsigned_abs());
    let moved = if n >= 0 {
        date.checked_add_days(step)
    } else {
        date.checked_sub_days(step)
    };
    moved.unwrap_or(date)
}

pub fn weekday_code(day: Weekday) -> &'static str {
    WEEKDAY_CODES[day.num_days_from_sunday() as usize]
}

pub fn weekday_of(date: NaiveDate) -> Weekday {
    date.weekday()
}

/// Parse a two-letter code (`MO`, `tu`, ...). Unknown codes yield `None`.
pub fn parse_weekday_code(code: &str) -> Option<Weekday> {
    match code.trim().to_ascii_uppercase().as_str() {
        "SU" => Some(Weekday::Sun),
        "MO" => Some(Weekday::Mon),
        "TU" => Some(Weekday::Tue),
        "WE" => Some(Weekday::Wed),
        "TH" => Some(Weekday::Thu),
        "FR" => Some(Weekday::Fri),
        "SA" => Some(Weekday::Sat),
        _ => None,
    }
}

/// Short weekday label, e.g. `Mon`.
pub fn weekday_label(date: NaiveDate) -> String {
    date.format("%a").to_string()
}

/// Short display label, e.g. `Jan 6`.
pub fn date_label(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

/// Today's calendar date on the user's clock.
///
/// With an IANA timezone name the current UTC instant is converted into that
/// zone; without one the system local clock is used.
pub fn today_in(timezone: Option<&str>) -> Result<NaiveDate> {
    match timezone {
        Some(name) => {
            let tz: Tz = name
                .parse()
                .map_err(|_| anyhow::anyhow!("invalid timezone: {name}"))?;
            Ok(Utc::now().with_timezone(&tz).date_naive())
        }
        None => Ok(Local::now().date_naive()),
    }
}
