//! Recurrence rules: the schedule record, its normalizer, and the occurrence predicate.

use std::collections::BTreeSet;

use chrono::{NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::date::{add_days, parse_iso_date, weekday_of};
use crate::habit::Habit;
use crate::lenient;

/// Days of `missedPrompts` history kept behind today.
pub const MISSED_PROMPT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Daily,
    Weekly,
    Once,
}

impl Frequency {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Some(Self::Daily),
            "weekly" => Some(Self::Weekly),
            "once" => Some(Self::Once),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Once => "once",
        }
    }
}

/// Stored recurrence record.
///
/// Fields are optional because older records predate some of them; after
/// [`normalize_schedule`] every field is resolved and the invariants hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    #[serde(default, deserialize_with = "lenient::frequency")]
    pub frequency: Option<Frequency>,
    #[serde(default, with = "lenient::opt_date")]
    pub start_date: Option<NaiveDate>,
    /// Authoritative for `once`; empty otherwise.
    #[serde(default, with = "lenient::opt_date")]
    pub event_date: Option<NaiveDate>,
    /// Non-empty only for `weekly`, kept in Sunday-first order.
    #[serde(default, with = "lenient::weekdays")]
    pub weekdays: Vec<Weekday>,
    /// Dates already flagged as reminder-eligible.
    #[serde(default, with = "lenient::date_set")]
    pub missed_prompts: BTreeSet<NaiveDate>,
}

impl Schedule {
    pub fn daily(start: NaiveDate) -> Self {
        Self {
            frequency: Some(Frequency::Daily),
            start_date: Some(start),
            ..Self::default()
        }
    }

    pub fn weekly(start: NaiveDate, weekdays: Vec<Weekday>) -> Self {
        Self {
            frequency: Some(Frequency::Weekly),
            start_date: Some(start),
            weekdays,
            ..Self::default()
        }
    }

    pub fn once(event: NaiveDate) -> Self {
        Self {
            frequency: Some(Frequency::Once),
            start_date: Some(event),
            event_date: Some(event),
            ..Self::default()
        }
    }

    /// Stored frequency, or the one inferred from the fields present.
    pub fn effective_frequency(&self) -> Frequency {
        self.frequency.unwrap_or(if self.event_date.is_some() {
            Frequency::Once
        } else {
            Frequency::Daily
        })
    }

    /// The single event date of a `once` schedule.
    pub fn resolved_event_date(&self) -> Option<NaiveDate> {
        self.event_date.or(self.start_date)
    }

    /// First date the schedule can produce an occurrence on.
    pub fn effective_start(&self) -> Option<NaiveDate> {
        match self.effective_frequency() {
            Frequency::Once => self.resolved_event_date(),
            Frequency::Daily | Frequency::Weekly => self.start_date,
        }
    }
}

/// Repair a possibly partial or legacy schedule in place.
///
/// Safe to call on every load: a second call on the result reports `false`.
pub fn normalize_schedule(habit: &mut Habit, today: NaiveDate) -> bool {
    let prior = habit.schedule.clone();
    let fallback = habit.creation_date().unwrap_or(today);

    let frequency = prior.effective_frequency();
    let mut next = Schedule {
        frequency: Some(frequency),
        ..Schedule::default()
    };

    match frequency {
        Frequency::Once => {
            let event = prior
                .event_date
                .or(prior.start_date)
                .unwrap_or(fallback);
            next.start_date = Some(event);
            next.event_date = Some(event);
        }
        Frequency::Daily => {
            next.start_date = Some(prior.start_date.unwrap_or(fallback));
        }
        Frequency::Weekly => {
            let start = prior.start_date.unwrap_or(fallback);
            next.start_date = Some(start);
            next.weekdays = canonical_weekdays(&prior.weekdays);
            if next.weekdays.is_empty() {
                next.weekdays.push(weekday_of(start));
            }
        }
    }

    next.missed_prompts = retained_prompts(&prior.missed_prompts, today);

    let changed = next != prior;
    if changed {
        tracing::debug!(habit = %habit.id, "schedule normalized");
        habit.schedule = next;
    }
    changed
}

/// Deduplicated, Sunday-first weekday list.
pub fn canonical_weekdays(days: &[Weekday]) -> Vec<Weekday> {
    let mut out: Vec<Weekday> = Vec::with_capacity(days.len());
    for day in days {
        if !out.contains(day) {
            out.push(*day);
        }
    }
    out.sort_by_key(|d| d.num_days_from_sunday());
    out
}

/// Prompts within `[today - 30d, today]`.
pub fn retained_prompts(prompts: &BTreeSet<NaiveDate>, today: NaiveDate) -> BTreeSet<NaiveDate> {
    let oldest = add_days(today, -MISSED_PROMPT_RETENTION_DAYS);
    prompts.range(oldest..=today).copied().collect()
}

/// Whether `date` is an occurrence under `schedule`.
pub fn is_scheduled(schedule: &Schedule, date: NaiveDate) -> bool {
    match schedule.effective_frequency() {
        Frequency::Once => schedule.resolved_event_date() == Some(date),
        Frequency::Daily => schedule.start_date.is_some_and(|start| date >= start),
        Frequency::Weekly => {
            let Some(start) = schedule.start_date else {
                return false;
            };
            // An empty set means every day. Normalized weekly schedules always
            // carry at least one weekday, so this branch only sees raw records.
            date >= start
                && (schedule.weekdays.is_empty() || schedule.weekdays.contains(&weekday_of(date)))
        }
    }
}

/// String-facing variant of [`is_scheduled`]; malformed dates are never scheduled.
pub fn is_scheduled_iso(schedule: &Schedule, date: &str) -> bool {
    parse_iso_date(date).is_some_and(|d| is_scheduled(schedule, d))
}
