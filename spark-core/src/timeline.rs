//! Timeline view: a bounded, ordered list of occurrences with per-day status.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::date::{add_days, date_label, weekday_label};
use crate::habit::Habit;
use crate::schedule::{Frequency, is_scheduled};

/// Days shown past today.
pub const LOOKAHEAD_DAYS: i64 = 14;
/// Most daily steps a single walk may take.
pub const MAX_TIMELINE_STEPS: i64 = 730;
/// Longest list returned; older entries are dropped first.
pub const MAX_TIMELINE_ENTRIES: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OccurrenceStatus {
    Complete,
    Missed,
    Pending,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub date: NaiveDate,
    pub weekday: String,
    pub label: String,
    pub status: OccurrenceStatus,
    pub is_today: bool,
}

pub fn occurrence_status(habit: &Habit, date: NaiveDate, today: NaiveDate) -> OccurrenceStatus {
    if habit.meets_target(date) {
        OccurrenceStatus::Complete
    } else if date < today {
        OccurrenceStatus::Missed
    } else if date == today {
        OccurrenceStatus::Pending
    } else {
        OccurrenceStatus::Upcoming
    }
}

/// Occurrences from the schedule's start through two weeks past today.
///
/// The walk begins no earlier than the step ceiling allows before the window
/// end, so long-running habits still reach today.
pub fn build_timeline(habit: &Habit, today: NaiveDate) -> Vec<Occurrence> {
    let schedule = &habit.schedule;
    let Some(start) = schedule.effective_start() else {
        return Vec::new();
    };
    let end = add_days(today, LOOKAHEAD_DAYS);
    let once = schedule.effective_frequency() == Frequency::Once;

    let mut cursor = start.max(add_days(end, -(MAX_TIMELINE_STEPS - 1)));
    let mut out = Vec::new();
    let mut steps = 0;

    while cursor <= end && steps < MAX_TIMELINE_STEPS {
        if is_scheduled(schedule, cursor) {
            out.push(Occurrence {
                date: cursor,
                weekday: weekday_label(cursor),
                label: date_label(cursor),
                status: occurrence_status(habit, cursor, today),
                is_today: cursor == today,
            });
        }
        if once && schedule.resolved_event_date().is_some_and(|event| cursor >= event) {
            break;
        }
        cursor = add_days(cursor, 1);
        steps += 1;
    }

    if out.len() > MAX_TIMELINE_ENTRIES {
        out.drain(..out.len() - MAX_TIMELINE_ENTRIES);
    }
    out
}
