//! Missed-occurrence detection for reminder delivery.
//!
//! `missedPrompts` on the schedule is the dedupe ledger: once a date lands
//! there it is never offered again, whatever its count does afterwards.

use chrono::NaiveDate;

use crate::date::add_days;
use crate::habit::Habit;
use crate::messages::HabitMissed;
use crate::schedule::{Frequency, is_scheduled, retained_prompts};

/// How far back a scan looks.
pub const MISSED_LOOKBACK_DAYS: i64 = 7;
/// Step ceiling for a single scan.
pub const MAX_MISSED_STEPS: i64 = 60;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissedScan {
    /// Newly flagged dates, oldest first.
    pub candidates: Vec<NaiveDate>,
    /// Whether `missedPrompts` was altered.
    pub changed: bool,
}

/// Flag recent past occurrences that fell short of target and were never prompted.
pub fn collect_missed(habit: &mut Habit, today: NaiveDate) -> MissedScan {
    let mut scan = MissedScan::default();

    let retained = retained_prompts(&habit.schedule.missed_prompts, today);
    if retained != habit.schedule.missed_prompts {
        habit.schedule.missed_prompts = retained;
        scan.changed = true;
    }

    let Some(start) = habit.schedule.effective_start() else {
        return scan;
    };
    let once = habit.schedule.effective_frequency() == Frequency::Once;
    let event = habit.schedule.resolved_event_date();

    let mut cursor = start.max(add_days(today, -MISSED_LOOKBACK_DAYS));
    let mut steps = 0;

    while cursor < today && steps < MAX_MISSED_STEPS {
        if is_scheduled(&habit.schedule, cursor)
            && !habit.meets_target(cursor)
            && habit.schedule.missed_prompts.insert(cursor)
        {
            scan.candidates.push(cursor);
            scan.changed = true;
        }
        if once && event.is_some_and(|e| cursor >= e) {
            break;
        }
        cursor = add_days(cursor, 1);
        steps += 1;
    }

    if !scan.candidates.is_empty() {
        tracing::debug!(habit = %habit.id, count = scan.candidates.len(), "flagged missed occurrences");
    }
    scan
}

/// Run the detector and shape the result as notification messages.
pub fn missed_notifications(habit: &mut Habit, today: NaiveDate) -> (Vec<HabitMissed>, bool) {
    let scan = collect_missed(habit, today);
    let messages = scan
        .candidates
        .iter()
        .map(|date| HabitMissed {
            habit_id: habit.id.clone(),
            name: habit.name.clone(),
            date: *date,
            target: habit.effective_target(),
        })
        .collect();
    (messages, scan.changed)
}
