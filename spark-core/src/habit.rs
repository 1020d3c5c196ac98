//! Habit model: identity, daily target, per-day history, schedule, achievements.
//!
//! Kept small and serializable; the JSON shape is the one the store persists.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::commands::new_habit_id;
use crate::date::parse_iso_date;
use crate::lenient;
use crate::schedule::{Schedule, normalize_schedule};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub description: String,
    #[serde(default, with = "lenient::opt_date")]
    pub unlocked_on: Option<NaiveDate>,
}

/// Stored habit. Every field decodes leniently; an empty `id` is assigned
/// by [`repair_habit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Habit {
    #[serde(default, deserialize_with = "lenient::string")]
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,

    /// Check-ins per day that count as done. Repaired to at least 1.
    #[serde(default = "default_target", deserialize_with = "lenient::target")]
    pub target: u32,

    /// RFC 3339 timestamp as written at creation.
    #[serde(default, deserialize_with = "lenient::string")]
    pub created_at: String,

    #[serde(default, deserialize_with = "lenient::history")]
    pub history: BTreeMap<NaiveDate, u32>,

    #[serde(default, deserialize_with = "lenient::schedule")]
    pub schedule: Schedule,

    #[serde(default, deserialize_with = "lenient::achievements")]
    pub achievements: Vec<Achievement>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub motivation: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient::string_list")]
    pub goals: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient::string_list")]
    pub tips: Vec<String>,

    /// Daily reminder wall-clock time, `HH:MM`.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub reminder_time: Option<String>,
}

fn default_target() -> u32 {
    1
}

impl Habit {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        target: u32,
        created_at: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            target: target.max(1),
            created_at: created_at.into(),
            history: BTreeMap::new(),
            schedule: Schedule::default(),
            achievements: Vec::new(),
            category: None,
            motivation: None,
            goals: Vec::new(),
            tips: Vec::new(),
            reminder_time: None,
        }
    }

    pub fn with_schedule(mut self, schedule: Schedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_history(mut self, entries: impl IntoIterator<Item = (NaiveDate, u32)>) -> Self {
        self.history.extend(entries);
        self
    }

    /// Target with the >= 1 floor applied, for records not yet repaired.
    pub fn effective_target(&self) -> u32 {
        self.target.max(1)
    }

    pub fn creation_date(&self) -> Option<NaiveDate> {
        parse_iso_date(&self.created_at)
    }

    pub fn count_for(&self, date: NaiveDate) -> u32 {
        self.history.get(&date).copied().unwrap_or(0)
    }

    pub fn set_count(&mut self, date: NaiveDate, count: u32) {
        self.history.insert(date, count);
    }

    pub fn meets_target(&self, date: NaiveDate) -> bool {
        self.count_for(date) >= self.effective_target()
    }

    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.iter().any(|a| a.id == id)
    }
}

/// Repair a loaded habit: assign a missing id, clamp the target, then
/// normalize the schedule.
pub fn repair_habit(habit: &mut Habit, today: NaiveDate) -> bool {
    let mut changed = false;
    if habit.id.trim().is_empty() {
        habit.id = new_habit_id();
        changed = true;
    }
    if habit.target == 0 {
        habit.target = 1;
        changed = true;
    }
    normalize_schedule(habit, today) || changed
}
