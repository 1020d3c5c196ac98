//! Command layer: every user action is a value applied to loaded state.
//!
//! Callers load, apply, save, then re-derive view data. Nothing here renders.

use anyhow::{Result, bail};
use chrono::{NaiveDate, Utc, Weekday};

use crate::habit::Habit;
use crate::messages::{HabitResponse, ResponseAction};
use crate::presets::{FIRST_LAUNCH_PRESETS, Preset, find_preset};
use crate::rewards::evaluate_rewards;
use crate::schedule::{Frequency, Schedule, normalize_schedule};
use crate::store::AppState;

/// Fields for a new habit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewHabit {
    pub name: String,
    pub target: u32,
    pub schedule: Schedule,
    pub category: Option<String>,
    pub motivation: Option<String>,
    pub goals: Vec<String>,
    pub tips: Vec<String>,
    pub reminder_time: Option<String>,
}

impl NewHabit {
    pub fn named(name: impl Into<String>, target: u32) -> Self {
        Self {
            name: name.into(),
            target,
            ..Self::default()
        }
    }

    pub fn from_preset(preset: &Preset) -> Self {
        Self {
            name: preset.name.to_string(),
            target: preset.target,
            category: Some(preset.category.to_string()),
            motivation: Some(preset.motivation.to_string()),
            tips: preset.tips.iter().map(|t| t.to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Replacement recurrence settings. Unset fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleUpdate {
    pub frequency: Option<Frequency>,
    pub start_date: Option<NaiveDate>,
    pub event_date: Option<NaiveDate>,
    pub weekdays: Option<Vec<Weekday>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(NewHabit),
    Increment { habit: String },
    Decrement { habit: String },
    Reset { habit: String },
    Delete { habit: String },
    Complete { habit: String, date: NaiveDate },
    Skip { habit: String, date: NaiveDate },
    SetSchedule { habit: String, update: ScheduleUpdate },
}

impl From<HabitResponse> for Command {
    fn from(r: HabitResponse) -> Self {
        match r.action {
            ResponseAction::Complete => Command::Complete {
                habit: r.habit_id,
                date: r.date,
            },
            ResponseAction::Skip => Command::Skip {
                habit: r.habit_id,
                date: r.date,
            },
        }
    }
}

/// What a command did, for the caller to report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Outcome {
    pub habit_id: Option<String>,
    /// Count for the affected date after the command.
    pub count: Option<u32>,
    /// Set when an increment lands exactly on the target.
    pub celebration: Option<String>,
    pub unlocked: Vec<String>,
}

pub fn apply(state: &mut AppState, command: Command, today: NaiveDate) -> Result<Outcome> {
    match command {
        Command::Add(new) => add_habit(state, new, today),
        Command::Increment { habit } => update_count(state, &habit, today, |c| c.saturating_add(1)),
        Command::Decrement { habit } => update_count(state, &habit, today, |c| c.saturating_sub(1)),
        Command::Reset { habit } => update_count(state, &habit, today, |_| 0),
        Command::Delete { habit } => {
            let Some(idx) = state.position(&habit) else {
                bail!("no habit matching '{habit}'");
            };
            let removed = state.habits.remove(idx);
            tracing::info!(habit = %removed.id, "habit deleted");
            Ok(Outcome {
                habit_id: Some(removed.id),
                ..Outcome::default()
            })
        }
        Command::Complete { habit, date } => {
            let h = lookup(state, &habit)?;
            let target = h.effective_target();
            h.set_count(date, target);
            h.schedule.missed_prompts.remove(&date);
            let unlocked = evaluate_rewards(h, today);
            Ok(Outcome {
                habit_id: Some(h.id.clone()),
                count: Some(target),
                celebration: None,
                unlocked,
            })
        }
        Command::Skip { habit, date } => {
            let h = lookup(state, &habit)?;
            // stays flagged so the date is never offered again
            h.schedule.missed_prompts.insert(date);
            Ok(Outcome {
                habit_id: Some(h.id.clone()),
                count: Some(h.count_for(date)),
                ..Outcome::default()
            })
        }
        Command::SetSchedule { habit, update } => {
            let h = lookup(state, &habit)?;
            apply_schedule_update(h, update, today);
            Ok(Outcome {
                habit_id: Some(h.id.clone()),
                ..Outcome::default()
            })
        }
    }
}

fn lookup<'a>(state: &'a mut AppState, key: &str) -> Result<&'a mut Habit> {
    state
        .find_mut(key)
        .ok_or_else(|| anyhow::anyhow!("no habit matching '{key}'"))
}

fn update_count(
    state: &mut AppState,
    key: &str,
    today: NaiveDate,
    f: impl FnOnce(u32) -> u32,
) -> Result<Outcome> {
    let h = lookup(state, key)?;
    let before = h.count_for(today);
    let after = f(before);
    h.set_count(today, after);

    let target = h.effective_target();
    let celebration = (after > before && after == target)
        .then(|| format!("Nice! You hit your \u{201c}{}\u{201d} target", h.name));
    let unlocked = evaluate_rewards(h, today);

    Ok(Outcome {
        habit_id: Some(h.id.clone()),
        count: Some(after),
        celebration,
        unlocked,
    })
}

fn add_habit(state: &mut AppState, new: NewHabit, today: NaiveDate) -> Result<Outcome> {
    let name = new.name.trim().to_string();
    if name.is_empty() {
        bail!("habit name is required");
    }

    let mut habit = Habit::new(new_habit_id(), name, new.target.max(1), Utc::now().to_rfc3339());
    habit.schedule = new.schedule;
    if habit.schedule.start_date.is_none() && habit.schedule.event_date.is_none() {
        habit.schedule.start_date = Some(today);
    }
    habit.category = new.category.filter(|c| !c.trim().is_empty());
    habit.motivation = new.motivation.filter(|m| !m.trim().is_empty());
    habit.goals = new.goals;
    habit.tips = new.tips;
    habit.reminder_time = new.reminder_time;
    normalize_schedule(&mut habit, today);

    tracing::info!(habit = %habit.id, name = %habit.name, "habit added");
    let id = habit.id.clone();
    state.habits.push(habit);
    Ok(Outcome {
        habit_id: Some(id),
        count: Some(0),
        ..Outcome::default()
    })
}

fn apply_schedule_update(habit: &mut Habit, update: ScheduleUpdate, today: NaiveDate) {
    let s = &mut habit.schedule;
    if let Some(f) = update.frequency {
        s.frequency = Some(f);
        if f != Frequency::Once {
            s.event_date = None;
        }
    }
    if let Some(start) = update.start_date {
        s.start_date = Some(start);
        if s.frequency == Some(Frequency::Once) && update.event_date.is_none() {
            s.event_date = Some(start);
        }
    }
    if let Some(event) = update.event_date {
        s.event_date = Some(event);
    }
    if let Some(days) = update.weekdays {
        s.weekdays = days;
    }
    normalize_schedule(habit, today);
}

/// Short random id, 8 lowercase hex characters.
pub fn new_habit_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Seed the first-launch habits into an empty state. Returns whether it did.
pub fn seed_if_empty(state: &mut AppState, today: NaiveDate) -> Result<bool> {
    if !state.habits.is_empty() {
        return Ok(false);
    }
    for id in FIRST_LAUNCH_PRESETS {
        if let Some(preset) = find_preset(id) {
            apply(state, Command::Add(NewHabit::from_preset(preset)), today)?;
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn state_with(habit: Habit) -> AppState {
        AppState {
            habits: vec![habit],
        }
    }

    #[test]
    fn add_validates_and_normalizes() {
        let today = d("2025-03-01");
        let mut state = AppState::default();
        assert!(apply(&mut state, Command::Add(NewHabit::named("   ", 1)), today).is_err());

        let out = apply(&mut state, Command::Add(NewHabit::named(" Stretch ", 0)), today).unwrap();
        let h = state.find(out.habit_id.as_deref().unwrap()).unwrap();
        assert_eq!(h.name, "Stretch");
        assert_eq!(h.target, 1);
        assert_eq!(h.id.len(), 8);
        assert_eq!(h.schedule.frequency, Some(Frequency::Daily));
        assert_eq!(h.schedule.start_date, Some(today));
    }

    #[test]
    fn increment_celebrates_exactly_at_target() {
        let today = d("2025-03-01");
        let mut state = state_with(Habit::new("w", "Water", 2, "2025-03-01T00:00:00Z"));
        let first = apply(&mut state, Command::Increment { habit: "w".into() }, today).unwrap();
        assert_eq!(first.count, Some(1));
        assert!(first.celebration.is_none());

        let second = apply(&mut state, Command::Increment { habit: "w".into() }, today).unwrap();
        assert_eq!(second.count, Some(2));
        assert!(second.celebration.unwrap().contains("Water"));
        assert_eq!(second.unlocked, vec!["First Spark"]);

        let third = apply(&mut state, Command::Increment { habit: "w".into() }, today).unwrap();
        assert!(third.celebration.is_none());
    }

    #[test]
    fn decrement_and_reset_clamp_at_zero() {
        let today = d("2025-03-01");
        let mut state = state_with(Habit::new("w", "Water", 2, "").with_history([(today, 1)]));
        apply(&mut state, Command::Decrement { habit: "w".into() }, today).unwrap();
        let out = apply(&mut state, Command::Decrement { habit: "w".into() }, today).unwrap();
        assert_eq!(out.count, Some(0));

        apply(&mut state, Command::Increment { habit: "w".into() }, today).unwrap();
        let out = apply(&mut state, Command::Reset { habit: "w".into() }, today).unwrap();
        assert_eq!(out.count, Some(0));
    }

    #[test]
    fn complete_sets_target_and_clears_prompt() {
        let today = d("2025-03-05");
        let missed = d("2025-03-03");
        let mut h = Habit::new("w", "Water", 8, "").with_schedule(Schedule::daily(d("2025-03-01")));
        h.schedule.missed_prompts.insert(missed);
        let mut state = state_with(h);

        let response = HabitResponse {
            habit_id: "w".into(),
            date: missed,
            action: ResponseAction::Complete,
        };
        apply(&mut state, response.into(), today).unwrap();
        let h = &state.habits[0];
        assert_eq!(h.count_for(missed), 8);
        assert!(!h.schedule.missed_prompts.contains(&missed));
    }

    #[test]
    fn skip_keeps_date_flagged() {
        let today = d("2025-03-05");
        let missed = d("2025-03-03");
        let mut state = state_with(Habit::new("w", "Water", 8, ""));
        apply(&mut state, Command::Skip { habit: "w".into(), date: missed }, today).unwrap();
        assert!(state.habits[0].schedule.missed_prompts.contains(&missed));
        assert_eq!(state.habits[0].count_for(missed), 0);
    }

    #[test]
    fn delete_and_unknown_habit() {
        let today = d("2025-03-05");
        let mut state = state_with(Habit::new("w", "Water", 8, ""));
        assert!(apply(&mut state, Command::Increment { habit: "zz".into() }, today).is_err());
        assert_eq!(state.habits[0].count_for(today), 0);
        apply(&mut state, Command::Delete { habit: "water".into() }, today).unwrap();
        assert!(state.habits.is_empty());
        assert!(apply(&mut state, Command::Delete { habit: "water".into() }, today).is_err());
    }

    #[test]
    fn set_schedule_switches_to_weekly_and_once() {
        let today = d("2025-01-06");
        let mut state = state_with(
            Habit::new("g", "Gym", 1, "").with_schedule(Schedule::daily(d("2025-01-01"))),
        );
        let update = ScheduleUpdate {
            frequency: Some(Frequency::Weekly),
            weekdays: Some(vec![Weekday::Thu, Weekday::Tue]),
            ..ScheduleUpdate::default()
        };
        apply(&mut state, Command::SetSchedule { habit: "g".into(), update }, today).unwrap();
        assert_eq!(state.habits[0].schedule.weekdays, vec![Weekday::Tue, Weekday::Thu]);

        let update = ScheduleUpdate {
            frequency: Some(Frequency::Once),
            start_date: Some(d("2025-02-14")),
            ..ScheduleUpdate::default()
        };
        apply(&mut state, Command::SetSchedule { habit: "g".into(), update }, today).unwrap();
        let s = &state.habits[0].schedule;
        assert_eq!(s.event_date, Some(d("2025-02-14")));
        assert_eq!(s.start_date, Some(d("2025-02-14")));
        assert!(s.weekdays.is_empty());
    }

    #[test]
    fn seeds_only_empty_state() {
        let today = d("2025-09-17");
        let mut state = AppState::default();
        assert!(seed_if_empty(&mut state, today).unwrap());
        let names: Vec<_> = state.habits.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Drink water", "Walk"]);
        assert_eq!(state.habits[0].target, 8);
        assert!(!state.habits[0].tips.is_empty());
        assert!(!seed_if_empty(&mut state, today).unwrap());
        assert_eq!(state.habits.len(), 2);
    }
}
