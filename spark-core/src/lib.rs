//! spark-core: habit model and recurrence engine for Habit Spark
//!
//! Schedules are normalized on load, expanded into timelines for display,
//! scanned for missed occurrences to remind about, and exported as iCalendar.

pub mod commands;
pub mod date;
pub mod habit;
pub mod ics;
mod lenient;
pub mod messages;
pub mod missed;
pub mod presets;
pub mod rewards;
pub mod schedule;
pub mod store;
pub mod timeline;

pub use commands::{Command, NewHabit, Outcome, ScheduleUpdate, apply, seed_if_empty};
pub use date::{normalize_date_string, parse_iso_date, today_in};
pub use habit::{Achievement, Habit, repair_habit};
pub use ics::{encode_calendar, export_filename};
pub use messages::{AppMessage, HabitMissed, HabitResponse, ResponseAction, WorkerMessage};
pub use missed::{MissedScan, collect_missed, missed_notifications};
pub use presets::{PRESETS, Preset, find_preset};
pub use rewards::{REWARDS, RewardDef, compute_streak, days_meeting_target, evaluate_rewards, total_completions};
pub use schedule::{Frequency, Schedule, is_scheduled, normalize_schedule};
pub use store::{AppState, HabitStore, JsonFileStore, MemoryStore};
pub use timeline::{Occurrence, OccurrenceStatus, build_timeline};
