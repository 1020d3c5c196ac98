//! Message schemas between the app and the background reminder worker.
//!
//! Delivery is fire-and-forget in both directions.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseAction {
    Complete,
    Skip,
}

impl ResponseAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "complete" | "done" | "c" => Some(Self::Complete),
            "skip" | "s" => Some(Self::Skip),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitMissed {
    pub habit_id: String,
    pub name: String,
    pub date: NaiveDate,
    pub target: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HabitResponse {
    pub habit_id: String,
    pub date: NaiveDate,
    pub action: ResponseAction,
}

/// App -> worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum WorkerMessage {
    HabitMissed(HabitMissed),
    #[serde(rename_all = "camelCase")]
    ScheduleReminder {
        habit_id: String,
        #[serde(default)]
        habit_name: Option<String>,
        #[serde(default)]
        scheduled_for: Option<DateTime<Utc>>,
        /// `HH:MM`; used when `scheduled_for` is absent.
        #[serde(default)]
        reminder_time: Option<String>,
    },
    /// A user acted on a displayed notification.
    NotificationAction(HabitResponse),
}

/// Worker -> app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AppMessage {
    HabitResponse(HabitResponse),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn habit_missed_wire_shape() {
        let msg = WorkerMessage::HabitMissed(HabitMissed {
            habit_id: "abc".into(),
            name: "Walk".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            target: 1,
        });
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            v,
            serde_json::json!({
                "type": "habit-missed",
                "habitId": "abc",
                "name": "Walk",
                "date": "2025-01-06",
                "target": 1
            })
        );
    }

    #[test]
    fn habit_response_parses_from_worker_json() {
        let msg: AppMessage = serde_json::from_str(
            r#"{"type":"habit-response","habitId":"abc","date":"2025-01-06","action":"complete"}"#,
        )
        .unwrap();
        let AppMessage::HabitResponse(r) = msg;
        assert_eq!(r.action, ResponseAction::Complete);
        assert_eq!(r.habit_id, "abc");
    }

    #[test]
    fn schedule_reminder_optional_fields() {
        let msg: WorkerMessage = serde_json::from_str(
            r#"{"type":"schedule-reminder","habitId":"abc","reminderTime":"08:30"}"#,
        )
        .unwrap();
        match msg {
            WorkerMessage::ScheduleReminder {
                habit_id,
                scheduled_for,
                reminder_time,
                ..
            } => {
                assert_eq!(habit_id, "abc");
                assert!(scheduled_for.is_none());
                assert_eq!(reminder_time.as_deref(), Some("08:30"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn action_aliases() {
        assert_eq!(ResponseAction::parse("Done"), Some(ResponseAction::Complete));
        assert_eq!(ResponseAction::parse("s"), Some(ResponseAction::Skip));
        assert_eq!(ResponseAction::parse("later"), None);
    }
}
