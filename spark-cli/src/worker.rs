//! Background reminder worker.
//!
//! Runs as its own task and talks to the app only through channels. Timers
//! live in memory, so a restart forgets every pending reminder.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use spark_core::{AppMessage, HabitMissed, WorkerMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Permission;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    /// Platform grouping key, `habit-<id>`.
    pub tag: String,
}

/// Where notifications are displayed.
pub trait Notifier: Send + Sync + 'static {
    fn permission(&self) -> Permission;
    fn show(&self, notification: &Notification) -> Result<()>;
}

/// Prints notifications to the terminal.
pub struct TerminalNotifier {
    permission: Permission,
}

impl TerminalNotifier {
    pub fn new(permission: Permission) -> Self {
        Self { permission }
    }
}

impl Notifier for TerminalNotifier {
    fn permission(&self) -> Permission {
        self.permission
    }

    fn show(&self, n: &Notification) -> Result<()> {
        println!("\n🔔 {}\n   {}\n", n.title, n.body);
        Ok(())
    }
}

/// Display if permitted; failures are logged and dropped.
fn deliver<N: Notifier>(notifier: &N, notification: &Notification) {
    if notifier.permission() != Permission::Granted {
        tracing::debug!(tag = %notification.tag, "notification permission not granted; dropped");
        return;
    }
    if let Err(e) = notifier.show(notification) {
        tracing::warn!(tag = %notification.tag, error = %e, "notification display failed");
    }
}

pub fn reminder_notification(habit_id: &str, habit_name: Option<&str>) -> Notification {
    let name = habit_name.map(str::trim).filter(|n| !n.is_empty());
    Notification {
        title: format!("Reminder: {}", name.unwrap_or("Habit")),
        body: match name {
            Some(n) => format!("Time to check in on {n}."),
            None => "Time to check in on your habit.".to_string(),
        },
        tag: format!("habit-{habit_id}"),
    }
}

pub fn missed_notification(missed: &HabitMissed) -> Notification {
    Notification {
        title: format!("Missed: {}", missed.name),
        body: format!(
            "{} was below its target of {} on {}. Reply `complete {} {}` or `skip {} {}`.",
            missed.name,
            missed.target,
            missed.date,
            missed.habit_id,
            missed.date,
            missed.habit_id,
            missed.date
        ),
        tag: format!("habit-{}", missed.habit_id),
    }
}

/// When a reminder should fire: an explicit instant wins, otherwise the next
/// future occurrence of the `HH:MM` wall-clock time in `now`'s zone.
pub fn resolve_fire_time<Z: TimeZone>(
    scheduled_for: Option<DateTime<Utc>>,
    reminder_time: Option<&str>,
    now: &DateTime<Z>,
) -> Option<DateTime<Utc>> {
    if let Some(at) = scheduled_for {
        return Some(at);
    }
    let time = NaiveTime::parse_from_str(reminder_time?.trim(), "%H:%M").ok()?;
    let tz = now.timezone();
    let mut candidate = tz
        .from_local_datetime(&now.date_naive().and_time(time))
        .earliest()?;
    if candidate <= *now {
        candidate = tz
            .from_local_datetime(&(now.date_naive() + Duration::days(1)).and_time(time))
            .earliest()?;
    }
    Some(candidate.with_timezone(&Utc))
}

pub struct ReminderWorker<N: Notifier> {
    notifier: Arc<N>,
    app_tx: mpsc::UnboundedSender<AppMessage>,
    /// Zone `HH:MM` reminder times are read in; system local when unset.
    tz: Option<Tz>,
    timers: HashMap<String, JoinHandle<()>>,
}

impl<N: Notifier> ReminderWorker<N> {
    pub fn new(notifier: N, app_tx: mpsc::UnboundedSender<AppMessage>) -> Self {
        Self {
            notifier: Arc::new(notifier),
            app_tx,
            tz: None,
            timers: HashMap::new(),
        }
    }

    pub fn with_timezone(mut self, tz: Option<Tz>) -> Self {
        self.tz = tz;
        self
    }

    fn fire_time(
        &self,
        scheduled_for: Option<DateTime<Utc>>,
        reminder_time: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        match self.tz {
            Some(tz) => resolve_fire_time(scheduled_for, reminder_time, &now.with_timezone(&tz)),
            None => resolve_fire_time(scheduled_for, reminder_time, &now.with_timezone(&chrono::Local)),
        }
    }

    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorkerMessage>) {
        while let Some(msg) = rx.recv().await {
            self.handle(msg, Utc::now());
        }
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }

    /// Timers that have not fired yet.
    pub fn pending(&self) -> usize {
        self.timers.values().filter(|h| !h.is_finished()).count()
    }

    pub fn handle(&mut self, msg: WorkerMessage, now: DateTime<Utc>) {
        self.timers.retain(|_, h| !h.is_finished());

        match msg {
            WorkerMessage::ScheduleReminder {
                habit_id,
                habit_name,
                scheduled_for,
                reminder_time,
            } => {
                if habit_id.is_empty() {
                    return;
                }
                if let Some(prior) = self.timers.remove(&habit_id) {
                    prior.abort();
                }
                let Some(fire_at) = self.fire_time(scheduled_for, reminder_time.as_deref(), now) else {
                    tracing::debug!(habit = %habit_id, "reminder has no usable time; ignored");
                    return;
                };

                let delay = (fire_at - now).to_std().unwrap_or_default();
                let notification = reminder_notification(&habit_id, habit_name.as_deref());
                let notifier = Arc::clone(&self.notifier);
                tracing::info!(habit = %habit_id, at = %fire_at, "reminder scheduled");

                let handle = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    deliver(notifier.as_ref(), &notification);
                });
                self.timers.insert(habit_id, handle);
            }
            WorkerMessage::HabitMissed(missed) => {
                deliver(self.notifier.as_ref(), &missed_notification(&missed));
            }
            WorkerMessage::NotificationAction(response) => {
                // fire-and-forget; the app may already be gone
                let _ = self.app_tx.send(AppMessage::HabitResponse(response));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use spark_core::{HabitResponse, ResponseAction};
    use std::sync::Mutex;

    #[derive(Clone)]
    struct Recorder {
        permission: Permission,
        shown: Arc<Mutex<Vec<Notification>>>,
    }

    impl Recorder {
        fn new(permission: Permission) -> Self {
            Self {
                permission,
                shown: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn shown(&self) -> Vec<Notification> {
            self.shown.lock().unwrap().clone()
        }
    }

    impl Notifier for Recorder {
        fn permission(&self) -> Permission {
            self.permission
        }

        fn show(&self, n: &Notification) -> Result<()> {
            self.shown.lock().unwrap().push(n.clone());
            Ok(())
        }
    }

    fn schedule(habit: &str, at: DateTime<Utc>) -> WorkerMessage {
        WorkerMessage::ScheduleReminder {
            habit_id: habit.to_string(),
            habit_name: Some("Walk".to_string()),
            scheduled_for: Some(at),
            reminder_time: None,
        }
    }

    fn missed() -> HabitMissed {
        HabitMissed {
            habit_id: "w".into(),
            name: "Walk".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            target: 1,
        }
    }

    #[test]
    fn fire_time_prefers_explicit_instant() {
        let now = Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 1, 7, 9, 0, 0).unwrap();
        assert_eq!(resolve_fire_time(Some(at), Some("08:00"), &now), Some(at));
    }

    #[test]
    fn fire_time_rolls_to_tomorrow_when_passed() {
        let now = Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap();
        assert_eq!(
            resolve_fire_time(None, Some("18:30"), &now),
            Some(Utc.with_ymd_and_hms(2025, 1, 6, 18, 30, 0).unwrap())
        );
        assert_eq!(
            resolve_fire_time(None, Some("08:00"), &now),
            Some(Utc.with_ymd_and_hms(2025, 1, 7, 8, 0, 0).unwrap())
        );
        assert_eq!(
            resolve_fire_time(None, Some("12:00"), &now),
            Some(Utc.with_ymd_and_hms(2025, 1, 7, 12, 0, 0).unwrap())
        );
        assert_eq!(resolve_fire_time(None, Some("noon"), &now), None);
        assert_eq!(resolve_fire_time(None, None, &now), None);
    }

    #[test]
    fn notification_text() {
        let n = reminder_notification("w", Some("Walk"));
        assert_eq!(n.title, "Reminder: Walk");
        assert_eq!(n.body, "Time to check in on Walk.");
        assert_eq!(n.tag, "habit-w");
        let anon = reminder_notification("w", None);
        assert_eq!(anon.title, "Reminder: Habit");
        assert_eq!(missed_notification(&missed()).title, "Missed: Walk");
    }

    #[test]
    fn reminder_times_follow_the_configured_zone() {
        let (app_tx, _app_rx) = mpsc::unbounded_channel();
        let worker = ReminderWorker::new(Recorder::new(Permission::Granted), app_tx)
            .with_timezone(Some(chrono_tz::Asia::Tokyo));

        // 09:00 in Tokyo
        let now = Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap();
        assert_eq!(
            worker.fire_time(None, Some("20:00"), now),
            Some(Utc.with_ymd_and_hms(2025, 1, 6, 11, 0, 0).unwrap())
        );
        // 21:00 in Tokyo, so tomorrow's 20:00
        let late = Utc.with_ymd_and_hms(2025, 1, 6, 12, 0, 0).unwrap();
        assert_eq!(
            worker.fire_time(None, Some("20:00"), late),
            Some(Utc.with_ymd_and_hms(2025, 1, 7, 11, 0, 0).unwrap())
        );
    }

    #[tokio::test]
    async fn replacing_a_reminder_cancels_the_prior_timer() {
        let rec = Recorder::new(Permission::Granted);
        let (app_tx, _app_rx) = mpsc::unbounded_channel();
        let mut worker = ReminderWorker::new(rec.clone(), app_tx);
        let now = Utc::now();

        worker.handle(schedule("w", now + Duration::hours(1)), now);
        assert_eq!(worker.pending(), 1);
        worker.handle(schedule("w", now - Duration::seconds(1)), now);
        assert_eq!(worker.timers.len(), 1);

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert_eq!(rec.shown().len(), 1);
        assert_eq!(worker.pending(), 0);
    }

    #[tokio::test]
    async fn different_habits_keep_separate_timers() {
        let rec = Recorder::new(Permission::Granted);
        let (app_tx, _app_rx) = mpsc::unbounded_channel();
        let mut worker = ReminderWorker::new(rec.clone(), app_tx);
        let now = Utc::now();

        worker.handle(schedule("a", now + Duration::hours(1)), now);
        worker.handle(schedule("b", now + Duration::hours(1)), now);
        assert_eq!(worker.pending(), 2);
    }

    #[tokio::test]
    async fn denied_permission_drops_notifications() {
        let rec = Recorder::new(Permission::Denied);
        let (app_tx, _app_rx) = mpsc::unbounded_channel();
        let mut worker = ReminderWorker::new(rec.clone(), app_tx);
        worker.handle(WorkerMessage::HabitMissed(missed()), Utc::now());
        assert!(rec.shown().is_empty());
    }

    #[tokio::test]
    async fn notification_actions_become_habit_responses() {
        let rec = Recorder::new(Permission::Granted);
        let (app_tx, mut app_rx) = mpsc::unbounded_channel();
        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        let worker = ReminderWorker::new(rec.clone(), app_tx);
        let task = tokio::spawn(worker.run(worker_rx));

        let response = HabitResponse {
            habit_id: "w".into(),
            date: NaiveDate::from_ymd_opt(2025, 1, 6).unwrap(),
            action: ResponseAction::Complete,
        };
        worker_tx.send(WorkerMessage::HabitMissed(missed())).unwrap();
        worker_tx
            .send(WorkerMessage::NotificationAction(response.clone()))
            .unwrap();

        let AppMessage::HabitResponse(got) = app_rx.recv().await.unwrap();
        assert_eq!(got, response);
        assert_eq!(rec.shown().len(), 1);

        drop(worker_tx);
        task.await.unwrap();
    }
}
