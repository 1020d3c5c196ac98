//! `spark watch`: foreground loop that feeds the reminder worker.
//!
//! Every `check_interval_secs` the store is rescanned for missed occurrences.
//! Replies typed on stdin (`complete <habit> <date>` / `skip <habit> <date>`)
//! travel through the worker as notification actions and come back as habit
//! responses, which are applied to the store like any other command.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use spark_core::{
    AppMessage, Command, HabitResponse, HabitStore, JsonFileStore, ResponseAction, WorkerMessage,
    apply, missed_notifications, parse_iso_date, today_in,
};
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::config::{Config, Permission};
use crate::state::load_state;
use crate::worker::{ReminderWorker, TerminalNotifier};

pub async fn run(store: &JsonFileStore, cfg: &Config) -> Result<()> {
    let input = BufReader::new(tokio::io::stdin());
    run_until(store, cfg, input, tokio::signal::ctrl_c()).await
}

/// The watch loop, reading replies from `input` until `shutdown` resolves.
async fn run_until<R, F>(store: &JsonFileStore, cfg: &Config, input: R, shutdown: F) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    let permission = cfg.effective_permission();
    if permission != Permission::Granted {
        tracing::warn!(?permission, "reminders are off; missed occurrences will not be scanned");
    }

    let (worker_tx, worker_rx) = mpsc::unbounded_channel();
    let (app_tx, mut app_rx) = mpsc::unbounded_channel();
    let worker = ReminderWorker::new(TerminalNotifier::new(permission), app_tx).with_timezone(cfg.tz()?);
    let worker_task = tokio::spawn(worker.run(worker_rx));

    let mut tick = tokio::time::interval(Duration::from_secs(cfg.reminders.check_interval_secs.max(1)));
    let mut lines = input.lines();
    let mut input_open = true;
    let mut reminders_for: Option<NaiveDate> = None;
    tokio::pin!(shutdown);

    println!("Watching habits. Reply with `complete <habit> <date>` or `skip <habit> <date>`; Ctrl-C to stop.");

    loop {
        tokio::select! {
            _ = tick.tick() => {
                let today = today_in(cfg.timezone.as_deref())?;
                // daily reminders are re-armed once per calendar day
                if reminders_for != Some(today) && cfg.reminders.enabled {
                    schedule_reminders(store, cfg, today, &worker_tx)?;
                    reminders_for = Some(today);
                }
                scan_if_permitted(store, permission, today, &worker_tx)?;
            }
            line = lines.next_line(), if input_open => {
                match line.context("read stdin")? {
                    Some(l) if l.trim().is_empty() => {}
                    Some(l) => match parse_response_line(&l) {
                        Some(response) => {
                            let _ = worker_tx.send(WorkerMessage::NotificationAction(response));
                        }
                        None => eprintln!("expected `complete <habit> <YYYY-MM-DD>` or `skip <habit> <YYYY-MM-DD>`"),
                    },
                    None => input_open = false,
                }
            }
            Some(msg) = app_rx.recv() => {
                let AppMessage::HabitResponse(response) = msg;
                let today = today_in(cfg.timezone.as_deref())?;
                if let Err(e) = apply_response(store, response, today) {
                    eprintln!("{e:#}");
                }
            }
            _ = &mut shutdown => {
                tracing::info!("interrupted; stopping reminder worker");
                break;
            }
        }
    }

    drop(worker_tx);
    worker_task.await.context("reminder worker panicked")?;
    Ok(())
}

/// Scan for missed occurrences only when notifications may be shown, so no
/// prompt is recorded for a reminder nobody could see. Returns whether it scanned.
fn scan_if_permitted(
    store: &JsonFileStore,
    permission: Permission,
    today: NaiveDate,
    worker_tx: &mpsc::UnboundedSender<WorkerMessage>,
) -> Result<bool> {
    if permission != Permission::Granted {
        return Ok(false);
    }
    scan_missed(store, today, worker_tx)?;
    Ok(true)
}

fn schedule_reminders(
    store: &JsonFileStore,
    cfg: &Config,
    today: NaiveDate,
    worker_tx: &mpsc::UnboundedSender<WorkerMessage>,
) -> Result<()> {
    let state = load_state(store, today)?;
    for h in &state.habits {
        let Some(time) = h.reminder_time.clone().or_else(|| cfg.reminders.default_time.clone()) else {
            continue;
        };
        let _ = worker_tx.send(WorkerMessage::ScheduleReminder {
            habit_id: h.id.clone(),
            habit_name: Some(h.name.clone()),
            scheduled_for: None,
            reminder_time: Some(time),
        });
    }
    Ok(())
}

fn scan_missed(
    store: &JsonFileStore,
    today: NaiveDate,
    worker_tx: &mpsc::UnboundedSender<WorkerMessage>,
) -> Result<()> {
    let mut state = load_state(store, today)?;
    let mut changed = false;
    let mut found = 0usize;
    for h in state.habits.iter_mut() {
        let (messages, c) = missed_notifications(h, today);
        changed |= c;
        for m in messages {
            found += 1;
            let _ = worker_tx.send(WorkerMessage::HabitMissed(m));
        }
    }
    // prompts are persisted before the notifications could be acted on
    if changed {
        store.save(&state)?;
    }
    tracing::debug!(found, "missed scan finished");
    Ok(())
}

fn apply_response(store: &JsonFileStore, response: HabitResponse, today: NaiveDate) -> Result<()> {
    let mut state = load_state(store, today)?;
    let action = response.action;
    let date = response.date;
    let outcome = apply(&mut state, Command::from(response), today)?;
    store.save(&state)?;

    let id = outcome.habit_id.unwrap_or_default();
    match action {
        ResponseAction::Complete => println!("Marked [{id}] complete for {date}."),
        ResponseAction::Skip => println!("Skipped [{id}] on {date}."),
    }
    for label in outcome.unlocked {
        println!("🏅 Unlocked: {label}");
    }
    Ok(())
}

/// `complete <habit> <date>` or `skip <habit> <date>`; the habit may be an id
/// or a name with spaces.
pub fn parse_response_line(line: &str) -> Option<HabitResponse> {
    let mut parts = line.split_whitespace();
    let action = ResponseAction::parse(parts.next()?)?;
    let rest: Vec<&str> = parts.collect();
    let (date, habit) = rest.split_last()?;
    if habit.is_empty() {
        return None;
    }
    Some(HabitResponse {
        habit_id: habit.join(" "),
        date: parse_iso_date(date)?,
        action,
    })
}
