use chrono::{NaiveDate, TimeZone, Utc, Weekday};
use spark_core::date::add_days;
use spark_core::timeline::MAX_TIMELINE_ENTRIES;
use spark_core::{
    AppState, Command, Frequency, Habit, HabitStore, MemoryStore, Schedule, apply,
    build_timeline, collect_missed, compute_streak, encode_calendar, evaluate_rewards,
    is_scheduled, missed_notifications, normalize_schedule,
};

fn d(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn legacy_habits() -> Vec<Habit> {
    let raw = serde_json::json!({"habits": [
        {"id": "a", "name": "Walk", "target": 1, "createdAt": "2025-01-01T07:00:00Z", "history": {}},
        {"id": "b", "name": "Trip", "schedule": {"eventDate": "2025-02-10"}},
        {"id": "c", "name": "Gym", "schedule": {"frequency": "weekly", "startDate": "2025-01-08", "weekdays": ["FR", "MO", "FR"]}},
        {"id": "d", "name": "Odd", "schedule": {"frequency": "monthly", "startDate": "nope",
            "missedPrompts": ["2024-01-01", "2025-01-28", "x"]}},
        {"id": "e", "name": "Once", "schedule": {"frequency": "once", "startDate": "2025-03-03"}}
    ]});
    AppState::from_json(&raw.to_string()).habits
}

/// Normalizing twice changes nothing the second time.
#[test]
fn normalization_is_idempotent_for_legacy_records() {
    let today = d("2025-02-01");
    for mut h in legacy_habits() {
        normalize_schedule(&mut h, today);
        let snapshot = h.clone();
        assert!(!normalize_schedule(&mut h, today), "habit {} changed twice", h.id);
        assert_eq!(h, snapshot);
    }
}

/// A `once` schedule with only one of its two dates set converges on that date.
#[test]
fn once_schedule_dates_converge() {
    let today = d("2025-02-01");
    let habits = legacy_habits();

    let mut trip = habits.iter().find(|h| h.id == "b").unwrap().clone();
    normalize_schedule(&mut trip, today);
    assert_eq!(trip.schedule.frequency, Some(Frequency::Once));
    assert_eq!(trip.schedule.start_date, Some(d("2025-02-10")));
    assert_eq!(trip.schedule.event_date, Some(d("2025-02-10")));

    let mut once = habits.iter().find(|h| h.id == "e").unwrap().clone();
    normalize_schedule(&mut once, today);
    assert_eq!(once.schedule.start_date, Some(d("2025-03-03")));
    assert_eq!(once.schedule.event_date, Some(d("2025-03-03")));
}

#[test]
fn invalid_values_are_coerced() {
    let today = d("2025-02-01");
    let mut odd = legacy_habits().into_iter().find(|h| h.id == "d").unwrap();
    normalize_schedule(&mut odd, today);
    assert_eq!(odd.schedule.frequency, Some(Frequency::Daily));
    assert_eq!(odd.schedule.start_date, Some(today));
    assert_eq!(odd.schedule.missed_prompts.iter().copied().collect::<Vec<_>>(), vec![d("2025-01-28")]);
}

#[test]
fn weekly_predicate_matches_configured_days() {
    let s = Schedule::weekly(d("2025-01-06"), vec![Weekday::Mon, Weekday::Wed]);
    assert!(is_scheduled(&s, d("2025-01-06")));
    assert!(is_scheduled(&s, d("2025-01-08")));
    assert!(is_scheduled(&s, d("2025-01-13")));
    assert!(!is_scheduled(&s, d("2025-01-07")));
    for back in 1..30 {
        assert!(!is_scheduled(&s, add_days(d("2025-01-06"), -back)));
    }
}

/// A flagged date is never returned again, even though it is still short of target.
#[test]
fn missed_detection_never_repeats_a_date() {
    let mut h = Habit::new("m", "Meditate", 2, "2025-01-01T00:00:00Z")
        .with_schedule(Schedule::daily(d("2025-01-01")));
    h.set_count(d("2025-01-09"), 1);

    let mut seen = Vec::new();
    for offset in 0..5 {
        let today = add_days(d("2025-01-10"), offset);
        normalize_schedule(&mut h, today);
        for date in collect_missed(&mut h, today).candidates {
            assert!(!seen.contains(&date), "{date} surfaced twice");
            seen.push(date);
        }
        assert!(collect_missed(&mut h, today).candidates.is_empty());
    }
    assert!(seen.contains(&d("2025-01-09")));
}

#[test]
fn streak_examples() {
    let h = Habit::new("s", "Walk", 1, "")
        .with_history([(d("2025-01-01"), 1), (d("2025-01-02"), 1), (d("2025-01-03"), 0)]);
    assert_eq!(compute_streak(&h, d("2025-01-02")), 2);
    assert_eq!(compute_streak(&h, d("2025-01-03")), 0);
}

#[test]
fn rewards_are_monotonic_and_unique() {
    let mut h = Habit::new("r", "Walk", 1, "");
    let mut last_len = 0;
    let start = d("2025-01-01");
    for i in 0..40 {
        let day = add_days(start, i);
        h.set_count(day, 1);
        evaluate_rewards(&mut h, day);
        assert!(h.achievements.len() >= last_len);
        last_len = h.achievements.len();

        let mut ids: Vec<_> = h.achievements.iter().map(|a| a.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), h.achievements.len());
    }
    // three streak tiers, first success, and 25 on-target days
    assert_eq!(h.achievements.len(), 5);
}

#[test]
fn export_shapes() {
    let now = Utc.with_ymd_and_hms(2025, 1, 10, 9, 0, 0).unwrap();
    let weekly = Habit::new("w", "Gym", 1, "")
        .with_schedule(Schedule::weekly(d("2025-01-07"), vec![Weekday::Tue, Weekday::Thu]));
    let doc = encode_calendar(&weekly, now);
    let rrule = doc.lines().find(|l| l.starts_with("RRULE:")).unwrap().trim_end();
    assert_eq!(rrule.rsplit("BYDAY=").next(), Some("TU,TH"));

    let once = Habit::new("o", "Dentist", 1, "").with_schedule(Schedule::once(d("2025-12-31")));
    let doc = encode_calendar(&once, now);
    assert!(!doc.contains("RRULE"));
    assert!(doc.contains("DTSTART;VALUE=DATE:20251231\r\n"));
    assert!(doc.contains("DTEND;VALUE=DATE:20260101\r\n"));
}

#[test]
fn timeline_is_bounded_for_ancient_daily_habits() {
    let h = Habit::new("t", "Walk", 1, "").with_schedule(Schedule::daily(d("1990-01-01")));
    let tl = build_timeline(&h, d("2025-06-01"));
    assert!(tl.len() <= MAX_TIMELINE_ENTRIES);
    assert!(tl.windows(2).all(|w| w[0].date < w[1].date));
}

/// Load, detect, respond, save: the reminder round trip through a store.
#[test]
fn reminder_round_trip_through_store() {
    let store = MemoryStore::default();
    let today = d("2025-01-10");

    let mut state = store.load();
    state.habits.push(
        Habit::new("w", "Water", 8, "2025-01-01T00:00:00Z")
            .with_schedule(Schedule::daily(d("2025-01-08"))),
    );
    state.normalize_all(today);
    let (messages, changed) = missed_notifications(&mut state.habits[0], today);
    assert!(changed);
    assert_eq!(messages.len(), 2);
    store.save(&state).unwrap();

    let mut state = store.load();
    let first = messages[0].clone();
    apply(
        &mut state,
        Command::Complete {
            habit: first.habit_id.clone(),
            date: first.date,
        },
        today,
    )
    .unwrap();
    store.save(&state).unwrap();

    let state = store.load();
    let h = &state.habits[0];
    assert_eq!(h.count_for(first.date), 8);
    assert!(!h.schedule.missed_prompts.contains(&first.date));
    assert!(h.schedule.missed_prompts.contains(&messages[1].date));
}
