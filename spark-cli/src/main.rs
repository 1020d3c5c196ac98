use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, Utc, Weekday};
use clap::{Args, Parser, Subcommand};
use spark_core::date::{parse_weekday_code, weekday_code};
use spark_core::rewards::reward_stats;
use spark_core::{
    AppState, Command as HabitCommand, Frequency, HabitStore, JsonFileStore, NewHabit,
    OccurrenceStatus, Outcome, PRESETS, ResponseAction, Schedule, ScheduleUpdate, apply,
    build_timeline, compute_streak, encode_calendar, evaluate_rewards, export_filename,
    find_preset, missed_notifications, parse_iso_date, today_in,
};
use std::fs;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod state;
mod watch;
mod worker;

const LONG_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SPARK_BUILD_SHA"), ")");

#[derive(Parser, Debug)]
#[command(name = "spark", version, long_version = LONG_VERSION, about = "Habit Spark: daily habits, schedules, and reminders")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a habit, optionally starting from a preset
    Add {
        /// Habit name (defaults to the preset's name)
        name: Option<String>,

        /// Preset id (see `spark presets`)
        #[arg(long)]
        preset: Option<String>,

        /// Check-ins per day that count as done
        #[arg(long)]
        target: Option<u32>,

        #[command(flatten)]
        schedule: ScheduleArgs,

        #[arg(long)]
        category: Option<String>,

        #[arg(long)]
        motivation: Option<String>,

        /// Goal entry (repeatable)
        #[arg(long = "goal")]
        goals: Vec<String>,

        /// Daily reminder time, HH:MM
        #[arg(long)]
        reminder: Option<String>,
    },

    /// List built-in presets
    Presets,

    /// Show every habit with today's progress
    List,

    /// Log one check-in for today
    Inc { habit: String },

    /// Remove one check-in for today
    Dec { habit: String },

    /// Set today's count back to zero
    Reset { habit: String },

    /// Delete a habit and its history
    Delete { habit: String },

    /// Change a habit's recurrence
    Schedule {
        habit: String,

        #[command(flatten)]
        schedule: ScheduleArgs,
    },

    /// Show past and upcoming occurrences
    Timeline { habit: String },

    /// Flag recent missed occurrences (each date is reported once)
    Missed,

    /// Answer a missed-occurrence reminder
    Respond {
        habit: String,

        /// Date of the occurrence, YYYY-MM-DD
        date: String,

        /// complete | skip
        action: String,
    },

    /// Write an .ics calendar file for a habit
    Export {
        habit: String,

        /// Directory to write into
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },

    /// Show streaks and achievements
    Rewards { habit: String },

    /// Run the reminder worker until interrupted
    Watch,

    /// Configuration file commands
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config.toml if none exists
    Init,
    /// Print the effective configuration
    Show,
}

#[derive(Args, Debug, Default)]
struct ScheduleArgs {
    /// daily | weekly | once
    #[arg(long)]
    frequency: Option<String>,

    /// First day of the schedule, YYYY-MM-DD
    #[arg(long)]
    start: Option<String>,

    /// Weekdays for weekly habits, e.g. MO,WE,FR
    #[arg(long)]
    on: Option<String>,

    /// Event date for one-time habits, YYYY-MM-DD
    #[arg(long)]
    date: Option<String>,
}

impl ScheduleArgs {
    fn is_empty(&self) -> bool {
        self.frequency.is_none() && self.start.is_none() && self.on.is_none() && self.date.is_none()
    }

    fn to_update(&self) -> Result<ScheduleUpdate> {
        let frequency = self
            .frequency
            .as_deref()
            .map(|f| Frequency::parse(f).ok_or_else(|| anyhow::anyhow!("unknown frequency '{f}' (daily, weekly, once)")))
            .transpose()?;
        let start_date = self.start.as_deref().map(parse_date_arg).transpose()?;
        let event_date = self.date.as_deref().map(parse_date_arg).transpose()?;
        let weekdays = self.on.as_deref().map(parse_weekdays_arg).transpose()?;

        // a date or weekday list implies the frequency when none is given
        let frequency = frequency.or(if event_date.is_some() {
            Some(Frequency::Once)
        } else if weekdays.is_some() {
            Some(Frequency::Weekly)
        } else {
            None
        });

        Ok(ScheduleUpdate {
            frequency,
            start_date,
            event_date,
            weekdays,
        })
    }

    fn to_schedule(&self) -> Result<Schedule> {
        let u = self.to_update()?;
        Ok(Schedule {
            frequency: u.frequency,
            start_date: u.start_date,
            event_date: u.event_date,
            weekdays: u.weekdays.unwrap_or_default(),
            ..Schedule::default()
        })
    }
}

fn parse_date_arg(s: &str) -> Result<NaiveDate> {
    parse_iso_date(s).ok_or_else(|| anyhow::anyhow!("invalid date '{s}' (expected YYYY-MM-DD)"))
}

fn parse_weekdays_arg(s: &str) -> Result<Vec<Weekday>> {
    s.split(',')
        .filter(|p| !p.trim().is_empty())
        .map(|p| parse_weekday_code(p).ok_or_else(|| anyhow::anyhow!("unknown weekday '{p}' (SU MO TU WE TH FR SA)")))
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "spark_cli=info,spark_core=warn".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config()?;
    let today = today_in(cfg.timezone.as_deref())?;
    let store = state::open_store()?;

    match cli.command {
        Command::Add {
            name,
            preset,
            target,
            schedule,
            category,
            motivation,
            goals,
            reminder,
        } => {
            let mut new = match preset.as_deref() {
                Some(id) => {
                    let p = find_preset(id).with_context(|| format!("unknown preset '{id}' (see `spark presets`)"))?;
                    NewHabit::from_preset(p)
                }
                None => NewHabit::named(name.clone().unwrap_or_default(), 1),
            };
            if let Some(n) = name {
                new.name = n;
            }
            if let Some(t) = target {
                new.target = t;
            }
            if category.is_some() {
                new.category = category;
            }
            if motivation.is_some() {
                new.motivation = motivation;
            }
            if let Some(r) = reminder.as_deref() {
                chrono::NaiveTime::parse_from_str(r, "%H:%M")
                    .with_context(|| format!("invalid reminder time '{r}' (expected HH:MM)"))?;
            }
            new.schedule = schedule.to_schedule()?;
            new.goals = goals;
            new.reminder_time = reminder;

            let outcome = mutate(&store, today, HabitCommand::Add(new))?;
            let state = store.load();
            if let Some(h) = outcome.habit_id.as_deref().and_then(|id| state.find(id)) {
                println!("Added [{}] {} (target {}, {})", h.id, h.name, h.target, describe_schedule(&h.schedule));
            }
        }

        Command::Presets => {
            for p in PRESETS {
                println!("{:<10} {} (target {}, {})", p.id, p.name, p.target, p.category);
            }
        }

        Command::List => {
            let state = state::load_state(&store, today)?;
            print_list(&state, today);
        }

        Command::Inc { habit } => report(mutate(&store, today, HabitCommand::Increment { habit })?),
        Command::Dec { habit } => report(mutate(&store, today, HabitCommand::Decrement { habit })?),
        Command::Reset { habit } => report(mutate(&store, today, HabitCommand::Reset { habit })?),
        Command::Delete { habit } => {
            let outcome = mutate(&store, today, HabitCommand::Delete { habit })?;
            println!("Deleted {}", outcome.habit_id.unwrap_or_default());
        }

        Command::Schedule { habit, schedule } => {
            if schedule.is_empty() {
                bail!("nothing to change; pass --frequency, --start, --on, or --date");
            }
            let update = schedule.to_update()?;
            let outcome = mutate(&store, today, HabitCommand::SetSchedule { habit, update })?;
            let state = store.load();
            if let Some(h) = outcome.habit_id.as_deref().and_then(|id| state.find(id)) {
                println!("{}: {}", h.name, describe_schedule(&h.schedule));
            }
        }

        Command::Timeline { habit } => {
            let state = state::load_state(&store, today)?;
            let h = state.find(&habit).with_context(|| format!("no habit matching '{habit}'"))?;
            println!("# {} ({})\n", h.name, describe_schedule(&h.schedule));
            let timeline = build_timeline(h, today);
            if timeline.is_empty() {
                println!("(no occurrences in range)");
            }
            for o in timeline {
                let marker = match o.status {
                    OccurrenceStatus::Complete => "✔",
                    OccurrenceStatus::Missed => "✘",
                    OccurrenceStatus::Pending => "•",
                    OccurrenceStatus::Upcoming => " ",
                };
                let today_flag = if o.is_today { "  <- today" } else { "" };
                println!(
                    "{marker} {} {:<7} {:?}{today_flag}",
                    o.weekday, o.label, o.status
                );
            }
        }

        Command::Missed => {
            let mut state = state::load_state(&store, today)?;
            let mut changed = false;
            let mut found = 0usize;
            for h in state.habits.iter_mut() {
                let (messages, c) = missed_notifications(h, today);
                changed |= c;
                for m in messages {
                    found += 1;
                    println!("- [{}] {} missed on {} (target {})", m.habit_id, m.name, m.date, m.target);
                }
            }
            if changed {
                store.save(&state)?;
            }
            if found == 0 {
                println!("No new missed occurrences.");
            }
        }

        Command::Respond { habit, date, action } => {
            let date = parse_date_arg(&date)?;
            let action = ResponseAction::parse(&action)
                .with_context(|| format!("unknown action '{action}' (complete, skip)"))?;
            let command = match action {
                ResponseAction::Complete => HabitCommand::Complete { habit, date },
                ResponseAction::Skip => HabitCommand::Skip { habit, date },
            };
            report(mutate(&store, today, command)?);
        }

        Command::Export { habit, out_dir } => {
            let state = state::load_state(&store, today)?;
            let h = state.find(&habit).with_context(|| format!("no habit matching '{habit}'"))?;
            let ics = encode_calendar(h, Utc::now());
            fs::create_dir_all(&out_dir).with_context(|| format!("create {}", out_dir.display()))?;
            let path = out_dir.join(export_filename(&h.name));
            fs::write(&path, ics).with_context(|| format!("write {}", path.display()))?;
            println!("Wrote {}", path.display());
        }

        Command::Rewards { habit } => {
            let mut state = state::load_state(&store, today)?;
            let h = state
                .find_mut(&habit)
                .with_context(|| format!("no habit matching '{habit}'"))?;
            let newly = evaluate_rewards(h, today);
            let stats = reward_stats(h, today);
            println!("# {}\n", h.name);
            println!("Streak: {} day(s)", stats.streak);
            println!("Total check-ins: {}", stats.total_completions);
            println!("Days on target: {}\n", stats.days_meeting_target);
            if h.achievements.is_empty() {
                println!("No achievements yet.");
            }
            for a in &h.achievements {
                let when = a.unlocked_on.map(|d| d.to_string()).unwrap_or_default();
                println!("🏅 {} ({}) {}", a.label, when, a.description);
            }
            if !newly.is_empty() {
                store.save(&state)?;
            }
        }

        Command::Watch => watch::run(&store, &cfg).await?,

        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => config::show_config()?,
        },
    }

    Ok(())
}

/// Load, apply one command, save.
fn mutate(store: &JsonFileStore, today: NaiveDate, command: HabitCommand) -> Result<Outcome> {
    let mut state = state::load_state(store, today)?;
    let outcome = apply(&mut state, command, today)?;
    store.save(&state)?;
    Ok(outcome)
}

fn report(outcome: Outcome) {
    if let (Some(id), Some(count)) = (&outcome.habit_id, outcome.count) {
        println!("[{id}] count: {count}");
    }
    if let Some(msg) = &outcome.celebration {
        println!("{msg} 🎉");
    }
    for label in &outcome.unlocked {
        println!("🏅 Unlocked: {label}");
    }
}

fn describe_schedule(s: &Schedule) -> String {
    let start = s.effective_start().map(|d| d.to_string()).unwrap_or_default();
    let frequency = s.effective_frequency();
    let label = frequency.as_str();
    match frequency {
        Frequency::Daily => format!("{label} from {start}"),
        Frequency::Weekly => {
            let days: Vec<&str> = s.weekdays.iter().map(|d| weekday_code(*d)).collect();
            format!("{label} on {} from {start}", days.join(","))
        }
        Frequency::Once => format!("{label} on {start}"),
    }
}

fn print_list(state: &AppState, today: NaiveDate) {
    if state.habits.is_empty() {
        println!("No habits yet. Add your first one with `spark add <name>`.");
        return;
    }
    for h in &state.habits {
        let count = h.count_for(today);
        let target = h.effective_target();
        let pct = (u64::from(count) * 100 / u64::from(target)).min(100);
        println!(
            "[{}] {:<20} {}/{} ({:>3}%)  🔥 {} day streak  · {}",
            h.id,
            h.name,
            count,
            target,
            pct,
            compute_streak(h, today),
            describe_schedule(&h.schedule)
        );
    }
}
