//! Streaks, history aggregates, and the achievement catalog.

use chrono::NaiveDate;

use crate::date::add_days;
use crate::habit::{Achievement, Habit};

/// Longest streak walk; anything beyond is counted as this many days.
pub const MAX_STREAK_STEPS: u32 = 9999;

/// Inputs every reward predicate sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RewardStats {
    pub streak: u32,
    pub total_completions: u64,
    pub days_meeting_target: u32,
}

pub struct RewardDef {
    pub id: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub unlocked: fn(&RewardStats) -> bool,
}

/// Unlock order follows this table.
pub static REWARDS: &[RewardDef] = &[
    RewardDef {
        id: "first-success",
        label: "First Spark",
        description: "Hit your daily target for the first time.",
        unlocked: |s| s.days_meeting_target >= 1,
    },
    RewardDef {
        id: "streak-3",
        label: "Warming Up",
        description: "Three days in a row on target.",
        unlocked: |s| s.streak >= 3,
    },
    RewardDef {
        id: "streak-7",
        label: "Week Strong",
        description: "A full week of hitting your target.",
        unlocked: |s| s.streak >= 7,
    },
    RewardDef {
        id: "streak-30",
        label: "Habit Formed",
        description: "Thirty consecutive days on target.",
        unlocked: |s| s.streak >= 30,
    },
    RewardDef {
        id: "total-50",
        label: "Fifty Check-ins",
        description: "Logged 50 check-ins in total.",
        unlocked: |s| s.total_completions >= 50,
    },
    RewardDef {
        id: "target-25",
        label: "Consistency",
        description: "Met your target on 25 different days.",
        unlocked: |s| s.days_meeting_target >= 25,
    },
];

pub fn find_reward(id: &str) -> Option<&'static RewardDef> {
    REWARDS.iter().find(|r| r.id == id)
}

/// Consecutive on-target days ending at `from`, walking backward.
pub fn compute_streak(habit: &Habit, from: NaiveDate) -> u32 {
    let mut streak = 0;
    let mut day = from;
    while streak < MAX_STREAK_STEPS && habit.meets_target(day) {
        streak += 1;
        let prev = add_days(day, -1);
        if prev == day {
            break;
        }
        day = prev;
    }
    streak
}

pub fn total_completions(habit: &Habit) -> u64 {
    habit.history.values().map(|&c| u64::from(c)).sum()
}

pub fn days_meeting_target(habit: &Habit) -> u32 {
    let target = habit.effective_target();
    habit.history.values().filter(|&&c| c >= target).count() as u32
}

pub fn reward_stats(habit: &Habit, today: NaiveDate) -> RewardStats {
    RewardStats {
        streak: compute_streak(habit, today),
        total_completions: total_completions(habit),
        days_meeting_target: days_meeting_target(habit),
    }
}

/// Append achievements newly earned as of `today`; returns their labels.
pub fn evaluate_rewards(habit: &mut Habit, today: NaiveDate) -> Vec<String> {
    let stats = reward_stats(habit, today);
    let mut unlocked = Vec::new();
    for reward in REWARDS {
        if habit.has_achievement(reward.id) || !(reward.unlocked)(&stats) {
            continue;
        }
        habit.achievements.push(Achievement {
            id: reward.id.to_string(),
            label: reward.label.to_string(),
            description: reward.description.to_string(),
            unlocked_on: Some(today),
        });
        unlocked.push(reward.label.to_string());
    }
    if !unlocked.is_empty() {
        tracing::info!(habit = %habit.id, ?unlocked, "achievements unlocked");
    }
    unlocked
}
