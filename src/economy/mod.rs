// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 DiaryBeast

//! Token economy: reward schedule, streaks, settlement.

pub mod settlement;
pub mod streak;

pub use settlement::{PlannedReward, SettlementEngine, SettlementError};

use crate::ledger::tx::BASE_UNIT_SCALE;
use crate::storage::RewardKind;

/// Reward schedule, display units.
pub const WELCOME_REWARD: u64 = 100;
pub const FIRST_ENTRY_REWARD: u64 = 50;
pub const DAILY_ENTRY_REWARD: u64 = 10;
pub const STREAK_BONUS_REWARD: u64 = 25;
/// Cost of generating a summary, display units.
pub const SUMMARY_PRICE: u64 = 5;

/// Streak milestones paying the bonus.
pub const STREAK_BONUS_INTERVAL: u32 = 7;

/// Lives restored and happiness granted per written entry.
pub const LIVES_PER_ENTRY: u8 = 1;
pub const HAPPINESS_PER_ENTRY: u8 = 10;

pub fn display_to_base(display: u64) -> u64 {
    display * BASE_UNIT_SCALE
}

/// Streak-based reward multiplier: 1x below a week, 2x from a week, 3x from
/// a month of consecutive writing.
pub fn reward_multiplier(streak: u32) -> u64 {
    match streak {
        0..=6 => 1,
        7..=29 => 2,
        _ => 3,
    }
}

/// Rewards owed for a newly written entry, quoted against the post-entry
/// streak.
pub fn quote_entry_rewards(is_first_entry: bool, new_streak: u32) -> Vec<PlannedReward> {
    let multiplier = reward_multiplier(new_streak);
    let mut planned = Vec::with_capacity(3);
    if is_first_entry {
        planned.push(PlannedReward {
            kind: RewardKind::FirstEntry,
            amount: display_to_base(FIRST_ENTRY_REWARD) * multiplier,
            description: "first diary entry".into(),
        });
    }
    planned.push(PlannedReward {
        kind: RewardKind::DailyEntry,
        amount: display_to_base(DAILY_ENTRY_REWARD) * multiplier,
        description: "daily diary entry".into(),
    });
    if new_streak > 0 && new_streak % STREAK_BONUS_INTERVAL == 0 {
        planned.push(PlannedReward {
            kind: RewardKind::StreakBonus,
            amount: display_to_base(STREAK_BONUS_REWARD),
            description: format!("{new_streak}-day streak bonus"),
        });
    }
    planned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_earns_both_rewards() {
        let planned = quote_entry_rewards(true, 1);
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].kind, RewardKind::FirstEntry);
        assert_eq!(planned[0].amount, 50 * BASE_UNIT_SCALE);
        assert_eq!(planned[1].kind, RewardKind::DailyEntry);
    }

    #[test]
    fn streak_milestone_adds_a_bonus() {
        let planned = quote_entry_rewards(false, 14);
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[1].kind, RewardKind::StreakBonus);
        assert!(planned[1].description.contains("14-day"));
    }

    #[test]
    fn ordinary_day_earns_only_the_daily_reward() {
        let planned = quote_entry_rewards(false, 3);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].kind, RewardKind::DailyEntry);
        assert_eq!(planned[0].amount, 10 * BASE_UNIT_SCALE);
    }

    #[test]
    fn multiplier_steps_at_week_and_month() {
        assert_eq!(reward_multiplier(1), 1);
        assert_eq!(reward_multiplier(6), 1);
        assert_eq!(reward_multiplier(7), 2);
        assert_eq!(reward_multiplier(29), 2);
        assert_eq!(reward_multiplier(30), 3);
    }

    #[test]
    fn weekly_streak_day_is_doubled_and_pays_the_bonus() {
        let planned = quote_entry_rewards(false, 7);
        assert_eq!(planned.len(), 2);
        assert_eq!(planned[0].amount, 20 * BASE_UNIT_SCALE);
        assert_eq!(planned[1].kind, RewardKind::StreakBonus);
    }
}
