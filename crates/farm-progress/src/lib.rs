#![deny(warnings)]

//! Achievement evaluation and progress reporting.

use farm_core::{Achievement, ConditionKind, Player, Reward};
use serde::Serialize;
use tracing::info;

/// Current value of the statistic a condition measures.
pub fn measure(kind: ConditionKind, player: &Player) -> u64 {
    let stats = &player.statistics;
    match kind {
        ConditionKind::CropsHarvested => stats.crops_harvested,
        ConditionKind::AnimalsCollected => stats.animals_collected,
        ConditionKind::CoinsEarned => stats.coins_earned,
        ConditionKind::LevelReached => u64::from(player.level),
        ConditionKind::ProductsSold => stats.products_sold,
    }
}

/// Grant a reward bundle. Experience goes through the level curve.
pub fn apply_reward(player: &mut Player, reward: &Reward) {
    farm_econ::grant_coins(player, reward.coins.unwrap_or(0));
    farm_econ::grant_gems(player, reward.gems.unwrap_or(0));
    farm_econ::add_experience(player, reward.experience.unwrap_or(0));
}

/// Unlock every achievement whose condition is met and pay its reward once.
///
/// Passes repeat until one unlocks nothing, so experience from a reward can
/// unlock a level achievement in the same call. Returns the ids unlocked by
/// this call, in unlock order.
pub fn evaluate(achievements: &mut [Achievement], player: &mut Player) -> Vec<String> {
    let mut unlocked = Vec::new();
    loop {
        let mut changed = false;
        for a in achievements.iter_mut().filter(|a| !a.unlocked) {
            if measure(a.condition.kind, player) < a.condition.value {
                continue;
            }
            a.unlocked = true;
            apply_reward(player, &a.reward);
            info!(achievement = %a.id, reward = ?a.reward, "achievement unlocked");
            unlocked.push(a.id.clone());
            changed = true;
        }
        if !changed {
            return unlocked;
        }
    }
}

/// How far the player is towards one achievement.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Progress {
    pub current: u64,
    pub target: u64,
    /// Completion in [0, 100].
    pub percent: f32,
}

pub fn progress(achievement: &Achievement, player: &Player) -> Progress {
    let current = measure(achievement.condition.kind, player);
    let target = achievement.condition.value;
    let percent = if target == 0 {
        100.0
    } else {
        ((current as f64 / target as f64) * 100.0).min(100.0) as f32
    };
    Progress {
        current,
        target,
        percent,
    }
}
