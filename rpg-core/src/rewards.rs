//! Reward settlement: battle rewards, experience and leveling.
//!
//! Leveling is a pure function over (level, xp, amount) so the store can run
//! it inside the same write that persists the result.

use crate::battle::BattleResult;
use crate::character::UserId;
use crate::enemies::EnemyArchetype;
use crate::store::{CharacterStore, Settlement, StoreError};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Share of listed XP granted on defeat, in percent (rounded down).
pub const DEFEAT_XP_PERCENT: u32 = 30;
/// Share of listed XP granted when the round cap ends the battle, in percent.
pub const ROUND_CAP_XP_PERCENT: u32 = 50;

/// Experience curve and level-up grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelingRules {
    pub base_xp: u32,
    pub xp_per_level: u32,
    pub stat_points_per_level: u32,
    /// Restore health to maximum whenever at least one level is gained.
    pub heal_on_level_up: bool,
}

impl Default for LevelingRules {
    fn default() -> Self {
        Self {
            base_xp: 100,
            xp_per_level: 50,
            stat_points_per_level: 5,
            heal_on_level_up: true,
        }
    }
}

impl LevelingRules {
    /// XP needed to advance from `level` to `level + 1`.
    pub fn xp_to_next_level(&self, level: u32) -> u32 {
        self.base_xp + level * self.xp_per_level
    }

    /// Add `amount` XP to a character at `level` holding `xp`.
    pub fn advance(&self, level: u32, xp: u32, amount: u32) -> Progression {
        let mut xp = xp.saturating_add(amount);
        let mut new_level = level;

        // A zero threshold would never terminate.
        while xp >= self.xp_to_next_level(new_level).max(1) {
            xp -= self.xp_to_next_level(new_level).max(1);
            new_level += 1;
        }

        let levels_gained = new_level - level;
        Progression {
            leveled_up: levels_gained > 0,
            new_level,
            levels_gained,
            remaining_xp: xp,
            stat_points_granted: levels_gained * self.stat_points_per_level,
        }
    }
}

/// What a grant of experience did to a character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progression {
    pub leveled_up: bool,
    pub new_level: u32,
    pub levels_gained: u32,
    pub remaining_xp: u32,
    pub stat_points_granted: u32,
}

/// XP and gold earned for a finished battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRewards {
    pub xp: u32,
    pub gold: u32,
}

impl BattleRewards {
    pub const NONE: BattleRewards = BattleRewards { xp: 0, gold: 0 };

    pub fn for_result(result: BattleResult, enemy: &EnemyArchetype) -> Self {
        match result {
            BattleResult::Victory => BattleRewards {
                xp: enemy.xp,
                gold: enemy.gold,
            },
            BattleResult::Defeat => BattleRewards {
                xp: enemy.xp * DEFEAT_XP_PERCENT / 100,
                gold: 0,
            },
            BattleResult::RoundCapReached => BattleRewards {
                xp: enemy.xp * ROUND_CAP_XP_PERCENT / 100,
                gold: 0,
            },
            BattleResult::Fled | BattleResult::TimedOut => Self::NONE,
        }
    }
}

/// Grant experience outside of a battle.
///
/// Returns `None` when the user has no character.
pub async fn grant_xp(
    store: &dyn CharacterStore,
    user_id: &UserId,
    amount: u32,
    rules: &LevelingRules,
) -> Result<Option<Progression>, StoreError> {
    let settlement = Settlement {
        xp: amount,
        ..Settlement::default()
    };
    let progression = store.apply_settlement(user_id, &settlement, rules).await?;

    if let Some(p) = &progression {
        if p.leveled_up {
            info!(user = %user_id, level = p.new_level, gained = p.levels_gained, "level up");
        }
    }
    Ok(progression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enemies::EnemyCatalog;

    #[test]
    fn test_threshold_formula() {
        let rules = LevelingRules::default();
        assert_eq!(rules.xp_to_next_level(1), 150);
        assert_eq!(rules.xp_to_next_level(2), 200);
        assert_eq!(rules.xp_to_next_level(10), 600);
    }

    #[test]
    fn test_exact_threshold_levels_once() {
        let rules = LevelingRules::default();
        let p = rules.advance(1, 0, 150);
        assert!(p.leveled_up);
        assert_eq!(p.new_level, 2);
        assert_eq!(p.levels_gained, 1);
        assert_eq!(p.remaining_xp, 0);
        assert_eq!(p.stat_points_granted, 5);
    }

    #[test]
    fn test_large_grant_levels_twice_with_carry() {
        let rules = LevelingRules::default();
        // 375 - 150 = 225, 225 - 200 = 25
        let p = rules.advance(1, 0, 375);
        assert_eq!(p.new_level, 3);
        assert_eq!(p.levels_gained, 2);
        assert_eq!(p.remaining_xp, 25);
        assert_eq!(p.stat_points_granted, 10);
    }

    #[test]
    fn test_below_threshold_keeps_level() {
        let rules = LevelingRules::default();
        let p = rules.advance(3, 100, 49);
        assert!(!p.leveled_up);
        assert_eq!(p.new_level, 3);
        assert_eq!(p.remaining_xp, 149);
        assert_eq!(p.stat_points_granted, 0);
    }

    #[test]
    fn test_rewards_by_result() {
        let catalog = EnemyCatalog::standard();
        let orc = catalog.get(2).unwrap();

        assert_eq!(
            BattleRewards::for_result(BattleResult::Victory, &orc),
            BattleRewards { xp: 30, gold: 20 }
        );
        assert_eq!(
            BattleRewards::for_result(BattleResult::Defeat, &orc),
            BattleRewards { xp: 9, gold: 0 }
        );
        assert_eq!(
            BattleRewards::for_result(BattleResult::RoundCapReached, &orc),
            BattleRewards { xp: 15, gold: 0 }
        );
        assert_eq!(
            BattleRewards::for_result(BattleResult::Fled, &orc),
            BattleRewards::NONE
        );
        assert_eq!(
            BattleRewards::for_result(BattleResult::TimedOut, &orc),
            BattleRewards::NONE
        );
    }
}
