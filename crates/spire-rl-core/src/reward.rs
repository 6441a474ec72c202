//! Reward types and reward shaping

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::snapshot::{Monster, Snapshot};

/// Scalar reward with optional decomposition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reward {
    /// Total scalar reward
    pub value: f64,
    /// Decomposed components for analysis
    #[serde(default)]
    pub components: RewardComponents,
}

/// Decomposed reward components
pub type RewardComponents = HashMap<String, f64>;

impl Reward {
    /// Add a named component; zero contributions are not recorded
    pub fn add(&mut self, name: &str, value: f64) {
        if value == 0.0 {
            return;
        }
        self.value += value;
        *self.components.entry(name.to_string()).or_insert(0.0) += value;
    }

    pub fn flat(name: &str, value: f64) -> Self {
        let mut reward = Reward::default();
        reward.add(name, value);
        reward
    }
}

/// Trait for computing rewards from two consecutive snapshots
pub trait RewardFunction: Send + Sync {
    /// Compute reward from state transition
    fn compute(&self, prev: &Snapshot, current: &Snapshot) -> Reward;
}

/// Combat-centric shaping: progress, damage dealt, kills, hp lost
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatReward {
    pub floor_bonus: f64,
    pub damage_weight: f64,
    pub kill_bonus: f64,
    pub hp_loss_weight: f64,
    pub block_bonus: f64,
    pub victory_bonus: f64,
    pub defeat_penalty: f64,
}

impl Default for CombatReward {
    fn default() -> Self {
        Self {
            floor_bonus: 10.0,
            damage_weight: 0.15,
            kill_bonus: 20.0,
            hp_loss_weight: 1.0,
            block_bonus: 0.05,
            victory_bonus: 100.0,
            defeat_penalty: -10.0,
        }
    }
}

fn present(monsters: &[Monster]) -> impl Iterator<Item = &Monster> {
    monsters.iter().filter(|m| !m.is_gone)
}

impl RewardFunction for CombatReward {
    fn compute(&self, prev: &Snapshot, current: &Snapshot) -> Reward {
        let mut reward = Reward::default();

        if let (Some(gp), Some(gc)) = (prev.game_state.as_ref(), current.game_state.as_ref()) {
            if gc.floor > gp.floor {
                reward.add("floor", self.floor_bonus);
            }
        }

        if let (Some(cp), Some(cc)) = (prev.combat(), current.combat()) {
            let hp_before: i32 = present(&cp.monsters).map(|m| m.current_hp).sum();
            let hp_after: i32 = present(&cc.monsters).map(|m| m.current_hp).sum();
            if hp_before > hp_after {
                reward.add("damage", f64::from(hp_before - hp_after) * self.damage_weight);
            }

            let alive_before = present(&cp.monsters).filter(|m| !m.is_dying).count();
            let alive_after = present(&cc.monsters).filter(|m| !m.is_dying).count();
            if alive_after < alive_before {
                reward.add("kill", (alive_before - alive_after) as f64 * self.kill_bonus);
            }

            let lost = cp.player.current_hp - cc.player.current_hp;
            if lost > 0 {
                reward.add("hp_loss", -f64::from(lost) * self.hp_loss_weight);
            }

            if cc.player.block > cp.player.block {
                reward.add("block", self.block_bonus);
            }
        }

        if current.is_terminal() && !prev.is_terminal() {
            if current.is_victory() {
                reward.add("victory", self.victory_bonus);
            } else {
                reward.add("defeat", self.defeat_penalty);
            }
        }

        reward
    }
}
