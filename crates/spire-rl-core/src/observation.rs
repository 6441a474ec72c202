//! Observation types

use serde::{Deserialize, Serialize};

use crate::action::{LegalityMask, MAX_HAND_CARDS, MAX_POTIONS};
use crate::reward::Reward;
use crate::snapshot::{ScreenType, Snapshot};

/// Turns a snapshot into a fixed-size feature vector.
///
/// `encode(None)` must return the zero vector of length `size()`; it is used
/// when the game has not produced a snapshot yet.
pub trait ObservationEncoder: Send + Sync {
    fn size(&self) -> usize;
    fn encode(&self, snapshot: Option<&Snapshot>) -> Vec<f32>;
}

/// Screens with a dedicated one-hot feature
const SCREEN_FEATURES: [ScreenType; 8] = [
    ScreenType::None,
    ScreenType::Combat,
    ScreenType::Map,
    ScreenType::Event,
    ScreenType::ShopScreen,
    ScreenType::Rest,
    ScreenType::CombatReward,
    ScreenType::BossReward,
];

const ENERGY_BUCKETS: usize = 6;
const MAX_MONSTERS: usize = 5;
const LOW_HP: f32 = 0.3;

/// Compact run-level encoder: vitals, energy, potions, screen and board size.
///
/// Layout:
/// - `[0]` hp ratio, `[1]` low-hp flag
/// - `[2..8]` energy one-hot (5+ share the last bucket)
/// - `[8]` block / 50, `[9]` floor / 50, `[10]` log10(gold + 1) / 4
/// - `[11..14]` potion slot occupied
/// - `[14..22]` screen one-hot
/// - `[22]` hand size / 10, `[23]` living monsters / 5
#[derive(Debug, Clone, Copy, Default)]
pub struct VitalsEncoder;

impl VitalsEncoder {
    pub const SIZE: usize = 2 + ENERGY_BUCKETS + 3 + MAX_POTIONS + SCREEN_FEATURES.len() + 2;
}

impl ObservationEncoder for VitalsEncoder {
    fn size(&self) -> usize {
        Self::SIZE
    }

    fn encode(&self, snapshot: Option<&Snapshot>) -> Vec<f32> {
        let mut features = vec![0.0f32; Self::SIZE];
        let Some(snapshot) = snapshot else {
            return features;
        };
        let Some(game) = snapshot.game_state.as_ref() else {
            return features;
        };

        let hp = snapshot.hp_ratio().unwrap_or(0.0).clamp(0.0, 1.0);
        features[0] = hp;
        features[1] = if hp > 0.0 && hp < LOW_HP { 1.0 } else { 0.0 };

        if let Some(energy) = snapshot.energy() {
            let bucket = (energy.max(0) as usize).min(ENERGY_BUCKETS - 1);
            features[2 + bucket] = 1.0;
        }

        let block = snapshot.combat().map(|c| c.player.block).unwrap_or(0);
        features[8] = (block as f32 / 50.0).min(1.0);
        features[9] = (game.floor.max(0) as f32 / 50.0).min(1.0);
        features[10] = (game.gold.max(0) as f32 + 1.0).log10() / 4.0;

        for (i, potion) in snapshot.potions().iter().take(MAX_POTIONS).enumerate() {
            if !potion.is_empty() {
                features[11 + i] = 1.0;
            }
        }

        let screen_base = 11 + MAX_POTIONS;
        if let Some(i) = SCREEN_FEATURES.iter().position(|s| *s == game.screen_type) {
            features[screen_base + i] = 1.0;
        }

        let tail = screen_base + SCREEN_FEATURES.len();
        features[tail] = snapshot.hand().len().min(MAX_HAND_CARDS) as f32 / MAX_HAND_CARDS as f32;
        let living = snapshot
            .monsters()
            .iter()
            .filter(|m| m.is_targetable())
            .count()
            .min(MAX_MONSTERS);
        features[tail + 1] = living as f32 / MAX_MONSTERS as f32;

        features
    }
}

/// Why an episode ended
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    Victory,
    Defeat,
    /// The game process closed its output
    ProcessGone,
}

/// Result of one environment step
#[derive(Debug, Clone)]
pub struct StepOutcome {
    pub observation: Vec<f32>,

    /// Legal actions for the next step
    pub mask: LegalityMask,

    pub reward: Reward,

    /// Episode terminated (run over or game gone)
    pub done: bool,

    /// Step gave up waiting for a decision point
    pub truncated: bool,

    pub termination_reason: Option<TerminationReason>,

    /// Command line actually sent, if any
    pub command: Option<String>,

    /// Snapshot the outcome was computed from
    pub snapshot: Option<Snapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_snapshot_encodes_zeros() {
        let encoder = VitalsEncoder;
        let features = encoder.encode(None);
        assert_eq!(features.len(), encoder.size());
        assert!(features.iter().all(|f| *f == 0.0));
    }

    #[test]
    fn test_combat_features() {
        let snapshot: Snapshot = serde_json::from_str(
            r#"{
                "available_commands": ["play", "end"],
                "game_state": {
                    "screen_type": "NONE", "room_phase": "COMBAT",
                    "floor": 5, "gold": 99, "current_hp": 20, "max_hp": 80,
                    "potions": [{"id": "Fire Potion"}, {"id": "Potion Slot"}, {"id": "Potion Slot"}],
                    "combat_state": {
                        "player": {"current_hp": 20, "max_hp": 80, "block": 10, "energy": 9},
                        "hand": [{"id": "Strike_R"}, {"id": "Defend_R"}],
                        "monsters": [{"current_hp": 12}, {"current_hp": 0, "is_gone": true}]
                    }
                }
            }"#,
        )
        .unwrap();

        let features = VitalsEncoder.encode(Some(&snapshot));
        assert_eq!(features.len(), VitalsEncoder::SIZE);
        assert_eq!(features[0], 0.25);
        assert_eq!(features[1], 1.0);
        assert_eq!(features[2 + ENERGY_BUCKETS - 1], 1.0);
        assert_eq!(features[8], 0.2);
        assert_eq!(&features[11..14], &[1.0, 0.0, 0.0]);
        assert_eq!(features[14], 1.0);
        assert_eq!(features[22], 0.2);
        assert_eq!(features[23], 0.2);
    }
}
