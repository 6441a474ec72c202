//! # spire-rl-core
//!
//! Core types and contracts shared by the Slay the Spire driver crates.
//!
//! This crate provides:
//! - The snapshot model parsed from the game's JSON state lines
//! - The outbound command grammar
//! - The flat action-space layout and legality masks
//! - Observation, reward and policy contracts
//! - The shared error type

pub mod action;
pub mod command;
pub mod duration_ms;
pub mod error;
pub mod observation;
pub mod policy;
pub mod reward;
pub mod snapshot;

pub use action::{
    ActionSlot, CANCEL_ACTION, END_TURN_ACTION, LegalityMask, MAX_HAND_CARDS, MAX_POTIONS,
    MAX_TARGETS, POTION_ACTION_START, TOTAL_ACTIONS,
};
pub use command::{Command, PotionSyntax, Verb};
pub use error::{Result, SpireError};
pub use observation::{ObservationEncoder, StepOutcome, TerminationReason, VitalsEncoder};
pub use policy::Policy;
pub use reward::{CombatReward, Reward, RewardComponents, RewardFunction};
pub use snapshot::{
    Card, CombatState, GameState, Monster, Player, Potion, Power, Relic, ScreenType, Snapshot,
};
