//! # spire-rl-env
//!
//! Synchronization engine and reset/step environment for Slay the Spire.
//!
//! This crate provides:
//! - `ConditionWaiter` for polling until a command has taken effect
//! - `Autopilot` for driving non-combat screens without the policy
//! - `ActionMapper` for legality masks and action decoding
//! - `SpireEnvironment`, the `Environment` implementation tying them together

pub mod autopilot;
pub mod config;
pub mod environment;
pub mod mapper;
pub mod waiter;

#[cfg(test)]
mod testing;

pub use autopilot::{Autopilot, ScreenCategory, SettleBudget, Settled, classify};
pub use config::{AutopilotConfig, EngineConfig, ResetConfig, StepConfig, WaitConfig};
pub use environment::{Environment, SpireEnvironment};
pub use mapper::ActionMapper;
pub use waiter::{ConditionWaiter, WaitOutcome};
