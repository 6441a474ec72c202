//! Engine configuration
//!
//! Every timing and heuristic threshold the engine uses lives here. All fields
//! have defaults, so a config file only needs the values it overrides.
//! Durations are integer milliseconds.

use serde::{Deserialize, Serialize};
use spire_bridge::StoreConfig;
use spire_rl_core::{Result, SpireError, duration_ms};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub waits: WaitConfig,
    pub autopilot: AutopilotConfig,
    pub reset: ResetConfig,
    pub step: StepConfig,
}

impl EngineConfig {
    /// Load from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SpireError::ConfigError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text)
            .map_err(|e| SpireError::ConfigError(format!("Invalid {}: {}", path.display(), e)))
    }
}

/// Condition-wait timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaitConfig {
    /// Pause between polls inside a wait
    #[serde(with = "duration_ms")]
    pub poll_interval: Duration,
    /// Read budget handed to the store on each poll
    pub poll_retry_budget: u32,

    #[serde(with = "duration_ms")]
    pub card_played_settle: Duration,
    #[serde(with = "duration_ms")]
    pub card_played_deadline: Duration,

    #[serde(with = "duration_ms")]
    pub new_turn_settle: Duration,
    #[serde(with = "duration_ms")]
    pub new_turn_deadline: Duration,

    #[serde(with = "duration_ms")]
    pub potion_settle: Duration,
    #[serde(with = "duration_ms")]
    pub potion_deadline: Duration,
    /// Re-issue the potion command after this long without effect
    #[serde(with = "duration_ms")]
    pub potion_retry_after: Duration,
    /// Send `cancel` before a potion retry to leave a stuck targeting mode
    pub potion_cancel_before_retry: bool,

    #[serde(with = "duration_ms")]
    pub choice_settle: Duration,
    #[serde(with = "duration_ms")]
    pub choice_deadline: Duration,

    #[serde(with = "duration_ms")]
    pub transition_settle: Duration,

    /// Polls spent waiting for the opening hand
    pub hand_draw_attempts: u32,
    #[serde(with = "duration_ms")]
    pub hand_draw_interval: Duration,
    /// Poll index at which a `ready` nudge is sent while the hand is empty
    pub hand_draw_ready_at: u32,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(50),
            poll_retry_budget: 2,
            card_played_settle: Duration::from_millis(300),
            card_played_deadline: Duration::from_secs(4),
            new_turn_settle: Duration::from_millis(200),
            new_turn_deadline: Duration::from_secs(60),
            potion_settle: Duration::from_millis(200),
            potion_deadline: Duration::from_secs(4),
            potion_retry_after: Duration::from_millis(800),
            potion_cancel_before_retry: true,
            choice_settle: Duration::from_millis(150),
            choice_deadline: Duration::from_secs(2),
            transition_settle: Duration::from_millis(100),
            hand_draw_attempts: 30,
            hand_draw_interval: Duration::from_millis(100),
            hand_draw_ready_at: 10,
        }
    }
}

/// Autopilot heuristics
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopilotConfig {
    /// Same map screen this many times before cycling paths
    pub map_stall_threshold: u32,
    /// Paths cycled through once a map screen stalls
    pub map_path_width: usize,
    pub rest_stall_threshold: u32,
    pub event_stall_threshold: u32,
    /// Same reward screen this many times before trying the next item
    pub reward_cycle_threshold: u32,
    /// Same reward screen this many times before leaving it
    pub reward_give_up_threshold: u32,
    /// Rest instead of upgrading below this hp ratio
    pub rest_hp_threshold: f32,

    #[serde(with = "duration_ms")]
    pub map_deadline: Duration,
    #[serde(with = "duration_ms")]
    pub rest_deadline: Duration,
    #[serde(with = "duration_ms")]
    pub reward_deadline: Duration,
    #[serde(with = "duration_ms")]
    pub default_deadline: Duration,

    /// Pause between polls while nothing actionable is on screen
    #[serde(with = "duration_ms")]
    pub idle_interval: Duration,
    /// Send `ready` every this many idle polls inside a combat room
    pub ready_nudge_every: u32,
    /// Minimum gap between emergency `return`/`cancel` bursts
    #[serde(with = "duration_ms")]
    pub emergency_interval: Duration,
}

impl Default for AutopilotConfig {
    fn default() -> Self {
        Self {
            map_stall_threshold: 5,
            map_path_width: 3,
            rest_stall_threshold: 5,
            event_stall_threshold: 5,
            reward_cycle_threshold: 4,
            reward_give_up_threshold: 8,
            rest_hp_threshold: 0.5,
            map_deadline: Duration::from_secs(8),
            rest_deadline: Duration::from_secs(5),
            reward_deadline: Duration::from_secs(1),
            default_deadline: Duration::from_secs(2),
            idle_interval: Duration::from_millis(100),
            ready_nudge_every: 20,
            emergency_interval: Duration::from_secs(5),
        }
    }
}

/// Episode start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResetConfig {
    pub character: String,
    pub ascension: Option<u32>,
    pub seed: Option<String>,
    /// Elapsed time after which emergency `return`/`cancel` commands start
    #[serde(with = "duration_ms")]
    pub emergency_after: Duration,
    /// Elapsed time after which reset fails
    #[serde(with = "duration_ms")]
    pub ceiling: Duration,
    /// Pause after `start` while the run loads
    #[serde(with = "duration_ms")]
    pub start_load_delay: Duration,
    /// Pause between polls while clicking through menus
    #[serde(with = "duration_ms")]
    pub menu_poll: Duration,
}

impl Default for ResetConfig {
    fn default() -> Self {
        Self {
            character: "ironclad".to_string(),
            ascension: None,
            seed: None,
            emergency_after: Duration::from_secs(30),
            ceiling: Duration::from_secs(90),
            start_load_delay: Duration::from_secs(2),
            menu_poll: Duration::from_millis(50),
        }
    }
}

/// Per-step behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    /// Reward for an action that decodes to no command
    pub invalid_action_penalty: f64,
    /// Longest a step may spend settling before it is truncated
    #[serde(with = "duration_ms")]
    pub step_ceiling: Duration,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            invalid_action_penalty: -0.05,
            step_ceiling: Duration::from_secs(120),
        }
    }
}
