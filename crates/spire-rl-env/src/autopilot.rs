//! Autopilot: clears every screen that does not need the policy
//!
//! Each snapshot is classified into a [`ScreenCategory`], a pure planner turns
//! (snapshot, category, stall counters) into an [`Intent`], and the settle loop
//! executes that intent: send exactly one command, wait for its transition,
//! repeat. Control returns once a decision point or a run-ending screen is
//! reached.

use crate::config::{AutopilotConfig, WaitConfig};
use crate::waiter::{ConditionWaiter, WaitOutcome};
use spire_bridge::StateStore;
use spire_rl_core::{Command, Result, ScreenType, Snapshot, SpireError, Verb};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

const SHOP_EXITS: [Verb; 5] = [Verb::Leave, Verb::Return, Verb::Cancel, Verb::Proceed, Verb::Skip];
const MAP_EXITS: [Verb; 2] = [Verb::Return, Verb::Cancel];
const REST_EXITS: [Verb; 3] = [Verb::Proceed, Verb::Leave, Verb::Skip];
const REWARD_EXITS: [Verb; 6] = [
    Verb::Proceed,
    Verb::Skip,
    Verb::Leave,
    Verb::Cancel,
    Verb::Return,
    Verb::Confirm,
];
const EVENT_EXITS: [Verb; 5] = [Verb::Leave, Verb::Skip, Verb::Proceed, Verb::Return, Verb::Cancel];

/// Coarse screen classes, in the order they are tested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenCategory {
    /// No game state or a bare room view outside combat
    Transitioning,
    /// Playable combat or an in-combat chooser: hand to the policy
    CombatDecision,
    /// Combat room still animating
    CombatPending,
    Terminal,
    /// A confirm button is showing
    Confirm,
    Shop,
    Map,
    Rest,
    /// Rewards, chests and card pickers
    Reward,
    /// Events and anything unrecognised
    Event,
}

pub fn classify(snapshot: &Snapshot) -> ScreenCategory {
    if snapshot.game_state.is_none() {
        return ScreenCategory::Transitioning;
    }
    if snapshot.has_any(&[Verb::Play, Verb::End]) {
        return ScreenCategory::CombatDecision;
    }
    let screen = snapshot.screen_type();
    let in_combat = snapshot.in_combat_phase();
    if in_combat
        && screen.is_card_chooser()
        && snapshot.has_any(&[Verb::Choose, Verb::Confirm])
    {
        return ScreenCategory::CombatDecision;
    }
    if screen.is_terminal() {
        return ScreenCategory::Terminal;
    }
    if in_combat && (screen.is_combat_view() || screen.is_card_chooser()) {
        return ScreenCategory::CombatPending;
    }
    if screen == ScreenType::None {
        return ScreenCategory::Transitioning;
    }
    if snapshot.has(Verb::Confirm) {
        return ScreenCategory::Confirm;
    }
    match screen {
        ScreenType::ShopRoom | ScreenType::ShopScreen => ScreenCategory::Shop,
        ScreenType::Map => ScreenCategory::Map,
        ScreenType::Rest => ScreenCategory::Rest,
        ScreenType::CombatReward
        | ScreenType::BossReward
        | ScreenType::CardReward
        | ScreenType::Chest
        | ScreenType::Grid
        | ScreenType::HandSelect => ScreenCategory::Reward,
        _ => ScreenCategory::Event,
    }
}

/// What the settle loop should do with a snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Hand control to the policy
    Yield,
    /// Run is over
    Terminal,
    /// Nothing to do yet; re-sample
    Refresh,
    /// Combat room without a playable state; re-sample and occasionally nudge
    AwaitCombat,
    Send(Command),
}

/// Consecutive unproductive commands on one screen
#[derive(Debug, Clone, Default)]
pub struct StallTracker {
    screen: Option<ScreenType>,
    same_screen: u32,
    last_choice: usize,
}

impl StallTracker {
    pub fn observe(&mut self, snapshot: &Snapshot) {
        let screen = snapshot.screen_type();
        if self.screen.as_ref() != Some(&screen) {
            self.screen = Some(screen);
            self.same_screen = 0;
            self.last_choice = 0;
        }
    }

    /// The last command had no visible effect
    pub fn bump(&mut self) {
        self.same_screen = self.same_screen.saturating_add(1);
    }

    /// The last command moved the game along
    pub fn moved(&mut self) {
        self.same_screen = 0;
    }

    pub fn chose(&mut self, index: usize) {
        self.last_choice = index;
    }

    pub fn same_screen(&self) -> u32 {
        self.same_screen
    }
}

fn first_verb(snapshot: &Snapshot, verbs: &[Verb]) -> Option<Command> {
    snapshot.first_of(verbs).map(Command::Bare)
}

/// Next index after the last choice, wrapping within `width`
fn cycle(tracker: &StallTracker, width: usize) -> usize {
    (tracker.last_choice + 1) % width.max(1)
}

fn plan_map(
    snapshot: &Snapshot,
    tracker: &StallTracker,
    config: &AutopilotConfig,
) -> Option<Command> {
    if snapshot.has(Verb::Choose) {
        if tracker.same_screen > config.map_stall_threshold {
            let offered = snapshot.choices().len();
            let width = if offered == 0 {
                config.map_path_width
            } else {
                config.map_path_width.min(offered)
            };
            return Some(Command::Choose(cycle(tracker, width)));
        }
        return Some(Command::Choose(0));
    }
    first_verb(snapshot, &MAP_EXITS)
}

fn plan_rest(
    snapshot: &Snapshot,
    tracker: &StallTracker,
    config: &AutopilotConfig,
) -> Option<Command> {
    if snapshot.has(Verb::Choose) {
        let choices = snapshot.choices();
        if tracker.same_screen > config.rest_stall_threshold {
            return Some(Command::Choose(cycle(tracker, choices.len())));
        }
        let low = snapshot
            .hp_ratio()
            .is_some_and(|hp| hp < config.rest_hp_threshold);
        let preferred: &[&str] = if low { &["rest", "smith"] } else { &["smith", "rest"] };
        let index = preferred
            .iter()
            .find_map(|want| choices.iter().position(|c| c.eq_ignore_ascii_case(want)))
            .unwrap_or(0);
        return Some(Command::Choose(index));
    }
    first_verb(snapshot, &REST_EXITS)
}

/// A reward entry that cannot be claimed right now
fn unclaimable(snapshot: &Snapshot, choice: &str) -> bool {
    choice.eq_ignore_ascii_case("potion") && snapshot.potion_slots_full()
}

fn plan_reward(
    snapshot: &Snapshot,
    tracker: &StallTracker,
    config: &AutopilotConfig,
) -> Option<Command> {
    if snapshot.has(Verb::Choose) && tracker.same_screen <= config.reward_give_up_threshold {
        let choices = snapshot.choices();
        let eligible: Vec<usize> = if choices.is_empty() {
            vec![0]
        } else {
            (0..choices.len())
                .filter(|i| !unclaimable(snapshot, &choices[*i]))
                .collect()
        };
        if !eligible.is_empty() {
            let index = if tracker.same_screen > config.reward_cycle_threshold {
                eligible
                    .iter()
                    .copied()
                    .find(|i| *i > tracker.last_choice)
                    .unwrap_or(eligible[0])
            } else {
                eligible[0]
            };
            return Some(Command::Choose(index));
        }
    }
    first_verb(snapshot, &REWARD_EXITS)
}

fn plan_event(
    snapshot: &Snapshot,
    tracker: &StallTracker,
    config: &AutopilotConfig,
) -> Option<Command> {
    if let Some(command) = first_verb(snapshot, &EVENT_EXITS) {
        return Some(command);
    }
    if snapshot.has(Verb::Choose) {
        if tracker.same_screen > config.event_stall_threshold {
            return Some(Command::Choose(cycle(tracker, snapshot.choices().len())));
        }
        return Some(Command::Choose(0));
    }
    first_verb(snapshot, &[Verb::Click])
}

/// Pure screen policy: what to do with `snapshot` given the stall history
pub fn plan(
    snapshot: &Snapshot,
    category: ScreenCategory,
    tracker: &StallTracker,
    config: &AutopilotConfig,
) -> Intent {
    let command = match category {
        ScreenCategory::CombatDecision => return Intent::Yield,
        ScreenCategory::Terminal => return Intent::Terminal,
        ScreenCategory::CombatPending => return Intent::AwaitCombat,
        ScreenCategory::Transitioning => return Intent::Refresh,
        ScreenCategory::Confirm => Some(Command::Bare(Verb::Confirm)),
        ScreenCategory::Shop => first_verb(snapshot, &SHOP_EXITS),
        ScreenCategory::Map => plan_map(snapshot, tracker, config),
        ScreenCategory::Rest => plan_rest(snapshot, tracker, config),
        ScreenCategory::Reward => plan_reward(snapshot, tracker, config),
        ScreenCategory::Event => plan_event(snapshot, tracker, config),
    };
    command.map_or(Intent::Refresh, Intent::Send)
}

/// How a settle run ended
#[derive(Debug, Clone, PartialEq)]
pub enum Settled {
    /// The policy has a decision to make
    Decision(Snapshot),
    /// The run is over
    Terminal(Snapshot),
    /// Gave up within a non-fatal budget; carries the last snapshot seen
    Stalled(Option<Snapshot>),
}

/// Time limits for one settle run
#[derive(Debug, Clone, Copy)]
pub struct SettleBudget {
    /// Start sending `return`/`cancel` bursts after this long
    pub emergency_after: Option<Duration>,
    pub ceiling: Duration,
    /// Exceeding the ceiling is an error rather than a [`Settled::Stalled`]
    pub fatal: bool,
}

pub struct Autopilot {
    config: AutopilotConfig,
    waits: WaitConfig,
}

impl Autopilot {
    pub fn new(config: AutopilotConfig, waits: WaitConfig) -> Self {
        Self { config, waits }
    }

    pub fn config(&self) -> &AutopilotConfig {
        &self.config
    }

    fn deadline_for(&self, category: ScreenCategory) -> Duration {
        match category {
            ScreenCategory::Map => self.config.map_deadline,
            ScreenCategory::Rest => self.config.rest_deadline,
            ScreenCategory::Reward => self.config.reward_deadline,
            _ => self.config.default_deadline,
        }
    }

    async fn resample(&self, store: &mut StateStore, fallback: Snapshot) -> Option<Snapshot> {
        sleep(self.config.idle_interval).await;
        store.request_state().await;
        Some(store.freshest(self.waits.poll_retry_budget).await.unwrap_or(fallback))
    }

    /// Drive the game from `start` until the policy is needed or the run ends
    pub async fn settle(
        &self,
        store: &mut StateStore,
        start: Option<Snapshot>,
        budget: SettleBudget,
    ) -> Result<Settled> {
        let began = Instant::now();
        let mut tracker = StallTracker::default();
        let mut current = start;
        let mut combat_polls = 0u32;
        let mut last_emergency: Option<Instant> = None;
        let mut last_category: Option<ScreenCategory> = None;

        loop {
            let elapsed = began.elapsed();
            let screen = current
                .as_ref()
                .map(|s| s.screen_type().to_string())
                .unwrap_or_else(|| "unknown".to_string());

            if store.process_gone() {
                if budget.fatal {
                    error!(screen = %screen, "Game process gone during settle");
                    return Err(SpireError::ProcessGone(format!("last screen {}", screen)));
                }
                warn!(screen = %screen, "Game process gone during settle");
                return Ok(Settled::Stalled(current));
            }

            if elapsed >= budget.ceiling {
                let elapsed_ms = elapsed.as_millis() as u64;
                if budget.fatal {
                    error!(screen = %screen, elapsed_ms, "Game never reached a tractable screen");
                    return Err(SpireError::Stalled(format!(
                        "no decision point after {} ms (screen {})",
                        elapsed_ms, screen
                    )));
                }
                warn!(screen = %screen, elapsed_ms, "Settle ceiling reached, proceeding");
                return Ok(Settled::Stalled(current));
            }

            if let Some(after) = budget.emergency_after {
                let due = last_emergency
                    .is_none_or(|at| at.elapsed() >= self.config.emergency_interval);
                if elapsed >= after && due {
                    warn!(
                        screen = %screen,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Stuck, sending emergency return/cancel"
                    );
                    store.send(&Command::Bare(Verb::Return)).await;
                    store.send(&Command::Bare(Verb::Cancel)).await;
                    last_emergency = Some(Instant::now());
                }
            }

            let Some(snapshot) = current.take() else {
                sleep(self.config.idle_interval).await;
                store.request_state().await;
                current = store.freshest(self.waits.poll_retry_budget).await;
                continue;
            };

            let category = classify(&snapshot);
            if last_category != Some(category) {
                debug!(screen = %snapshot.screen_type(), ?category, "Autopilot screen");
                last_category = Some(category);
            }
            tracker.observe(&snapshot);

            match plan(&snapshot, category, &tracker, &self.config) {
                Intent::Yield => {
                    let snapshot = ConditionWaiter::new(store, &self.waits)
                        .hand_drawn(snapshot)
                        .await;
                    return Ok(Settled::Decision(snapshot));
                }
                Intent::Terminal => {
                    let victory = snapshot.is_victory();
                    info!(screen = %snapshot.screen_type(), victory, "Run over");
                    return Ok(Settled::Terminal(snapshot));
                }
                Intent::AwaitCombat => {
                    combat_polls += 1;
                    let every = self.config.ready_nudge_every;
                    if every > 0 && combat_polls % every == 0 {
                        debug!("Combat still pending after {} polls, sending ready", combat_polls);
                        store.send(&Command::Ready).await;
                    }
                    current = self.resample(store, snapshot).await;
                }
                Intent::Refresh => {
                    current = self.resample(store, snapshot).await;
                }
                Intent::Send(command) => {
                    combat_polls = 0;
                    info!(screen = %snapshot.screen_type(), command = %command, "Autopilot");
                    store.send(&command).await;
                    if let Command::Choose(index) = command {
                        tracker.chose(index);
                    }

                    let deadline = self.deadline_for(category);
                    let outcome = ConditionWaiter::new(store, &self.waits)
                        .transition(&snapshot, deadline)
                        .await;
                    current = match outcome {
                        WaitOutcome::Satisfied(next) | WaitOutcome::ScreenChanged(next) => {
                            tracker.moved();
                            Some(next)
                        }
                        WaitOutcome::TimedOut(_) | WaitOutcome::NoBaseline => {
                            tracker.bump();
                            debug!(stalls = tracker.same_screen(), "No transition, re-sampling");
                            Some(store.refresh().await.unwrap_or(snapshot))
                        }
                    };
                }
            }
        }
    }
}
