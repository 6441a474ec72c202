//! Reset/step environment over a running game

use crate::autopilot::{Autopilot, SettleBudget, Settled};
use crate::config::EngineConfig;
use crate::mapper::ActionMapper;
use crate::waiter::ConditionWaiter;
use async_trait::async_trait;
use spire_bridge::{StateStore, Transport};
use spire_rl_core::{
    CombatReward, Command, LegalityMask, ObservationEncoder, Result, Reward, RewardFunction,
    Snapshot, SpireError, StepOutcome, TerminationReason, Verb, VitalsEncoder,
};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Trait for driving a game as an episodic environment
#[async_trait]
pub trait Environment: Send {
    /// Start (or resume) a run and settle on the first decision point
    async fn reset(&mut self) -> Result<StepOutcome>;

    /// Apply one action and settle on the next decision point
    async fn step(&mut self, action: usize) -> Result<StepOutcome>;

    /// Legal actions for the current decision point
    fn action_mask(&self) -> LegalityMask;

    /// Called when the environment should shut down
    async fn shutdown(&mut self) -> Result<()>;
}

/// Where the reset click-through ended up
enum Entry {
    MainMenu,
    InRun(Snapshot),
}

pub struct SpireEnvironment {
    store: StateStore,
    autopilot: Autopilot,
    mapper: ActionMapper,
    encoder: Box<dyn ObservationEncoder>,
    reward: Box<dyn RewardFunction>,
    config: EngineConfig,
    last: Option<Snapshot>,
    episode_over: bool,
    steps: u64,
}

impl SpireEnvironment {
    /// Wrap a transport and send the `ready` handshake the game waits for
    pub async fn connect(transport: Transport, config: EngineConfig) -> Self {
        let mut store = StateStore::new(transport, config.store.clone());
        info!("Connecting to game");
        store.send(&Command::Ready).await;
        Self {
            store,
            autopilot: Autopilot::new(config.autopilot.clone(), config.waits.clone()),
            mapper: ActionMapper::new(),
            encoder: Box::new(VitalsEncoder),
            reward: Box::new(CombatReward::default()),
            config,
            last: None,
            episode_over: true,
            steps: 0,
        }
    }

    pub fn with_encoder(mut self, encoder: Box<dyn ObservationEncoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_reward(mut self, reward: Box<dyn RewardFunction>) -> Self {
        self.reward = reward;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn observation_size(&self) -> usize {
        self.encoder.size()
    }

    /// Snapshot the current decision point was computed from
    pub fn last_snapshot(&self) -> Option<&Snapshot> {
        self.last.as_ref()
    }

    pub fn describe(&self, action: usize) -> String {
        self.mapper.describe(action, self.last.as_ref())
    }

    fn outcome(
        &self,
        snapshot: Option<Snapshot>,
        reward: Reward,
        command: Option<String>,
    ) -> StepOutcome {
        StepOutcome {
            observation: self.encoder.encode(snapshot.as_ref()),
            mask: self.mapper.mask(snapshot.as_ref()),
            reward,
            done: false,
            truncated: false,
            termination_reason: None,
            command,
            snapshot,
        }
    }

    fn gone_or_stalled(&self, elapsed: Duration, screen: &str) -> SpireError {
        if self.store.process_gone() {
            SpireError::ProcessGone(format!("during reset on screen {}", screen))
        } else {
            SpireError::Stalled(format!(
                "reset made no progress for {} ms (screen {})",
                elapsed.as_millis(),
                screen
            ))
        }
    }

    /// Click through game-over and menu screens until a run can start or resume
    async fn reach_entry(&mut self, began: Instant) -> Result<Entry> {
        let reset = &self.config.reset;
        let mut screen = "unknown".to_string();
        loop {
            let elapsed = began.elapsed();
            if elapsed >= reset.ceiling || self.store.process_gone() {
                error!(
                    screen = %screen,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Reset never reached the main menu"
                );
                return Err(self.gone_or_stalled(elapsed, &screen));
            }

            self.store.request_state().await;
            let Some(snapshot) = self.store.freshest(self.config.store.retry_budget).await else {
                sleep(reset.menu_poll).await;
                continue;
            };
            screen = snapshot.screen_type().to_string();

            if snapshot.ready_for_command == Some(false) {
                sleep(reset.menu_poll).await;
                continue;
            }
            if snapshot.has(Verb::Start) {
                return Ok(Entry::MainMenu);
            }
            if snapshot.game_state.is_some() && !snapshot.is_terminal() {
                return Ok(Entry::InRun(snapshot));
            }
            if let Some(verb) = snapshot.first_of(&[Verb::Proceed, Verb::Confirm, Verb::Leave]) {
                debug!(screen = %screen, "Clicking {} on the way to the menu", verb);
                self.store.send(&Command::Bare(verb)).await;
            }
            sleep(reset.menu_poll).await;
        }
    }
}

#[async_trait]
impl Environment for SpireEnvironment {
    async fn reset(&mut self) -> Result<StepOutcome> {
        info!("Resetting environment");
        let began = Instant::now();
        self.episode_over = true;
        self.last = None;
        self.steps = 0;

        let start = match self.reach_entry(began).await? {
            Entry::MainMenu => {
                let reset = &self.config.reset;
                let command = Command::Start {
                    character: reset.character.clone(),
                    ascension: reset.ascension,
                    seed: reset.seed.clone(),
                };
                info!("At main menu, starting a new run");
                self.store.send(&command).await;
                sleep(reset.start_load_delay).await;
                self.store.refresh().await
            }
            Entry::InRun(snapshot) => {
                info!(screen = %snapshot.screen_type(), "Resuming run in progress");
                Some(snapshot)
            }
        };

        let elapsed = began.elapsed();
        let budget = SettleBudget {
            emergency_after: Some(self.config.reset.emergency_after.saturating_sub(elapsed)),
            ceiling: self.config.reset.ceiling.saturating_sub(elapsed),
            fatal: true,
        };
        let settled = self.autopilot.settle(&mut self.store, start, budget).await?;

        let outcome = match settled {
            Settled::Decision(snapshot) => {
                self.episode_over = false;
                self.outcome(Some(snapshot), Reward::default(), None)
            }
            Settled::Terminal(snapshot) => {
                warn!("Run ended before the first decision");
                let reason = terminal_reason(&snapshot);
                let mut outcome = self.outcome(Some(snapshot), Reward::default(), None);
                outcome.done = true;
                outcome.termination_reason = Some(reason);
                outcome
            }
            Settled::Stalled(snapshot) => {
                let screen = snapshot
                    .map(|s| s.screen_type().to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                return Err(self.gone_or_stalled(began.elapsed(), &screen));
            }
        };
        self.last = outcome.snapshot.clone();
        info!(elapsed_ms = began.elapsed().as_millis() as u64, "Reset complete");
        Ok(outcome)
    }

    async fn step(&mut self, action: usize) -> Result<StepOutcome> {
        if self.episode_over {
            return Err(SpireError::EpisodeTerminated);
        }
        let Some(prev) = self.last.clone() else {
            return Err(SpireError::EpisodeTerminated);
        };
        self.steps += 1;
        let label = self.mapper.describe(action, Some(&prev));

        let Some(command) = self.mapper.decode(action, &prev) else {
            warn!(
                step = self.steps,
                action,
                "Action does not fit the current state ({}), refreshing",
                label
            );
            let current = self.store.refresh().await.unwrap_or(prev);
            self.last = Some(current.clone());
            let penalty = Reward::flat("invalid_action", self.config.step.invalid_action_penalty);
            return Ok(self.outcome(Some(current), penalty, None));
        };

        info!(step = self.steps, action, "{}", label);
        self.store.send(&command).await;

        let mut waiter = ConditionWaiter::new(&mut self.store, &self.config.waits);
        let effect = match &command {
            Command::Bare(Verb::End) => waiter.new_turn(&prev).await,
            Command::Play { .. } => waiter.card_played(&prev).await,
            Command::Potion { .. } => waiter.potion_used(&prev, &command).await,
            Command::Choose(_) if prev.screen_type().is_card_chooser() => {
                waiter.choice_confirmed(&prev).await
            }
            _ => {
                waiter
                    .transition(&prev, self.config.autopilot.default_deadline)
                    .await
            }
        };
        let after = match effect.into_snapshot() {
            Some(snapshot) => Some(snapshot),
            None => self.store.refresh().await,
        };

        let budget = SettleBudget {
            emergency_after: None,
            ceiling: self.config.step.step_ceiling,
            fatal: false,
        };
        let settled = self.autopilot.settle(&mut self.store, after, budget).await?;

        let (next, done, truncated, reason) = match settled {
            Settled::Decision(snapshot) => (snapshot, false, false, None),
            Settled::Terminal(snapshot) => {
                let reason = terminal_reason(&snapshot);
                (snapshot, true, false, Some(reason))
            }
            Settled::Stalled(snapshot) => {
                let snapshot = snapshot.unwrap_or_else(|| prev.clone());
                if self.store.process_gone() {
                    error!(step = self.steps, "Game process gone");
                    (snapshot, true, false, Some(TerminationReason::ProcessGone))
                } else {
                    warn!(step = self.steps, "Step truncated before a decision point");
                    (snapshot, false, true, None)
                }
            }
        };

        let reward = self.reward.compute(&prev, &next);
        debug!(step = self.steps, reward = reward.value, "Step reward");
        if done {
            info!(step = self.steps, reason = ?reason, "Episode finished");
            self.episode_over = true;
        }

        let mut outcome = self.outcome(Some(next.clone()), reward, Some(command.to_string()));
        outcome.done = done;
        outcome.truncated = truncated;
        outcome.termination_reason = reason;
        self.last = Some(next);
        Ok(outcome)
    }

    fn action_mask(&self) -> LegalityMask {
        self.mapper.mask(self.last.as_ref())
    }

    async fn shutdown(&mut self) -> Result<()> {
        info!(steps = self.steps, "Shutting down environment");
        self.episode_over = true;
        Ok(())
    }
}

fn terminal_reason(snapshot: &Snapshot) -> TerminationReason {
    if snapshot.is_victory() {
        TerminationReason::Victory
    } else {
        TerminationReason::Defeat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fake_game, fast_config, line};
    use serde_json::{Value, json};
    use spire_rl_core::END_TURN_ACTION;

    fn menu() -> Value {
        json!({"available_commands": ["start", "state"], "ready_for_command": true})
    }

    fn fight(turn: u32, energy: i32, monster_hp: i32, hand: &[&str]) -> Value {
        let cards: Vec<_> = hand
            .iter()
            .map(|id| {
                let attack = id.starts_with("Strike");
                json!({"id": id, "uuid": format!("{}-{}", id, turn), "cost": 1, "is_playable": true,
                    "has_target": attack, "type": if attack { "ATTACK" } else { "SKILL" }})
            })
            .collect();
        json!({
            "available_commands": ["play", "end", "state"],
            "ready_for_command": true,
            "game_state": {
                "screen_type": "NONE", "room_phase": "COMBAT", "floor": 1,
                "current_hp": 80, "max_hp": 80,
                "combat_state": {
                    "turn": turn,
                    "player": {"current_hp": 80, "max_hp": 80, "energy": energy},
                    "hand": cards,
                    "monsters": [{"id": "JawWorm", "current_hp": monster_hp, "max_hp": 40}],
                    "draw_pile": [{"id": "Strike_R"}]
                }
            }
        })
    }

    fn victory() -> Value {
        json!({
            "available_commands": ["proceed", "state"],
            "ready_for_command": true,
            "game_state": {"screen_type": "GAME_OVER", "floor": 1, "screen_state": {"victory": true}}
        })
    }

    async fn connect_to(
        respond: impl FnMut(&str) -> Vec<String> + Send + 'static,
    ) -> (SpireEnvironment, tokio::task::JoinHandle<Vec<String>>) {
        let (store, game) = fake_game(respond);
        let config = fast_config();
        let mut env = SpireEnvironment {
            store,
            autopilot: Autopilot::new(config.autopilot.clone(), config.waits.clone()),
            mapper: ActionMapper::new(),
            encoder: Box::new(VitalsEncoder),
            reward: Box::new(CombatReward::default()),
            config,
            last: None,
            episode_over: true,
            steps: 0,
        };
        env.store.send(&Command::Ready).await;
        (env, game)
    }

    #[tokio::test]
    async fn test_episode_from_menu_to_victory() {
        let states = vec![
            menu(),
            fight(1, 3, 20, &["Strike_R", "Defend_R"]),
            fight(1, 2, 14, &["Defend_R"]),
            fight(2, 3, 14, &["Strike_R", "Defend_R"]),
            victory(),
        ];
        let mut stage = 0usize;
        let (mut env, game) = connect_to(move |cmd| {
            match (cmd, stage) {
                ("start ironclad", 0) => stage = 1,
                ("play 1 0", 1) => stage = 2,
                ("end", 2) => stage = 3,
                ("play 1 0", 3) => stage = 4,
                _ => {}
            }
            if cmd == "ready" {
                return vec![];
            }
            vec![line(&states[stage])]
        })
        .await;

        assert!(matches!(env.step(0).await, Err(SpireError::EpisodeTerminated)));

        let first = env.reset().await.unwrap();
        assert!(!first.done);
        assert_eq!(first.observation.len(), env.observation_size());
        assert!(first.mask.is_legal(0));
        assert!(first.mask.is_legal(END_TURN_ACTION));

        let played = env.step(0).await.unwrap();
        assert_eq!(played.command.as_deref(), Some("play 1 0"));
        assert!(!played.done);
        assert!((played.reward.components["damage"] - 0.9).abs() < 1e-9);
        assert_eq!(env.action_mask(), played.mask);

        let ended = env.step(END_TURN_ACTION).await.unwrap();
        assert_eq!(ended.command.as_deref(), Some("end"));
        assert_eq!(ended.snapshot.as_ref().map(|s| s.turn()), Some(2));

        let last = env.step(0).await.unwrap();
        assert!(last.done);
        assert_eq!(last.termination_reason, Some(TerminationReason::Victory));
        assert_eq!(last.reward.components["victory"], 100.0);

        assert!(matches!(env.step(0).await, Err(SpireError::EpisodeTerminated)));
        env.shutdown().await.unwrap();

        drop(env);
        let received = game.await.unwrap();
        assert_eq!(received[0], "ready");
        let sent: Vec<&str> = received
            .iter()
            .map(String::as_str)
            .filter(|c| *c != "state" && *c != "ready")
            .collect();
        assert_eq!(sent, ["start ironclad", "play 1 0", "end", "play 1 0"]);
    }

    #[tokio::test]
    async fn test_invalid_action_is_penalised() {
        let fight = fight(1, 3, 20, &["Strike_R", "Defend_R"]);
        let (mut env, game) = connect_to(move |cmd| {
            if cmd == "state" { vec![line(&fight)] } else { vec![] }
        })
        .await;

        let first = env.reset().await.unwrap();
        assert!(!first.done);

        // Hand slot 9 does not exist
        let outcome = env.step(45).await.unwrap();
        assert_eq!(outcome.command, None);
        assert_eq!(outcome.reward.value, -0.05);
        assert!(!outcome.done);

        drop(env);
        let received = game.await.unwrap();
        assert!(received.iter().all(|c| !c.starts_with("play")));
    }

    #[tokio::test]
    async fn test_reset_clicks_through_game_over() {
        let over = json!({
            "available_commands": ["proceed", "state"],
            "ready_for_command": true,
            "game_state": {"screen_type": "GAME_OVER", "screen_state": {"victory": false}}
        });
        let states = vec![over, menu(), fight(1, 3, 20, &["Strike_R"])];
        let mut stage = 0usize;
        let (mut env, game) = connect_to(move |cmd| {
            match (cmd, stage) {
                ("proceed", 0) => stage = 1,
                ("start ironclad", 1) => stage = 2,
                _ => {}
            }
            vec![line(&states[stage])]
        })
        .await;

        let first = env.reset().await.unwrap();
        assert!(!first.done);
        assert_eq!(env.last_snapshot().map(|s| s.hand().len()), Some(1));

        drop(env);
        let received = game.await.unwrap();
        let proceed = received.iter().position(|c| c == "proceed").unwrap();
        let start = received.iter().position(|c| c == "start ironclad").unwrap();
        assert!(proceed < start);
    }

    #[tokio::test]
    async fn test_reset_fails_when_game_is_silent() {
        let (mut env, game) = connect_to(|_| vec![]).await;
        env.config.reset.ceiling = Duration::from_millis(200);

        let result = env.reset().await;
        assert!(matches!(result, Err(SpireError::Stalled(_))));

        drop(env);
        game.await.unwrap();
    }
}
