//! Condition waits
//!
//! After a command is sent, the control loop blocks here until the game shows
//! the effect of that command. Every wait has the same shape: capture a
//! baseline, sleep a short settle delay, then poll until the verdict over
//! (baseline, current snapshot) is no longer pending or the deadline passes.
//! A timeout is logged and reported, never raised.

use crate::config::WaitConfig;
use spire_bridge::StateStore;
use spire_rl_core::{Command, ScreenType, Snapshot, Verb};
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Result of checking one snapshot against a baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pending,
    /// The awaited effect is visible
    Satisfied,
    /// The game moved to a screen where the effect no longer matters
    ScreenChanged,
}

/// How a wait ended
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Satisfied(Snapshot),
    ScreenChanged(Snapshot),
    /// Deadline passed; carries the newest snapshot seen, if any
    TimedOut(Option<Snapshot>),
    /// The baseline lacked what this wait compares (e.g. no combat state)
    NoBaseline,
}

impl WaitOutcome {
    pub fn into_snapshot(self) -> Option<Snapshot> {
        match self {
            WaitOutcome::Satisfied(s) | WaitOutcome::ScreenChanged(s) => Some(s),
            WaitOutcome::TimedOut(s) => s,
            WaitOutcome::NoBaseline => None,
        }
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, WaitOutcome::TimedOut(_))
    }
}

/// Combat is over or was never entered
fn left_combat(snapshot: &Snapshot) -> bool {
    snapshot.is_terminal() || snapshot.combat().is_none() || !snapshot.in_combat_phase()
}

fn sorted_identities(snapshot: &Snapshot) -> Vec<String> {
    let mut ids: Vec<String> = snapshot
        .hand()
        .iter()
        .map(|c| c.identity().to_string())
        .collect();
    ids.sort();
    ids
}

/// Energy, hand size and hand contents before a card was played
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPlayedBaseline {
    energy: i32,
    hand_len: usize,
    identities: Vec<String>,
}

impl CardPlayedBaseline {
    pub fn capture(snapshot: &Snapshot) -> Option<Self> {
        let combat = snapshot.combat()?;
        Some(Self {
            energy: combat.player.energy,
            hand_len: combat.hand.len(),
            identities: sorted_identities(snapshot),
        })
    }

    pub fn verdict(&self, snapshot: &Snapshot) -> Verdict {
        if left_combat(snapshot) || !snapshot.screen_type().is_combat_view() {
            return Verdict::ScreenChanged;
        }
        let Some(combat) = snapshot.combat() else {
            return Verdict::ScreenChanged;
        };
        if combat.player.energy != self.energy || combat.hand.len() != self.hand_len {
            return Verdict::Satisfied;
        }
        if sorted_identities(snapshot) != self.identities {
            return Verdict::Satisfied;
        }
        Verdict::Pending
    }
}

/// Turn counter before `end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewTurnBaseline {
    turn: u32,
}

impl NewTurnBaseline {
    pub fn capture(snapshot: &Snapshot) -> Self {
        Self {
            turn: snapshot.turn(),
        }
    }

    pub fn verdict(&self, snapshot: &Snapshot) -> Verdict {
        if left_combat(snapshot) || !snapshot.screen_type().is_combat_view() {
            return Verdict::ScreenChanged;
        }
        // The counter moves before the hand is dealt; `play` marks the real start
        if snapshot.turn() > self.turn && snapshot.has(Verb::Play) {
            return Verdict::Satisfied;
        }
        Verdict::Pending
    }
}

/// Identity occupying a potion slot before it was used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PotionBaseline {
    slot: usize,
    identity: String,
}

impl PotionBaseline {
    pub fn capture(snapshot: &Snapshot, slot: usize) -> Option<Self> {
        let potion = snapshot.potions().get(slot)?;
        Some(Self {
            slot,
            identity: potion.id.clone(),
        })
    }

    pub fn verdict(&self, snapshot: &Snapshot) -> Verdict {
        if left_combat(snapshot) {
            return Verdict::ScreenChanged;
        }
        match snapshot.potions().get(self.slot) {
            Some(potion) if potion.id == self.identity => Verdict::Pending,
            _ => Verdict::Satisfied,
        }
    }
}

/// Chooser screen a sub-selection was made on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceBaseline {
    screen: ScreenType,
}

impl ChoiceBaseline {
    pub fn capture(snapshot: &Snapshot) -> Self {
        Self {
            screen: snapshot.screen_type(),
        }
    }

    pub fn verdict(&self, snapshot: &Snapshot) -> Verdict {
        if snapshot.screen_type() != self.screen {
            return Verdict::ScreenChanged;
        }
        if snapshot.has(Verb::Confirm) {
            return Verdict::Satisfied;
        }
        Verdict::Pending
    }
}

/// Screen, command set and choice list before a traversal command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionBaseline {
    in_game: bool,
    in_combat: bool,
    screen: ScreenType,
    commands: Vec<String>,
    choices: Vec<String>,
}

impl TransitionBaseline {
    pub fn capture(snapshot: &Snapshot) -> Self {
        Self {
            in_game: snapshot.game_state.is_some(),
            in_combat: snapshot.in_combat_phase(),
            screen: snapshot.screen_type(),
            commands: snapshot.available_commands.clone(),
            choices: snapshot.choices().to_vec(),
        }
    }

    pub fn verdict(&self, snapshot: &Snapshot) -> Verdict {
        let screen = snapshot.screen_type();
        if snapshot.game_state.is_some() != self.in_game || screen != self.screen {
            return Verdict::ScreenChanged;
        }
        // A fight starting behind an unchanged overlay still counts as moving on
        if snapshot.in_combat_phase() != self.in_combat {
            return Verdict::Satisfied;
        }
        if snapshot.available_commands != self.commands
            || snapshot.choices() != self.choices.as_slice()
        {
            return Verdict::Satisfied;
        }
        Verdict::Pending
    }
}

/// Periodic re-send of a command that may have been swallowed
struct Resend {
    every: Duration,
    command: Command,
    cancel_first: bool,
    last_sent: Duration,
}

/// Polls the store until a baseline verdict resolves
pub struct ConditionWaiter<'a> {
    store: &'a mut StateStore,
    config: &'a WaitConfig,
}

impl<'a> ConditionWaiter<'a> {
    pub fn new(store: &'a mut StateStore, config: &'a WaitConfig) -> Self {
        Self { store, config }
    }

    /// After `play`: energy, hand size or hand contents changed
    pub async fn card_played(&mut self, baseline: &Snapshot) -> WaitOutcome {
        let Some(base) = CardPlayedBaseline::capture(baseline) else {
            sleep(self.config.card_played_settle).await;
            return WaitOutcome::NoBaseline;
        };
        let (settle, deadline) = (self.config.card_played_settle, self.config.card_played_deadline);
        self.poll("card_played", settle, deadline, None, |s| base.verdict(s))
            .await
    }

    /// After `end`: turn counter advanced and the new hand is playable
    pub async fn new_turn(&mut self, baseline: &Snapshot) -> WaitOutcome {
        let base = NewTurnBaseline::capture(baseline);
        info!("Waiting for turn {} to end", base.turn);
        let (settle, deadline) = (self.config.new_turn_settle, self.config.new_turn_deadline);
        self.poll("new_turn", settle, deadline, None, |s| base.verdict(s))
            .await
    }

    /// After a potion command: the slot's occupant changed.
    ///
    /// Re-issues the command in the other accepted syntax every
    /// `potion_retry_after`, optionally cancelling a stuck targeting mode first.
    pub async fn potion_used(&mut self, baseline: &Snapshot, command: &Command) -> WaitOutcome {
        let Command::Potion { slot, .. } = command else {
            return WaitOutcome::NoBaseline;
        };
        let Some(base) = PotionBaseline::capture(baseline, *slot) else {
            return WaitOutcome::NoBaseline;
        };
        let resend = Resend {
            every: self.config.potion_retry_after,
            command: command.clone(),
            cancel_first: self.config.potion_cancel_before_retry,
            last_sent: Duration::ZERO,
        };
        let (settle, deadline) = (self.config.potion_settle, self.config.potion_deadline);
        self.poll("potion_used", settle, deadline, Some(resend), |s| base.verdict(s))
            .await
    }

    /// After a sub-selection inside a chooser: `confirm` appeared or the chooser closed
    pub async fn choice_confirmed(&mut self, baseline: &Snapshot) -> WaitOutcome {
        let base = ChoiceBaseline::capture(baseline);
        let (settle, deadline) = (self.config.choice_settle, self.config.choice_deadline);
        self.poll("choice_confirmed", settle, deadline, None, |s| base.verdict(s))
            .await
    }

    /// After a traversal command: screen, command set or choice list changed
    pub async fn transition(&mut self, baseline: &Snapshot, deadline: Duration) -> WaitOutcome {
        let base = TransitionBaseline::capture(baseline);
        let settle = self.config.transition_settle;
        self.poll("transition", settle, deadline, None, |s| base.verdict(s))
            .await
    }

    /// Poll until the hand has been dealt (or there is genuinely nothing to draw),
    /// sending one `ready` nudge part-way through.
    pub async fn hand_drawn(&mut self, snapshot: Snapshot) -> Snapshot {
        let mut current = snapshot;
        for attempt in 0..self.config.hand_draw_attempts {
            if hand_is_dealt(&current) {
                return current;
            }
            if attempt == self.config.hand_draw_ready_at {
                info!("Hand still empty after {} polls, sending ready", attempt);
                self.store.send(&Command::Ready).await;
            }
            sleep(self.config.hand_draw_interval).await;
            self.store.request_state().await;
            if let Some(next) = self.store.freshest(self.config.poll_retry_budget).await {
                current = next;
            }
        }
        if !hand_is_dealt(&current) {
            warn!("Hand never appeared, yielding anyway");
        }
        current
    }

    async fn poll<F>(
        &mut self,
        wait: &'static str,
        settle: Duration,
        deadline: Duration,
        mut resend: Option<Resend>,
        verdict: F,
    ) -> WaitOutcome
    where
        F: Fn(&Snapshot) -> Verdict,
    {
        sleep(settle).await;
        let start = Instant::now();
        let mut last_seen: Option<Snapshot> = None;

        loop {
            self.store.request_state().await;
            match self.store.freshest(self.config.poll_retry_budget).await {
                Some(snapshot) => match verdict(&snapshot) {
                    Verdict::Satisfied => {
                        let elapsed_ms = start.elapsed().as_millis() as u64;
                        debug!(wait, elapsed_ms, "Wait satisfied");
                        return WaitOutcome::Satisfied(snapshot);
                    }
                    Verdict::ScreenChanged => {
                        let screen = snapshot.screen_type();
                        info!(wait, screen = %screen, "Screen changed while waiting");
                        return WaitOutcome::ScreenChanged(snapshot);
                    }
                    Verdict::Pending => last_seen = Some(snapshot),
                },
                None if self.store.process_gone() => {
                    warn!(wait, "Game process gone while waiting");
                    return WaitOutcome::TimedOut(last_seen);
                }
                None => {}
            }

            let elapsed = start.elapsed();
            if elapsed >= deadline {
                let screen = last_seen
                    .as_ref()
                    .map(|s| s.screen_type().to_string())
                    .unwrap_or_else(|| "unknown".to_string());
                warn!(
                    wait,
                    elapsed_ms = elapsed.as_millis() as u64,
                    screen = %screen,
                    "Wait timed out, proceeding"
                );
                return WaitOutcome::TimedOut(last_seen.or_else(|| self.store.current().cloned()));
            }

            if let Some(resend) = resend.as_mut() {
                if elapsed.saturating_sub(resend.last_sent) >= resend.every {
                    resend.command = resend.command.alternate_syntax();
                    info!(wait, command = %resend.command, "No effect yet, re-sending");
                    if resend.cancel_first {
                        self.store.send(&Command::Bare(Verb::Cancel)).await;
                    }
                    self.store.send(&resend.command).await;
                    resend.last_sent = elapsed;
                }
            }

            sleep(self.config.poll_interval).await;
        }
    }
}

/// Hand is non-empty, or both piles are empty so nothing is coming
pub fn hand_is_dealt(snapshot: &Snapshot) -> bool {
    match snapshot.combat() {
        Some(combat) if snapshot.screen_type().is_combat_view() => {
            let piles_empty = combat.draw_pile.is_empty() && combat.discard_pile.is_empty();
            !combat.hand.is_empty() || piles_empty
        }
        _ => true,
    }
}
