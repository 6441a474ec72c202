//! State store: "maybe a line" to "maybe a valid snapshot"
//!
//! Retrieval never blocks for long and never reports a half-parsed value.
//! `None` from any retrieval means "try again later", not "game over";
//! [`StateStore::process_gone`] is the only signal that the game has exited.

use crate::protocol::{decode_line, decode_snapshot};
use crate::transport::Transport;
use serde::{Deserialize, Serialize};
use spire_rl_core::{Command, Snapshot, duration_ms};
use std::time::Duration;
use tracing::debug;

/// Retrieval tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Reads attempted by one `latest` call
    pub retry_budget: u32,
    /// Wait per read attempt
    #[serde(with = "duration_ms")]
    pub poll_timeout: Duration,
    /// Pause inserted on the final attempts of a budget
    #[serde(with = "duration_ms")]
    pub backoff: Duration,
    /// Empty retrievals after stream close before the game counts as gone
    pub gone_after_misses: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            poll_timeout: Duration::from_millis(5),
            backoff: Duration::from_millis(20),
            gone_after_misses: 3,
        }
    }
}

/// Snapshot cache over a [`Transport`]
pub struct StateStore {
    transport: Transport,
    config: StoreConfig,
    current: Option<Snapshot>,
    misses: u32,
}

impl StateStore {
    pub fn new(transport: Transport, config: StoreConfig) -> Self {
        Self {
            transport,
            config,
            current: None,
            misses: 0,
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Last snapshot successfully retrieved
    pub fn current(&self) -> Option<&Snapshot> {
        self.current.as_ref()
    }

    pub async fn send(&mut self, command: &Command) {
        self.transport.send(command).await;
    }

    /// Ask the game to re-emit its state
    pub async fn request_state(&mut self) {
        self.transport.send(&Command::State).await;
    }

    /// Up to `budget` quick reads, nudging the game with `state` on every
    /// other miss and backing off on the last attempts.
    pub async fn latest(&mut self, budget: u32) -> Option<Snapshot> {
        for attempt in 0..budget {
            if let Some(snapshot) = self.read_one().await {
                self.accept(&snapshot);
                return Some(snapshot);
            }
            if self.transport.is_closed() {
                break;
            }
            if attempt % 2 == 1 {
                self.request_state().await;
            }
            if attempt + 2 >= budget {
                tokio::time::sleep(self.config.backoff).await;
            }
        }
        self.misses = self.misses.saturating_add(1);
        None
    }

    /// Like [`latest`](Self::latest), then drain whatever is already queued
    /// and keep the newest valid snapshot.
    pub async fn freshest(&mut self, budget: u32) -> Option<Snapshot> {
        let mut newest = self.latest(budget).await?;
        let mut skipped = 0usize;
        while let Some(line) = self.transport.receive_line(None).await {
            let parsed = decode_line(&line).and_then(|v| decode_snapshot(v).ok());
            if let Some(snapshot) = parsed {
                newest = snapshot;
                skipped += 1;
            }
        }
        if skipped > 0 {
            debug!("Skipped {} stale snapshot(s)", skipped);
            self.accept(&newest);
        }
        Some(newest)
    }

    /// Nudge, then take the freshest snapshot within the default budget
    pub async fn refresh(&mut self) -> Option<Snapshot> {
        self.request_state().await;
        self.freshest(self.config.retry_budget).await
    }

    /// The game's output has closed and retrievals keep coming back empty
    pub fn process_gone(&self) -> bool {
        self.transport.is_closed() && self.misses >= self.config.gone_after_misses
    }

    /// Consecutive retrievals that returned nothing
    pub fn misses(&self) -> u32 {
        self.misses
    }

    async fn read_one(&mut self) -> Option<Snapshot> {
        let value = self.transport.receive(Some(self.config.poll_timeout)).await?;
        match decode_snapshot(value) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                debug!("Ignoring line: {}", e);
                None
            }
        }
    }

    fn accept(&mut self, snapshot: &Snapshot) {
        self.misses = 0;
        self.current = Some(snapshot.clone());
    }
}
