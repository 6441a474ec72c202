//! Scripted in-memory game for tests

use crate::config::EngineConfig;
use spire_bridge::{
    DEFAULT_QUEUE_CAPACITY, LineReadWrapper, LineWriteWrapper, StateStore, StoreConfig, Transport,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::JoinHandle;

/// Spawn a fake game answering each received command line with the lines
/// `respond` returns. The handle resolves to every line the game received
/// once the store (and with it our end of the pipe) is dropped.
pub(crate) fn fake_game<F>(respond: F) -> (StateStore, JoinHandle<Vec<String>>)
where
    F: FnMut(&str) -> Vec<String> + Send + 'static,
{
    let (game_out, our_in) = tokio::io::duplex(256 * 1024);
    let (our_out, game_in) = tokio::io::duplex(256 * 1024);
    let transport = Transport::new(
        LineReadWrapper::new(our_in),
        LineWriteWrapper(our_out),
        DEFAULT_QUEUE_CAPACITY,
    );
    let store = StateStore::new(transport, fast_config().store);

    let handle = tokio::spawn(async move {
        let mut respond = respond;
        let mut game_out = game_out;
        let mut lines = BufReader::new(game_in).lines();
        let mut received = Vec::new();
        while let Ok(Some(command)) = lines.next_line().await {
            for reply in respond(&command) {
                let _ = game_out.write_all(format!("{}\n", reply).as_bytes()).await;
            }
            received.push(command);
        }
        received
    });

    (store, handle)
}

/// Serialize a JSON state as one protocol line
pub(crate) fn line(value: &serde_json::Value) -> String {
    value.to_string()
}

/// Short deadlines so timeouts resolve in milliseconds
pub(crate) fn fast_config() -> EngineConfig {
    let mut config = EngineConfig::default();

    config.store = StoreConfig {
        retry_budget: 3,
        poll_timeout: Duration::from_millis(5),
        backoff: Duration::from_millis(2),
        gone_after_misses: 3,
    };

    let waits = &mut config.waits;
    waits.poll_interval = Duration::from_millis(5);
    waits.card_played_settle = Duration::from_millis(1);
    waits.card_played_deadline = Duration::from_millis(300);
    waits.new_turn_settle = Duration::from_millis(1);
    waits.new_turn_deadline = Duration::from_secs(1);
    waits.potion_settle = Duration::from_millis(1);
    waits.potion_deadline = Duration::from_secs(1);
    waits.potion_retry_after = Duration::from_millis(40);
    waits.choice_settle = Duration::from_millis(1);
    waits.choice_deadline = Duration::from_millis(300);
    waits.transition_settle = Duration::from_millis(1);
    waits.hand_draw_attempts = 30;
    waits.hand_draw_interval = Duration::from_millis(5);
    waits.hand_draw_ready_at = 3;

    let autopilot = &mut config.autopilot;
    autopilot.map_deadline = Duration::from_millis(150);
    autopilot.rest_deadline = Duration::from_millis(150);
    autopilot.reward_deadline = Duration::from_millis(100);
    autopilot.default_deadline = Duration::from_millis(100);
    autopilot.idle_interval = Duration::from_millis(5);
    autopilot.ready_nudge_every = 4;
    autopilot.emergency_interval = Duration::from_millis(50);

    config.reset.emergency_after = Duration::from_secs(1);
    config.reset.ceiling = Duration::from_secs(3);
    config.reset.start_load_delay = Duration::from_millis(10);
    config.reset.menu_poll = Duration::from_millis(5);

    config.step.step_ceiling = Duration::from_secs(2);

    config
}
