//! Bridge infrastructure between the engine and the game process
//!
//! This crate provides:
//! - Line decoding for the game's JSON state reports
//! - Transport abstractions (AsyncLineReader/AsyncLineWriter traits)
//! - Stdio and child-process transports
//! - Background reader task feeding a bounded line queue
//! - The state store: retry-with-nudge snapshot retrieval

pub mod protocol;
pub mod stdio;
pub mod store;
pub mod transport;

pub use protocol::{decode_line, decode_snapshot};
pub use stdio::{LineReadWrapper, LineWriteWrapper, spawn_game, stdio_transport};
pub use store::{StateStore, StoreConfig};
pub use transport::{
    AsyncLineReader, AsyncLineWriter, DEFAULT_QUEUE_CAPACITY, Transport, reader_task,
};
