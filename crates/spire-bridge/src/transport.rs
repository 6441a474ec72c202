//! Transport abstractions for the game bridge
//!
//! A background task reads lines from the game and pushes them into a bounded
//! queue; the control loop pops from that queue with an explicit timeout and
//! never reads the stream directly.

use crate::protocol::decode_line;
use async_trait::async_trait;
use serde_json::Value;
use spire_rl_core::{Command, Result};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Lines buffered between the reader task and the control loop
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Trait for async reading of newline-delimited text
#[async_trait]
pub trait AsyncLineReader: Send {
    /// Read one line without its terminator; `Ok(None)` at end of stream
    async fn read_line(&mut self) -> Result<Option<String>>;
}

/// Trait for async writing of newline-delimited text
#[async_trait]
pub trait AsyncLineWriter: Send {
    /// Write one line, append the terminator and flush
    async fn write_line(&mut self, line: &str) -> Result<()>;
}

/// Background reader task feeding the line queue
///
/// Blank lines are skipped. A full queue blocks this task (and, through the
/// pipe, the game's writer) instead of dropping lines. Garbled bytes reach the
/// queue as a lossy line for the decoder to drop. The task ends on end of
/// stream, on an I/O error, or when the queue's receiver is gone.
pub async fn reader_task<R: AsyncLineReader>(mut reader: R, line_tx: mpsc::Sender<String>) {
    loop {
        match reader.read_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                let preview: String = line.chars().take(200).collect();
                debug!("[Game→Rust] len={} json={}", line.len(), preview);

                if line_tx.send(line).await.is_err() {
                    debug!("Line queue dropped, reader task exiting");
                    break;
                }
            }
            Ok(None) => {
                info!("Game output closed, reader task exiting");
                break;
            }
            Err(e) => {
                error!("Reader task failed: {}", e);
                break;
            }
        }
    }
}

/// Line exchange with the game process
pub struct Transport {
    writer: Box<dyn AsyncLineWriter>,
    line_rx: mpsc::Receiver<String>,
    closed: bool,
    reader_handle: JoinHandle<()>,
}

impl Transport {
    /// Spawn the reader task over `reader` and wrap `writer` for outbound commands
    pub fn new<R, W>(reader: R, writer: W, capacity: usize) -> Self
    where
        R: AsyncLineReader + 'static,
        W: AsyncLineWriter + 'static,
    {
        let (line_tx, line_rx) = mpsc::channel(capacity.max(1));
        let reader_handle = tokio::spawn(reader_task(reader, line_tx));
        Self {
            writer: Box::new(writer),
            line_rx,
            closed: false,
            reader_handle,
        }
    }

    /// Write one command line; failures are logged and swallowed
    pub async fn send(&mut self, command: &Command) {
        let line = command.to_string();
        if !command.is_refresh() {
            info!("[Rust→Game] {}", line);
        }
        if let Err(e) = self.writer.write_line(&line).await {
            warn!("Failed to send {:?}: {}", line, e);
        }
    }

    /// Pop one raw line.
    ///
    /// `None` or a zero timeout never waits; otherwise waits up to `timeout`.
    pub async fn receive_line(&mut self, timeout: Option<Duration>) -> Option<String> {
        match timeout {
            Some(limit) if !limit.is_zero() => {
                match tokio::time::timeout(limit, self.line_rx.recv()).await {
                    Ok(Some(line)) => Some(line),
                    Ok(None) => {
                        self.mark_closed();
                        None
                    }
                    Err(_) => None,
                }
            }
            _ => match self.line_rx.try_recv() {
                Ok(line) => Some(line),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    self.mark_closed();
                    None
                }
            },
        }
    }

    /// Pop one line and parse it; malformed lines read as `None`
    pub async fn receive(&mut self, timeout: Option<Duration>) -> Option<Value> {
        let line = self.receive_line(timeout).await?;
        decode_line(&line)
    }

    /// Reader task has ended and every queued line has been consumed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn mark_closed(&mut self) {
        if !self.closed {
            warn!("Game input stream closed, no further state will arrive");
            self.closed = true;
        }
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}
