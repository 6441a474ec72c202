//! Line transports over byte streams
//!
//! The game runs the engine as a child process and talks over the engine's
//! own stdin/stdout; for local runs the engine can instead spawn the game
//! command itself and use the child's pipes.

use crate::transport::{AsyncLineReader, AsyncLineWriter, Transport};
use async_trait::async_trait;
use spire_rl_core::{Result, SpireError};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command as ProcessCommand};
use tracing::info;

/// Buffered line reader over any async byte stream
pub struct LineReadWrapper<R>(pub BufReader<R>);

impl<R: AsyncRead + Unpin> LineReadWrapper<R> {
    pub fn new(inner: R) -> Self {
        Self(BufReader::new(inner))
    }
}

#[async_trait]
impl<R> AsyncLineReader for LineReadWrapper<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Bytes that are not valid UTF-8 are replaced rather than failing the
    /// read, so a garbled line is dropped by the decoder and the stream lives on.
    async fn read_line(&mut self) -> Result<Option<String>> {
        let mut buf = Vec::new();
        let read = self
            .0
            .read_until(b'\n', &mut buf)
            .await
            .map_err(|e| SpireError::IpcError(format!("Line read failed: {}", e)))?;
        if read == 0 {
            return Ok(None);
        }
        let mut line = String::from_utf8_lossy(&buf).into_owned();
        let len = line.trim_end_matches(['\r', '\n']).len();
        line.truncate(len);
        Ok(Some(line))
    }
}

/// Line writer over any async byte sink; flushes after every line
pub struct LineWriteWrapper<W>(pub W);

#[async_trait]
impl<W> AsyncLineWriter for LineWriteWrapper<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.0
            .write_all(line.as_bytes())
            .await
            .map_err(|e| SpireError::IpcError(format!("Line write failed: {}", e)))?;
        self.0
            .write_all(b"\n")
            .await
            .map_err(|e| SpireError::IpcError(format!("Line write failed: {}", e)))?;
        self.0
            .flush()
            .await
            .map_err(|e| SpireError::IpcError(format!("Flush failed: {}", e)))?;
        Ok(())
    }
}

/// Transport over this process's own stdin/stdout
pub fn stdio_transport(capacity: usize) -> Transport {
    Transport::new(
        LineReadWrapper::new(tokio::io::stdin()),
        LineWriteWrapper(tokio::io::stdout()),
        capacity,
    )
}

/// Spawn `program` with piped stdio and attach a transport to it.
///
/// The child is killed when the returned handle is dropped.
pub fn spawn_game(program: &str, args: &[String], capacity: usize) -> Result<(Transport, Child)> {
    let mut child = ProcessCommand::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| SpireError::IpcError(format!("Failed to spawn {}: {}", program, e)))?;

    let stdin = child
        .stdin
        .take()
        .ok_or_else(|| SpireError::IpcError("Child stdin was not captured".into()))?;
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| SpireError::IpcError("Child stdout was not captured".into()))?;

    info!("Spawned game process {} (pid {:?})", program, child.id());
    let transport = Transport::new(LineReadWrapper::new(stdout), LineWriteWrapper(stdin), capacity);
    Ok((transport, child))
}
