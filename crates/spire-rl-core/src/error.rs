//! Error types for the Spire engine

use thiserror::Error;

/// Result type for Spire engine operations
pub type Result<T> = std::result::Result<T, SpireError>;

/// Spire engine error types
///
/// Transient unavailability and per-step stalls are recovered locally and never
/// show up here. Only the reset path surfaces `Stalled` and `ProcessGone`.
#[derive(Debug, Error)]
pub enum SpireError {
    /// IPC communication error
    #[error("IPC error: {0}")]
    IpcError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Protocol error
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The game never reached a tractable screen within the reset ceiling
    #[error("Game stalled: {0}")]
    Stalled(String),

    /// The game process closed its output stream
    #[error("Game process gone: {0}")]
    ProcessGone(String),

    /// Episode already terminated (or never started)
    #[error("Episode terminated, call reset")]
    EpisodeTerminated,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<serde_json::Error> for SpireError {
    fn from(err: serde_json::Error) -> Self {
        SpireError::SerializationError(err.to_string())
    }
}
