//! Error types for voxplayback

use crate::types::RoomId;

/// Errors raised by the playback engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Player error: {0}")]
    Player(String),

    #[error("No playable stream for track: {0}")]
    Stream(String),

    #[error("Session for {0} is already shutting down")]
    SessionDestroyed(RoomId),

    #[error("No active session for {0}")]
    NoSession(RoomId),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Specialized Result type for voxplayback
pub type Result<T> = std::result::Result<T, Error>;
