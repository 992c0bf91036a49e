//! Voice transport and player seams
//!
//! The transport capability (joining a room, the live connection, audio
//! encoding) is consumed, never reimplemented: the engine only drives these
//! traits and reacts to the events they emit.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;
use crate::source::AudioStream;
use crate::types::RoomId;

/// Why a connection dropped; decides between rejoin and teardown.
#[derive(Debug, Clone)]
pub enum DisconnectCause {
    /// Rejoining is pointless (e.g. the bot was forcibly removed from the
    /// room). The session stops immediately.
    Fatal(String),
    /// Transient network trouble; the supervisor rejoins with backoff.
    Transient(String),
}

/// Lifecycle events emitted by a live connection.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Signalling finished, audio can flow.
    Ready,
    Disconnected { cause: DisconnectCause },
}

/// Events emitted by the audio player.
#[derive(Debug, Clone)]
pub enum PlayerEvent {
    /// The current stream ran to its end.
    Finished,
    /// The player gave up on the current stream.
    Errored(String),
}

/// A live voice connection for one room.
#[async_trait]
pub trait VoiceConnection: Send + Sync {
    /// Subscribe to lifecycle events. Every subscriber sees every event.
    fn events(&self) -> broadcast::Receiver<ConnectionEvent>;

    /// The player bound to this room. The handle stays valid across
    /// transparent rejoins of the same room; sessions hold it for their
    /// whole lifetime.
    fn player(&self) -> Arc<dyn AudioPlayer>;

    /// Release the transport. Idempotent.
    async fn destroy(&self) -> Result<()>;
}

/// Entry point into the voice capability.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn join(&self, room: RoomId) -> Result<Arc<dyn VoiceConnection>>;
}

/// Playback control surface over the transport's audio pipeline.
///
/// `stop` must *not* emit [`PlayerEvent::Finished`]: the engine calls it when
/// it is already advancing (manual skip, forced stop) and a synthetic
/// completion event would race the advancement lock.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self, stream: AudioStream) -> Result<()>;
    async fn pause(&self) -> Result<()>;
    async fn resume(&self) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    /// Volume in 0-100.
    async fn set_volume(&self, volume: u8) -> Result<()>;
    async fn set_muted(&self, muted: bool) -> Result<()>;
    fn events(&self) -> broadcast::Receiver<PlayerEvent>;
}
