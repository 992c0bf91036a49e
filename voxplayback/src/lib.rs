//! # voxplayback - Per-room playback engine
//!
//! The playback core of the VoxRoom bot:
//!
//! - **Session** : per-room state machine (`Idle → Buffering → Playing`)
//!   driving start/stop/advance over a queue of resolved tracks
//! - **SessionRegistry** : one session per room, process-wide
//! - **ConnectionSupervisor** : bounded reconnection with linear backoff
//! - **SourceFactory** : stream materialization with secondary-provider
//!   fallback
//! - **AdvertisementScheduler** : sponsor announcements between tracks,
//!   never visible in the queue
//!
//! The voice transport, audio player, statistics store, advertisement
//! catalog and notification surface are external collaborators consumed
//! through traits; this crate reimplements none of them.
//!
//! Concurrency model: event-driven, no parallel mutation. Each session's
//! advancement is serialized by an explicit lock, and the session is the
//! sole mutator of its own state.

mod ads;
mod config;
mod control;
mod error;
mod notify;
mod queue;
mod registry;
mod session;
mod source;
mod stats;
mod supervisor;
mod track;
mod transport;
mod types;

pub use ads::{AdCatalog, Announcement, AdvertisementScheduler, NoAds};
pub use config::{PlaybackConfig, ShufflePolicy};
pub use control::Control;
pub use error::{Error, Result};
pub use notify::{Notice, Notifier};
pub use queue::PlaybackQueue;
pub use registry::SessionRegistry;
pub use session::{PlaybackState, Session, SessionDeps};
pub use source::{AudioStream, SourceFactory, StreamProvider};
pub use stats::{report_listening, report_played, report_skipped, NullStats, StatsSink};
pub use track::Track;
pub use transport::{
    AudioPlayer, ConnectionEvent, DisconnectCause, PlayerEvent, VoiceConnection, VoiceTransport,
};
pub use types::{RoomId, UserId};

// `StatsSink` exposes it in its signatures.
pub use voxresolve::Platform;
