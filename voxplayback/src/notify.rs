//! Notification surface seam
//!
//! The engine describes *what* happened; rendering (embeds, localization,
//! buttons) is the embedder's business.

use async_trait::async_trait;

use crate::control::Control;
use crate::types::{RoomId, UserId};

/// User-facing playback notices.
#[derive(Debug, Clone)]
pub enum Notice {
    /// A track started; `controls` is the fixed interactive set.
    NowPlaying {
        title: String,
        requested_by: UserId,
        duration_secs: u64,
        controls: &'static [Control],
    },
    /// The queue drained; the session lingers for the grace period.
    QueueEnded,
    /// A track was dropped (resolution, stream or player failure).
    TrackError { title: String, reason: String },
    /// Visual part of a sponsor announcement.
    Announcement(String),
    /// No humans left; teardown in `seconds` unless someone returns.
    DisconnectCountdown { seconds: u64 },
    /// Torn down because the queue stayed empty through the grace period.
    LeftInactive,
    /// Torn down because the room stayed empty through the grace period.
    LeftEmpty,
}

/// Delivers notices to the room's reply channel.
///
/// Failures are the embedder's to log; the engine ignores them beyond a
/// warning, a lost message must never stall playback.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, room: RoomId, notice: Notice) -> anyhow::Result<()>;
}
