//! Playback engine configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which part of the queue a shuffle reorders.
///
/// The two policies are deliberately distinct (not silently unified): the
/// pre-playback call sites historically shuffled everything while the
/// mid-playback control kept the playing head in place. The embedder picks
/// one and it applies uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShufflePolicy {
    /// Shuffle every track, including the one currently playing.
    WholeQueue,
    /// Keep the playing head in place and shuffle the rest. Before playback
    /// starts this is equivalent to `WholeQueue`.
    KeepHead,
}

/// Engine tuning, one instance shared by every session.
///
/// All fields have serde defaults so a partial config file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Tracks played between two sponsor announcements.
    pub ad_interval: u32,

    /// Seconds an idle (stopped or drained) session lingers before the
    /// transport is released; a new enqueue within the window cancels it.
    pub stop_grace_secs: u64,

    /// Bounded reconnection: attempts before the connection is destroyed.
    pub reconnect_max_attempts: u32,

    /// Linear backoff step between reconnection attempts, in seconds
    /// (attempt n waits n × step).
    pub reconnect_backoff_step_secs: u64,

    /// Wall-clock bound on waiting for a rejoined transport to become ready.
    pub ready_timeout_secs: u64,

    /// Shuffle behavior for the `Shuffle` control.
    pub shuffle_policy: ShufflePolicy,

    /// Initial volume of a fresh session, 0-100.
    pub default_volume: u8,

    /// Volume change applied by the VolumeUp/VolumeDown controls.
    pub volume_step: u8,

    /// A track counts as "played" when at least this percentage of its
    /// duration elapsed before completion; below it the track is "skipped".
    pub played_ratio_percent: u8,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            ad_interval: 5,
            stop_grace_secs: 30,
            reconnect_max_attempts: 5,
            reconnect_backoff_step_secs: 2,
            ready_timeout_secs: 10,
            shuffle_policy: ShufflePolicy::KeepHead,
            default_volume: 100,
            volume_step: 10,
            played_ratio_percent: 50,
        }
    }
}

impl PlaybackConfig {
    pub fn stop_grace(&self) -> Duration {
        Duration::from_secs(self.stop_grace_secs)
    }

    pub fn reconnect_backoff_step(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_step_secs)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }
}
