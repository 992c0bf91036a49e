//! # voxpresence - Voice room occupancy monitoring
//!
//! Tracks who is in a voice room, accumulates per-user listening time, and
//! tears the room's playback session down after a grace period once the
//! last human leaves. Bots never count as occupants.
//!
//! Membership events come from the chat platform through [`RoomMembership`]
//! and [`PresenceEvent`]; a periodic heartbeat reconciles against the live
//! member list so missed events cannot wedge a room.

mod monitor;

pub use monitor::{
    PresenceConfig, PresenceEvent, RoomMembership, SessionStopper, VoicePresenceMonitor,
};
