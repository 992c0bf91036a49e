//! Queued track

use voxresolve::{Resolution, SourceRef};

use crate::types::UserId;

/// One queued track.
///
/// Immutable once built; a fresh instance is created per enqueue (the same
/// reference requested twice yields two tracks). Owned by the queue slot
/// holding it until played or dropped.
#[derive(Debug, Clone)]
pub struct Track {
    pub title: String,
    pub source: SourceRef,
    /// Resolved audio-source URL. `None` only for tracks built before
    /// resolution, which the source factory will refuse to materialize.
    pub url: Option<String>,
    pub duration_secs: u64,
    pub requested_by: UserId,
}

impl Track {
    pub fn new(
        title: impl Into<String>,
        source: SourceRef,
        url: Option<String>,
        duration_secs: u64,
        requested_by: UserId,
    ) -> Self {
        Self {
            title: title.into(),
            source,
            url,
            duration_secs,
            requested_by,
        }
    }

    /// Build a track from a completed resolution.
    pub fn from_resolution(
        resolution: Resolution,
        source: SourceRef,
        duration_secs: u64,
        requested_by: UserId,
    ) -> Self {
        Self {
            title: resolution.title,
            source,
            url: Some(resolution.url),
            duration_secs,
            requested_by,
        }
    }

    /// Title for notices; falls back to the raw reference when the
    /// resolution carried no title (direct audio links).
    pub fn display_title(&self) -> &str {
        if self.title.is_empty() {
            &self.source.raw
        } else {
            &self.title
        }
    }
}
