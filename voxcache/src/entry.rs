//! Cache entry and platform tag types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Origin platform of a track reference.
///
/// `Audio` is the platform audio is ultimately streamed from; the storefront
/// variants only ever appear as the *origin* of a reference that still needs
/// resolving. `Unknown` covers free-text references (search terms).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Audio,
    Spotify,
    AppleMusic,
    Deezer,
    Unknown,
}

impl Platform {
    /// Short tag used in statistics reporting and log fields.
    pub fn tag(&self) -> &'static str {
        match self {
            Platform::Audio => "audio",
            Platform::Spotify => "spotify",
            Platform::AppleMusic => "apple_music",
            Platform::Deezer => "deezer",
            Platform::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// One resolved (or definitively unresolved) reference.
///
/// `url: None` is a valid cached "no result": the full resolution chain ran
/// and found nothing, and repeated lookups must not re-trigger external
/// calls. Entries carry no TTL; a cached miss stays a miss until something
/// overwrites it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedEntry {
    pub platform: Platform,
    pub title: String,
    pub artist: String,
    pub url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ResolvedEntry {
    pub fn new(
        platform: Platform,
        title: impl Into<String>,
        artist: impl Into<String>,
        url: Option<String>,
    ) -> Self {
        Self {
            platform,
            title: title.into(),
            artist: artist.into(),
            url,
            updated_at: Utc::now(),
        }
    }

    /// A cached "no result" for a reference the chain could not resolve.
    pub fn miss(platform: Platform) -> Self {
        Self::new(platform, "", "", None)
    }

    /// True when this entry records a definitive failure to resolve.
    pub fn is_miss(&self) -> bool {
        self.url.is_none()
    }
}
