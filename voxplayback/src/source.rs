//! Audio source materialization with secondary-provider fallback

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::error::Result;
use crate::track::Track;

/// A streamable resource ready to hand to the player.
///
/// Opaque to the engine beyond its labels; the provider that produced it and
/// the player consuming it agree on what `handle` means (a process stdout, a
/// remux URL, a file path...).
#[derive(Debug, Clone)]
pub struct AudioStream {
    /// The URL this stream was opened from.
    pub url: String,
    /// Provider-specific handle.
    pub handle: String,
}

/// Opens streamable resources from audio-platform URLs.
#[async_trait]
pub trait StreamProvider: Send + Sync {
    /// Open a stream from a full audio-platform URL.
    async fn open(&self, url: &str) -> Result<AudioStream>;

    /// Open an equivalent stream from a platform-native identifier (the
    /// video/track id embedded in the URL). Used by secondary providers
    /// that address content by id rather than by URL.
    async fn open_native(&self, native_id: &str) -> Result<AudioStream>;
}

/// Materializes tracks, falling back to a secondary provider when the
/// primary extraction fails.
pub struct SourceFactory {
    primary: Arc<dyn StreamProvider>,
    secondary: Option<Arc<dyn StreamProvider>>,
}

impl SourceFactory {
    pub fn new(primary: Arc<dyn StreamProvider>) -> Self {
        Self {
            primary,
            secondary: None,
        }
    }

    pub fn with_secondary(mut self, secondary: Arc<dyn StreamProvider>) -> Self {
        self.secondary = Some(secondary);
        self
    }

    /// Produce a streamable resource for a track.
    ///
    /// `None` means both providers failed (or the track carries no resolved
    /// URL); the caller must treat the track as "skip".
    pub async fn materialize(&self, track: &Track) -> Option<AudioStream> {
        let url = track.url.as_deref()?;

        match self.primary.open(url).await {
            Ok(stream) => {
                debug!(title = track.display_title(), url, "primary stream opened");
                return Some(stream);
            }
            Err(e) => {
                warn!(
                    title = track.display_title(),
                    url,
                    error = %e,
                    "primary extraction failed"
                );
            }
        }

        let secondary = self.secondary.as_ref()?;
        let native_id = native_id_from_url(url)?;
        match secondary.open_native(&native_id).await {
            Ok(stream) => {
                debug!(
                    title = track.display_title(),
                    native_id, "secondary stream opened"
                );
                Some(stream)
            }
            Err(e) => {
                warn!(
                    title = track.display_title(),
                    native_id,
                    error = %e,
                    "secondary extraction failed"
                );
                None
            }
        }
    }

    /// Open a bare URL (announcement audio) through the primary provider.
    pub async fn open_url(&self, url: &str) -> Option<AudioStream> {
        match self.primary.open(url).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!(url, error = %e, "announcement stream failed to open");
                None
            }
        }
    }
}

/// Re-derive the platform-native identifier from an audio-platform URL:
/// the `v` query parameter, or the path tail for short-link hosts.
fn native_id_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;

    if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k == "v") {
        return Some(v.into_owned());
    }

    let host = parsed.host_str()?;
    if host.eq_ignore_ascii_case("youtu.be") {
        let id = parsed.path().trim_start_matches('/');
        if !id.is_empty() {
            return Some(id.to_string());
        }
    }
    None
}
