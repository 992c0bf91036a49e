//! Source references and their canonical form
//!
//! A reference is whatever the user handed us: an audio-platform link, a
//! storefront link (Spotify, Apple Music, Deezer) or free text to search for.
//! The canonical form is the cache key: host and scheme lowercased, tracking
//! query parameters and fragments dropped, so the same track shared from two
//! devices lands on the same cache entry.

use url::Url;
use voxcache::Platform;

/// Query parameters that vary per share without changing the track.
const TRACKING_PARAMS: &[&str] = &["si", "feature", "context", "nd", "app"];

/// A parsed user-supplied track reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    /// The reference exactly as supplied.
    pub raw: String,
    /// Origin platform detected from the host.
    pub platform: Platform,
    /// Normalized form used as the cache key.
    pub canonical: String,
}

impl SourceRef {
    /// Parse a reference, detecting its platform and computing the cache key.
    ///
    /// Non-URL input is treated as free text (`Platform::Unknown`) and
    /// canonicalized by trimming and lowercasing.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();

        let Ok(url) = Url::parse(raw) else {
            return Self {
                raw: raw.to_string(),
                platform: Platform::Unknown,
                canonical: raw.to_lowercase(),
            };
        };

        if !matches!(url.scheme(), "http" | "https") {
            return Self {
                raw: raw.to_string(),
                platform: Platform::Unknown,
                canonical: raw.to_lowercase(),
            };
        }

        let platform = platform_for_host(url.host_str().unwrap_or_default());
        let canonical = canonicalize(&url);

        Self {
            raw: raw.to_string(),
            platform,
            canonical,
        }
    }

    /// True when the reference already points at the audio platform and can
    /// be handed to the player without any resolution work.
    pub fn is_direct_audio_link(&self) -> bool {
        self.platform == Platform::Audio
    }
}

impl std::fmt::Display for SourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn platform_for_host(host: &str) -> Platform {
    let host = host.to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    match host {
        "youtube.com" | "m.youtube.com" | "youtu.be" | "music.youtube.com" => Platform::Audio,
        "open.spotify.com" | "spotify.com" | "play.spotify.com" => Platform::Spotify,
        "music.apple.com" | "itunes.apple.com" => Platform::AppleMusic,
        "deezer.com" | "deezer.page.link" => Platform::Deezer,
        _ => Platform::Unknown,
    }
}

fn canonicalize(url: &Url) -> String {
    let mut normalized = url.clone();
    normalized.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !is_tracking_param(k))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    if kept.is_empty() {
        normalized.set_query(None);
    } else {
        let mut pairs = normalized.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
    }

    let mut out = normalized.to_string();
    // Url keeps a lone trailing slash on path-less links; drop it for key
    // stability between "https://x.com" and "https://x.com/".
    if out.ends_with('/') {
        out.pop();
    }
    out
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_audio_platform_hosts() {
        for raw in [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://music.youtube.com/watch?v=abc",
        ] {
            assert!(SourceRef::parse(raw).is_direct_audio_link(), "{raw}");
        }
    }

    #[test]
    fn detects_storefront_platforms() {
        assert_eq!(
            SourceRef::parse("https://open.spotify.com/track/4uLU6hMCjMI").platform,
            Platform::Spotify
        );
        assert_eq!(
            SourceRef::parse("https://music.apple.com/us/album/x/14408?i=144").platform,
            Platform::AppleMusic
        );
        assert_eq!(
            SourceRef::parse("https://www.deezer.com/track/3135556").platform,
            Platform::Deezer
        );
    }

    #[test]
    fn free_text_is_unknown_platform() {
        let r = SourceRef::parse("  Never Gonna Give You Up  ");
        assert_eq!(r.platform, Platform::Unknown);
        assert_eq!(r.canonical, "never gonna give you up");
    }

    #[test]
    fn canonical_form_drops_tracking_params_and_fragment() {
        let a = SourceRef::parse(
            "https://open.spotify.com/track/4uLU6hMCjMI?si=abc123&utm_source=share#frag",
        );
        let b = SourceRef::parse("https://open.spotify.com/track/4uLU6hMCjMI");
        assert_eq!(a.canonical, b.canonical);
    }

    #[test]
    fn canonical_form_keeps_meaningful_params() {
        let r = SourceRef::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ&si=xyz");
        assert!(r.canonical.contains("v=dQw4w9WgXcQ"));
        assert!(!r.canonical.contains("si="));
    }

    #[test]
    fn host_case_does_not_split_cache_keys() {
        let a = SourceRef::parse("https://OPEN.SPOTIFY.COM/track/abc");
        let b = SourceRef::parse("https://open.spotify.com/track/abc");
        assert_eq!(a.canonical, b.canonical);
        assert_eq!(a.platform, Platform::Spotify);
    }
}
