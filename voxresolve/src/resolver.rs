//! TrackResolver: reference → playable audio-source URL
//!
//! The fallback chain, in order:
//! 1. direct audio-platform links pass through untouched
//! 2. cache hit on the canonical reference short-circuits (including cached
//!    "no result" entries, which fail fast without any external call)
//! 3. storefront metadata lookup + audio-platform search, top match wins
//! 4. throttled aggregation-service fallback
//!
//! Every definitive outcome, hit or miss, is written back to the cache so a
//! reference is resolved externally at most once.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use voxcache::{Platform, ResolutionCache, ResolvedEntry};

use crate::error::{Error, Result};
use crate::reference::SourceRef;
use crate::throttle::RequestThrottle;

/// Title + primary artist extracted from a storefront page or API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
}

/// Extracts title/artist from a storefront reference.
///
/// Implementations own the per-platform scraping or API details; `Ok(None)`
/// means the platform is unsupported or the page carried no usable metadata.
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn lookup(&self, source: &SourceRef) -> Result<Option<TrackMetadata>>;
}

/// Searches the audio platform for a track; returns the top match URL.
#[async_trait]
pub trait AudioSearch: Send + Sync {
    async fn search(&self, title: &str, artist: &str) -> Result<Option<String>>;
}

/// Third-party service mapping a reference on one platform to equivalent
/// links on others. Calls must only happen under a [`RequestThrottle`] permit.
#[async_trait]
pub trait AggregationService: Send + Sync {
    async fn equivalent_audio_link(&self, source: &SourceRef) -> Result<Option<String>>;
}

/// A successful resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub url: String,
    pub title: String,
    pub artist: String,
    pub platform: Platform,
}

impl Resolution {
    fn from_entry(entry: &ResolvedEntry, url: String) -> Self {
        Self {
            url,
            title: entry.title.clone(),
            artist: entry.artist.clone(),
            platform: entry.platform,
        }
    }
}

/// Resolves arbitrary references into playable audio-source URLs.
#[derive(Clone)]
pub struct TrackResolver {
    cache: ResolutionCache,
    throttle: Arc<RequestThrottle>,
    metadata: Arc<dyn MetadataProvider>,
    search: Arc<dyn AudioSearch>,
    aggregator: Arc<dyn AggregationService>,
}

impl TrackResolver {
    pub fn new(
        cache: ResolutionCache,
        throttle: Arc<RequestThrottle>,
        metadata: Arc<dyn MetadataProvider>,
        search: Arc<dyn AudioSearch>,
        aggregator: Arc<dyn AggregationService>,
    ) -> Self {
        Self {
            cache,
            throttle,
            metadata,
            search,
            aggregator,
        }
    }

    /// Resolve a reference to a playable URL.
    ///
    /// `Error::NoResult` means the whole chain ran dry; callers skip the
    /// track and notify the requester. Transient failures (network, quota)
    /// surface as their own variants and are *not* cached, so the reference
    /// gets another chance later.
    pub async fn resolve(&self, raw: &str) -> Result<Resolution> {
        let source = SourceRef::parse(raw);

        // 1. Already a direct audio-platform link.
        if source.is_direct_audio_link() {
            debug!(reference = %source, "direct audio link, no resolution needed");
            return Ok(Resolution {
                url: source.raw.clone(),
                title: String::new(),
                artist: String::new(),
                platform: Platform::Audio,
            });
        }

        // 2. Cache short-circuit, for hits and for recorded misses alike.
        if let Some(entry) = self.cache.get(&source.canonical).await {
            return match &entry.url {
                Some(url) => {
                    debug!(reference = %source, url, "resolved from cache");
                    Ok(Resolution::from_entry(&entry, url.clone()))
                }
                None => {
                    debug!(reference = %source, "cached no-result, failing fast");
                    Err(Error::NoResult(source.raw.clone()))
                }
            };
        }

        // 3. Storefront metadata + audio-platform search.
        let metadata = self.lookup_metadata(&source).await;
        if let Some(meta) = &metadata {
            if let Some(url) = self.search_audio(meta).await {
                self.store(&source, Some(meta), &url).await;
                info!(reference = %source, url, "resolved via metadata search");
                return Ok(Resolution {
                    url,
                    title: meta.title.clone(),
                    artist: meta.artist.clone(),
                    platform: source.platform,
                });
            }
        }

        // 4. Aggregation fallback, serialized behind the shared throttle.
        let mut permit = self.throttle.admit().await;
        match self.aggregator.equivalent_audio_link(&source).await {
            Ok(Some(url)) => {
                drop(permit);
                self.store(&source, metadata.as_ref(), &url).await;
                info!(reference = %source, url, "resolved via aggregation service");
                Ok(Resolution {
                    url,
                    title: metadata.as_ref().map(|m| m.title.clone()).unwrap_or_default(),
                    artist: metadata
                        .as_ref()
                        .map(|m| m.artist.clone())
                        .unwrap_or_default(),
                    platform: source.platform,
                })
            }
            Ok(None) => {
                drop(permit);
                // 5. Definitive miss: record it so steps 3-4 never re-run.
                if let Err(e) = self.cache.put_miss(&source.canonical, source.platform).await {
                    warn!(reference = %source, error = %e, "failed to cache no-result");
                }
                info!(reference = %source, "resolution exhausted, no result");
                Err(Error::NoResult(source.raw.clone()))
            }
            Err(Error::QuotaExhausted) => {
                permit.rate_limited();
                drop(permit);
                warn!(reference = %source, "aggregation quota exhausted, cooldown forced");
                Err(Error::QuotaExhausted)
            }
            Err(e) => {
                drop(permit);
                warn!(reference = %source, error = %e, "aggregation call failed");
                Err(e)
            }
        }
    }

    /// Metadata fetch with network failures downgraded to a miss so the
    /// chain falls through to the aggregation fallback.
    async fn lookup_metadata(&self, source: &SourceRef) -> Option<TrackMetadata> {
        match self.metadata.lookup(source).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(reference = %source, error = %e, "metadata lookup failed, treating as miss");
                None
            }
        }
    }

    async fn search_audio(&self, meta: &TrackMetadata) -> Option<String> {
        match self.search.search(&meta.title, &meta.artist).await {
            Ok(url) => url,
            Err(e) => {
                warn!(
                    title = meta.title,
                    error = %e,
                    "audio-platform search failed, treating as miss"
                );
                None
            }
        }
    }

    async fn store(&self, source: &SourceRef, meta: Option<&TrackMetadata>, url: &str) {
        let entry = ResolvedEntry::new(
            source.platform,
            meta.map(|m| m.title.as_str()).unwrap_or_default(),
            meta.map(|m| m.artist.as_str()).unwrap_or_default(),
            Some(url.to_string()),
        );
        if let Err(e) = self.cache.put(&source.canonical, entry).await {
            warn!(reference = %source, error = %e, "failed to persist resolution");
        }
    }
}
