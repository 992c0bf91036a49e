//! ResolutionCache: reference → resolved-metadata map over a backend

use std::sync::Arc;

use tracing::{debug, warn};

use crate::entry::{Platform, ResolvedEntry};
use crate::error::Result;
use crate::store::CacheBackend;

/// Durable map from canonical reference to resolution outcome.
///
/// Every mutation is a wholesale load-modify-save of the backing store.
/// There is no cross-call locking: concurrent writers for *distinct* keys can
/// race and the last write wins, which loses at most the other writer's entry
/// (it will simply be re-resolved next time). Writers for the *same* key
/// racing would also be last-write-wins; both would have written equivalent
/// data, so no correctness issue arises.
#[derive(Clone)]
pub struct ResolutionCache {
    backend: Arc<dyn CacheBackend>,
}

impl ResolutionCache {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Look up a canonical reference.
    ///
    /// Backend failures are logged and reported as a cache miss: a broken
    /// cache must never block resolution.
    pub async fn get(&self, canonical: &str) -> Option<ResolvedEntry> {
        match self.backend.load().await {
            Ok(map) => {
                let hit = map.get(canonical).cloned();
                debug!(key = canonical, hit = hit.is_some(), "cache lookup");
                hit
            }
            Err(e) => {
                warn!(key = canonical, error = %e, "cache load failed, treating as miss");
                None
            }
        }
    }

    /// Record a resolution outcome for a canonical reference.
    pub async fn put(&self, canonical: &str, entry: ResolvedEntry) -> Result<()> {
        let mut map = self.backend.load().await?;
        map.insert(canonical.to_string(), entry);
        self.backend.save(&map).await
    }

    /// Record a definitive "no result" so the chain is never re-run for this key.
    pub async fn put_miss(&self, canonical: &str, platform: Platform) -> Result<()> {
        self.put(canonical, ResolvedEntry::miss(platform)).await
    }

    /// Number of entries currently stored (misses included).
    pub async fn len(&self) -> usize {
        self.backend.load().await.map(|m| m.len()).unwrap_or(0)
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn cache() -> ResolutionCache {
        ResolutionCache::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn get_on_empty_cache_is_none() {
        assert!(cache().get("spotify:track:abc").await.is_none());
    }

    #[tokio::test]
    async fn put_then_get_round_trips() -> anyhow::Result<()> {
        let cache = cache();
        let entry = ResolvedEntry::new(
            Platform::Spotify,
            "Song X",
            "Artist Y",
            Some("https://audio.example/watch?v=123".into()),
        );
        cache.put("spotify:track:abc", entry.clone()).await?;

        let got = cache.get("spotify:track:abc").await.expect("entry");
        assert_eq!(got, entry);
        assert!(!got.is_miss());
        Ok(())
    }

    #[tokio::test]
    async fn cached_miss_is_a_valid_entry() -> anyhow::Result<()> {
        let cache = cache();
        cache.put_miss("deezer:track:42", Platform::Deezer).await?;

        let got = cache.get("deezer:track:42").await.expect("entry");
        assert!(got.is_miss());
        assert_eq!(got.platform, Platform::Deezer);
        Ok(())
    }

    #[tokio::test]
    async fn overwrite_replaces_previous_entry() -> anyhow::Result<()> {
        let cache = cache();
        cache.put_miss("k", Platform::Unknown).await?;
        cache
            .put(
                "k",
                ResolvedEntry::new(Platform::Unknown, "T", "A", Some("u".into())),
            )
            .await?;

        assert!(!cache.get("k").await.expect("entry").is_miss());
        assert_eq!(cache.len().await, 1);
        Ok(())
    }
}
