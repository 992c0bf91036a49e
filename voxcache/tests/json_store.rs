use std::sync::Arc;

use voxcache::{JsonFileStore, Platform, ResolutionCache, ResolvedEntry};

#[tokio::test]
async fn missing_file_loads_as_empty_cache() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let store = Arc::new(JsonFileStore::new(dir.path().join("resolution.json")));
    let cache = ResolutionCache::new(store);

    assert!(cache.is_empty().await);
    assert!(cache.get("anything").await.is_none());
    Ok(())
}

#[tokio::test]
async fn entries_survive_a_reopen() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("resolution.json");

    {
        let cache = ResolutionCache::new(Arc::new(JsonFileStore::new(&path)));
        cache
            .put(
                "apple_music:song:1440857781",
                ResolvedEntry::new(
                    Platform::AppleMusic,
                    "Song X",
                    "Artist Y",
                    Some("https://audio.example/watch?v=xyz".into()),
                ),
            )
            .await?;
        cache
            .put_miss("spotify:track:gone", Platform::Spotify)
            .await?;
    }

    let reopened = ResolutionCache::new(Arc::new(JsonFileStore::new(&path)));
    assert_eq!(reopened.len().await, 2);

    let hit = reopened
        .get("apple_music:song:1440857781")
        .await
        .expect("entry");
    assert_eq!(hit.title, "Song X");
    assert_eq!(hit.url.as_deref(), Some("https://audio.example/watch?v=xyz"));

    let miss = reopened.get("spotify:track:gone").await.expect("entry");
    assert!(miss.is_miss());
    Ok(())
}

#[tokio::test]
async fn parent_directory_is_created_on_first_save() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested/deeper/resolution.json");

    let cache = ResolutionCache::new(Arc::new(JsonFileStore::new(&path)));
    cache.put_miss("k", Platform::Unknown).await?;

    assert!(path.exists());
    Ok(())
}
