//! # voxcache - Durable track-resolution cache
//!
//! Maps a canonical track reference to its previously resolved metadata and,
//! when known, a directly playable audio-source URL. An entry with no URL is
//! a valid cached "no result": resolution ran the full fallback chain and
//! found nothing, and must not run it again for that reference.
//!
//! Two backends are provided:
//! - [`JsonFileStore`] : whole-file read/overwrite of a JSON map
//! - [`MemoryStore`] : in-process map for tests and ephemeral runs
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use voxcache::{JsonFileStore, Platform, ResolvedEntry, ResolutionCache};
//!
//! # #[tokio::main]
//! # async fn main() -> voxcache::Result<()> {
//! let store = Arc::new(JsonFileStore::new("/var/lib/voxroom/resolution.json"));
//! let cache = ResolutionCache::new(store);
//!
//! cache.put(
//!     "spotify:track:4uLU6hMCjMI75M1A2tKUQC",
//!     ResolvedEntry::new(
//!         Platform::Spotify,
//!         "Never Gonna Give You Up",
//!         "Rick Astley",
//!         Some("https://audio.example/watch?v=dQw4w9WgXcQ".into()),
//!     ),
//! ).await?;
//! # Ok(())
//! # }
//! ```

mod cache;
mod entry;
mod error;
mod store;

pub use cache::ResolutionCache;
pub use entry::{Platform, ResolvedEntry};
pub use error::{Error, Result};
pub use store::{CacheBackend, JsonFileStore, MemoryStore};
