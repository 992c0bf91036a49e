//! # voxresolve - Track resolution pipeline
//!
//! Turns arbitrary user-supplied references (audio-platform links, storefront
//! links, free text) into directly playable audio-source URLs:
//!
//! - **SourceRef** : platform detection + canonical cache key
//! - **TrackResolver** : the fallback chain (direct link → cache → metadata
//!   search → aggregation service)
//! - **RequestThrottle** : process-wide FIFO gate + cooldown in front of the
//!   aggregation quota
//! - **LinkAggregator** : reqwest client for the aggregation API
//!
//! Per-platform metadata extraction and audio-platform search plug in through
//! the [`MetadataProvider`] and [`AudioSearch`] traits; the resolver only
//! owns the protocol between them.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use voxcache::{MemoryStore, ResolutionCache};
//! use voxresolve::{LinkAggregator, RequestThrottle, TrackResolver};
//! # use voxresolve::{AudioSearch, MetadataProvider};
//!
//! # async fn example(
//! #     metadata: Arc<dyn MetadataProvider>,
//! #     search: Arc<dyn AudioSearch>,
//! # ) -> voxresolve::Result<()> {
//! let resolver = TrackResolver::new(
//!     ResolutionCache::new(Arc::new(MemoryStore::new())),
//!     Arc::new(RequestThrottle::default()),
//!     metadata,
//!     search,
//!     Arc::new(LinkAggregator::new()?),
//! );
//!
//! let resolution = resolver
//!     .resolve("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC")
//!     .await?;
//! println!("playable: {}", resolution.url);
//! # Ok(())
//! # }
//! ```

mod aggregator;
mod error;
mod reference;
mod resolver;
mod throttle;

pub use aggregator::{LinkAggregator, LinkAggregatorBuilder, DEFAULT_BASE_URL};
pub use error::{Error, Result};
pub use reference::SourceRef;
pub use resolver::{
    AggregationService, AudioSearch, MetadataProvider, Resolution, TrackMetadata, TrackResolver,
};
pub use throttle::{RequestThrottle, ThrottleConfig, ThrottlePermit};

// Platform tags live next to the cache entries they annotate.
pub use voxcache::Platform;
