//! Error types for voxresolve

/// Errors raised by the resolution pipeline
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The full fallback chain ran and found nothing playable.
    /// Callers must treat this as "skip the track and notify".
    #[error("No playable source found for: {0}")]
    NoResult(String),

    /// The aggregation service reported a rate limit; a cooldown has been
    /// forced on the shared throttle.
    #[error("Aggregation service quota exhausted")]
    QuotaExhausted,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected aggregation response: {0}")]
    BadResponse(String),

    #[error(transparent)]
    Cache(#[from] voxcache::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Specialized Result type for voxresolve
pub type Result<T> = std::result::Result<T, Error>;
