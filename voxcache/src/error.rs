//! Error types for voxcache

/// Errors raised by the resolution cache
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache file is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Specialized Result type for voxcache
pub type Result<T> = std::result::Result<T, Error>;
