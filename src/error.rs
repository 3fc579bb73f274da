use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain an embedding for a piece of text.
#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("cannot embed empty text")]
    EmptyText,
    /// The remote provider failed: network, auth, quota, timeout or a malformed body.
    #[error("embedding provider call failed")]
    Provider(#[source] anyhow::Error),
}

/// Faults in the on-disk embedding cache. None of these are returned to
/// callers of the cache; they are logged and the lookup carries on.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("corrupt cache entry {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("reading cache entry {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing cache entry {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A record draft that can't be registered.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("cloud_services must list at least one service")]
    EmptyServices,
    #[error("cloud_provider must be one of AWS, Azure, GCP (got {0:?})")]
    UnknownProvider(String),
}
