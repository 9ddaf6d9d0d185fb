//! Error types.

use grana_core::{DecodeError, TransformError};
use std::time::Duration;
use thiserror::Error;

/// Error type.
#[derive(Error, Debug)]
pub enum Error {
    /// The chain resolved to a terminal error (decode or transform failure).
    #[error(transparent)]
    Transform(#[from] TransformError),

    /// A blocking wait gave up. The load keeps running.
    #[error("Timed out after {0:?} waiting for buffer")]
    Timeout(Duration),

    /// No cache entry exists for the hash.
    #[error("No cache entry for hash {0:016x}")]
    NotFound(u64),

    /// The loader thread is gone and can no longer resolve requests.
    #[error("Loader stopped before the request resolved")]
    LoaderStopped,

    /// Invalid configuration.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// IO error (e.g. spawning the loader thread).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True if the root load transform failed to decode its file.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Transform(e) if e.is_decode())
    }

    /// The underlying decode error, if any.
    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            Self::Transform(TransformError::Decode(e)) => Some(e),
            _ => None,
        }
    }
}

/// Result type.
pub type Result<T> = std::result::Result<T, Error>;
