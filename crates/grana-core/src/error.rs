//! Error types for grana-core.

use std::path::PathBuf;
use thiserror::Error;

/// Failure reported by a [`Decoder`](crate::Decoder).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("file does not exist: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("no decoder for format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid sample range: start={start}, end={end}, length={len}")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("invalid channel count: {0}")]
    InvalidChannels(usize),

    #[error("read failed: {0}")]
    ReadFailed(String),
}

/// Failure of a single [`Transform`](crate::Transform) in a chain.
///
/// Stored verbatim as the terminal state of a failed chain, so it must be
/// cheap to clone and comparable.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Transform error in {transform}: {reason}")]
    Failed { transform: String, reason: String },

    #[error("Transform error: chain does not start with a load transform")]
    MissingRoot,

    #[error("Transform error: worker panicked: {0}")]
    Panicked(String),
}

impl TransformError {
    pub(crate) fn failed(transform: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Failed {
            transform: transform.into(),
            reason: reason.into(),
        }
    }

    /// True if the failure came from decoding the root load transform.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, TransformError>;
