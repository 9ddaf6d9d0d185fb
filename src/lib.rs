//! # Grana - Audio Buffer Cache
//!
//! Decoded and processed audio buffers, cached by the transform chain that
//! produced them.
//!
//! ## Architecture
//!
//! Grana is an umbrella crate that coordinates:
//! - **grana-core** - Buffers, transforms, chains and decoders (no threading)
//! - **grana-cache** - Lock-free cache, background loader and request API
//!
//! ## Quick Start
//!
//! ```ignore
//! use grana::prelude::*;
//! use std::time::Duration;
//!
//! let cache = BufferCache::builder()
//!     .max_cache_bytes(128 * 1024 * 1024)
//!     .build()?;
//!
//! // Non-blocking: poll the handle from the audio thread
//! let handle = cache
//!     .request("snare.wav")
//!     .channels(1)
//!     .transform(Transform::gain(-3.0))
//!     .execute();
//!
//! // Blocking: offline and batch work
//! let buffer = cache
//!     .request("snare.wav")
//!     .transform(Transform::Normalize)
//!     .execute_blocking(Duration::from_secs(2))?;
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - WAV decoding
//! - `wav` - WAV decoder via hound

/// Re-export of grana-core for direct access
pub use grana_core as core;

/// Re-export of grana-cache for direct access
pub use grana_cache as cache;

// Core types
pub use grana_core::{
    Buffer, Chain, DecodeError, DecodedAudio, Decoder, SampleRange, Transform, TransformError,
};
#[cfg(feature = "wav")]
pub use grana_core::WavDecoder;

// Cache system
pub use grana_cache::{
    BufferCache, BufferCacheBuilder, CacheConfig, CacheEntry, CacheListener, CacheStats,
    EntryState, Error, LoadState, LoaderStats, Request, RequestHandle, Result,
};

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        Buffer, BufferCache, CacheListener, Chain, Error, LoadState, RequestHandle, Result,
        Transform,
    };
}
