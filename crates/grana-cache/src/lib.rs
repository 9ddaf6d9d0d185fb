//! Content-addressed audio buffer cache with a background transform loader.
//!
//! Decoded and processed buffers are cached under the hash of the transform
//! chain that produced them. Real-time code polls through lock-free reads;
//! a single loader thread does the decoding and processing.
//!
//! # Features
//!
//! - **Lock-free reads**: the cache map is swapped atomically, readers never block
//! - **Deduplication**: identical concurrent requests share one job
//! - **Prefix reuse**: a chain resumes from its longest cached prefix
//! - **Byte budget**: least recently used ready buffers are evicted first
//!
//! # Example
//!
//! ```ignore
//! use grana_cache::{BufferCache, Transform};
//! use std::time::Duration;
//!
//! let cache = BufferCache::builder()
//!     .max_cache_bytes(256 * 1024 * 1024)
//!     .build()?;
//!
//! // Control thread
//! let handle = cache
//!     .request("loop.wav")
//!     .range(0, 88200)
//!     .transform(Transform::band_limit(40.0, 12000.0))
//!     .transform(Transform::Normalize)
//!     .execute();
//!
//! // Audio thread, once per block
//! if let Some(buffer) = handle.get() {
//!     // play it
//! }
//!
//! // Offline
//! let buffer = cache.request("hit.wav").execute_blocking(Duration::from_secs(1))?;
//! ```

// Error types
pub mod error;
pub use error::{Error, Result};

// Main high-level API
mod system;
pub use system::{BufferCache, BufferCacheBuilder};

mod request;
pub use request::Request;

mod handle;
pub use handle::RequestHandle;

mod config;
pub use config::CacheConfig;

mod listener;
pub use listener::CacheListener;

// Lower-level pieces
pub mod cache;
pub use cache::{Cache, CacheStats};

pub mod entry;
pub use entry::{CacheEntry, EntryState, LoadState};

mod loader;
pub use loader::LoaderStats;

// Core types
pub use grana_core::{
    Buffer, Chain, DecodeError, DecodedAudio, Decoder, SampleRange, Transform, TransformError,
};
#[cfg(feature = "wav")]
pub use grana_core::WavDecoder;

#[cfg(test)]
mod testing;
