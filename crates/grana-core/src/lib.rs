//! Core types for the Grana buffer cache.
//!
//! Everything in this crate is single-threaded and allocation-happy; the
//! concurrent cache and loader live in `grana-cache`.
//!
//! - [`Buffer`] - decoded audio (channel x frame matrix, sample rate, peak)
//! - [`Transform`] - one hashable step producing or mutating a buffer
//! - [`Chain`] - ordered transforms, doubling as the cache key
//! - [`Decoder`] - collaborator that turns a file into samples
//!
//! # Example
//!
//! ```ignore
//! use grana_core::{Buffer, Chain, Transform, WavDecoder};
//!
//! let chain = Chain::new(vec![
//!     Transform::load("kick.wav"),
//!     Transform::gain(3.0),
//!     Transform::Normalize,
//! ]);
//!
//! let mut buffer = Buffer::empty();
//! for t in chain.transforms() {
//!     t.apply(&mut buffer, &WavDecoder)?;
//! }
//! ```

pub mod error;
pub use error::{DecodeError, Result, TransformError};

mod buffer;
pub use buffer::{Buffer, SampleRange};

mod chain;
pub use chain::Chain;

pub mod decoder;
pub use decoder::{DecodedAudio, Decoder};
#[cfg(feature = "wav")]
pub use decoder::WavDecoder;

pub mod filter;

mod transform;
pub use transform::Transform;
