//! Decoded audio buffers.

use crate::error::DecodeError;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Frame range `[start, end)` requested from a decoder or range transform.
///
/// `end` past the available length is clamped; an empty or out-of-bounds
/// start is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleRange {
    pub start: usize,
    pub end: usize,
}

impl SampleRange {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Resolve against a source of `len` frames.
    pub fn resolve(&self, len: usize) -> Result<Range<usize>, DecodeError> {
        let end = self.end.min(len);
        if self.start >= end {
            return Err(DecodeError::InvalidRange {
                start: self.start,
                end: self.end,
                len,
            });
        }
        Ok(self.start..end)
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decoded audio: a channel x frame sample matrix plus its sample rate.
///
/// Buffers are shared as `Arc<Buffer>` once published to the cache and are
/// never mutated afterwards; transforms work on an owned copy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Buffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
    peak: f32,
    source: Option<PathBuf>,
}

impl Buffer {
    /// Buffer with no channels, the starting point of every chain.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from planar channel data. All channels should have the same length.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let mut buffer = Self {
            channels,
            sample_rate,
            peak: 0.0,
            source: None,
        };
        buffer.update_peak();
        buffer
    }

    /// Attach the path this buffer was decoded from.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn num_frames(&self) -> usize {
        self.channels.first().map(|c| c.len()).unwrap_or(0)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Largest absolute sample value across all channels.
    #[inline]
    pub fn peak(&self) -> f32 {
        self.peak
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        self.num_frames() == 0
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    pub fn channels(&self) -> &[Vec<f32>] {
        &self.channels
    }

    /// Mutable access to the sample data.
    ///
    /// Callers that change sample values must call [`update_peak`](Self::update_peak).
    pub fn channels_mut(&mut self) -> &mut Vec<Vec<f32>> {
        &mut self.channels
    }

    /// Approximate memory footprint of the sample data (4 bytes per sample).
    pub fn size_bytes(&self) -> u64 {
        self.channels.iter().map(|c| c.len() as u64 * 4).sum()
    }

    /// Replace the sample data wholesale, keeping provenance.
    pub fn replace(&mut self, channels: Vec<Vec<f32>>, sample_rate: u32) {
        self.channels = channels;
        self.sample_rate = sample_rate;
        self.update_peak();
    }

    pub fn set_source(&mut self, path: Option<PathBuf>) {
        self.source = path;
    }

    /// Recompute the cached peak magnitude.
    pub fn update_peak(&mut self) {
        self.peak = self
            .channels
            .iter()
            .flat_map(|c| c.iter())
            .fold(0.0f32, |acc, s| acc.max(s.abs()));
    }

    /// Multiply every sample by `gain`.
    pub fn scale(&mut self, gain: f32) {
        for channel in &mut self.channels {
            for sample in channel.iter_mut() {
                *sample *= gain;
            }
        }
        self.peak *= gain.abs();
    }
}
