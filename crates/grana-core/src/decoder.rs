//! Decoder collaborator used by the load transform.
//!
//! The cache never parses containers itself; it asks a [`Decoder`] for raw
//! planar samples and a sample rate. [`WavDecoder`] covers WAV through
//! `hound`, other formats plug in by implementing the trait.

use crate::buffer::SampleRange;
use crate::error::DecodeError;
use std::path::Path;

/// Raw decoder output: planar samples plus sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

/// Turns a file into samples.
///
/// Implementations run on the loader thread and may block on I/O.
pub trait Decoder: Send + Sync {
    /// Decode `path`, restricted to `range` frames and at most `channels` channels.
    fn decode(
        &self,
        path: &Path,
        range: Option<SampleRange>,
        channels: Option<usize>,
    ) -> Result<DecodedAudio, DecodeError>;
}

impl<D: Decoder + ?Sized> Decoder for std::sync::Arc<D> {
    fn decode(
        &self,
        path: &Path,
        range: Option<SampleRange>,
        channels: Option<usize>,
    ) -> Result<DecodedAudio, DecodeError> {
        (**self).decode(path, range, channels)
    }
}

/// Resolve a channel clamp against the channels a file actually has.
pub fn clamp_channels(available: usize, requested: Option<usize>) -> Result<usize, DecodeError> {
    match requested {
        Some(0) => Err(DecodeError::InvalidChannels(0)),
        Some(n) => Ok(n.min(available)),
        None => Ok(available),
    }
}

/// WAV decoder (PCM 8/16/24/32-bit and 32-bit float).
#[cfg(feature = "wav")]
#[derive(Debug, Clone, Copy, Default)]
pub struct WavDecoder;

#[cfg(feature = "wav")]
impl Decoder for WavDecoder {
    fn decode(
        &self,
        path: &Path,
        range: Option<SampleRange>,
        channels: Option<usize>,
    ) -> Result<DecodedAudio, DecodeError> {
        if !path.exists() {
            return Err(DecodeError::FileNotFound(path.to_path_buf()));
        }

        let is_wav = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("wav") || e.eq_ignore_ascii_case("wave"));
        if !is_wav {
            return Err(DecodeError::UnsupportedFormat(path.display().to_string()));
        }

        let mut reader = hound::WavReader::open(path).map_err(map_hound_error)?;
        let spec = reader.spec();
        let total = reader.duration() as usize;
        let src_channels = spec.channels as usize;

        let frames = match range {
            Some(r) => r.resolve(total)?,
            None => 0..total,
        };
        let keep = clamp_channels(src_channels, channels)?;

        reader
            .seek(frames.start as u32)
            .map_err(|e| DecodeError::ReadFailed(e.to_string()))?;

        let count = frames.len() * src_channels;
        let mut out = vec![Vec::with_capacity(frames.len()); keep];

        match spec.sample_format {
            hound::SampleFormat::Float => {
                let samples = reader
                    .samples::<f32>()
                    .take(count)
                    .map(|s| s.map_err(map_hound_error));
                deinterleave(samples, src_channels, &mut out)?;
            }
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                let samples = reader
                    .samples::<i32>()
                    .take(count)
                    .map(|s| s.map(|v| v as f32 * scale).map_err(map_hound_error));
                deinterleave(samples, src_channels, &mut out)?;
            }
        }

        tracing::trace!(
            "decoded {} ({} ch x {} frames @ {} Hz)",
            path.display(),
            keep,
            frames.len(),
            spec.sample_rate
        );

        Ok(DecodedAudio {
            channels: out,
            sample_rate: spec.sample_rate,
        })
    }
}

#[cfg(feature = "wav")]
fn map_hound_error(e: hound::Error) -> DecodeError {
    match e {
        hound::Error::FormatError(_)
        | hound::Error::Unsupported
        | hound::Error::InvalidSampleFormat => DecodeError::UnsupportedFormat(e.to_string()),
        _ => DecodeError::ReadFailed(e.to_string()),
    }
}

/// Split interleaved samples into planar channels, dropping channels past `out.len()`.
fn deinterleave<I>(samples: I, src_channels: usize, out: &mut [Vec<f32>]) -> Result<(), DecodeError>
where
    I: Iterator<Item = Result<f32, DecodeError>>,
{
    if src_channels == 0 {
        return Ok(());
    }
    for (i, sample) in samples.enumerate() {
        let sample = sample?;
        if let Some(channel) = out.get_mut(i % src_channels) {
            channel.push(sample);
        }
    }
    Ok(())
}
