//! Buffer transforms.
//!
//! A closed set of operations that produce or mutate a [`Buffer`]. Each
//! variant hashes only its construction parameters, so two independently
//! built transforms with equal parameters address the same cache entry.

use crate::buffer::{Buffer, SampleRange};
use crate::decoder::Decoder;
use crate::error::{Result, TransformError};
use crate::filter::{Biquad, FilterType};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

/// One step of a [`Chain`](crate::Chain).
#[derive(Debug, Clone, PartialEq)]
pub enum Transform {
    /// Decode a file. Always the root of a chain.
    Load {
        path: PathBuf,
        range: Option<SampleRange>,
        channels: Option<usize>,
    },
    /// Keep frames `[start, end)` of the current buffer.
    Range(SampleRange),
    /// Reduce to `count` channels (1 folds to a mono average).
    Channels(usize),
    /// High-pass at `low_hz` (skipped when 0) and low-pass at `high_hz`
    /// (skipped at Nyquist).
    BandLimit { low_hz: f32, high_hz: f32 },
    /// Gain in decibels.
    Gain { db: f32 },
    /// Scale so the peak magnitude is 1.0. Silent buffers are left alone.
    Normalize,
}

impl Transform {
    pub fn load(path: impl Into<PathBuf>) -> Self {
        Self::Load {
            path: path.into(),
            range: None,
            channels: None,
        }
    }

    pub fn range(start: usize, end: usize) -> Self {
        Self::Range(SampleRange::new(start, end))
    }

    pub fn channels(count: usize) -> Self {
        Self::Channels(count)
    }

    pub fn band_limit(low_hz: f32, high_hz: f32) -> Self {
        Self::BandLimit { low_hz, high_hz }
    }

    pub fn gain(db: f32) -> Self {
        Self::Gain { db }
    }

    pub fn is_load(&self) -> bool {
        matches!(self, Self::Load { .. })
    }

    /// Short identifier used in hashes and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::Range(_) => "range",
            Self::Channels(_) => "channels",
            Self::BandLimit { .. } => "band_limit",
            Self::Gain { .. } => "gain",
            Self::Normalize => "normalize",
        }
    }

    /// Human readable description, e.g. `gain(+3.0 dB)`.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    /// Hash of the variant and its parameters only.
    pub fn stable_hash(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.name().hash(&mut hasher);
        match self {
            Self::Load {
                path,
                range,
                channels,
            } => {
                path.hash(&mut hasher);
                range.hash(&mut hasher);
                channels.hash(&mut hasher);
            }
            Self::Range(range) => range.hash(&mut hasher),
            Self::Channels(count) => count.hash(&mut hasher),
            Self::BandLimit { low_hz, high_hz } => {
                low_hz.to_bits().hash(&mut hasher);
                high_hz.to_bits().hash(&mut hasher);
            }
            Self::Gain { db } => db.to_bits().hash(&mut hasher),
            Self::Normalize => {}
        }
        hasher.finish()
    }

    /// Apply to `buffer` in place. `decoder` is only consulted by [`Transform::Load`].
    pub fn apply(&self, buffer: &mut Buffer, decoder: &dyn Decoder) -> Result<()> {
        match self {
            Self::Load {
                path,
                range,
                channels,
            } => {
                let audio = decoder.decode(path, *range, *channels)?;
                buffer.replace(audio.channels, audio.sample_rate);
                buffer.set_source(Some(path.clone()));
            }
            Self::Range(range) => {
                let frames = range
                    .resolve(buffer.num_frames())
                    .map_err(|e| TransformError::failed(self.name(), e.to_string()))?;
                for channel in buffer.channels_mut().iter_mut() {
                    channel.truncate(frames.end);
                    channel.drain(..frames.start);
                }
                buffer.update_peak();
            }
            Self::Channels(count) => apply_channels(buffer, *count)?,
            Self::BandLimit { low_hz, high_hz } => apply_band_limit(buffer, *low_hz, *high_hz)?,
            Self::Gain { db } => {
                if !db.is_finite() {
                    return Err(TransformError::failed(self.name(), "gain must be finite"));
                }
                buffer.scale(10.0_f32.powf(db / 20.0));
            }
            Self::Normalize => {
                let peak = buffer.peak();
                if peak > 0.0 {
                    buffer.scale(1.0 / peak);
                }
            }
        }
        Ok(())
    }
}

fn apply_channels(buffer: &mut Buffer, count: usize) -> Result<()> {
    if count == 0 {
        return Err(TransformError::failed("channels", "channel count must be at least 1"));
    }
    let current = buffer.num_channels();
    if count >= current {
        return Ok(());
    }

    let channels = buffer.channels_mut();
    if count == 1 {
        let frames = channels.iter().map(|c| c.len()).min().unwrap_or(0);
        let scale = 1.0 / current as f32;
        let mono: Vec<f32> = (0..frames)
            .map(|i| channels.iter().map(|c| c[i]).sum::<f32>() * scale)
            .collect();
        *channels = vec![mono];
    } else {
        channels.truncate(count);
    }
    buffer.update_peak();
    Ok(())
}

fn apply_band_limit(buffer: &mut Buffer, low_hz: f32, high_hz: f32) -> Result<()> {
    let fail = |reason: String| TransformError::failed("band_limit", reason);

    if !low_hz.is_finite() || !high_hz.is_finite() || low_hz < 0.0 {
        return Err(fail(format!("invalid cutoffs {} / {} Hz", low_hz, high_hz)));
    }
    if low_hz >= high_hz {
        return Err(fail(format!(
            "low cutoff {} Hz must be below high cutoff {} Hz",
            low_hz, high_hz
        )));
    }
    let sample_rate = buffer.sample_rate() as f32;
    if sample_rate <= 0.0 {
        return Err(fail("buffer has no sample rate".to_string()));
    }
    let nyquist = sample_rate / 2.0;
    if high_hz > nyquist {
        return Err(fail(format!(
            "high cutoff {} Hz above Nyquist {} Hz",
            high_hz, nyquist
        )));
    }

    for channel in buffer.channels_mut().iter_mut() {
        if low_hz > 0.0 {
            Biquad::butterworth(FilterType::HighPass, sample_rate, low_hz).process_slice(channel);
        }
        if high_hz < nyquist {
            Biquad::butterworth(FilterType::LowPass, sample_rate, high_hz).process_slice(channel);
        }
    }
    buffer.update_peak();
    Ok(())
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load {
                path,
                range,
                channels,
            } => {
                write!(f, "load({}", path.display())?;
                if let Some(r) = range {
                    write!(f, ", {}..{}", r.start, r.end)?;
                }
                if let Some(n) = channels {
                    write!(f, ", {}ch", n)?;
                }
                write!(f, ")")
            }
            Self::Range(r) => write!(f, "range({}..{})", r.start, r.end),
            Self::Channels(n) => write!(f, "channels({})", n),
            Self::BandLimit { low_hz, high_hz } => {
                write!(f, "band_limit({} Hz..{} Hz)", low_hz, high_hz)
            }
            Self::Gain { db } => write!(f, "gain({:+.1} dB)", db),
            Self::Normalize => write!(f, "normalize"),
        }
    }
}
