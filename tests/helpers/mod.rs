//! Test helpers and fixtures for Grana integration tests
//!
//! ## Tolerance Levels
//!
//! Use the appropriate tolerance from [`tolerances`] module:
//! - `FLOAT_EPSILON` (1e-6): Exact operations (unity gain, normalize)
//! - `INT16_EPSILON`: Values that went through a 16-bit WAV file

#![allow(dead_code)]

pub mod tolerances;

use grana::core::decoder::clamp_channels;
use grana::{BufferCache, DecodeError, DecodedAudio, Decoder, SampleRange};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Sample rate reported by [`CountingDecoder`].
pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Frames in every file [`CountingDecoder`] "decodes".
pub const TEST_FRAMES: usize = 1000;

/// Generous timeout for blocking calls in tests.
pub const WAIT: Duration = Duration::from_secs(5);

/// Install a test-friendly tracing subscriber. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Stub decoder: stereo, [`TEST_FRAMES`] frames of a 441 Hz sine at half
/// scale, for any path.
///
/// - `missing.wav` fails with "file does not exist"
/// - `panic.wav` panics inside the decoder
///
/// Counts every decode call, optionally sleeping first so tests can race
/// requests against a running job.
#[derive(Default)]
pub struct CountingDecoder {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingDecoder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Decoder for CountingDecoder {
    fn decode(
        &self,
        path: &Path,
        range: Option<SampleRange>,
        channels: Option<usize>,
    ) -> Result<DecodedAudio, DecodeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        match path.file_name().and_then(|n| n.to_str()) {
            Some("missing.wav") => return Err(DecodeError::FileNotFound(path.to_path_buf())),
            Some("panic.wav") => panic!("corrupt header in {}", path.display()),
            _ => {}
        }

        let frames = match range {
            Some(r) => r.resolve(TEST_FRAMES)?,
            None => 0..TEST_FRAMES,
        };
        let count = clamp_channels(2, channels)?;
        let sine = generate_sine(441.0, TEST_SAMPLE_RATE as f64, TEST_FRAMES);
        let data = (0..count)
            .map(|_| sine[frames.clone()].iter().map(|s| s * 0.5).collect())
            .collect();

        Ok(DecodedAudio {
            channels: data,
            sample_rate: TEST_SAMPLE_RATE,
        })
    }
}

/// Buffer cache wired to `decoder` with the given byte budget.
pub fn test_cache(decoder: Arc<CountingDecoder>, max_bytes: u64) -> BufferCache {
    init_tracing();
    BufferCache::builder()
        .max_cache_bytes(max_bytes)
        .decoder(decoder)
        .build()
        .expect("Failed to create test cache")
}

/// Size in bytes of a buffer with the given shape.
pub fn buffer_bytes(channels: usize, frames: usize) -> u64 {
    (channels * frames * std::mem::size_of::<f32>()) as u64
}

/// Generate a test signal: sine wave at given frequency for specified samples.
pub fn generate_sine(frequency: f64, sample_rate: f64, num_samples: usize) -> Vec<f32> {
    (0..num_samples)
        .map(|i| {
            let t = i as f64 / sample_rate;
            (2.0 * std::f64::consts::PI * frequency * t).sin() as f32
        })
        .collect()
}

/// Calculate RMS of a signal.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_sq: f32 = samples.iter().map(|s| s * s).sum();
    (sum_sq / samples.len() as f32).sqrt()
}

/// Calculate peak amplitude of a signal.
pub fn peak(samples: &[f32]) -> f32 {
    samples
        .iter()
        .map(|s| s.abs())
        .fold(0.0_f32, |a, b| a.max(b))
}

/// Poll `condition` every millisecond until it holds or `max_wait_ms` passes.
pub fn wait_until(max_wait_ms: u64, condition: impl Fn() -> bool) -> bool {
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(max_wait_ms);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    false
}

/// Save stereo audio as a 16-bit PCM WAV file.
pub fn save_wav_file_pcm16(
    path: &Path,
    left: &[f32],
    right: &[f32],
    sample_rate: u32,
) -> Result<(), String> {
    use hound::{WavSpec, WavWriter};

    let spec = WavSpec {
        channels: 2,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer =
        WavWriter::create(path, spec).map_err(|e| format!("Failed to create WAV: {}", e))?;

    for (l, r) in left.iter().zip(right.iter()) {
        // Convert f32 [-1.0, 1.0] to i16 [-32768, 32767]
        let l = (l.clamp(-1.0, 1.0) * 32767.0) as i16;
        let r = (r.clamp(-1.0, 1.0) * 32767.0) as i16;
        writer
            .write_sample(l)
            .map_err(|e| format!("Failed to write sample: {}", e))?;
        writer
            .write_sample(r)
            .map_err(|e| format!("Failed to write sample: {}", e))?;
    }

    writer
        .finalize()
        .map_err(|e| format!("Failed to finalize WAV: {}", e))
}
