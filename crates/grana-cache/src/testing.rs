//! Stub decoder for unit tests.

use grana_core::decoder::clamp_channels;
use grana_core::{DecodeError, DecodedAudio, Decoder, SampleRange};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) const FRAMES: usize = 4410;
pub(crate) const SAMPLE_RATE: u32 = 44100;

/// Stereo 0.5 amplitude ramp of [`FRAMES`] frames for any path.
///
/// `missing.wav` fails with `FileNotFound`, `panic.wav` panics.
#[derive(Default)]
pub(crate) struct CountingDecoder {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Some(delay),
        }
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

        match path.to_str() {
            Some("missing.wav") => return Err(DecodeError::FileNotFound(path.to_path_buf())),
            Some("panic.wav") => panic!("decoder blew up"),
            _ => {}
        }

        let frames = match range {
            Some(r) => r.resolve(FRAMES)?,
            None => 0..FRAMES,
        };
        let count = clamp_channels(2, channels)?;
        let data = (0..count)
            .map(|_| {
                frames
                    .clone()
                    .map(|i| 0.5 * i as f32 / FRAMES as f32)
                    .collect()
            })
            .collect();

        Ok(DecodedAudio {
            channels: data,
            sample_rate: SAMPLE_RATE,
        })
    }
}
