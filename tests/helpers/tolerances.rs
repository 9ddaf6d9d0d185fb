//! Tolerance constants for audio testing.

/// Floating point rounding errors (unity gain, normalize to 1.0).
pub const FLOAT_EPSILON: f32 = 1e-6;

/// DSP processing tolerance (filters).
pub const DSP_EPSILON: f32 = 1e-4;

/// 16-bit quantization step size.
/// Use when comparing against samples read back from a 16-bit WAV.
pub const INT16_EPSILON: f32 = 1.0 / 32768.0;
