//! Low-level DSP primitives used by the render units.
//!
//! These components are allocation-free once constructed and realtime-safe,
//! making them safe to embed directly inside voice and effect structs. They
//! stay focused on the signal-processing math; orchestration lives in
//! `graph` and `synth`.

/// Time-domain delay line with fractional reads.
pub mod delay;
/// Waveshaping transfer functions.
pub mod distortion;
/// Compressor and brick-wall limiter.
pub mod dynamics;
/// Attack/decay/sustain/release envelope generator.
pub mod envelope;
/// State-variable filter implementation with multiple responses.
pub mod filter;
/// Low-frequency waveform shapes.
pub mod lfo;
/// Panning, dry/wet blending, parameter smoothing.
pub mod mix;
/// Oscillator waveforms and noise sources.
pub mod oscillator;
/// Schroeder reverberator.
pub mod reverb;

pub use envelope::EnvelopeState;
