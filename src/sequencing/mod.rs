//! Musical time: note storage, scales, cycle length and the per-node sequencer.
//!
//! Everything here except [`sequencer`] is control-side data. The sequencer
//! runs on the render thread and only reads a [`program::SequenceProgram`]
//! that was compiled for it ahead of time.

pub mod arp;
pub mod capture;
pub mod cycle;
pub mod euclid;
pub mod note;
pub mod program;
pub mod scale;
pub mod sequencer;

pub use arp::{build_pool, ArpConfig, ArpEntry, ArpMode, ArpRate};
pub use capture::{CaptureBuffer, CapturedNote};
pub use cycle::{cycle_length_beats, CycleCache};
pub use euclid::Euclid;
pub use note::{Accumulator, Direction, Mutation, NoteEvent, NoteSequence};
pub use program::SequenceProgram;
pub use scale::{resolve_key, Key, ScaleKind};
pub use sequencer::Sequencer;

/// The step quantum: one sixteenth note, in beats.
pub const STEP_BEATS: f64 = 0.25;

/// Snap a length in beats to a positive whole number of steps.
#[inline]
pub fn clamp_length_beats(beats: f64) -> f64 {
    if !beats.is_finite() {
        return STEP_BEATS;
    }
    let steps = (beats / STEP_BEATS).round().max(1.0);
    steps * STEP_BEATS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_clamp() {
        assert_eq!(clamp_length_beats(0.0), STEP_BEATS);
        assert_eq!(clamp_length_beats(-3.0), STEP_BEATS);
        assert_eq!(clamp_length_beats(0.1), STEP_BEATS);
        assert_eq!(clamp_length_beats(f64::NAN), STEP_BEATS);
        assert_eq!(clamp_length_beats(4.1), 4.0);
        assert_eq!(clamp_length_beats(2.9), 3.0);
    }
}
