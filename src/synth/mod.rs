//! Voice management and polyphony.
//!
//! Instruments sit between the sequencer and the node's effect chain. They
//! are built on the control thread from a [`SoundPatch`] and moved onto the
//! render thread boxed; from then on they only receive [`Trigger`]s.

pub mod drums;
pub mod message;
pub mod poly;
pub mod voice;

use crate::dsp::envelope::EnvelopeShape;
use crate::tree::patch::{SoundPatch, SoundType};
use message::{SynthMessage, Trigger};

pub use drums::DrumKit;
pub use poly::PolySynth;

/// Voices per oscillator node.
pub const MAX_VOICES: usize = 8;

/// MIDI note to Hz, A4 (69) = 440.
#[inline]
pub fn midi_note_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

/// A render unit that turns triggers into audio.
pub trait Instrument: Send {
    /// Apply one message immediately.
    fn handle(&mut self, message: SynthMessage);

    /// Add every sounding voice into `out`.
    fn render_voices(&mut self, out: &mut [f32]);

    fn set_envelope(&mut self, shape: EnvelopeShape);

    /// Modulation offsets: pitch in semitones, tone cutoff in octaves.
    fn set_modulation(&mut self, _pitch_semitones: f32, _cutoff_octaves: f32) {}

    fn is_active(&self) -> bool;

    /// Overwrite `out` with one block, applying each trigger on its frame.
    ///
    /// Triggers must be sorted by offset.
    fn render(&mut self, out: &mut [f32], triggers: &[Trigger]) {
        out.fill(0.0);
        let mut cursor = 0usize;
        for trigger in triggers {
            let at = (trigger.offset as usize).min(out.len());
            if at > cursor {
                self.render_voices(&mut out[cursor..at]);
                cursor = at;
            }
            self.handle(trigger.message);
        }
        if cursor < out.len() {
            self.render_voices(&mut out[cursor..]);
        }
    }
}

/// Build the instrument a patch describes.
pub fn build_instrument(patch: &SoundPatch, sample_rate: f32) -> Box<dyn Instrument> {
    match &patch.sound {
        SoundType::Oscillator {
            waveform,
            detune_cents,
        } => Box::new(PolySynth::new(
            *waveform,
            *detune_cents,
            patch.envelope.shape(),
            sample_rate,
        )),
        SoundType::DrumKit { voices } => Box::new(DrumKit::new(voices, sample_rate)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::message::Trigger;
    use crate::tree::patch::DrumVoice;

    #[test]
    fn test_a4_is_440() {
        assert!((midi_note_to_freq(69) - 440.0).abs() < 1e-3);
        assert!((midi_note_to_freq(81) - 880.0).abs() < 1e-2);
    }

    #[test]
    fn test_triggers_land_on_their_frame() {
        let patch = SoundPatch::default();
        let mut instrument = build_instrument(&patch, 48_000.0);
        let mut out = vec![0.0; 256];
        instrument.render(&mut out, &[Trigger::note_on(100, 60, 1.0)]);
        assert!(out[..100].iter().all(|&s| s == 0.0));
        assert!(out[100..].iter().any(|&s| s != 0.0));
        assert!(instrument.is_active());
    }

    #[test]
    fn test_drum_patch_builds_a_kit() {
        let patch = SoundPatch {
            sound: SoundType::DrumKit {
                voices: DrumVoice::standard_kit(),
            },
            ..SoundPatch::default()
        };
        let mut instrument = build_instrument(&patch, 48_000.0);
        assert!(!instrument.is_active());
        instrument.handle(SynthMessage::NoteOn {
            pitch: 36,
            velocity: 1.0,
        });
        assert!(instrument.is_active());
    }
}
