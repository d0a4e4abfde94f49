use crate::dsp::envelope::EnvelopeShape;
use crate::dsp::oscillator::OscillatorWaveform;
use crate::synth::message::SynthMessage;
use crate::synth::voice::{Voice, VoiceState};
use crate::synth::{Instrument, MAX_VOICES};

const BASE_CUTOFF: f32 = 8_000.0;

/// Polyphonic oscillator instrument.
pub struct PolySynth {
    voices: Box<[Voice]>,
    frame_counter: u64,
    pitch_offset: f32,
    cutoff: f32,
}

impl PolySynth {
    pub fn new(
        waveform: OscillatorWaveform,
        detune_cents: f32,
        shape: EnvelopeShape,
        sample_rate: f32,
    ) -> Self {
        let voices = (0..MAX_VOICES)
            .map(|_| Voice::new(waveform, detune_cents, shape, sample_rate))
            .collect();

        Self {
            voices,
            frame_counter: 0,
            pitch_offset: 0.0,
            cutoff: BASE_CUTOFF,
        }
    }

    pub fn active_voices(&self) -> usize {
        self.voices.iter().filter(|v| v.is_active()).count()
    }

    /// Free voice first, then the oldest releasing one, then the oldest
    /// held one.
    fn allocate_voice(&mut self) -> &mut Voice {
        let index = self
            .voices
            .iter()
            .position(|v| v.is_free())
            .or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .filter(|(_, v)| v.state() == VoiceState::Releasing)
                    .min_by_key(|(_, v)| v.age())
                    .map(|(i, _)| i)
            })
            .or_else(|| {
                self.voices
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, v)| v.age())
                    .map(|(i, _)| i)
            })
            .unwrap_or(0);
        &mut self.voices[index]
    }
}

impl Instrument for PolySynth {
    fn handle(&mut self, message: SynthMessage) {
        match message {
            SynthMessage::NoteOn { pitch, velocity } => {
                let age = self.frame_counter;
                // A still-held voice on the same pitch is re-struck in place.
                if let Some(voice) = self
                    .voices
                    .iter_mut()
                    .find(|v| v.pitch() == pitch && v.state() == VoiceState::Active)
                {
                    voice.start(pitch, velocity, age);
                } else {
                    self.allocate_voice().start(pitch, velocity, age);
                }
            }
            SynthMessage::NoteOff { pitch } => {
                if let Some(voice) = self
                    .voices
                    .iter_mut()
                    .find(|v| v.pitch() == pitch && v.state() == VoiceState::Active)
                {
                    voice.release();
                }
            }
            SynthMessage::AllNotesOff => {
                self.voices.iter_mut().for_each(Voice::release);
            }
        }
    }

    fn render_voices(&mut self, out: &mut [f32]) {
        for voice in self.voices.iter_mut() {
            voice.render_add(out, self.pitch_offset, self.cutoff);
        }
        self.frame_counter += out.len() as u64;
    }

    fn set_envelope(&mut self, shape: EnvelopeShape) {
        self.voices.iter_mut().for_each(|v| v.set_shape(shape));
    }

    fn set_modulation(&mut self, pitch_semitones: f32, cutoff_octaves: f32) {
        self.pitch_offset = pitch_semitones;
        self.cutoff = BASE_CUTOFF * 2.0_f32.powf(cutoff_octaves.clamp(-8.0, 1.0));
    }

    fn is_active(&self) -> bool {
        self.voices.iter().any(Voice::is_active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::message::Trigger;

    fn synth() -> PolySynth {
        PolySynth::new(
            OscillatorWaveform::Square,
            0.0,
            EnvelopeShape::new(0.001, 0.01, 0.8, 0.005),
            48_000.0,
        )
    }

    #[test]
    fn test_voice_stealing_never_exceeds_limit() {
        let mut poly = synth();
        for pitch in 40..(40 + MAX_VOICES as u8 + 4) {
            poly.handle(SynthMessage::NoteOn {
                pitch,
                velocity: 1.0,
            });
        }
        assert_eq!(poly.active_voices(), MAX_VOICES);
    }

    #[test]
    fn test_trigger_offsets_split_the_block() {
        let mut poly = synth();
        let mut out = vec![0.0; 256];
        poly.render(&mut out, &[Trigger::note_on(128, 69, 1.0)]);

        assert!(out[..128].iter().all(|&s| s == 0.0), "silence before the trigger");
        assert!(out[129..].iter().any(|s| s.abs() > 0.0));
    }

    #[test]
    fn test_all_notes_off_releases_everything() {
        let mut poly = synth();
        poly.handle(SynthMessage::NoteOn { pitch: 60, velocity: 1.0 });
        poly.handle(SynthMessage::NoteOn { pitch: 64, velocity: 1.0 });
        poly.handle(SynthMessage::AllNotesOff);

        let mut out = vec![0.0; 4096];
        poly.render(&mut out, &[]);
        assert!(!poly.is_active());
    }
}
