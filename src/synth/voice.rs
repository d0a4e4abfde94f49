use crate::dsp::envelope::{Envelope, EnvelopeShape};
use crate::dsp::filter::SVFilter;
use crate::dsp::oscillator::{OscillatorBlock, OscillatorWaveform};
use super::midi_note_to_freq;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    Free,      // Available for allocation
    Active,    // Gate high
    Releasing, // Gate low, envelope still ringing
}

/// Per-voice output scaling so a full chord stays near unity.
const VOICE_GAIN: f32 = 0.3;

/// Two detuned oscillators through a tone filter and an ADSR.
///
/// Plain data: no boxed graph, no shared references. Everything the voice
/// touches while rendering is inline.
pub struct Voice {
    pitch: u8,
    velocity: f32,
    state: VoiceState,
    age: u64,
    sample_rate: f32,

    osc_a: OscillatorBlock,
    osc_b: OscillatorBlock,
    detune_ratio: f32,
    tone: SVFilter,
    envelope: Envelope,
}

impl Voice {
    pub fn new(
        waveform: OscillatorWaveform,
        detune_cents: f32,
        shape: EnvelopeShape,
        sample_rate: f32,
    ) -> Self {
        Self {
            pitch: 0,
            velocity: 0.0,
            state: VoiceState::Free,
            age: 0,
            sample_rate,
            osc_a: OscillatorBlock::new(waveform),
            osc_b: OscillatorBlock::new(waveform),
            detune_ratio: 2.0_f32.powf(detune_cents / 1200.0),
            tone: SVFilter::lowpass(8_000.0),
            envelope: Envelope::with_shape(shape, sample_rate),
        }
    }

    pub fn start(&mut self, pitch: u8, velocity: f32, age: u64) {
        if self.state == VoiceState::Free {
            self.osc_a.reset();
            self.osc_b.reset();
            self.tone.reset();
        }
        self.pitch = pitch;
        self.velocity = velocity;
        self.state = VoiceState::Active;
        self.age = age;
        self.envelope.note_on();
    }

    pub fn release(&mut self) {
        if self.state == VoiceState::Active {
            self.state = VoiceState::Releasing;
            self.envelope.note_off();
        }
    }

    /// Add this voice into `out`.
    ///
    /// `pitch_offset` is in semitones, `cutoff` in Hz. Both come from the
    /// owning instrument so modulation applies to every voice at once.
    pub fn render_add(&mut self, out: &mut [f32], pitch_offset: f32, cutoff: f32) {
        if self.state == VoiceState::Free {
            return;
        }

        let freq = midi_note_to_freq(self.pitch) * 2.0_f32.powf(pitch_offset / 12.0);
        let freq_b = freq * self.detune_ratio;
        let gain = self.velocity * VOICE_GAIN;
        self.tone.set_cutoff(cutoff);

        for sample in out.iter_mut() {
            let a = self.osc_a.next_sample(freq, self.sample_rate);
            let b = self.osc_b.next_sample(freq_b, self.sample_rate);
            let level = self.envelope.next_sample();
            let filtered = self.tone.process((a + b) * 0.5, self.sample_rate);
            *sample += filtered * level * gain;
        }

        if self.state == VoiceState::Releasing && !self.envelope.is_active() {
            self.free();
        }
    }

    pub fn set_shape(&mut self, shape: EnvelopeShape) {
        self.envelope.set_shape(shape);
    }

    pub fn is_free(&self) -> bool {
        self.state == VoiceState::Free
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, VoiceState::Active | VoiceState::Releasing)
    }

    pub fn free(&mut self) {
        self.state = VoiceState::Free;
        self.envelope.reset();
    }

    pub fn pitch(&self) -> u8 {
        self.pitch
    }

    pub fn age(&self) -> u64 {
        self.age
    }

    pub fn state(&self) -> VoiceState {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn voice() -> Voice {
        Voice::new(
            OscillatorWaveform::Saw,
            7.0,
            EnvelopeShape::new(0.001, 0.01, 0.8, 0.01),
            48_000.0,
        )
    }

    #[test]
    fn test_voice_renders_then_frees_after_release() {
        let mut v = voice();
        let mut out = vec![0.0; 512];
        v.start(60, 1.0, 0);
        v.render_add(&mut out, 0.0, 8_000.0);
        assert!(out.iter().any(|s| s.abs() > 0.01));

        v.release();
        let mut tail = vec![0.0; 2048];
        v.render_add(&mut tail, 0.0, 8_000.0);
        assert!(v.is_free());
    }

    #[test]
    fn test_free_voice_adds_nothing() {
        let mut v = voice();
        let mut out = vec![0.25; 64];
        v.render_add(&mut out, 0.0, 8_000.0);
        assert!(out.iter().all(|&s| s == 0.25));
    }
}
