use arrayvec::ArrayVec;

use crate::dsp::envelope::EnvelopeShape;
use crate::dsp::filter::SVFilter;
use crate::dsp::oscillator::OscillatorBlock;
use crate::synth::message::SynthMessage;
use crate::synth::Instrument;
use crate::tree::patch::{DrumKind, DrumVoice};

/*
Drum pads
=========

Every pad is a one-shot: note-on restarts it, note-off is ignored, and the
sound dies on its own exponential decay.

  Kick   sine body with a fast downward pitch sweep (~4x → 1x tune)
  Tom    same, gentler sweep and longer body
  Snare  sine body at tune plus band-passed noise
  HiHat  high-passed noise, very short
  Clap   band-passed noise with three quick re-attacks

Incoming pitches pick a pad by exact note first, otherwise `pitch % pads`.
*/

pub const MAX_PADS: usize = 16;

struct Pad {
    config: DrumVoice,
    body: OscillatorBlock,
    noise: OscillatorBlock,
    filter: SVFilter,
    amp: f32,
    amp_decay: f32,
    sweep: f32,
    sweep_decay: f32,
    velocity: f32,
    elapsed: u32,
    sample_rate: f32,
}

impl Pad {
    fn new(config: DrumVoice, sample_rate: f32) -> Self {
        let filter = match config.kind {
            DrumKind::HiHat => SVFilter::highpass(config.tune_hz.min(sample_rate * 0.45)),
            _ => SVFilter::bandpass(config.tune_hz.max(200.0) * 4.0),
        };
        Self {
            config,
            body: OscillatorBlock::sine(),
            noise: OscillatorBlock::noise(),
            filter,
            amp: 0.0,
            amp_decay: decay_coefficient(config.decay, sample_rate),
            sweep: 0.0,
            sweep_decay: decay_coefficient(0.03, sample_rate),
            velocity: 0.0,
            elapsed: 0,
            sample_rate,
        }
    }

    fn strike(&mut self, velocity: f32) {
        self.body.reset();
        self.amp = 1.0;
        self.sweep = match self.config.kind {
            DrumKind::Kick => 3.0,
            DrumKind::Tom => 1.0,
            _ => 0.0,
        };
        self.velocity = velocity;
        self.elapsed = 0;
    }

    fn is_active(&self) -> bool {
        self.amp > 1e-4
    }

    fn render_add(&mut self, out: &mut [f32]) {
        if !self.is_active() {
            return;
        }
        let gain = self.velocity * self.config.level;
        let clap_gap = (0.012 * self.sample_rate) as u32;

        for sample in out.iter_mut() {
            let value = match self.config.kind {
                DrumKind::Kick | DrumKind::Tom => {
                    let freq = self.config.tune_hz * (1.0 + self.sweep);
                    self.sweep *= self.sweep_decay;
                    self.body.next_sample(freq, self.sample_rate)
                }
                DrumKind::Snare => {
                    let tone = self.body.next_sample(self.config.tune_hz, self.sample_rate);
                    let noise = self.noise.next_sample(0.0, self.sample_rate);
                    0.4 * tone + 0.6 * self.filter.process(noise, self.sample_rate)
                }
                DrumKind::HiHat => {
                    let noise = self.noise.next_sample(0.0, self.sample_rate);
                    self.filter.process(noise, self.sample_rate)
                }
                DrumKind::Clap => {
                    if self.elapsed > 0 && self.elapsed < 3 * clap_gap && self.elapsed % clap_gap == 0 {
                        self.amp = 1.0;
                    }
                    let noise = self.noise.next_sample(0.0, self.sample_rate);
                    self.filter.process(noise, self.sample_rate)
                }
            };

            *sample += value * self.amp * gain;
            self.amp *= self.amp_decay;
            self.elapsed = self.elapsed.saturating_add(1);
        }
    }
}

fn decay_coefficient(seconds: f32, sample_rate: f32) -> f32 {
    // reach -60 dB after `seconds`
    (-6.9 / (seconds.max(0.005) * sample_rate)).exp()
}

/// Multi-pad percussion instrument.
pub struct DrumKit {
    pads: ArrayVec<Pad, MAX_PADS>,
}

impl DrumKit {
    pub fn new(voices: &[DrumVoice], sample_rate: f32) -> Self {
        let pads = voices
            .iter()
            .take(MAX_PADS)
            .map(|config| Pad::new(*config, sample_rate))
            .collect();
        Self { pads }
    }

    fn pad_for(&mut self, pitch: u8) -> Option<&mut Pad> {
        if self.pads.is_empty() {
            return None;
        }
        let index = self
            .pads
            .iter()
            .position(|p| p.config.note == pitch)
            .unwrap_or(pitch as usize % self.pads.len());
        self.pads.get_mut(index)
    }
}

impl Instrument for DrumKit {
    fn handle(&mut self, message: SynthMessage) {
        match message {
            SynthMessage::NoteOn { pitch, velocity } => {
                if let Some(pad) = self.pad_for(pitch) {
                    pad.strike(velocity);
                }
            }
            SynthMessage::NoteOff { .. } => {}
            SynthMessage::AllNotesOff => {
                for pad in self.pads.iter_mut() {
                    pad.amp = 0.0;
                }
            }
        }
    }

    fn render_voices(&mut self, out: &mut [f32]) {
        for pad in self.pads.iter_mut() {
            pad.render_add(out);
        }
    }

    /// Pads shape their own decay.
    fn set_envelope(&mut self, _shape: EnvelopeShape) {}

    fn is_active(&self) -> bool {
        self.pads.iter().any(Pad::is_active)
    }
}
