use std::f32::consts::PI;

use crate::dsp::delay::DelayLine;
use crate::dsp::distortion::{self, DistortionMode};
use crate::dsp::dynamics::Compressor;
use crate::dsp::filter::{FilterType, SVFilter};
use crate::dsp::lfo::{self, LfoWaveform};
use crate::dsp::reverb::SchroederReverb;
use crate::tree::{Effect, EffectKind};

/*
Effect units
============

An `Effect` in the document is a kind plus a loose parameter map. Before it
reaches the renderer it is resolved into `EffectSettings`: typed, clamped,
defaults filled in. The renderer only ever sees settings.

  parameter       kinds                    default
  ---------       -----                    -------
  cutoff          filter                   1200 Hz
  resonance       filter, auto_filter      0.2
  mode            filter (0 lp 1 hp 2 bp 3 notch), distortion (0 soft 1 hard 2 fold)
  drive           distortion               4.0
  time            delay (s), smear grain (s)
  beats           delay: tempo-synced time, overrides `time` when > 0
  feedback        delay, smear
  room_size       reverb                   0.6
  damping         reverb                   0.4
  threshold       compressor (dB)          -18
  ratio           compressor               4
  attack/release  compressor (s)
  makeup          compressor (dB)          0
  rate            auto_filter, tremolo (Hz)
  depth           auto_filter (octaves), tremolo (0..1)
  low/high        multiband crossovers (Hz)
  low_gain/mid_gain/high_gain/gain   dB

Each unit is mono. A stereo chain holds one unit per channel built from the
same settings; the reverb's right channel is spread so the tails decorrelate.

Units are sized on construction (delay lines, reverb buffers) and never
allocate afterwards. Reconfiguring a unit keeps its state.
*/

const MAX_DELAY_SECONDS: f32 = 4.0;
const MAX_SMEAR_SECONDS: f32 = 1.0;
const CUTOFF_UPDATE_INTERVAL: u32 = 16;

#[inline]
fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EffectSettings {
    Filter {
        mode: FilterType,
        cutoff_hz: f32,
        resonance: f32,
    },
    Distortion {
        mode: DistortionMode,
        drive: f32,
    },
    Delay {
        time_seconds: f32,
        /// Tempo-synced length; wins over `time_seconds` when set.
        beats: Option<f32>,
        feedback: f32,
    },
    Reverb {
        room_size: f32,
        damping: f32,
    },
    Compressor {
        threshold_db: f32,
        ratio: f32,
        attack: f32,
        release: f32,
        makeup_db: f32,
    },
    AutoFilter {
        cutoff_hz: f32,
        depth_octaves: f32,
        rate_hz: f32,
        resonance: f32,
    },
    Tremolo {
        rate_hz: f32,
        depth: f32,
    },
    Multiband {
        low_hz: f32,
        high_hz: f32,
        low_gain: f32,
        mid_gain: f32,
        high_gain: f32,
    },
    Gain {
        gain: f32,
    },
    Smear {
        grain_seconds: f32,
        spread: f32,
        feedback: f32,
    },
}

impl EffectSettings {
    pub fn from_effect(effect: &Effect) -> Self {
        let p = |name: &str, default: f32| effect.param_or(name, default);
        match effect.kind {
            EffectKind::Filter => EffectSettings::Filter {
                mode: match p("mode", 0.0).round() as i32 {
                    1 => FilterType::HighPass,
                    2 => FilterType::BandPass,
                    3 => FilterType::Notch,
                    _ => FilterType::LowPass,
                },
                cutoff_hz: p("cutoff", 1_200.0).clamp(20.0, 20_000.0),
                resonance: p("resonance", 0.2).clamp(0.0, 0.98),
            },
            EffectKind::Distortion => EffectSettings::Distortion {
                mode: DistortionMode::from_index(p("mode", 0.0)),
                drive: p("drive", 4.0).clamp(1.0, 50.0),
            },
            EffectKind::Delay => {
                let beats = p("beats", 0.0);
                EffectSettings::Delay {
                    time_seconds: p("time", 0.3).clamp(0.001, MAX_DELAY_SECONDS),
                    beats: (beats > 0.0).then_some(beats.min(16.0)),
                    feedback: p("feedback", 0.4).clamp(0.0, 0.95),
                }
            }
            EffectKind::Reverb => EffectSettings::Reverb {
                room_size: p("room_size", 0.6).clamp(0.0, 1.0),
                damping: p("damping", 0.4).clamp(0.0, 1.0),
            },
            EffectKind::Compressor => EffectSettings::Compressor {
                threshold_db: p("threshold", -18.0).clamp(-60.0, 0.0),
                ratio: p("ratio", 4.0).clamp(1.0, 20.0),
                attack: p("attack", 0.005).clamp(0.0001, 1.0),
                release: p("release", 0.1).clamp(0.001, 3.0),
                makeup_db: p("makeup", 0.0).clamp(-24.0, 24.0),
            },
            EffectKind::AutoFilter => EffectSettings::AutoFilter {
                cutoff_hz: p("cutoff", 800.0).clamp(20.0, 20_000.0),
                depth_octaves: p("depth", 2.0).clamp(0.0, 6.0),
                rate_hz: p("rate", 0.5).clamp(0.0, 40.0),
                resonance: p("resonance", 0.5).clamp(0.0, 0.98),
            },
            EffectKind::Tremolo => EffectSettings::Tremolo {
                rate_hz: p("rate", 5.0).clamp(0.0, 40.0),
                depth: p("depth", 0.5).clamp(0.0, 1.0),
            },
            EffectKind::Multiband => {
                let low_hz = p("low", 250.0).clamp(20.0, 2_000.0);
                EffectSettings::Multiband {
                    low_hz,
                    high_hz: p("high", 4_000.0).clamp(low_hz * 2.0, 18_000.0),
                    low_gain: db_to_gain(p("low_gain", 0.0).clamp(-24.0, 24.0)),
                    mid_gain: db_to_gain(p("mid_gain", 0.0).clamp(-24.0, 24.0)),
                    high_gain: db_to_gain(p("high_gain", 0.0).clamp(-24.0, 24.0)),
                }
            }
            EffectKind::Gain => EffectSettings::Gain {
                gain: db_to_gain(p("gain", 0.0).clamp(-60.0, 24.0)),
            },
            EffectKind::Smear => EffectSettings::Smear {
                grain_seconds: p("time", 0.08).clamp(0.01, MAX_SMEAR_SECONDS * 0.25),
                spread: p("spread", 0.5).clamp(0.0, 1.0),
                feedback: p("feedback", 0.3).clamp(0.0, 0.9),
            },
        }
    }

    pub fn kind(&self) -> EffectKind {
        match self {
            EffectSettings::Filter { .. } => EffectKind::Filter,
            EffectSettings::Distortion { .. } => EffectKind::Distortion,
            EffectSettings::Delay { .. } => EffectKind::Delay,
            EffectSettings::Reverb { .. } => EffectKind::Reverb,
            EffectSettings::Compressor { .. } => EffectKind::Compressor,
            EffectSettings::AutoFilter { .. } => EffectKind::AutoFilter,
            EffectSettings::Tremolo { .. } => EffectKind::Tremolo,
            EffectSettings::Multiband { .. } => EffectKind::Multiband,
            EffectSettings::Gain { .. } => EffectKind::Gain,
            EffectSettings::Smear { .. } => EffectKind::Smear,
        }
    }
}

/// One grain voice of the smear unit.
struct Grain {
    delay: f32,
    age: u32,
}

/// Per-kind render state.
enum UnitState {
    Filter(SVFilter),
    Distortion,
    Delay(DelayLine),
    Reverb(SchroederReverb),
    Compressor(Compressor),
    AutoFilter {
        filter: SVFilter,
        phase: f32,
        countdown: u32,
    },
    Tremolo {
        phase: f32,
    },
    Multiband {
        low: SVFilter,
        high: SVFilter,
    },
    Gain,
    Smear {
        line: DelayLine,
        grains: [Grain; 2],
        rng: fastrand::Rng,
    },
}

/// A mono effect processor.
pub struct EffectUnit {
    settings: EffectSettings,
    state: UnitState,
    sample_rate: f32,
    bpm: f32,
}

impl EffectUnit {
    /// Build a unit. `channel` decorrelates stereo pairs.
    pub fn new(settings: EffectSettings, channel: usize, sample_rate: f32) -> Self {
        let state = match settings {
            EffectSettings::Filter { mode, .. } => UnitState::Filter(SVFilter::new(mode, 1_000.0)),
            EffectSettings::Distortion { .. } => UnitState::Distortion,
            EffectSettings::Delay { .. } => {
                UnitState::Delay(DelayLine::new(MAX_DELAY_SECONDS, sample_rate))
            }
            EffectSettings::Reverb { .. } => {
                UnitState::Reverb(SchroederReverb::with_spread(sample_rate, channel * 23))
            }
            EffectSettings::Compressor { .. } => UnitState::Compressor(Compressor::new(sample_rate)),
            EffectSettings::AutoFilter { .. } => UnitState::AutoFilter {
                filter: SVFilter::lowpass(1_000.0),
                phase: channel as f32 * 0.25,
                countdown: 0,
            },
            EffectSettings::Tremolo { .. } => UnitState::Tremolo { phase: 0.0 },
            EffectSettings::Multiband { .. } => UnitState::Multiband {
                low: SVFilter::lowpass(250.0),
                high: SVFilter::highpass(4_000.0),
            },
            EffectSettings::Gain { .. } => UnitState::Gain,
            EffectSettings::Smear { .. } => UnitState::Smear {
                line: DelayLine::new(MAX_SMEAR_SECONDS, sample_rate),
                grains: [Grain { delay: 1.0, age: 0 }, Grain { delay: 1.0, age: 0 }],
                rng: fastrand::Rng::with_seed(0x5eed_0000 + channel as u64),
            },
        };

        let mut unit = Self {
            settings,
            state,
            sample_rate,
            bpm: 120.0,
        };
        unit.configure(settings);
        unit
    }

    pub fn kind(&self) -> EffectKind {
        self.settings.kind()
    }

    pub fn settings(&self) -> EffectSettings {
        self.settings
    }

    /// Apply new settings of the same kind. A different kind is ignored;
    /// kind changes go through a fresh unit.
    pub fn configure(&mut self, settings: EffectSettings) {
        if settings.kind() != self.settings.kind() {
            debug_assert!(false, "effect kind changed in place");
            return;
        }
        self.settings = settings;
        let sr = self.sample_rate;
        match (&mut self.state, settings) {
            (
                UnitState::Filter(filter),
                EffectSettings::Filter {
                    mode,
                    cutoff_hz,
                    resonance,
                },
            ) => {
                filter.set_type(mode);
                filter.set_cutoff(cutoff_hz);
                filter.set_resonance(resonance);
            }
            (UnitState::Reverb(reverb), EffectSettings::Reverb { room_size, damping }) => {
                reverb.set_room_size(room_size);
                reverb.set_damping(damping);
            }
            (
                UnitState::Compressor(comp),
                EffectSettings::Compressor {
                    threshold_db,
                    ratio,
                    attack,
                    release,
                    makeup_db,
                },
            ) => comp.configure(threshold_db, ratio, attack, release, makeup_db, sr),
            (UnitState::AutoFilter { filter, countdown, .. }, EffectSettings::AutoFilter { resonance, .. }) => {
                filter.set_resonance(resonance);
                *countdown = 0;
            }
            (UnitState::Multiband { low, high }, EffectSettings::Multiband { low_hz, high_hz, .. }) => {
                low.set_cutoff(low_hz);
                high.set_cutoff(high_hz);
            }
            _ => {}
        }
    }

    /// Tempo for synced delay times.
    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = bpm.max(1.0);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let sr = self.sample_rate;
        match (&mut self.state, self.settings) {
            (UnitState::Filter(filter), _) => filter.process(input, sr),
            (UnitState::Distortion, EffectSettings::Distortion { mode, drive }) => {
                distortion::shape(mode, input, drive)
            }
            (
                UnitState::Delay(line),
                EffectSettings::Delay {
                    time_seconds,
                    beats,
                    feedback,
                },
            ) => {
                let seconds = match beats {
                    Some(beats) => (beats * 60.0 / self.bpm).min(MAX_DELAY_SECONDS),
                    None => time_seconds,
                };
                line.process(input, seconds * sr, feedback)
            }
            (UnitState::Reverb(reverb), _) => reverb.process(input),
            (UnitState::Compressor(comp), _) => comp.process(input),
            (
                UnitState::AutoFilter {
                    filter,
                    phase,
                    countdown,
                },
                EffectSettings::AutoFilter {
                    cutoff_hz,
                    depth_octaves,
                    rate_hz,
                    ..
                },
            ) => {
                if *countdown == 0 {
                    let sweep = lfo::sample(LfoWaveform::Sine, *phase) * depth_octaves;
                    filter.set_cutoff(cutoff_hz * 2.0_f32.powf(sweep));
                    *countdown = CUTOFF_UPDATE_INTERVAL;
                }
                *countdown -= 1;
                *phase = lfo::advance_phase(*phase, rate_hz, 1.0 / sr);
                filter.process(input, sr)
            }
            (UnitState::Tremolo { phase }, EffectSettings::Tremolo { rate_hz, depth }) => {
                let level = lfo::bipolar_to_unipolar(lfo::sample(LfoWaveform::Sine, *phase));
                *phase = lfo::advance_phase(*phase, rate_hz, 1.0 / sr);
                input * (1.0 - depth * level)
            }
            (
                UnitState::Multiband { low, high },
                EffectSettings::Multiband {
                    low_gain,
                    mid_gain,
                    high_gain,
                    ..
                },
            ) => {
                let lows = low.process(input, sr);
                let highs = high.process(input, sr);
                let mids = input - lows - highs;
                lows * low_gain + mids * mid_gain + highs * high_gain
            }
            (UnitState::Gain, EffectSettings::Gain { gain }) => input * gain,
            (
                UnitState::Smear { line, grains, rng },
                EffectSettings::Smear {
                    grain_seconds,
                    spread,
                    feedback,
                },
            ) => {
                let grain_len = (grain_seconds * sr).max(2.0) as u32;
                let max_delay = (line.capacity() as f32 - 1.0).max(1.0);
                let mut out = 0.0;
                for (i, grain) in grains.iter_mut().enumerate() {
                    // the second grain runs half a grain behind the first
                    let age = (grain.age + i as u32 * grain_len / 2) % grain_len;
                    if age == 0 {
                        let jitter = rng.f32() * spread;
                        grain.delay = (grain_len as f32 * (1.0 + 2.0 * jitter)).min(max_delay);
                    }
                    let window = (PI * age as f32 / grain_len as f32).sin();
                    out += line.read(grain.delay) * window * window;
                    grain.age = (grain.age + 1) % grain_len;
                }
                line.write(input + out * feedback);
                out
            }
            _ => input,
        }
    }

    pub fn reset(&mut self) {
        match &mut self.state {
            UnitState::Filter(filter) => filter.reset(),
            UnitState::Delay(line) => line.reset(),
            UnitState::Reverb(reverb) => reverb.reset(),
            UnitState::Compressor(comp) => comp.reset(),
            UnitState::AutoFilter { filter, phase, .. } => {
                filter.reset();
                *phase = 0.0;
            }
            UnitState::Tremolo { phase } => *phase = 0.0,
            UnitState::Multiband { low, high } => {
                low.reset();
                high.reset();
            }
            UnitState::Smear { line, .. } => line.reset(),
            UnitState::Distortion | UnitState::Gain => {}
        }
    }
}
