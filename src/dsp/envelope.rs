use crate::MIN_TIME;

/*
Linear ADSR Envelope
====================

  Level
    1.0 ┐     ╱╲
        │    ╱  ╲___________
    S   │   ╱               ╲
        │  ╱                 ╲
    0.0 └─╱───────────────────╲──→ Time
          A    D      S        R

Each stage is a straight ramp. Stage durations are converted into per-sample
increments:

    increment = change / (seconds · sample_rate)

Stages: Idle → Attack → Decay → Sustain, and Release from any of them.

Two details matter for a sequencer-driven voice:

  Retrigger   A voice that is stolen or re-struck starts its attack from the
              current level instead of snapping to zero. A jump to zero is an
              audible click when the previous note is still ringing.

  Release     The starting level and total length are captured at note-off and
              the ramp interpolates between them, so it always lands exactly
              on 0.0 regardless of where in the envelope the gate fell.

The shape can be replaced while a note sounds (patch edits during playback).
The new times apply from the next sample; the current level is kept.
*/

/// The current stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeState {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Stage times in seconds plus the sustain level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeShape {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl EnvelopeShape {
    pub fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack: attack.max(MIN_TIME),
            decay: decay.max(MIN_TIME),
            sustain: sustain.clamp(0.0, 1.0),
            release: release.max(MIN_TIME),
        }
    }
}

impl Default for EnvelopeShape {
    fn default() -> Self {
        Self::new(0.01, 0.1, 0.7, 0.3)
    }
}

pub struct Envelope {
    shape: EnvelopeShape,
    sample_rate: f32,

    stage: EnvelopeState,
    level: f32,

    release_from: f32,
    release_total: u32,
    release_elapsed: u32,
}

impl Envelope {
    pub fn new(sample_rate: f32) -> Self {
        Self::with_shape(EnvelopeShape::default(), sample_rate)
    }

    pub fn with_shape(shape: EnvelopeShape, sample_rate: f32) -> Self {
        Self {
            shape,
            sample_rate,
            stage: EnvelopeState::Idle,
            level: 0.0,
            release_from: 0.0,
            release_total: 1,
            release_elapsed: 0,
        }
    }

    pub fn set_shape(&mut self, shape: EnvelopeShape) {
        self.shape = shape;
    }

    pub fn shape(&self) -> EnvelopeShape {
        self.shape
    }

    /// Gate high. Attack ramps up from whatever level the envelope is at.
    pub fn note_on(&mut self) {
        self.stage = EnvelopeState::Attack;
        self.release_elapsed = 0;
    }

    /// Gate low: start the release phase from current level.
    pub fn note_off(&mut self) {
        if self.stage == EnvelopeState::Idle {
            return;
        }

        self.release_from = self.level;
        self.release_total = (self.shape.release * self.sample_rate).round().max(1.0) as u32;
        self.release_elapsed = 0;
        self.stage = EnvelopeState::Release;
    }

    /// Advance by one sample and return the new level.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeState::Idle => self.level = 0.0,
            EnvelopeState::Attack => {
                self.level += 1.0 / (self.shape.attack * self.sample_rate);
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeState::Decay;
                }
            }
            EnvelopeState::Decay => {
                let target = self.shape.sustain;
                self.level -= (1.0 - target) / (self.shape.decay * self.sample_rate);
                if self.level <= target {
                    self.level = target;
                    self.stage = EnvelopeState::Sustain;
                }
            }
            EnvelopeState::Sustain => self.level = self.shape.sustain,
            EnvelopeState::Release => {
                let progress = self.release_elapsed as f32 / self.release_total as f32;
                self.level = (self.release_from * (1.0 - progress)).max(0.0);
                self.release_elapsed = self.release_elapsed.saturating_add(1);
                if self.release_elapsed >= self.release_total {
                    self.level = 0.0;
                    self.stage = EnvelopeState::Idle;
                }
            }
        }

        debug_assert!((0.0..=1.0).contains(&self.level));
        self.level
    }

    /// Returns true if the envelope is producing output (not idle).
    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeState::Idle
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeState::Idle;
        self.level = 0.0;
        self.release_from = 0.0;
        self.release_elapsed = 0;
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn state(&self) -> EnvelopeState {
        self.stage
    }
}
