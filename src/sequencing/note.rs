#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize};

use super::{clamp_length_beats, ArpConfig, Euclid, STEP_BEATS};

/// One note in a node's loop. Pitch is an absolute MIDI note number.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub velocity: f32,
    pub start_beats: f64,
    pub duration_beats: f64,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub probability: Option<f32>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub ratchet: Option<u8>,
}

impl NoteEvent {
    pub fn new(pitch: u8, velocity: f32, start_beats: f64, duration_beats: f64) -> Self {
        Self {
            pitch: pitch.min(127),
            velocity: velocity.clamp(0.0, 1.0),
            start_beats: start_beats.max(0.0),
            duration_beats: duration_beats.max(0.0),
            probability: None,
            ratchet: None,
        }
    }

    /// A note that fills exactly one grid step.
    pub fn at_step(step: usize, pitch: u8, velocity: f32) -> Self {
        Self::new(pitch, velocity, step as f64 * STEP_BEATS, STEP_BEATS)
    }

    pub fn with_probability(mut self, probability: f32) -> Self {
        self.probability = Some(probability.clamp(0.0, 1.0));
        self
    }

    pub fn with_ratchet(mut self, count: u8) -> Self {
        self.ratchet = Some(count.max(1));
        self
    }

    pub fn end_beats(&self) -> f64 {
        self.start_beats + self.duration_beats
    }

    /// Grid step the event starts in.
    pub fn step(&self) -> usize {
        (self.start_beats / STEP_BEATS + 1e-9).floor() as usize
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
    PingPong,
}

/// Stochastic pitch wander, redrawn at each loop wrap.
///
/// Each event independently moves with probability `amount` by a uniform
/// offset in `-range..=range` semitones, snapped back into the node's scale.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mutation {
    pub amount: f32,
    pub range: u8,
}

/// Deterministic scale-degree walk.
///
/// After every completed pass the whole sequence is transposed `step` more
/// scale degrees. Once the total offset exceeds `limit` degrees in magnitude
/// it wraps back to zero.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accumulator {
    pub step: i32,
    pub limit: u32,
}

impl Accumulator {
    /// Offset in degrees during pass `cycle` (0-based).
    pub fn offset_at(&self, cycle: u64) -> i32 {
        if self.step == 0 {
            return 0;
        }
        let period = (self.limit / self.step.unsigned_abs()) as u64 + 1;
        (cycle % period) as i32 * self.step
    }
}

/// The notes of one node plus how they loop.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct NoteSequence {
    events: Vec<NoteEvent>,
    #[cfg_attr(feature = "serde", serde(deserialize_with = "deserialize_length"))]
    length_beats: f64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub direction: Direction,
    #[cfg_attr(feature = "serde", serde(default = "default_probability"))]
    pub probability: f32,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub mutation: Option<Mutation>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub accumulator: Option<Accumulator>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub arp: Option<ArpConfig>,
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub euclid: Option<Euclid>,
}

#[cfg(feature = "serde")]
fn default_probability() -> f32 {
    1.0
}

#[cfg(feature = "serde")]
fn deserialize_length<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    f64::deserialize(deserializer).map(clamp_length_beats)
}

impl Default for NoteSequence {
    fn default() -> Self {
        Self::new(4.0)
    }
}

impl NoteSequence {
    pub fn new(length_beats: f64) -> Self {
        Self {
            events: Vec::new(),
            length_beats: clamp_length_beats(length_beats),
            direction: Direction::Forward,
            probability: 1.0,
            mutation: None,
            accumulator: None,
            arp: None,
            euclid: None,
        }
    }

    pub fn with_events(mut self, events: impl IntoIterator<Item = NoteEvent>) -> Self {
        self.replace_events(events);
        self
    }

    pub fn length_beats(&self) -> f64 {
        self.length_beats
    }

    /// Set the loop length. Values are rounded to whole steps, minimum one.
    /// Returns the length actually stored.
    pub fn set_length_beats(&mut self, beats: f64) -> f64 {
        self.length_beats = clamp_length_beats(beats);
        self.length_beats
    }

    pub fn length_steps(&self) -> usize {
        (self.length_beats / STEP_BEATS).round() as usize
    }

    pub fn events(&self) -> &[NoteEvent] {
        &self.events
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Add an event, keeping start order.
    pub fn insert(&mut self, event: NoteEvent) {
        let at = self
            .events
            .partition_point(|e| e.start_beats <= event.start_beats);
        self.events.insert(at, event);
    }

    /// Step-grid entry point: add a one-step note or remove the existing one.
    /// Returns true when a note was added.
    pub fn toggle_step(&mut self, step: usize, pitch: u8, velocity: f32) -> bool {
        if let Some(index) = self
            .events
            .iter()
            .position(|e| e.step() == step && e.pitch == pitch)
        {
            self.events.remove(index);
            false
        } else {
            self.insert(NoteEvent::at_step(step, pitch, velocity));
            true
        }
    }

    /// Generation entry point: replace every event.
    pub fn replace_events(&mut self, events: impl IntoIterator<Item = NoteEvent>) {
        self.events = events.into_iter().collect();
        self.events
            .sort_by(|a, b| a.start_beats.total_cmp(&b.start_beats));
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Write the stored Euclidean pattern as one-step notes and size the loop
    /// to it. Does nothing without a pattern.
    pub fn apply_euclid(&mut self, pitch: u8, velocity: f32) {
        let Some(euclid) = self.euclid else {
            return;
        };
        let pattern = euclid.pattern();
        self.replace_events(
            pattern
                .iter()
                .enumerate()
                .filter(|(_, &hit)| hit)
                .map(|(step, _)| NoteEvent::at_step(step, pitch, velocity)),
        );
        self.set_length_beats(pattern.len() as f64 * STEP_BEATS);
    }
}
