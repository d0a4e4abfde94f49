#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::NoteSequence;

/*
Arpeggiator pool
================

The pool is built on the control thread from a node's notes and handed to
the render side as a snapshot. It holds no timing in samples, so a BPM
change never requires a rebuild: the sequencer derives the arp grid from
beats.

  Up / Down   one entry per distinct pitch, sorted by pitch. The entry keeps
              the loudest velocity and spans the earliest start to the latest
              end of that pitch in the loop.
  UpDown      Up followed by Down without repeating either end point:
              C E G → C E G E
  AsRecorded  every event in start order, unchanged.

During playback an arp tick picks the next entry, cycling from the previous
pick, whose span covers the loop position. Nothing covers it → rest.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArpMode {
    #[default]
    Up,
    Down,
    UpDown,
    AsRecorded,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArpRate {
    ThirtySecond,
    #[default]
    Sixteenth,
    SixteenthTriplet,
    Eighth,
    EighthTriplet,
    Quarter,
}

impl ArpRate {
    pub fn beats(self) -> f64 {
        match self {
            ArpRate::ThirtySecond => 0.125,
            ArpRate::Sixteenth => 0.25,
            ArpRate::SixteenthTriplet => 1.0 / 6.0,
            ArpRate::Eighth => 0.5,
            ArpRate::EighthTriplet => 1.0 / 3.0,
            ArpRate::Quarter => 1.0,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArpConfig {
    pub mode: ArpMode,
    pub rate: ArpRate,
    /// Fraction of one arp step each note sounds for.
    pub gate: f32,
}

impl Default for ArpConfig {
    fn default() -> Self {
        Self {
            mode: ArpMode::Up,
            rate: ArpRate::Sixteenth,
            gate: 0.5,
        }
    }
}

impl ArpConfig {
    /// Gate length in beats, never zero.
    pub fn gate_beats(&self) -> f64 {
        self.rate.beats() * self.gate.clamp(0.05, 1.0) as f64
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArpEntry {
    pub pitch: u8,
    pub velocity: f32,
    pub start_beats: f64,
    pub end_beats: f64,
}

impl ArpEntry {
    #[inline]
    pub fn covers(&self, position: f64) -> bool {
        position >= self.start_beats && position < self.end_beats
    }
}

pub fn build_pool(sequence: &NoteSequence, config: &ArpConfig) -> Vec<ArpEntry> {
    let events = sequence.events();
    if events.is_empty() {
        return Vec::new();
    }

    if config.mode == ArpMode::AsRecorded {
        return events
            .iter()
            .map(|e| ArpEntry {
                pitch: e.pitch,
                velocity: e.velocity,
                start_beats: e.start_beats,
                end_beats: e.end_beats(),
            })
            .collect();
    }

    let mut distinct: Vec<ArpEntry> = Vec::new();
    for event in events {
        match distinct.iter_mut().find(|entry| entry.pitch == event.pitch) {
            Some(entry) => {
                entry.velocity = entry.velocity.max(event.velocity);
                entry.start_beats = entry.start_beats.min(event.start_beats);
                entry.end_beats = entry.end_beats.max(event.end_beats());
            }
            None => distinct.push(ArpEntry {
                pitch: event.pitch,
                velocity: event.velocity,
                start_beats: event.start_beats,
                end_beats: event.end_beats(),
            }),
        }
    }
    distinct.sort_by_key(|entry| entry.pitch);

    match config.mode {
        ArpMode::Up => distinct,
        ArpMode::Down => {
            distinct.reverse();
            distinct
        }
        ArpMode::UpDown => {
            let len = distinct.len();
            if len > 2 {
                let descending: Vec<ArpEntry> = distinct[1..len - 1].iter().rev().copied().collect();
                distinct.extend(descending);
            }
            distinct
        }
        ArpMode::AsRecorded => distinct,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::NoteEvent;

    fn chord() -> NoteSequence {
        NoteSequence::new(4.0).with_events([
            NoteEvent::new(67, 0.5, 0.0, 4.0),
            NoteEvent::new(60, 0.9, 0.0, 4.0),
            NoteEvent::new(64, 0.7, 0.0, 2.0),
            NoteEvent::new(64, 1.0, 2.0, 2.0),
        ])
    }

    fn pitches(pool: &[ArpEntry]) -> Vec<u8> {
        pool.iter().map(|e| e.pitch).collect()
    }

    #[test]
    fn test_up_merges_distinct_pitches() {
        let pool = build_pool(&chord(), &ArpConfig::default());
        assert_eq!(pitches(&pool), vec![60, 64, 67]);
        let e = pool[1];
        assert_eq!(e.velocity, 1.0);
        assert_eq!((e.start_beats, e.end_beats), (0.0, 4.0));
    }

    #[test]
    fn test_down_and_updown() {
        let down = ArpConfig {
            mode: ArpMode::Down,
            ..ArpConfig::default()
        };
        assert_eq!(pitches(&build_pool(&chord(), &down)), vec![67, 64, 60]);

        let updown = ArpConfig {
            mode: ArpMode::UpDown,
            ..ArpConfig::default()
        };
        assert_eq!(pitches(&build_pool(&chord(), &updown)), vec![60, 64, 67, 64]);
    }

    #[test]
    fn test_as_recorded_keeps_every_event() {
        let config = ArpConfig {
            mode: ArpMode::AsRecorded,
            ..ArpConfig::default()
        };
        let pool = build_pool(&chord(), &config);
        assert_eq!(pool.len(), 4);
        assert!(pool.windows(2).all(|w| w[0].start_beats <= w[1].start_beats));
    }

    #[test]
    fn test_empty_sequence_gives_empty_pool() {
        assert!(build_pool(&NoteSequence::new(4.0), &ArpConfig::default()).is_empty());
    }

    #[test]
    fn test_triplet_rates() {
        assert!((ArpRate::EighthTriplet.beats() * 3.0 - 1.0).abs() < 1e-12);
        assert!((ArpRate::SixteenthTriplet.beats() * 6.0 - 1.0).abs() < 1e-12);
    }
}
