use std::collections::VecDeque;

use super::{NoteEvent, STEP_BEATS};

/// Beats in one bar; captured phrases are padded to whole bars.
const BAR_BEATS: f64 = 4.0;
/// Silence that separates one phrase from the next.
const PHRASE_GAP_BEATS: f64 = 2.0;
const MAX_CAPTURED: usize = 512;
const MAX_HELD: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturedNote {
    pub pitch: u8,
    pub velocity: f32,
    pub start_beat: f64,
    pub duration_beats: f64,
}

/// Rolling record of what was played on the keyboard.
///
/// Notes are recorded against the caller's beat clock, which must not rescale
/// on tempo changes. Anything that ended more than `max_age_beats` ago is
/// pruned. Held notes are completed on note-off; a note-off with no matching
/// note-on is ignored.
#[derive(Debug, Clone)]
pub struct CaptureBuffer {
    notes: VecDeque<CapturedNote>,
    held: Vec<(u8, f32, f64)>,
    max_age_beats: f64,
}

impl Default for CaptureBuffer {
    fn default() -> Self {
        Self::new(32.0)
    }
}

impl CaptureBuffer {
    pub fn new(max_age_beats: f64) -> Self {
        Self {
            notes: VecDeque::with_capacity(MAX_CAPTURED),
            held: Vec::with_capacity(MAX_HELD),
            max_age_beats: max_age_beats.max(BAR_BEATS),
        }
    }

    pub fn note_on(&mut self, pitch: u8, velocity: f32, beat: f64) {
        self.held.retain(|(p, _, _)| *p != pitch);
        if self.held.len() == MAX_HELD {
            self.held.remove(0);
        }
        self.held.push((pitch, velocity.clamp(0.0, 1.0), beat));
    }

    pub fn note_off(&mut self, pitch: u8, beat: f64) {
        let Some(index) = self.held.iter().position(|(p, _, _)| *p == pitch) else {
            return;
        };
        let (pitch, velocity, start_beat) = self.held.remove(index);
        if self.notes.len() == MAX_CAPTURED {
            self.notes.pop_front();
        }
        self.notes.push_back(CapturedNote {
            pitch,
            velocity,
            start_beat,
            duration_beats: (beat - start_beat).max(0.0),
        });
        self.prune(beat);
    }

    /// Drop notes that ended before `now - max_age`.
    pub fn prune(&mut self, now: f64) {
        let horizon = now - self.max_age_beats;
        while self
            .notes
            .front()
            .is_some_and(|n| n.start_beat + n.duration_beats < horizon)
        {
            self.notes.pop_front();
        }
    }

    /// Discard everything, including notes still held.
    pub fn clear(&mut self) {
        self.notes.clear();
        self.held.clear();
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// The most recent phrase: notes after the last gap of at least
    /// two beats. The buffer is emptied.
    pub fn take_phrase(&mut self) -> Vec<CapturedNote> {
        let mut notes: Vec<CapturedNote> = self.notes.drain(..).collect();
        notes.sort_by(|a, b| a.start_beat.total_cmp(&b.start_beat));

        let mut phrase_start = 0;
        let mut latest_end = f64::NEG_INFINITY;
        for (i, note) in notes.iter().enumerate() {
            if i > 0 && note.start_beat - latest_end >= PHRASE_GAP_BEATS {
                phrase_start = i;
            }
            latest_end = latest_end.max(note.start_beat + note.duration_beats);
        }
        notes.split_off(phrase_start)
    }
}

/// Snap a phrase to the step grid.
///
/// Starts round to the nearest step and the phrase is rebased so its first
/// note lands on beat 0. Durations are at least one step. The returned
/// length covers every note, rounded up to whole bars.
pub fn quantize_phrase(phrase: &[CapturedNote]) -> (Vec<NoteEvent>, f64) {
    let Some(first) = phrase
        .iter()
        .map(|n| n.start_beat)
        .min_by(|a, b| a.total_cmp(b))
    else {
        return (Vec::new(), BAR_BEATS);
    };
    let origin = (first / STEP_BEATS).round() * STEP_BEATS;

    let events: Vec<NoteEvent> = phrase
        .iter()
        .map(|n| {
            let start = ((n.start_beat / STEP_BEATS).round() * STEP_BEATS - origin).max(0.0);
            let duration = ((n.duration_beats / STEP_BEATS).round() * STEP_BEATS).max(STEP_BEATS);
            NoteEvent::new(n.pitch, n.velocity, start, duration)
        })
        .collect();

    let end = events
        .iter()
        .map(NoteEvent::end_beats)
        .fold(STEP_BEATS, f64::max);
    let length = (end / BAR_BEATS).ceil().max(1.0) * BAR_BEATS;
    (events, length)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(buffer: &mut CaptureBuffer, pitch: u8, start: f64, end: f64) {
        buffer.note_on(pitch, 0.8, start);
        buffer.note_off(pitch, end);
    }

    #[test]
    fn test_phrase_starts_after_last_gap() {
        let mut buffer = CaptureBuffer::default();
        play(&mut buffer, 48, 0.0, 0.5);
        play(&mut buffer, 60, 4.0, 4.5);
        play(&mut buffer, 62, 5.0, 5.4);

        let phrase = buffer.take_phrase();
        let pitches: Vec<u8> = phrase.iter().map(|n| n.pitch).collect();
        assert_eq!(pitches, vec![60, 62]);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_prune_by_age() {
        let mut buffer = CaptureBuffer::new(8.0);
        play(&mut buffer, 60, 0.0, 1.0);
        play(&mut buffer, 62, 20.0, 21.0);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_quantize_rebases_and_pads_to_bar() {
        let phrase = [
            CapturedNote {
                pitch: 60,
                velocity: 1.0,
                start_beat: 10.02,
                duration_beats: 0.1,
            },
            CapturedNote {
                pitch: 64,
                velocity: 1.0,
                start_beat: 11.49,
                duration_beats: 0.6,
            },
        ];
        let (events, length) = quantize_phrase(&phrase);
        assert_eq!(events[0].start_beats, 0.0);
        assert_eq!(events[0].duration_beats, STEP_BEATS);
        assert_eq!(events[1].start_beats, 1.5);
        assert_eq!(events[1].duration_beats, 0.5);
        assert_eq!(length, 4.0);
    }

    #[test]
    fn test_clear_discards_held_notes() {
        let mut buffer = CaptureBuffer::default();
        buffer.note_on(60, 1.0, 0.0);
        buffer.clear();
        buffer.note_off(60, 1.0);
        assert!(buffer.is_empty());
    }
}
