use arrayvec::ArrayVec;

use super::{SequenceProgram, STEP_BEATS};
use crate::synth::message::{push_trigger, Trigger, TriggerBuffer};

/*
Per-Node Sequencer
==================

Runs on the render thread. Owns a compiled `SequenceProgram` and turns it
into sample-stamped note-on/note-off triggers.

Time
----

  position   beats inside the loop, [0, length)
  elapsed    beats since transport start (drives the arp grid)
  advance    bpm / 60 / sample_rate beats per sample

A tempo change only swaps `advance`. Position is untouched, so there is no
jump.

Per sample, in order
--------------------

  1. note-offs whose remaining gate has run out
  2. the step whose boundary was crossed by the previous advance
     (or an arp tick when arpeggiation is on)
  3. ratchet repeats and off-grid starts that fell due
  4. advance; on loop wrap redraw mutation offsets and move the
     accumulator

Offs go first so a note retriggered on the same pitch is released and
re-struck rather than swallowed.

Trigger pipeline for one scheduled note
---------------------------------------

  probability   one draw per step crossing: note.p × sequence.p
  mutation      + per-event semitone offset for this pass, snapped to scale
  accumulator   + scale degrees for this pass
  ratchet       n repeats at k·dur/n, each gated 90 % of dur/n

Capacity
--------

Sounding notes and pending starts live in fixed arrays. A ratcheted event
takes one pending entry however many repeats it has: the entry re-arms by
one interval each time it fires. When sounding notes are full the oldest one
is released to make room; when pending is full the late start is dropped.
Neither allocates.
*/

const MAX_ACTIVE: usize = 32;
const MAX_PENDING: usize = 128;
const RATCHET_GATE: f64 = 0.9;
const EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, Copy)]
struct ActiveNote {
    pitch: u8,
    remaining: f64,
}

/// A delayed start, or the remaining repeats of a ratchet.
#[derive(Debug, Clone, Copy)]
struct PendingNote {
    pitch: u8,
    velocity: f32,
    due: f64,
    interval: f64,
    repeats: u8,
    duration: f64,
}

pub struct Sequencer {
    program: Box<SequenceProgram>,
    running: bool,

    position: f64,
    elapsed: f64,
    cycle: u64,
    step: usize,
    fire_due: bool,

    advance: f64,
    sample_rate: f64,

    active: ArrayVec<ActiveNote, MAX_ACTIVE>,
    pending: ArrayVec<PendingNote, MAX_PENDING>,

    accumulator: i32,
    arp_cursor: usize,
    next_arp_tick: f64,

    rng: fastrand::Rng,
}

impl Sequencer {
    pub fn new(program: Box<SequenceProgram>, sample_rate: f32) -> Self {
        Self::with_seed(program, sample_rate, 0x0a7b_02c5)
    }

    pub fn with_seed(program: Box<SequenceProgram>, sample_rate: f32, seed: u64) -> Self {
        let sample_rate = sample_rate as f64;
        Self {
            program,
            running: false,
            position: 0.0,
            elapsed: 0.0,
            cycle: 0,
            step: 0,
            fire_due: false,
            advance: 120.0 / 60.0 / sample_rate,
            sample_rate,
            active: ArrayVec::new(),
            pending: ArrayVec::new(),
            accumulator: 0,
            arp_cursor: 0,
            next_arp_tick: 0.0,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Loop position in beats, [0, length).
    pub fn position(&self) -> f64 {
        self.position.max(0.0)
    }

    /// Completed passes since start.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn length_beats(&self) -> f64 {
        self.program.length_beats
    }

    pub fn program(&self) -> &SequenceProgram {
        &self.program
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.advance = bpm as f64 / 60.0 / self.sample_rate;
    }

    /// Start at `elapsed` transport beats. Zero aligns to the loop start;
    /// anything else joins phase-locked at `elapsed mod length`.
    pub fn start(&mut self, bpm: f32, elapsed: f64) {
        self.set_bpm(bpm);
        self.running = true;
        self.pending.clear();
        self.program.mutation_offsets.fill(0);
        self.arp_cursor = 0;
        self.lock_phase(elapsed);
    }

    /// Stop and reset. Sounding notes are released at offset 0.
    pub fn stop(&mut self, triggers: &mut TriggerBuffer) {
        self.release_all(0, triggers);
        self.pending.clear();
        self.running = false;
        self.position = 0.0;
        self.elapsed = 0.0;
        self.cycle = 0;
        self.step = 0;
        self.fire_due = false;
        self.accumulator = 0;
        self.arp_cursor = 0;
        self.next_arp_tick = 0.0;
        self.program.mutation_offsets.fill(0);
    }

    /// Swap in a new program and hand back the old one. A running sequencer
    /// re-locks to `elapsed`; sounding notes keep their gates.
    ///
    /// A step boundary crossed on the last sample of the previous block is
    /// still owed; it fires even if the re-lock lands a hair past the grid.
    pub fn load(&mut self, program: Box<SequenceProgram>, elapsed: f64) -> Box<SequenceProgram> {
        let old = std::mem::replace(&mut self.program, program);
        self.pending.clear();
        self.arp_cursor = 0;
        if self.running {
            let (owed, step) = (self.fire_due, self.step);
            self.lock_phase(elapsed);
            if owed && self.step == step {
                self.fire_due = true;
            }
        }
        old
    }

    fn lock_phase(&mut self, elapsed: f64) {
        let length = self.program.length_beats;
        self.elapsed = elapsed.max(0.0);
        self.position = self.elapsed.rem_euclid(length);
        self.cycle = (self.elapsed / length + EPSILON).floor() as u64;
        if length - self.position < EPSILON {
            self.position = 0.0;
        }

        let exact = self.position / STEP_BEATS;
        let nearest = exact.round();
        if (exact - nearest).abs() < 1e-6 {
            self.step = (nearest as usize) % self.program.steps;
            self.fire_due = true;
        } else {
            self.step = exact.floor() as usize;
            self.fire_due = false;
        }

        self.accumulator = self
            .program
            .accumulator
            .map_or(0, |acc| acc.offset_at(self.cycle));

        if let Some(arp) = self.program.arp {
            let rate = arp.rate.beats();
            self.next_arp_tick = (self.elapsed / rate - 1e-6).ceil() * rate;
        }
    }

    /// Emit this block's triggers into `triggers`, stamped with frame offsets.
    pub fn process(&mut self, frames: usize, triggers: &mut TriggerBuffer) {
        if !self.running {
            return;
        }

        for frame in 0..frames {
            let offset = frame as u32;

            self.emit_note_offs(offset, triggers);

            if self.program.arp.is_some() {
                if self.elapsed + EPSILON >= self.next_arp_tick {
                    self.fire_arp(offset, triggers);
                }
            } else if self.fire_due {
                self.fire_step(offset, triggers);
            }
            self.fire_due = false;

            self.emit_pending(offset, triggers);
            self.advance_one();
        }
    }

    fn advance_one(&mut self) {
        let dt = self.advance;
        self.position += dt;
        self.elapsed += dt;
        for note in self.active.iter_mut() {
            note.remaining -= dt;
        }
        for note in self.pending.iter_mut() {
            note.due -= dt;
        }

        let boundary = (self.step + 1) as f64 * STEP_BEATS;
        if self.position + EPSILON >= boundary {
            self.step += 1;
            self.fire_due = true;
            if self.step >= self.program.steps {
                self.position -= self.program.length_beats;
                self.step = 0;
                self.on_wrap();
            }
        }
    }

    fn on_wrap(&mut self) {
        self.cycle += 1;

        if let Some(mutation) = self.program.mutation {
            let range = mutation.range.min(24) as i32;
            let amount = mutation.amount.clamp(0.0, 1.0);
            for offset in self.program.mutation_offsets.iter_mut() {
                *offset = if range > 0 && self.rng.f32() < amount {
                    self.rng.i32(-range..=range) as i8
                } else {
                    0
                };
            }
        }

        if let Some(acc) = self.program.accumulator {
            self.accumulator += acc.step;
            if self.accumulator.unsigned_abs() > acc.limit {
                self.accumulator = 0;
            }
        }
    }

    fn fire_step(&mut self, offset: u32, triggers: &mut TriggerBuffer) {
        let global = self.program.probability;
        let count = self.program.table(self.cycle).step(self.step).len();

        for i in 0..count {
            let note = self.program.table(self.cycle).step(self.step)[i];

            let p = note.probability * global;
            if p < 1.0 && self.rng.f32() >= p {
                continue;
            }

            let pitch = self.resolve_pitch(note.pitch, note.slot as usize);

            let repeats = note.ratchet.max(1);
            let interval = note.duration / repeats as f64;
            let gate = if repeats > 1 {
                interval * RATCHET_GATE
            } else {
                note.duration
            };

            let mut pending = PendingNote {
                pitch,
                velocity: note.velocity,
                due: note.delay,
                interval,
                repeats,
                duration: gate,
            };
            if pending.due < EPSILON {
                self.start_note(pitch, note.velocity, gate, offset, triggers);
                pending.repeats -= 1;
                pending.due += interval;
            }
            if pending.repeats > 0 {
                let _ = self.pending.try_push(pending);
            }
        }
    }

    fn fire_arp(&mut self, offset: u32, triggers: &mut TriggerBuffer) {
        let Some(arp) = self.program.arp else {
            return;
        };
        let rate = arp.rate.beats();
        self.next_arp_tick += rate;

        let len = self.program.arp_pool.len();
        if len == 0 {
            return;
        }

        let global = self.program.probability;
        if global < 1.0 && self.rng.f32() >= global {
            return;
        }

        for i in 0..len {
            let index = (self.arp_cursor + i) % len;
            let entry = self.program.arp_pool[index];
            if entry.covers(self.position) {
                self.arp_cursor = index + 1;
                let pitch = self.transpose(entry.pitch);
                self.start_note(pitch, entry.velocity, arp.gate_beats(), offset, triggers);
                return;
            }
        }
    }

    fn resolve_pitch(&self, pitch: u8, slot: usize) -> u8 {
        let wander = self.program.mutation_offsets.get(slot).copied().unwrap_or(0);
        let pitch = if wander != 0 {
            let moved = (pitch as i32 + wander as i32).clamp(0, 127) as u8;
            self.program.key.quantize(moved)
        } else {
            pitch
        };
        self.transpose(pitch)
    }

    fn transpose(&self, pitch: u8) -> u8 {
        if self.accumulator == 0 {
            pitch
        } else {
            self.program.key.transpose_degrees(pitch, self.accumulator)
        }
    }

    fn start_note(
        &mut self,
        pitch: u8,
        velocity: f32,
        duration: f64,
        offset: u32,
        triggers: &mut TriggerBuffer,
    ) {
        if let Some(index) = self.active.iter().position(|n| n.pitch == pitch) {
            self.active.remove(index);
            push_trigger(triggers, Trigger::note_off(offset, pitch));
        } else if self.active.is_full() {
            let oldest = self.active.remove(0);
            push_trigger(triggers, Trigger::note_off(offset, oldest.pitch));
        }

        push_trigger(triggers, Trigger::note_on(offset, pitch, velocity));
        self.active.push(ActiveNote {
            pitch,
            remaining: duration,
        });
    }

    fn emit_note_offs(&mut self, offset: u32, triggers: &mut TriggerBuffer) {
        let mut i = 0;
        while i < self.active.len() {
            if self.active[i].remaining <= EPSILON {
                let note = self.active.remove(i);
                push_trigger(triggers, Trigger::note_off(offset, note.pitch));
            } else {
                i += 1;
            }
        }
    }

    fn emit_pending(&mut self, offset: u32, triggers: &mut TriggerBuffer) {
        let mut i = 0;
        while i < self.pending.len() {
            let note = self.pending[i];
            if note.due > EPSILON {
                i += 1;
                continue;
            }
            self.start_note(note.pitch, note.velocity, note.duration, offset, triggers);
            let entry = &mut self.pending[i];
            entry.repeats -= 1;
            if entry.repeats == 0 {
                self.pending.swap_remove(i);
            } else {
                entry.due += entry.interval;
                i += 1;
            }
        }
    }

    fn release_all(&mut self, offset: u32, triggers: &mut TriggerBuffer) {
        for note in self.active.drain(..) {
            push_trigger(triggers, Trigger::note_off(offset, note.pitch));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::{
        Accumulator, ArpConfig, ArpMode, ArpRate, Direction, Key, Mutation, NoteEvent,
        NoteSequence, ScaleKind,
    };
    use crate::synth::message::SynthMessage;

    const SAMPLE_RATE: f32 = 48_000.0;
    /// Samples per beat at 120 BPM and 48 kHz.
    const BEAT: usize = 24_000;

    fn sequencer(seq: &NoteSequence) -> Sequencer {
        let program = SequenceProgram::compile(seq, Key::new(0, ScaleKind::Major));
        Sequencer::new(Box::new(program), SAMPLE_RATE)
    }

    /// Run `frames` in 512-frame blocks, returning (absolute frame, message).
    fn run(seq: &mut Sequencer, frames: usize) -> Vec<(usize, SynthMessage)> {
        let mut out = Vec::new();
        let mut done = 0;
        while done < frames {
            let block = (frames - done).min(512);
            let mut triggers = TriggerBuffer::new();
            seq.process(block, &mut triggers);
            out.extend(triggers.iter().map(|t| (done + t.offset as usize, t.message)));
            done += block;
        }
        out
    }

    fn note_ons(events: &[(usize, SynthMessage)]) -> Vec<(usize, u8)> {
        events
            .iter()
            .filter_map(|(frame, msg)| match msg {
                SynthMessage::NoteOn { pitch, .. } => Some((*frame, *pitch)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_step_fires_on_exact_sample() {
        let seq_data = NoteSequence::new(1.0).with_events([
            NoteEvent::new(60, 1.0, 0.0, 0.25),
            NoteEvent::new(64, 1.0, 0.5, 0.25),
        ]);
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let ons = note_ons(&run(&mut seq, BEAT));
        assert_eq!(ons, vec![(0, 60), (BEAT / 2, 64)]);
    }

    #[test]
    fn test_note_off_after_duration() {
        let seq_data = NoteSequence::new(1.0).with_events([NoteEvent::new(60, 1.0, 0.0, 0.5)]);
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let events = run(&mut seq, BEAT);
        let off = events
            .iter()
            .find(|(_, m)| matches!(m, SynthMessage::NoteOff { pitch: 60 }))
            .map(|(f, _)| *f);
        assert_eq!(off, Some(BEAT / 2));
    }

    #[test]
    fn test_off_grid_start_is_sample_accurate() {
        let seq_data = NoteSequence::new(1.0).with_events([NoteEvent::new(60, 1.0, 0.3, 0.1)]);
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let ons = note_ons(&run(&mut seq, BEAT));
        let expected = (0.3 * BEAT as f64).round() as usize;
        assert_eq!(ons.len(), 1);
        assert!(ons[0].0.abs_diff(expected) <= 1, "fired at {} not {expected}", ons[0].0);
    }

    #[test]
    fn test_loop_wraps_and_counts_cycles() {
        let seq_data = NoteSequence::new(1.0).with_events([NoteEvent::new(60, 1.0, 0.0, 0.1)]);
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let ons = note_ons(&run(&mut seq, 3 * BEAT));
        assert_eq!(ons.iter().map(|(f, _)| *f).collect::<Vec<_>>(), vec![0, BEAT, 2 * BEAT]);
        assert_eq!(seq.cycle(), 3);
        assert!(seq.position() < 1e-6 || seq.length_beats() - seq.position() < 1e-6);
    }

    #[test]
    fn test_bpm_change_keeps_position() {
        let seq_data = NoteSequence::new(4.0);
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);
        run(&mut seq, 10_000);

        let before = seq.position();
        seq.set_bpm(90.0);
        let after = seq.position();
        assert_eq!(before, after);

        run(&mut seq, 1);
        let one_sample = 90.0 / 60.0 / SAMPLE_RATE as f64;
        assert!((seq.position() - before - one_sample).abs() < 1e-12);
    }

    #[test]
    fn test_zero_probability_never_fires() {
        let seq_data = NoteSequence::new(1.0)
            .with_events([NoteEvent::new(60, 1.0, 0.0, 0.1).with_probability(0.0)]);
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);
        assert!(note_ons(&run(&mut seq, 4 * BEAT)).is_empty());
    }

    #[test]
    fn test_global_probability_scales_events() {
        let mut seq_data = NoteSequence::new(0.25)
            .with_events([NoteEvent::new(60, 1.0, 0.0, 0.1).with_probability(0.5)]);
        seq_data.probability = 0.5;
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        // 400 steps at an effective 25 %
        let fired = note_ons(&run(&mut seq, 100 * BEAT)).len();
        assert!((50..=150).contains(&fired), "fired {fired} of 400");
    }

    #[test]
    fn test_ratchet_splits_duration() {
        let seq_data =
            NoteSequence::new(1.0).with_events([NoteEvent::new(60, 1.0, 0.0, 0.5).with_ratchet(4)]);
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let frames: Vec<usize> = note_ons(&run(&mut seq, BEAT)).iter().map(|(f, _)| *f).collect();
        let sub = BEAT / 8;
        assert_eq!(frames.len(), 4);
        for (k, frame) in frames.iter().enumerate() {
            assert!(frame.abs_diff(k * sub) <= 1, "ratchet {k} at {frame}");
        }
    }

    #[test]
    fn test_long_ratchet_fires_every_repeat() {
        let seq_data =
            NoteSequence::new(4.0).with_events([NoteEvent::new(60, 1.0, 0.0, 4.0).with_ratchet(100)]);
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let frames: Vec<usize> = note_ons(&run(&mut seq, 4 * BEAT)).iter().map(|(f, _)| *f).collect();
        // 4 beats / 100 = 960 samples apart
        assert_eq!(frames.len(), 100);
        for (k, frame) in frames.iter().enumerate() {
            assert!(frame.abs_diff(k * 960) <= 1, "repeat {k} at {frame}");
        }
    }

    #[test]
    fn test_ratcheted_chord_keeps_every_voice() {
        let chord = [60, 62, 64, 65, 67];
        let seq_data = NoteSequence::new(1.0).with_events(
            chord.map(|pitch| NoteEvent::new(pitch, 1.0, 0.0, 1.0).with_ratchet(16)),
        );
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let ons = note_ons(&run(&mut seq, BEAT));
        assert_eq!(ons.len(), 80);
        for pitch in chord {
            assert_eq!(ons.iter().filter(|(_, p)| *p == pitch).count(), 16, "pitch {pitch}");
        }
    }

    #[test]
    fn test_reverse_plays_mirrored() {
        let mut seq_data = NoteSequence::new(1.0).with_events([NoteEvent::new(60, 1.0, 0.0, 0.25)]);
        seq_data.direction = Direction::Reverse;
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let ons = note_ons(&run(&mut seq, BEAT));
        assert_eq!(ons, vec![(3 * BEAT / 4, 60)]);
    }

    #[test]
    fn test_ping_pong_alternates_each_pass() {
        let mut seq_data = NoteSequence::new(1.0).with_events([NoteEvent::new(60, 1.0, 0.0, 0.25)]);
        seq_data.direction = Direction::PingPong;
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let frames: Vec<usize> = note_ons(&run(&mut seq, 4 * BEAT)).iter().map(|(f, _)| *f).collect();
        assert_eq!(frames, vec![0, 42_000, 48_000, 90_000]);
    }

    #[test]
    fn test_accumulator_walks_scale_each_pass() {
        let mut seq_data = NoteSequence::new(1.0).with_events([NoteEvent::new(60, 1.0, 0.0, 0.1)]);
        seq_data.accumulator = Some(Accumulator { step: 1, limit: 2 });
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let pitches: Vec<u8> = note_ons(&run(&mut seq, 4 * BEAT)).iter().map(|(_, p)| *p).collect();
        assert_eq!(pitches, vec![60, 62, 64, 60]);
    }

    #[test]
    fn test_mutation_stays_in_scale_and_range() {
        let mut seq_data = NoteSequence::new(0.25).with_events([NoteEvent::new(60, 1.0, 0.0, 0.1)]);
        seq_data.mutation = Some(Mutation { amount: 1.0, range: 3 });
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let key = Key::new(0, ScaleKind::Major);
        let pitches: Vec<u8> = note_ons(&run(&mut seq, 20 * BEAT)).iter().map(|(_, p)| *p).collect();
        assert_eq!(pitches[0], 60, "first pass plays as written");
        assert!(pitches.iter().all(|&p| key.contains(p) && p.abs_diff(60) <= 4));
        assert!(pitches.iter().any(|&p| p != 60), "mutation never moved a note");
    }

    #[test]
    fn test_partial_mutation_moves_some_passes() {
        let mut seq_data = NoteSequence::new(0.25).with_events([NoteEvent::new(60, 1.0, 0.0, 0.1)]);
        seq_data.mutation = Some(Mutation { amount: 0.5, range: 5 });
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let key = Key::new(0, ScaleKind::Major);
        let pitches: Vec<u8> = note_ons(&run(&mut seq, 40 * BEAT)).iter().map(|(_, p)| *p).collect();
        assert_eq!(pitches.len(), 160);
        let moved = pitches.iter().filter(|&&p| p != 60).count();
        assert!((20..=140).contains(&moved), "moved {moved} of 160");
        assert!(pitches.iter().all(|&p| key.contains(p) && p.abs_diff(60) <= 6));
    }

    #[test]
    fn test_zero_mutation_amount_never_moves() {
        let mut seq_data = NoteSequence::new(0.25).with_events([NoteEvent::new(60, 1.0, 0.0, 0.1)]);
        seq_data.mutation = Some(Mutation { amount: 0.0, range: 12 });
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let pitches: Vec<u8> = note_ons(&run(&mut seq, 10 * BEAT)).iter().map(|(_, p)| *p).collect();
        assert!(pitches.iter().all(|&p| p == 60));
    }

    #[test]
    fn test_reload_every_block_keeps_every_step() {
        const BPM: f32 = 133.0;
        const BLOCK: usize = 64;
        // 20 s at 133 BPM is 177.33 steps: boundaries 0..=177 fire
        const TOTAL: usize = 960_000;

        let seq_data = NoteSequence::new(1.0)
            .with_events((0..4).map(|step| NoteEvent::at_step(step, 60, 1.0)));
        let program = SequenceProgram::compile(&seq_data, Key::new(0, ScaleKind::Major));

        let count = |reload: bool| {
            let mut seq = Sequencer::new(Box::new(program.clone()), SAMPLE_RATE);
            seq.start(BPM, 0.0);
            let beats_per_block = BLOCK as f64 / SAMPLE_RATE as f64 * BPM as f64 / 60.0;
            let mut transport = 0.0;
            let mut fired = 0;
            for _ in 0..TOTAL / BLOCK {
                let mut triggers = TriggerBuffer::new();
                seq.process(BLOCK, &mut triggers);
                fired += triggers
                    .iter()
                    .filter(|t| matches!(t.message, SynthMessage::NoteOn { .. }))
                    .count();
                transport += beats_per_block;
                if reload {
                    seq.load(Box::new(program.clone()), transport);
                }
            }
            fired
        };

        assert_eq!(count(false), 178);
        assert_eq!(count(true), 178);
    }

    #[test]
    fn test_arp_replaces_raw_events() {
        let mut seq_data = NoteSequence::new(1.0).with_events([
            NoteEvent::new(60, 1.0, 0.0, 1.0),
            NoteEvent::new(64, 1.0, 0.0, 1.0),
            NoteEvent::new(67, 1.0, 0.0, 1.0),
        ]);
        seq_data.arp = Some(ArpConfig {
            mode: ArpMode::Up,
            rate: ArpRate::Sixteenth,
            gate: 0.5,
        });
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);

        let ons = note_ons(&run(&mut seq, BEAT));
        let pitches: Vec<u8> = ons.iter().map(|(_, p)| *p).collect();
        assert_eq!(pitches, vec![60, 64, 67, 60]);
        assert_eq!(ons[1].0, BEAT / 4);
    }

    #[test]
    fn test_arp_on_empty_sequence_is_silent() {
        let mut seq_data = NoteSequence::new(1.0);
        seq_data.arp = Some(ArpConfig::default());
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);
        assert!(run(&mut seq, 2 * BEAT).is_empty());
    }

    #[test]
    fn test_stop_releases_and_resets() {
        let seq_data = NoteSequence::new(2.0).with_events([NoteEvent::new(60, 1.0, 0.0, 2.0)]);
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 0.0);
        run(&mut seq, BEAT / 2);

        let mut triggers = TriggerBuffer::new();
        seq.stop(&mut triggers);
        assert_eq!(triggers.as_slice(), &[Trigger::note_off(0, 60)]);
        assert_eq!(seq.position(), 0.0);
        assert!(!seq.is_running());
    }

    #[test]
    fn test_phase_locked_start() {
        let seq_data = NoteSequence::new(1.5).with_events([NoteEvent::new(60, 1.0, 0.0, 0.1)]);
        let mut seq = sequencer(&seq_data);
        seq.start(120.0, 4.0);
        assert!((seq.position() - 1.0).abs() < 1e-9);
        assert_eq!(seq.cycle(), 2);

        // next loop start is half a beat away
        let ons = note_ons(&run(&mut seq, BEAT));
        assert_eq!(ons.len(), 1);
        assert!(ons[0].0.abs_diff(BEAT / 2) <= 1);
    }
}
