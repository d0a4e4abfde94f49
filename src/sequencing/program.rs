use super::{build_pool, Accumulator, ArpConfig, ArpEntry, Direction, Key, Mutation, NoteSequence, STEP_BEATS};

/// A note as the render thread sees it: already bucketed into a step, with
/// its sub-step delay and effective gating resolved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduledNote {
    /// Index into the per-event mutation offsets.
    pub slot: u16,
    pub pitch: u8,
    pub velocity: f32,
    /// Beats after the step boundary at which the note starts.
    pub delay: f64,
    pub duration: f64,
    pub probability: f32,
    pub ratchet: u8,
}

/// Notes grouped by the step they start in.
#[derive(Debug, Clone, Default)]
pub struct StepTable {
    offsets: Box<[u32]>,
    notes: Box<[ScheduledNote]>,
}

impl StepTable {
    fn build(steps: usize, mut notes: Vec<(usize, ScheduledNote)>) -> Self {
        notes.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.delay.total_cmp(&b.1.delay)));

        let mut offsets = vec![0u32; steps + 1];
        for (step, _) in &notes {
            offsets[step + 1] += 1;
        }
        for i in 1..offsets.len() {
            offsets[i] += offsets[i - 1];
        }

        Self {
            offsets: offsets.into_boxed_slice(),
            notes: notes.into_iter().map(|(_, n)| n).collect(),
        }
    }

    #[inline]
    pub fn step(&self, step: usize) -> &[ScheduledNote] {
        match (self.offsets.get(step), self.offsets.get(step + 1)) {
            (Some(&from), Some(&to)) => &self.notes[from as usize..to as usize],
            _ => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Everything a [`Sequencer`](super::Sequencer) needs, compiled ahead of time
/// on the control thread so playback never sorts, searches or allocates.
#[derive(Debug, Clone)]
pub struct SequenceProgram {
    pub length_beats: f64,
    pub steps: usize,
    pub direction: Direction,
    pub probability: f32,
    pub mutation: Option<Mutation>,
    pub accumulator: Option<Accumulator>,
    pub key: Key,
    pub forward: StepTable,
    pub reverse: StepTable,
    pub arp: Option<ArpConfig>,
    pub arp_pool: Box<[ArpEntry]>,
    /// Per-event pitch offsets redrawn at each wrap. Owned here so the
    /// render side has storage sized for this program.
    pub mutation_offsets: Box<[i8]>,
}

impl SequenceProgram {
    pub fn compile(sequence: &NoteSequence, key: Key) -> Self {
        let length = sequence.length_beats();
        let steps = sequence.length_steps().max(1);

        let mut forward = Vec::with_capacity(sequence.events().len());
        let mut reverse = Vec::with_capacity(sequence.events().len());

        for (slot, event) in sequence.events().iter().enumerate() {
            if event.start_beats >= length || slot > u16::MAX as usize {
                continue;
            }
            let duration = event.duration_beats.clamp(0.0, length).max(1e-3);
            let note = ScheduledNote {
                slot: slot as u16,
                pitch: event.pitch,
                velocity: event.velocity,
                delay: 0.0,
                duration,
                probability: event.probability.unwrap_or(1.0).clamp(0.0, 1.0),
                ratchet: event.ratchet.unwrap_or(1).max(1),
            };

            forward.push(bucket(note, event.start_beats, steps));

            let mirrored = (length - event.start_beats - duration).max(0.0);
            reverse.push(bucket(note, mirrored, steps));
        }

        let arp_pool = match &sequence.arp {
            Some(config) => build_pool(sequence, config).into_boxed_slice(),
            None => Box::default(),
        };

        Self {
            length_beats: length,
            steps,
            direction: sequence.direction,
            probability: sequence.probability.clamp(0.0, 1.0),
            mutation: sequence.mutation,
            accumulator: sequence.accumulator,
            key,
            forward: StepTable::build(steps, forward),
            reverse: StepTable::build(steps, reverse),
            arp: sequence.arp,
            arp_pool,
            mutation_offsets: vec![0; sequence.events().len()].into_boxed_slice(),
        }
    }

    /// An empty one-bar program.
    pub fn silent() -> Self {
        Self::compile(&NoteSequence::default(), Key::default())
    }

    /// Table for pass `cycle`.
    #[inline]
    pub fn table(&self, cycle: u64) -> &StepTable {
        match self.direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
            Direction::PingPong if cycle % 2 == 0 => &self.forward,
            Direction::PingPong => &self.reverse,
        }
    }
}

fn bucket(mut note: ScheduledNote, start: f64, steps: usize) -> (usize, ScheduledNote) {
    let step = ((start / STEP_BEATS + 1e-9).floor() as usize).min(steps - 1);
    note.delay = (start - step as f64 * STEP_BEATS).max(0.0);
    (step, note)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::NoteEvent;

    #[test]
    fn test_notes_land_in_their_steps() {
        let seq = NoteSequence::new(1.0).with_events([
            NoteEvent::new(60, 1.0, 0.0, 0.25),
            NoteEvent::new(62, 1.0, 0.6, 0.25),
        ]);
        let program = SequenceProgram::compile(&seq, Key::default());

        assert_eq!(program.steps, 4);
        assert_eq!(program.forward.step(0)[0].pitch, 60);
        let off_grid = program.forward.step(2)[0];
        assert_eq!(off_grid.pitch, 62);
        assert!((off_grid.delay - 0.1).abs() < 1e-9);
        assert!(program.forward.step(1).is_empty());
    }

    #[test]
    fn test_reverse_mirrors_inside_loop() {
        let seq = NoteSequence::new(1.0).with_events([NoteEvent::new(60, 1.0, 0.0, 0.25)]);
        let program = SequenceProgram::compile(&seq, Key::default());
        assert!(program.reverse.step(0).is_empty());
        assert_eq!(program.reverse.step(3)[0].pitch, 60);
    }

    #[test]
    fn test_events_past_loop_end_are_dropped() {
        let seq = NoteSequence::new(1.0).with_events([NoteEvent::new(60, 1.0, 2.0, 0.25)]);
        let program = SequenceProgram::compile(&seq, Key::default());
        assert!(program.forward.is_empty());
    }

    #[test]
    fn test_ping_pong_alternates() {
        let mut seq = NoteSequence::new(1.0);
        seq.direction = Direction::PingPong;
        let program = SequenceProgram::compile(&seq, Key::default());
        assert!(std::ptr::eq(program.table(0), &program.forward));
        assert!(std::ptr::eq(program.table(1), &program.reverse));
    }
}
