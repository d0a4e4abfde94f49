use std::sync::Arc;

use arrayvec::ArrayVec;
use rtrb::{Consumer, Producer};

use super::command::{EngineCommand, Retired};
use super::telemetry::Telemetry;
use crate::graph::{MasterBus, NodeSubgraph};
use crate::modulation::{ModulationPlan, NodeModulation};
use crate::tree::DEFAULT_BPM;
use crate::MAX_BLOCK_SIZE;

/// Retired objects held back while the ring is full.
const STASH_CAPACITY: usize = 64;

/*
Renderer
========

Owned by the audio callback. Per block:

  1. apply every queued command, in order
  2. hand back anything stashed while the retired ring was full
  3. evaluate modulation once for the block
  4. render each occupied slot into the stereo bus, detaching slots that
     finished their removal fade
  5. master chain, volume, Shore
  6. advance transport and LFO clocks, publish telemetry

Start, Stop and SetBpm are applied to every sequencer while draining the
queue, before any slot renders, so all nodes see them on the same sample.

Nothing here allocates, locks or frees. Replaced objects go back over the
retired ring.
*/

pub struct EngineRenderer {
    commands: Consumer<EngineCommand>,
    retired: Producer<Retired>,
    stash: ArrayVec<Retired, STASH_CAPACITY>,

    slots: Box<[Option<Box<NodeSubgraph>>]>,
    master: MasterBus,
    modulation: Box<ModulationPlan>,
    offsets: Box<[NodeModulation]>,
    telemetry: Arc<Telemetry>,

    sample_rate: f32,
    playing: bool,
    bpm: f32,
    transport_beats: f64,
    lfo_seconds: f64,

    left: Box<[f32]>,
    right: Box<[f32]>,
}

impl EngineRenderer {
    pub(crate) fn new(
        commands: Consumer<EngineCommand>,
        retired: Producer<Retired>,
        telemetry: Arc<Telemetry>,
        slots: usize,
        sample_rate: f32,
    ) -> Self {
        Self {
            commands,
            retired,
            stash: ArrayVec::new(),
            slots: (0..slots).map(|_| None).collect(),
            master: MasterBus::new(0.8, true, 0.98, sample_rate),
            modulation: Box::default(),
            offsets: vec![NodeModulation::default(); slots].into_boxed_slice(),
            telemetry,
            sample_rate,
            playing: false,
            bpm: DEFAULT_BPM,
            transport_beats: 0.0,
            lfo_seconds: 0.0,
            left: vec![0.0; MAX_BLOCK_SIZE].into_boxed_slice(),
            right: vec![0.0; MAX_BLOCK_SIZE].into_boxed_slice(),
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn transport_beats(&self) -> f64 {
        self.transport_beats
    }

    pub fn slot(&self, slot: usize) -> Option<&NodeSubgraph> {
        self.slots.get(slot)?.as_deref()
    }

    pub fn occupied_slots(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn master(&self) -> &MasterBus {
        &self.master
    }

    /// The modulation plan currently applied.
    pub fn modulation(&self) -> &ModulationPlan {
        &self.modulation
    }

    /// Fill an interleaved output buffer. Channels beyond two get silence;
    /// a mono device gets the left channel.
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let total = data.len() / channels;
        let mut done = 0;
        while done < total {
            let frames = (total - done).min(MAX_BLOCK_SIZE);
            self.process_block(frames);
            let out = &mut data[done * channels..(done + frames) * channels];
            for (i, frame) in out.chunks_exact_mut(channels).enumerate() {
                frame[0] = self.left[i];
                if channels > 1 {
                    frame[1] = self.right[i];
                    frame[2..].fill(0.0);
                }
            }
            done += frames;
        }
    }

    /// Fill separate left/right buffers of equal length.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());
        let total = left.len().min(right.len());
        let mut done = 0;
        while done < total {
            let frames = (total - done).min(MAX_BLOCK_SIZE);
            self.process_block(frames);
            left[done..done + frames].copy_from_slice(&self.left[..frames]);
            right[done..done + frames].copy_from_slice(&self.right[..frames]);
            done += frames;
        }
    }

    fn process_block(&mut self, frames: usize) {
        self.apply_commands();
        self.flush_stash();

        let left = &mut self.left[..frames];
        let right = &mut self.right[..frames];
        left.fill(0.0);
        right.fill(0.0);

        self.offsets.fill(NodeModulation::default());
        self.modulation.apply(self.lfo_seconds, &mut self.offsets);

        for index in 0..self.slots.len() {
            let Some(subgraph) = self.slots[index].as_deref_mut() else {
                continue;
            };
            subgraph.render_into(left, right, &self.offsets[index]);
            let sequencer = subgraph.sequencer();
            self.telemetry
                .publish_slot(index, sequencer.position(), sequencer.cycle());

            if subgraph.is_removable() {
                if let Some(subgraph) = self.slots[index].take() {
                    Self::retire_into(
                        &mut self.retired,
                        &mut self.stash,
                        &self.telemetry,
                        Retired::Node {
                            slot: index,
                            subgraph,
                        },
                    );
                }
            }
        }

        self.master.process(left, right);

        let seconds = frames as f64 / self.sample_rate as f64;
        if self.playing {
            self.transport_beats += seconds * self.bpm as f64 / 60.0;
        }
        self.lfo_seconds += seconds;
        self.telemetry
            .publish_transport(self.playing, self.transport_beats);
    }

    fn apply_commands(&mut self) {
        while let Ok(command) = self.commands.pop() {
            self.apply(command);
        }
    }

    fn apply(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Reset => {
                for index in 0..self.slots.len() {
                    if let Some(subgraph) = self.slots[index].take() {
                        self.retire(Retired::Node {
                            slot: index,
                            subgraph,
                        });
                    }
                }
                let Self {
                    master,
                    retired,
                    stash,
                    telemetry,
                    ..
                } = self;
                master.chain_mut().drain(|slot| {
                    Self::retire_into(retired, stash, telemetry, Retired::EffectSlot(slot))
                });
                self.playing = false;
                self.transport_beats = 0.0;
            }
            EngineCommand::InstallNode { slot, mut subgraph } => {
                let Some(target) = self.slots.get_mut(slot) else {
                    self.retire(Retired::Node { slot, subgraph });
                    return;
                };
                subgraph.chain_mut().set_bpm(self.bpm);
                if self.playing {
                    subgraph
                        .sequencer_mut()
                        .start(self.bpm, self.transport_beats);
                }
                if let Some(old) = target.replace(subgraph) {
                    self.retire(Retired::Node { slot, subgraph: old });
                }
            }
            EngineCommand::RemoveNode { slot } => {
                if let Some(subgraph) = self.slot_mut(slot) {
                    subgraph.begin_removal();
                }
            }
            EngineCommand::ConfigureChain { slot, mut plan } => {
                let Self {
                    slots,
                    retired,
                    stash,
                    telemetry,
                    ..
                } = self;
                if let Some(subgraph) = slots.get_mut(slot).and_then(|s| s.as_deref_mut()) {
                    subgraph.chain_mut().apply(&mut plan, |slot| {
                        Self::retire_into(retired, stash, telemetry, Retired::EffectSlot(slot))
                    });
                }
                self.retire(Retired::ChainPlan(plan));
            }
            EngineCommand::SwapInstrument { slot, instrument } => {
                match self.slot_mut(slot) {
                    Some(subgraph) => {
                        let old = subgraph.swap_instrument(instrument);
                        self.retire(Retired::Instrument(old));
                    }
                    None => self.retire(Retired::Instrument(instrument)),
                }
            }
            EngineCommand::LoadSequence { slot, program } => {
                let beats = self.transport_beats;
                match self.slot_mut(slot) {
                    Some(subgraph) => {
                        let old = subgraph.sequencer_mut().load(program, beats);
                        self.retire(Retired::Program(old));
                    }
                    None => self.retire(Retired::Program(program)),
                }
            }
            EngineCommand::ConfigurePatch {
                slot,
                envelope,
                volume,
                pan,
            } => {
                if let Some(subgraph) = self.slot_mut(slot) {
                    subgraph.instrument_mut().set_envelope(envelope);
                    let strip = subgraph.strip_mut();
                    strip.set_volume(volume);
                    strip.set_pan(pan);
                }
            }
            EngineCommand::Note { slot, message } => {
                if let Some(subgraph) = self.slot_mut(slot) {
                    subgraph.queue(message);
                }
            }
            EngineCommand::ConfigureMasterChain(mut plan) => {
                let bpm = self.bpm;
                let Self {
                    master,
                    retired,
                    stash,
                    telemetry,
                    ..
                } = self;
                master.chain_mut().apply(&mut plan, |slot| {
                    Self::retire_into(retired, stash, telemetry, Retired::EffectSlot(slot))
                });
                master.chain_mut().set_bpm(bpm);
                self.retire(Retired::ChainPlan(plan));
            }
            EngineCommand::MasterVolume(volume) => self.master.set_volume(volume),
            EngineCommand::Shore { enabled, ceiling } => {
                self.master.configure_shore(enabled, ceiling)
            }
            EngineCommand::Modulation(plan) => {
                let old = std::mem::replace(&mut self.modulation, plan);
                self.retire(Retired::Modulation(old));
            }
            EngineCommand::Start { bpm } => {
                self.bpm = bpm;
                self.master.set_bpm(bpm);
                self.transport_beats = 0.0;
                self.playing = true;
                for subgraph in self.slots.iter_mut().flatten() {
                    if subgraph.is_removing() {
                        continue;
                    }
                    subgraph.chain_mut().set_bpm(bpm);
                    subgraph.sequencer_mut().start(bpm, 0.0);
                }
            }
            EngineCommand::Stop => {
                self.playing = false;
                self.transport_beats = 0.0;
                for subgraph in self.slots.iter_mut().flatten() {
                    subgraph.stop();
                }
            }
            EngineCommand::SetBpm(bpm) => {
                self.bpm = bpm;
                self.master.set_bpm(bpm);
                for subgraph in self.slots.iter_mut().flatten() {
                    subgraph.chain_mut().set_bpm(bpm);
                    subgraph.sequencer_mut().set_bpm(bpm);
                }
            }
        }
    }

    fn slot_mut(&mut self, slot: usize) -> Option<&mut NodeSubgraph> {
        self.slots
            .get_mut(slot)?
            .as_deref_mut()
            .filter(|s| !s.is_removing())
    }

    fn retire(&mut self, item: Retired) {
        Self::retire_into(&mut self.retired, &mut self.stash, &self.telemetry, item);
    }

    fn retire_into(
        retired: &mut Producer<Retired>,
        stash: &mut ArrayVec<Retired, STASH_CAPACITY>,
        telemetry: &Telemetry,
        item: Retired,
    ) {
        if let Err(rtrb::PushError::Full(item)) = retired.push(item) {
            telemetry.note_retire_overflow();
            if let Err(err) = stash.try_push(item) {
                // Both full: the control thread has stopped draining. Keeping
                // the object alive is worse than one deallocation here.
                debug_assert!(false, "retired stash overflow");
                drop(err.element());
            }
        }
    }

    fn flush_stash(&mut self) {
        while let Some(item) = self.stash.pop() {
            if let Err(rtrb::PushError::Full(item)) = self.retired.push(item) {
                // capacity is guaranteed: we just popped
                let _ = self.stash.try_push(item);
                break;
            }
        }
    }
}
