use std::collections::{HashMap, VecDeque};

use rtrb::{Consumer, Producer, PushError};
use tracing::{debug, info, warn};

use super::command::{EngineCommand, Retired};
use crate::error::{Error, Result};
use crate::graph::{ChainMirror, NodeStrip, NodeSubgraph};
use crate::modulation::ModulationPlan;
use crate::sequencing::{Key, NoteSequence, SequenceProgram};
use crate::synth::build_instrument;
use crate::synth::message::SynthMessage;
use crate::tree::{Effect, Node, NodeId, Project, SoundPatch, SoundType};

/*
Graph synchronizer
==================

Control-side half of the engine. Keeps the renderer's set of node subgraphs
equal to the tree's node set by sending the smallest command that gets
there. It never touches render memory: everything goes over the command
ring, and whatever the renderer replaces comes back over the retired ring
to be dropped here.

Slots
-----

Each live node owns one renderer slot:

    Free ──add_node──> Live(id) ──remove_node──> Draining(id) ──retired──> Free

A draining slot is still fading out on the render side, so it is only
handed out again once the renderer has returned its subgraph. A full
rebuild (`build_graph`) resets all slots in one go: the renderer applies
`Reset` before anything queued after it.

Backlog
-------

If the ring is full, commands wait in a local queue and are retried, in
order, before anything newer is sent.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Free,
    Live(NodeId),
    Draining(NodeId),
}

#[derive(Debug, Clone)]
struct NodeMirror {
    slot: usize,
    chain: ChainMirror,
    sound: SoundType,
}

pub struct GraphSync {
    commands: Producer<EngineCommand>,
    retired: Consumer<Retired>,
    backlog: VecDeque<EngineCommand>,
    sample_rate: f32,
    slots: Vec<SlotState>,
    nodes: HashMap<NodeId, NodeMirror>,
    master_chain: ChainMirror,
    next_serial: u64,
}

impl GraphSync {
    pub(crate) fn new(
        commands: Producer<EngineCommand>,
        retired: Consumer<Retired>,
        slots: usize,
        sample_rate: f32,
    ) -> Self {
        Self {
            commands,
            retired,
            backlog: VecDeque::new(),
            sample_rate,
            slots: vec![SlotState::Free; slots],
            nodes: HashMap::new(),
            master_chain: ChainMirror::new(2, sample_rate),
            next_serial: 0,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn slot_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.get(&id).map(|n| n.slot)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Slots still fading out on the render side.
    pub fn draining(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, SlotState::Draining(_)))
            .count()
    }

    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    /// Serials of the control-side record of a node's chain, in order.
    pub fn chain_serials(&self, id: NodeId) -> Option<Vec<u64>> {
        self.nodes.get(&id).map(|n| n.chain.serials())
    }

    /// Tear everything down and rebuild from the project's playing tree.
    /// Used on load; audible by nature.
    pub fn build_graph(&mut self, project: &Project) -> Result<()> {
        info!(
            nodes = project.tree().len(),
            "rebuilding audio graph"
        );
        self.send(EngineCommand::Reset);
        self.slots.fill(SlotState::Free);
        self.nodes.clear();
        self.master_chain.clear();

        self.configure_master_fx_chain(&project.master.effects);
        self.configure_master_volume(project.master.volume);
        self.configure_shore(project.master.shore.enabled, project.master.shore.ceiling);

        let tree = project.tree();
        let mut result = Ok(());
        for node in tree.nodes() {
            let key = project.resolve_key(node.id).unwrap_or(project.key);
            if let Err(err) = self.add_node(node, key) {
                warn!(node = %node.id, %err, "node left out of the graph");
                result = Err(err);
            }
        }
        result
    }

    /// Build one subgraph and hand it to the renderer. Other slots are not
    /// touched. Adding a node that is already live does nothing.
    pub fn add_node(&mut self, node: &Node, key: Key) -> Result<usize> {
        self.collect_retired();
        if let Some(mirror) = self.nodes.get(&node.id) {
            return Ok(mirror.slot);
        }
        let slot = self
            .slots
            .iter()
            .position(|s| *s == SlotState::Free)
            .ok_or(Error::GraphFull {
                max: self.slots.len(),
            })?;

        let program = Box::new(SequenceProgram::compile(&node.sequence, key));
        let instrument = build_instrument(&node.patch, self.sample_rate);
        let strip = NodeStrip::new(
            node.patch.clamped_volume(),
            node.patch.clamped_pan(),
            self.sample_rate,
        );
        let mut subgraph = Box::new(NodeSubgraph::new(
            node.id,
            program,
            instrument,
            strip,
            self.sample_rate,
        ));

        let mut chain = ChainMirror::new(1, self.sample_rate);
        if let Some(mut plan) = chain.plan(&node.effects, &mut self.next_serial) {
            // not shared yet, so the plan is applied right here
            subgraph.chain_mut().apply(&mut plan, drop);
        }

        self.slots[slot] = SlotState::Live(node.id);
        self.nodes.insert(
            node.id,
            NodeMirror {
                slot,
                chain,
                sound: node.patch.sound.clone(),
            },
        );
        debug!(node = %node.id, name = %node.name, slot, "node added");
        self.send(EngineCommand::InstallNode { slot, subgraph });
        Ok(slot)
    }

    /// Fade a node out and detach it. Its slot frees up once the renderer
    /// hands the subgraph back.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let mirror = self.nodes.remove(&id).ok_or(Error::UnknownNode(id))?;
        self.slots[mirror.slot] = SlotState::Draining(id);
        debug!(node = %id, slot = mirror.slot, "node removal started");
        self.send(EngineCommand::RemoveNode { slot: mirror.slot });
        Ok(())
    }

    /// Make a node's chain match `effects`. Returns whether anything was
    /// sent; an unchanged list sends nothing.
    pub fn configure_node_fx_chain(&mut self, id: NodeId, effects: &[Effect]) -> Result<bool> {
        let mirror = self.nodes.get_mut(&id).ok_or(Error::UnknownNode(id))?;
        let Some(plan) = mirror.chain.plan(effects, &mut self.next_serial) else {
            return Ok(false);
        };
        let slot = mirror.slot;
        debug!(node = %id, effects = plan.len(), "node effect chain reconfigured");
        self.send(EngineCommand::ConfigureChain { slot, plan });
        Ok(true)
    }

    /// Replace only the voice unit of a node. Chain and strip stay wired.
    pub fn swap_engine(&mut self, id: NodeId, patch: &SoundPatch) -> Result<()> {
        let mirror = self.nodes.get_mut(&id).ok_or(Error::UnknownNode(id))?;
        mirror.sound = patch.sound.clone();
        let slot = mirror.slot;
        let instrument = build_instrument(patch, self.sample_rate);
        debug!(node = %id, "voice unit swapped");
        self.send(EngineCommand::SwapInstrument { slot, instrument });
        Ok(())
    }

    /// Push envelope, volume and pan. A changed sound type swaps the voice
    /// unit instead of reconfiguring it.
    pub fn configure_patch(&mut self, id: NodeId, patch: &SoundPatch) -> Result<()> {
        let mirror = self.nodes.get(&id).ok_or(Error::UnknownNode(id))?;
        if mirror.sound != patch.sound {
            return self.swap_engine(id, patch);
        }
        let slot = mirror.slot;
        self.send(EngineCommand::ConfigurePatch {
            slot,
            envelope: patch.envelope.shape(),
            volume: patch.clamped_volume(),
            pan: patch.clamped_pan(),
        });
        Ok(())
    }

    /// Compile and install a node's sequence. A running sequencer keeps its
    /// phase relative to the transport.
    pub fn load_sequence(&mut self, id: NodeId, sequence: &NoteSequence, key: Key) -> Result<()> {
        let slot = self.slot_of(id).ok_or(Error::UnknownNode(id))?;
        let program = Box::new(SequenceProgram::compile(sequence, key));
        debug!(
            node = %id,
            events = sequence.events().len(),
            length = sequence.length_beats(),
            "sequence loaded"
        );
        self.send(EngineCommand::LoadSequence { slot, program });
        Ok(())
    }

    /// Install an arpeggiator change. The pool is rebuilt from `sequence`
    /// as part of its program.
    pub fn set_arp(&mut self, id: NodeId, sequence: &NoteSequence, key: Key) -> Result<()> {
        debug!(node = %id, arp = ?sequence.arp, "arpeggiator changed");
        self.load_sequence(id, sequence, key)
    }

    pub fn note_on(&mut self, id: NodeId, pitch: u8, velocity: f32) -> Result<()> {
        self.note(id, SynthMessage::NoteOn {
            pitch: pitch.min(127),
            velocity: velocity.clamp(0.0, 1.0),
        })
    }

    pub fn note_off(&mut self, id: NodeId, pitch: u8) -> Result<()> {
        self.note(id, SynthMessage::NoteOff { pitch })
    }

    fn note(&mut self, id: NodeId, message: SynthMessage) -> Result<()> {
        let slot = self.slot_of(id).ok_or(Error::UnknownNode(id))?;
        self.send(EngineCommand::Note { slot, message });
        Ok(())
    }

    pub fn configure_master_fx_chain(&mut self, effects: &[Effect]) -> bool {
        match self.master_chain.plan(effects, &mut self.next_serial) {
            Some(plan) => {
                debug!(effects = plan.len(), "master effect chain reconfigured");
                self.send(EngineCommand::ConfigureMasterChain(plan));
                true
            }
            None => false,
        }
    }

    pub fn configure_master_volume(&mut self, volume: f32) {
        self.send(EngineCommand::MasterVolume(volume.clamp(0.0, 1.5)));
    }

    pub fn configure_shore(&mut self, enabled: bool, ceiling: f32) {
        self.send(EngineCommand::Shore {
            enabled,
            ceiling: ceiling.clamp(0.01, 1.0),
        });
    }

    pub fn set_modulation(&mut self, plan: ModulationPlan) {
        debug!(routes = plan.routes().len(), "modulation plan installed");
        self.send(EngineCommand::Modulation(Box::new(plan)));
    }

    pub(crate) fn start_all(&mut self, bpm: f32) {
        self.send(EngineCommand::Start { bpm });
    }

    pub(crate) fn stop_all(&mut self) {
        self.send(EngineCommand::Stop);
    }

    pub(crate) fn set_all_bpm(&mut self, bpm: f32) {
        self.send(EngineCommand::SetBpm(bpm));
    }

    /// Drop everything the renderer handed back and free drained slots.
    /// Returns how many objects were collected.
    pub fn collect_retired(&mut self) -> usize {
        let mut count = 0;
        while let Ok(item) = self.retired.pop() {
            if let Retired::Node { slot, subgraph } = &item {
                let id = subgraph.id();
                if self.slots.get(*slot) == Some(&SlotState::Draining(id)) {
                    self.slots[*slot] = SlotState::Free;
                    debug!(node = %id, slot, "slot freed");
                }
            }
            drop(item);
            count += 1;
        }
        count
    }

    /// Retry backlogged commands. Returns how many are still waiting.
    pub fn flush(&mut self) -> usize {
        while let Some(command) = self.backlog.pop_front() {
            if let Err(PushError::Full(command)) = self.commands.push(command) {
                self.backlog.push_front(command);
                break;
            }
        }
        self.backlog.len()
    }

    fn send(&mut self, command: EngineCommand) {
        self.collect_retired();
        if self.flush() > 0 {
            self.backlog.push_back(command);
            return;
        }
        if let Err(PushError::Full(command)) = self.commands.push(command) {
            warn!(
                command = command.name(),
                "command ring full, queueing locally"
            );
            self.backlog.push_back(command);
        }
    }
}
