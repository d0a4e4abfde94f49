//! Messages between the control thread and the renderer.

use crate::dsp::envelope::EnvelopeShape;
use crate::graph::{ChainPlan, EffectSlot, NodeSubgraph};
use crate::modulation::ModulationPlan;
use crate::sequencing::SequenceProgram;
use crate::synth::message::SynthMessage;
use crate::synth::Instrument;

/// Default capacity of the control → render ring.
pub const COMMAND_CAPACITY: usize = 1024;
/// Capacity of the render → control ring of retired objects.
pub const RETIRED_CAPACITY: usize = 4096;

/// A graph or transport change, applied by the renderer at the next block
/// boundary in the order sent. Everything boxed in here was allocated on the
/// control thread.
pub enum EngineCommand {
    /// Drop every node subgraph and the master chain, stop the transport.
    Reset,
    InstallNode {
        slot: usize,
        subgraph: Box<NodeSubgraph>,
    },
    /// Fade out, then detach and retire.
    RemoveNode {
        slot: usize,
    },
    ConfigureChain {
        slot: usize,
        plan: Box<ChainPlan>,
    },
    SwapInstrument {
        slot: usize,
        instrument: Box<dyn Instrument>,
    },
    LoadSequence {
        slot: usize,
        program: Box<SequenceProgram>,
    },
    ConfigurePatch {
        slot: usize,
        envelope: EnvelopeShape,
        volume: f32,
        pan: f32,
    },
    Note {
        slot: usize,
        message: SynthMessage,
    },
    ConfigureMasterChain(Box<ChainPlan>),
    MasterVolume(f32),
    Shore {
        enabled: bool,
        ceiling: f32,
    },
    Modulation(Box<ModulationPlan>),
    /// Start every sequencer at beat zero inside one block.
    Start {
        bpm: f32,
    },
    Stop,
    SetBpm(f32),
}

impl EngineCommand {
    pub fn name(&self) -> &'static str {
        match self {
            EngineCommand::Reset => "reset",
            EngineCommand::InstallNode { .. } => "install_node",
            EngineCommand::RemoveNode { .. } => "remove_node",
            EngineCommand::ConfigureChain { .. } => "configure_chain",
            EngineCommand::SwapInstrument { .. } => "swap_instrument",
            EngineCommand::LoadSequence { .. } => "load_sequence",
            EngineCommand::ConfigurePatch { .. } => "configure_patch",
            EngineCommand::Note { .. } => "note",
            EngineCommand::ConfigureMasterChain(_) => "configure_master_chain",
            EngineCommand::MasterVolume(_) => "master_volume",
            EngineCommand::Shore { .. } => "shore",
            EngineCommand::Modulation(_) => "modulation",
            EngineCommand::Start { .. } => "start",
            EngineCommand::Stop => "stop",
            EngineCommand::SetBpm(_) => "set_bpm",
        }
    }
}

/// Objects the renderer is done with, sent back so they are dropped on the
/// control thread. Only their `Drop` matters.
#[allow(dead_code)]
pub enum Retired {
    Node {
        slot: usize,
        subgraph: Box<NodeSubgraph>,
    },
    Instrument(Box<dyn Instrument>),
    Program(Box<SequenceProgram>),
    EffectSlot(Box<EffectSlot>),
    ChainPlan(Box<ChainPlan>),
    Modulation(Box<ModulationPlan>),
}
