use super::chain::EffectChain;
use super::strip::NodeStrip;
use crate::modulation::NodeModulation;
use crate::sequencing::{SequenceProgram, Sequencer};
use crate::synth::message::{push_trigger, SynthMessage, Trigger, TriggerBuffer};
use crate::synth::Instrument;
use crate::tree::NodeId;
use crate::MAX_BLOCK_SIZE;

/// Everything one node renders with:
///
/// ```text
/// sequencer ─┐
///            ├─ triggers ─> instrument ─> effect chain ─> strip ─> bus
/// live keys ─┘
/// ```
///
/// Built whole on the control thread and moved into an engine slot.
pub struct NodeSubgraph {
    id: NodeId,
    sequencer: Sequencer,
    instrument: Box<dyn Instrument>,
    chain: EffectChain,
    strip: NodeStrip,
    triggers: TriggerBuffer,
    /// Live note messages queued since the last block.
    live: TriggerBuffer,
    scratch: Box<[f32]>,
}

impl NodeSubgraph {
    pub fn new(
        id: NodeId,
        program: Box<SequenceProgram>,
        instrument: Box<dyn Instrument>,
        strip: NodeStrip,
        sample_rate: f32,
    ) -> Self {
        Self {
            id,
            sequencer: Sequencer::new(program, sample_rate),
            instrument,
            chain: EffectChain::new(),
            strip,
            triggers: TriggerBuffer::new(),
            live: TriggerBuffer::new(),
            scratch: vec![0.0; MAX_BLOCK_SIZE].into_boxed_slice(),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn sequencer_mut(&mut self) -> &mut Sequencer {
        &mut self.sequencer
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut EffectChain {
        &mut self.chain
    }

    pub fn strip_mut(&mut self) -> &mut NodeStrip {
        &mut self.strip
    }

    pub fn instrument_mut(&mut self) -> &mut dyn Instrument {
        self.instrument.as_mut()
    }

    /// Put in a new voice unit and return the old one. Chain and strip stay.
    pub fn swap_instrument(&mut self, instrument: Box<dyn Instrument>) -> Box<dyn Instrument> {
        std::mem::replace(&mut self.instrument, instrument)
    }

    /// Queue a live message for the start of the next block.
    pub fn queue(&mut self, message: SynthMessage) {
        push_trigger(&mut self.live, Trigger { offset: 0, message });
    }

    /// Stop the sequencer. Its note-offs go out with the next block.
    pub fn stop(&mut self) {
        self.sequencer.stop(&mut self.live);
    }

    pub fn begin_removal(&mut self) {
        self.stop();
        self.live.clear();
        push_trigger(&mut self.live, Trigger { offset: 0, message: SynthMessage::AllNotesOff });
        self.strip.fade_out();
    }

    pub fn is_removable(&self) -> bool {
        self.strip.is_silent()
    }

    pub fn is_removing(&self) -> bool {
        self.strip.is_fading()
    }

    /// Render one block and sum it into the stereo bus.
    pub fn render_into(
        &mut self,
        left: &mut [f32],
        right: &mut [f32],
        modulation: &NodeModulation,
    ) {
        let frames = left.len().min(self.scratch.len());
        if frames == 0 {
            return;
        }

        self.triggers.clear();
        self.triggers.extend(self.live.drain(..));
        self.sequencer.process(frames, &mut self.triggers);

        self.instrument
            .set_modulation(modulation.pitch_semitones, modulation.cutoff_octaves);
        let mono = &mut self.scratch[..frames];
        self.instrument.render(mono, &self.triggers);
        self.chain.process(&mut [&mut *mono], modulation.effect_mix);
        self.strip.mix_into(
            mono,
            &mut left[..frames],
            &mut right[..frames],
            modulation.volume,
            modulation.pan,
        );
    }
}
