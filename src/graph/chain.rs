use arrayvec::ArrayVec;

use super::effect::{EffectSettings, EffectUnit};
use crate::dsp::mix::{blend_dry_wet, SmoothedValue};
use crate::tree::{Effect, EffectId, EffectKind};
use crate::MAX_EFFECTS;

/*
Effect chains
=============

Render side: `EffectChain`, an ordered run of boxed `EffectSlot`s. Each slot
carries a serial number handed out on the control thread when the slot was
built. The serial is the slot's identity; it is how a new ordering finds the
instances it should keep.

Control side: `ChainMirror`, what the renderer is known to hold. Asked to
match a requested `&[Effect]`, it diffs and emits a `ChainPlan`:

    requested:  [A  B' C]          (B' = B with new params)
    mirror:     [B  A  D]

    plan:       [Keep(A) Keep(B, new settings) Insert(C)]
    retired:    D

Rules:
  * same effect id and same kind  -> keep the instance, push new settings
  * same id but a different kind  -> new instance (old one retired)
  * requested == mirror            -> no plan at all

So applying the same list twice sends nothing the second time, and a
bypass toggle is a settings update on a kept slot.

Bypass
------

A bypassed slot is still in place. Its wet amount ramps to zero and once the
ramp settles the unit is skipped entirely, so the dry signal passes through
untouched. Un-bypassing ramps the wet back in.
*/

const MIX_RAMP_SECONDS: f32 = 0.01;
const MAX_CHANNELS: usize = 2;

/// One effect instance as the renderer holds it.
pub struct EffectSlot {
    serial: u64,
    id: EffectId,
    units: ArrayVec<EffectUnit, MAX_CHANNELS>,
    mix: f32,
    bypass: bool,
    wet: SmoothedValue,
}

impl EffectSlot {
    pub fn new(
        serial: u64,
        id: EffectId,
        settings: EffectSettings,
        mix: f32,
        bypass: bool,
        channels: usize,
        sample_rate: f32,
    ) -> Self {
        let mut units = ArrayVec::new();
        for channel in 0..channels.clamp(1, MAX_CHANNELS) {
            units.push(EffectUnit::new(settings, channel, sample_rate));
        }
        let mix = mix.clamp(0.0, 1.0);
        let start = if bypass { 0.0 } else { mix };
        Self {
            serial,
            id,
            units,
            mix,
            bypass,
            wet: SmoothedValue::with_time(start, MIX_RAMP_SECONDS, sample_rate),
        }
    }

    pub fn serial(&self) -> u64 {
        self.serial
    }

    pub fn id(&self) -> EffectId {
        self.id
    }

    pub fn kind(&self) -> Option<EffectKind> {
        self.units.first().map(EffectUnit::kind)
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    pub fn configure(&mut self, settings: EffectSettings, mix: f32, bypass: bool) {
        for unit in self.units.iter_mut() {
            unit.configure(settings);
        }
        self.mix = mix.clamp(0.0, 1.0);
        self.bypass = bypass;
        self.wet.set_target(if bypass { 0.0 } else { self.mix });
    }

    fn set_bpm(&mut self, bpm: f32) {
        for unit in self.units.iter_mut() {
            unit.set_bpm(bpm);
        }
    }

    /// Process `channels` in place. `mix_offset` is added to the wet amount
    /// unless bypassed.
    fn process(&mut self, channels: &mut [&mut [f32]], mix_offset: f32) {
        if self.bypass && self.wet.is_settled() {
            return;
        }
        let frames = channels.first().map_or(0, |c| c.len());
        for frame in 0..frames {
            let wet = self.wet.next();
            let amount = if self.bypass {
                wet
            } else {
                (wet + mix_offset).clamp(0.0, 1.0)
            };
            for (unit, channel) in self.units.iter_mut().zip(channels.iter_mut()) {
                let dry = channel[frame];
                channel[frame] = blend_dry_wet(dry, unit.process(dry), amount);
            }
        }
    }

    fn reset(&mut self) {
        self.units.iter_mut().for_each(EffectUnit::reset);
    }
}

/// One step of a [`ChainPlan`].
pub enum ChainEntry {
    /// Reuse the slot with this serial, with new settings.
    Keep {
        serial: u64,
        settings: EffectSettings,
        mix: f32,
        bypass: bool,
    },
    /// A slot built on the control thread. Taken by the renderer.
    Insert(Option<Box<EffectSlot>>),
}

/// A complete target ordering for one chain.
#[derive(Default)]
pub struct ChainPlan {
    entries: ArrayVec<ChainEntry, MAX_EFFECTS>,
}

impl ChainPlan {
    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The render-side chain.
#[derive(Default)]
pub struct EffectChain {
    slots: ArrayVec<Box<EffectSlot>, MAX_EFFECTS>,
}

impl EffectChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> impl Iterator<Item = &EffectSlot> + '_ {
        self.slots.iter().map(|s| &**s)
    }

    /// Serials in processing order.
    pub fn serials(&self) -> ArrayVec<u64, MAX_EFFECTS> {
        self.slots.iter().map(|s| s.serial).collect()
    }

    /// Rebuild the ordering from `plan`. Slots the plan does not keep are
    /// handed to `retire`. Never allocates.
    pub fn apply(&mut self, plan: &mut ChainPlan, mut retire: impl FnMut(Box<EffectSlot>)) {
        let mut old = std::mem::take(&mut self.slots);
        for entry in plan.entries.iter_mut() {
            let slot = match entry {
                ChainEntry::Keep {
                    serial,
                    settings,
                    mix,
                    bypass,
                } => {
                    let Some(index) = old.iter().position(|s| s.serial == *serial) else {
                        debug_assert!(false, "kept slot {serial} is not in the chain");
                        continue;
                    };
                    let mut slot = old.remove(index);
                    slot.configure(*settings, *mix, *bypass);
                    slot
                }
                ChainEntry::Insert(slot) => match slot.take() {
                    Some(slot) => slot,
                    None => continue,
                },
            };
            if let Err(err) = self.slots.try_push(slot) {
                retire(err.element());
            }
        }
        for slot in old.drain(..) {
            retire(slot);
        }
    }

    /// Take every slot out, e.g. when the chain itself is being dropped.
    pub fn drain(&mut self, mut retire: impl FnMut(Box<EffectSlot>)) {
        for slot in self.slots.drain(..) {
            retire(slot);
        }
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.slots.iter_mut().for_each(|s| s.set_bpm(bpm));
    }

    #[inline]
    pub fn process(&mut self, channels: &mut [&mut [f32]], mix_offset: f32) {
        for slot in self.slots.iter_mut() {
            slot.process(channels, mix_offset);
        }
    }

    pub fn reset(&mut self) {
        self.slots.iter_mut().for_each(|s| s.reset());
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct MirrorEntry {
    serial: u64,
    id: EffectId,
    settings: EffectSettings,
    mix: f32,
    bypass: bool,
}

/// Control-side record of what a render chain holds.
#[derive(Debug, Clone)]
pub struct ChainMirror {
    entries: Vec<MirrorEntry>,
    channels: usize,
    sample_rate: f32,
}

impl ChainMirror {
    pub fn new(channels: usize, sample_rate: f32) -> Self {
        Self {
            entries: Vec::new(),
            channels,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn serials(&self) -> Vec<u64> {
        self.entries.iter().map(|e| e.serial).collect()
    }

    /// Diff `effects` against the mirror. Returns `None` when nothing would
    /// change. Anything past `MAX_EFFECTS` is ignored.
    pub fn plan(&mut self, effects: &[Effect], next_serial: &mut u64) -> Option<Box<ChainPlan>> {
        let effects = &effects[..effects.len().min(MAX_EFFECTS)];

        let unchanged = effects.len() == self.entries.len()
            && effects.iter().zip(&self.entries).all(|(effect, entry)| {
                entry.id == effect.id
                    && entry.settings == EffectSettings::from_effect(effect)
                    && entry.mix == effect.mix.clamp(0.0, 1.0)
                    && entry.bypass == effect.bypass
            });
        if unchanged {
            return None;
        }

        let mut plan = Box::<ChainPlan>::default();
        let mut entries = Vec::with_capacity(effects.len());

        for effect in effects {
            let settings = EffectSettings::from_effect(effect);
            let mix = effect.mix.clamp(0.0, 1.0);
            let kept = self
                .entries
                .iter()
                .find(|e| e.id == effect.id && e.settings.kind() == effect.kind)
                .filter(|e| !entries.iter().any(|n: &MirrorEntry| n.serial == e.serial));

            let serial = match kept {
                Some(existing) => {
                    plan.entries.push(ChainEntry::Keep {
                        serial: existing.serial,
                        settings,
                        mix,
                        bypass: effect.bypass,
                    });
                    existing.serial
                }
                None => {
                    let serial = *next_serial;
                    *next_serial += 1;
                    plan.entries.push(ChainEntry::Insert(Some(Box::new(EffectSlot::new(
                        serial,
                        effect.id,
                        settings,
                        mix,
                        effect.bypass,
                        self.channels,
                        self.sample_rate,
                    )))));
                    serial
                }
            };
            entries.push(MirrorEntry {
                serial,
                id: effect.id,
                settings,
                mix,
                bypass: effect.bypass,
            });
        }

        self.entries = entries;
        Some(plan)
    }

    /// Forget everything, e.g. after the render chain was replaced wholesale.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
