use std::collections::BTreeMap;

use super::{LfoDefinition, ModulationRouting, NodeParameter};
use crate::dsp::lfo::{self, LfoWaveform};
use crate::tree::NodeId;

/// Semitones per unit of pitch modulation.
pub const PITCH_RANGE_SEMITONES: f32 = 12.0;

/*
Modulation router
=================

Compiled on the control thread whenever LFOs, routings or the node set
change, then shipped whole to the renderer. The renderer keeps one running
clock in seconds and, once per block, evaluates

    value = wave(phase₀ + rate · t) · depth

for every route and adds it into that node's offsets. Phase is derived from
the clock instead of being accumulated, so swapping in a new plan never
makes an LFO jump, and `values_at(t)` on the control side gives exactly what
the renderer heard at `t`.

A routing is dropped at compile time when its LFO is missing or disabled or
its node has no live slot. Nothing errors.
*/

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedLfo {
    pub rate_hz: f32,
    pub phase: f32,
    pub waveform: LfoWaveform,
}

impl PlannedLfo {
    #[inline]
    pub fn value_at(&self, seconds: f64) -> f32 {
        let phase = (self.phase as f64 + self.rate_hz as f64 * seconds).rem_euclid(1.0);
        lfo::sample(self.waveform, phase as f32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedRoute {
    /// Index into the plan's LFOs.
    pub lfo: usize,
    pub node: NodeId,
    /// Engine slot of the node.
    pub slot: usize,
    pub parameter: NodeParameter,
    pub depth: f32,
}

/// Summed offsets for one node over one block.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NodeModulation {
    pub volume: f32,
    pub pan: f32,
    pub pitch_semitones: f32,
    pub cutoff_octaves: f32,
    pub effect_mix: f32,
}

impl NodeModulation {
    #[inline]
    pub fn add(&mut self, parameter: NodeParameter, value: f32) {
        match parameter {
            NodeParameter::Volume => self.volume += value,
            NodeParameter::Pan => self.pan += value,
            NodeParameter::Pitch => self.pitch_semitones += value * PITCH_RANGE_SEMITONES,
            NodeParameter::FilterCutoff => self.cutoff_octaves += value,
            NodeParameter::EffectMix => self.effect_mix += value,
        }
    }

    pub fn is_neutral(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModulationPlan {
    lfos: Box<[PlannedLfo]>,
    routes: Box<[PlannedRoute]>,
}

impl ModulationPlan {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn lfos(&self) -> &[PlannedLfo] {
        &self.lfos
    }

    pub fn routes(&self) -> &[PlannedRoute] {
        &self.routes
    }

    /// Add every route's value at `seconds` into `out`, indexed by slot.
    /// Routes whose slot is out of range are ignored.
    #[inline]
    pub fn apply(&self, seconds: f64, out: &mut [NodeModulation]) {
        for route in self.routes.iter() {
            let Some(target) = out.get_mut(route.slot) else {
                continue;
            };
            let value = self.lfos[route.lfo].value_at(seconds) * route.depth;
            target.add(route.parameter, value);
        }
    }

    /// Control-side view: summed `(node, parameter) → value` at `seconds`.
    pub fn values_at(&self, seconds: f64) -> BTreeMap<(NodeId, NodeParameter), f32> {
        let mut values = BTreeMap::new();
        for route in self.routes.iter() {
            let value = self.lfos[route.lfo].value_at(seconds) * route.depth;
            *values.entry((route.node, route.parameter)).or_insert(0.0) += value;
        }
        values
    }
}

pub struct ModulationRouter;

impl ModulationRouter {
    /// Build a plan. `slot_of` maps a node to its engine slot, or `None` when
    /// the node is gone.
    pub fn compile(
        lfos: &[LfoDefinition],
        routings: &[ModulationRouting],
        slot_of: impl Fn(NodeId) -> Option<usize>,
    ) -> ModulationPlan {
        let mut planned = Vec::new();
        let mut lfo_index = Vec::with_capacity(lfos.len());
        for def in lfos {
            if def.enabled && def.rate_hz.is_finite() {
                lfo_index.push((def.id, planned.len()));
                planned.push(PlannedLfo {
                    rate_hz: def.rate_hz.max(0.0),
                    phase: def.phase,
                    waveform: def.waveform,
                });
            }
        }

        let routes = routings
            .iter()
            .filter(|r| r.depth.is_finite())
            .filter_map(|r| {
                let lfo = lfo_index.iter().find(|(id, _)| *id == r.lfo)?.1;
                let slot = slot_of(r.node)?;
                Some(PlannedRoute {
                    lfo,
                    node: r.node,
                    slot,
                    parameter: r.parameter,
                    depth: r.depth,
                })
            })
            .collect();

        ModulationPlan {
            lfos: planned.into_boxed_slice(),
            routes,
        }
    }
}
