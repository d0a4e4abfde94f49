use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::ids::EffectId;

/// The closed set of effect categories a chain can hold.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectKind {
    Filter,
    Distortion,
    Delay,
    Reverb,
    Compressor,
    /// Filter with an LFO on the cutoff.
    AutoFilter,
    /// Level modulated by an LFO.
    Tremolo,
    Multiband,
    Gain,
    /// Granular smear.
    Smear,
}

impl EffectKind {
    pub const ALL: [EffectKind; 10] = [
        EffectKind::Filter,
        EffectKind::Distortion,
        EffectKind::Delay,
        EffectKind::Reverb,
        EffectKind::Compressor,
        EffectKind::AutoFilter,
        EffectKind::Tremolo,
        EffectKind::Multiband,
        EffectKind::Gain,
        EffectKind::Smear,
    ];

    /// Starting wet amount for a freshly added effect.
    pub fn default_mix(self) -> f32 {
        match self {
            EffectKind::Delay | EffectKind::Smear => 0.35,
            EffectKind::Reverb => 0.3,
            _ => 1.0,
        }
    }
}

/// One entry of a node's or the master bus's effect chain.
///
/// Parameters are a loose name → value map so documents stay readable and
/// forward compatible. Unknown names are ignored and missing ones fall back
/// to defaults when the render unit is configured.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Effect {
    pub id: EffectId,
    pub kind: EffectKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub params: BTreeMap<String, f32>,
    pub mix: f32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub bypass: bool,
}

impl Effect {
    pub fn new(kind: EffectKind) -> Self {
        Self {
            id: EffectId::new(),
            kind,
            params: BTreeMap::new(),
            mix: kind.default_mix(),
            bypass: false,
        }
    }

    pub fn with_param(mut self, name: &str, value: f32) -> Self {
        self.params.insert(name.to_owned(), value);
        self
    }

    pub fn with_mix(mut self, mix: f32) -> Self {
        self.mix = mix.clamp(0.0, 1.0);
        self
    }

    pub fn param_or(&self, name: &str, default: f32) -> f32 {
        self.params
            .get(name)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }
}
