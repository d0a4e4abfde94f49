use super::chain::EffectChain;
use crate::dsp::dynamics::Limiter;
use crate::dsp::mix::SmoothedValue;

const VOLUME_RAMP_SECONDS: f32 = 0.02;

/// Stereo master: effect chain, then volume, then the Shore limiter.
///
/// The limiter is always the last stage. Disabling it only skips it.
pub struct MasterBus {
    chain: EffectChain,
    volume: SmoothedValue,
    shore: Limiter,
    shore_enabled: bool,
    bpm: f32,
}

impl MasterBus {
    pub fn new(volume: f32, shore_enabled: bool, ceiling: f32, sample_rate: f32) -> Self {
        Self {
            chain: EffectChain::new(),
            volume: SmoothedValue::with_time(volume, VOLUME_RAMP_SECONDS, sample_rate),
            shore: Limiter::new(ceiling, sample_rate),
            shore_enabled,
            bpm: 120.0,
        }
    }

    pub fn chain(&self) -> &EffectChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut EffectChain {
        &mut self.chain
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume.set_target(volume);
    }

    pub fn configure_shore(&mut self, enabled: bool, ceiling: f32) {
        self.shore_enabled = enabled;
        self.shore.set_ceiling(ceiling);
        if !enabled {
            self.shore.reset();
        }
    }

    pub fn shore_enabled(&self) -> bool {
        self.shore_enabled
    }

    pub fn ceiling(&self) -> f32 {
        self.shore.ceiling()
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn set_bpm(&mut self, bpm: f32) {
        self.bpm = bpm;
        self.chain.set_bpm(bpm);
    }

    #[inline]
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.chain.process(&mut [&mut *left, &mut *right], 0.0);

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let gain = self.volume.next();
            let (ol, or) = (*l * gain, *r * gain);
            (*l, *r) = if self.shore_enabled {
                self.shore.process_stereo(ol, or)
            } else {
                (ol, or)
            };
        }
    }
}
