/*
Dynamics
========

Both units follow the level of the signal and derive a gain from it.

Compressor (feed-forward, peak detector):

  env   one-pole follower with separate attack/release coefficients
  over  = max(0, level_db(env) − threshold_db)
  gain  = −over · (1 − 1/ratio)          (in dB), then + makeup

Limiter ("Shore" on the master bus):

  The follower attacks instantly, so any sample whose magnitude exceeds the
  ceiling gets the full reduction on that same sample. Release is smooth.
  A final clamp to ±ceiling makes it brick-wall even for inter-sample
  overshoot of the gain computer. Left and right share one gain so the
  stereo image does not wander.
*/

#[inline]
fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

#[inline]
fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.max(1e-9).log10()
}

#[inline]
fn time_coefficient(seconds: f32, sample_rate: f32) -> f32 {
    (-1.0 / (seconds.max(1e-4) * sample_rate)).exp()
}

pub struct Compressor {
    threshold_db: f32,
    ratio: f32,
    makeup: f32,
    attack_coeff: f32,
    release_coeff: f32,
    envelope: f32,
}

impl Compressor {
    pub fn new(sample_rate: f32) -> Self {
        let mut comp = Self {
            threshold_db: -18.0,
            ratio: 4.0,
            makeup: 1.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
        };
        comp.configure(-18.0, 4.0, 0.005, 0.1, 0.0, sample_rate);
        comp
    }

    pub fn configure(
        &mut self,
        threshold_db: f32,
        ratio: f32,
        attack: f32,
        release: f32,
        makeup_db: f32,
        sample_rate: f32,
    ) {
        self.threshold_db = threshold_db.min(0.0);
        self.ratio = ratio.max(1.0);
        self.makeup = db_to_gain(makeup_db);
        self.attack_coeff = time_coefficient(attack, sample_rate);
        self.release_coeff = time_coefficient(release, sample_rate);
    }

    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let level = input.abs();
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = level + coeff * (self.envelope - level);

        let over = (gain_to_db(self.envelope) - self.threshold_db).max(0.0);
        let reduction_db = -over * (1.0 - 1.0 / self.ratio);
        input * db_to_gain(reduction_db) * self.makeup
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

pub struct Limiter {
    ceiling: f32,
    gain: f32,
    release_coeff: f32,
}

impl Limiter {
    pub fn new(ceiling: f32, sample_rate: f32) -> Self {
        Self {
            ceiling: ceiling.clamp(0.01, 1.0),
            gain: 1.0,
            release_coeff: time_coefficient(0.05, sample_rate),
        }
    }

    pub fn set_ceiling(&mut self, ceiling: f32) {
        self.ceiling = ceiling.clamp(0.01, 1.0);
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    /// Current gain reduction (1.0 = untouched).
    pub fn gain(&self) -> f32 {
        self.gain
    }

    #[inline]
    pub fn process_stereo(&mut self, left: f32, right: f32) -> (f32, f32) {
        let peak = left.abs().max(right.abs());
        let target = if peak > self.ceiling {
            self.ceiling / peak
        } else {
            1.0
        };

        if target < self.gain {
            self.gain = target;
        } else {
            self.gain = target + self.release_coeff * (self.gain - target);
        }

        (
            (left * self.gain).clamp(-self.ceiling, self.ceiling),
            (right * self.gain).clamp(-self.ceiling, self.ceiling),
        )
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_never_exceeds_ceiling() {
        let mut limiter = Limiter::new(0.5, 48_000.0);
        for i in 0..4800 {
            let x = 3.0 * ((i as f32) * 0.05).sin();
            let (l, r) = limiter.process_stereo(x, -x);
            assert!(l.abs() <= 0.5 + 1e-6 && r.abs() <= 0.5 + 1e-6);
        }
    }

    #[test]
    fn test_limiter_leaves_quiet_signal_alone() {
        let mut limiter = Limiter::new(0.9, 48_000.0);
        let (l, r) = limiter.process_stereo(0.2, -0.1);
        assert!((l - 0.2).abs() < 1e-6 && (r + 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_compressor_reduces_loud_signal() {
        let mut comp = Compressor::new(48_000.0);
        comp.configure(-20.0, 8.0, 0.001, 0.1, 0.0, 48_000.0);
        let mut last = 0.0;
        for _ in 0..4800 {
            last = comp.process(1.0);
        }
        assert!(last < 0.5, "expected gain reduction, got {last}");
    }
}
