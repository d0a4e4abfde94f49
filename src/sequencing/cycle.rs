//! Polyrhythmic cycle length.
//!
//! Every loop is counted in steps (`max(1, round(len / step))`). The tree's
//! natural cycle is the least common multiple of those counts: the first
//! point where every loop is back at its start at the same time.
//!
//! ```text
//! A: 2 beats  |--|--|--|
//! B: 3 beats  |---|---|
//!             0     6      LCM(8, 12) steps = 24 steps = 6 beats
//! ```

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = b;
        b = a % b;
        a = t;
    }
    a
}

fn lcm(a: u64, b: u64) -> u64 {
    if a == 0 || b == 0 {
        return a.max(b);
    }
    (a / gcd(a, b)).saturating_mul(b)
}

/// Cycle length in beats for the given loop lengths.
///
/// An empty set yields one step.
pub fn cycle_length_beats(lengths: impl IntoIterator<Item = f64>, step: f64) -> f64 {
    let steps = lengths
        .into_iter()
        .map(|len| (len / step).round().max(1.0) as u64)
        .fold(1u64, lcm);
    steps as f64 * step
}

/// Cycle length memoized against a timing revision counter.
///
/// The owner bumps its revision only when a node is added, removed or
/// changes loop length, so unrelated edits (renames, patch tweaks) never
/// trigger a recompute.
#[derive(Debug, Default, Clone)]
pub struct CycleCache {
    cached: Option<(u64, f64)>,
}

impl CycleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_compute(&mut self, revision: u64, compute: impl FnOnce() -> f64) -> f64 {
        match self.cached {
            Some((rev, value)) if rev == revision => value,
            _ => {
                let value = compute();
                self.cached = Some((revision, value));
                value
            }
        }
    }

    pub fn invalidate(&mut self) {
        self.cached = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencing::STEP_BEATS;

    #[test]
    fn test_whole_beat_steps() {
        assert_eq!(cycle_length_beats([4.0, 6.0, 3.0], 1.0), 12.0);
    }

    #[test]
    fn test_sixteenth_steps() {
        assert_eq!(cycle_length_beats([2.0, 3.0], STEP_BEATS), 6.0);
        assert_eq!(cycle_length_beats([1.25, 1.0], STEP_BEATS), 5.0);
    }

    #[test]
    fn test_order_invariant() {
        let a = cycle_length_beats([3.0, 4.0, 2.5], STEP_BEATS);
        let b = cycle_length_beats([2.5, 3.0, 4.0], STEP_BEATS);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_is_one_step() {
        assert_eq!(cycle_length_beats(std::iter::empty(), STEP_BEATS), STEP_BEATS);
    }

    #[test]
    fn test_degenerate_lengths_count_as_one_step() {
        assert_eq!(cycle_length_beats([0.0, 0.01], STEP_BEATS), STEP_BEATS);
    }

    #[test]
    fn test_cache_recomputes_only_on_new_revision() {
        let mut cache = CycleCache::new();
        let mut calls = 0;
        for revision in [1, 1, 1, 2, 2] {
            cache.get_or_compute(revision, || {
                calls += 1;
                4.0
            });
        }
        assert_eq!(calls, 2);
    }
}
