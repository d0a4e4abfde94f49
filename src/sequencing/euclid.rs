#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Euclidean rhythm descriptor: `pulses` hits spread as evenly as possible
/// over `steps`, rotated right by `rotation`.
///
/// Used when generating notes only. Playback never reads it.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Euclid {
    pub pulses: u32,
    pub steps: u32,
    pub rotation: u32,
}

impl Euclid {
    pub fn new(pulses: u32, steps: u32, rotation: u32) -> Self {
        let steps = steps.clamp(1, 64);
        Self {
            pulses: pulses.min(steps),
            steps,
            rotation,
        }
    }

    /// Bresenham form of Bjorklund: step `i` is a hit when the running
    /// `i · pulses` total crosses a multiple of `steps`. The first step is
    /// always a hit before rotation.
    pub fn pattern(&self) -> Vec<bool> {
        let steps = self.steps.max(1) as usize;
        let pulses = self.pulses.min(self.steps) as usize;
        let rotation = self.rotation as usize % steps;

        let base: Vec<bool> = (0..steps)
            .map(|i| pulses > 0 && (i * pulses) % steps < pulses)
            .collect();

        (0..steps)
            .map(|i| base[(i + steps - rotation) % steps])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(e: Euclid) -> String {
        e.pattern().iter().map(|&b| if b { 'x' } else { '.' }).collect()
    }

    #[test]
    fn test_tresillo() {
        assert_eq!(render(Euclid::new(3, 8, 0)), "x..x..x.");
    }

    #[test]
    fn test_four_on_the_floor() {
        assert_eq!(render(Euclid::new(4, 16, 0)), "x...x...x...x...");
    }

    #[test]
    fn test_rotation_and_bounds() {
        assert_eq!(render(Euclid::new(3, 8, 1)), ".x..x..x");
        assert_eq!(render(Euclid::new(0, 4, 0)), "....");
        assert_eq!(render(Euclid::new(9, 4, 0)), "xxxx");
    }
}
