#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScaleKind {
    Chromatic,
    #[default]
    Major,
    Minor,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Locrian,
    HarmonicMinor,
    MajorPentatonic,
    MinorPentatonic,
    Blues,
}

impl ScaleKind {
    /// Semitone offsets from the root, ascending, within one octave.
    pub fn intervals(self) -> &'static [u8] {
        match self {
            ScaleKind::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            ScaleKind::Major => &[0, 2, 4, 5, 7, 9, 11],
            ScaleKind::Minor => &[0, 2, 3, 5, 7, 8, 10],
            ScaleKind::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            ScaleKind::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            ScaleKind::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            ScaleKind::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            ScaleKind::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            ScaleKind::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            ScaleKind::MajorPentatonic => &[0, 2, 4, 7, 9],
            ScaleKind::MinorPentatonic => &[0, 3, 5, 7, 10],
            ScaleKind::Blues => &[0, 3, 5, 6, 7, 10],
        }
    }
}

/// A root pitch class (0 = C .. 11 = B) and a scale.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Key {
    pub root: u8,
    pub scale: ScaleKind,
}

impl Key {
    pub fn new(root: u8, scale: ScaleKind) -> Self {
        Self {
            root: root % 12,
            scale,
        }
    }

    pub fn contains(&self, pitch: u8) -> bool {
        let class = (pitch as i32 - self.root as i32).rem_euclid(12) as u8;
        self.scale.intervals().contains(&class)
    }

    /// Nearest pitch in the scale. Ties resolve downward.
    pub fn quantize(&self, pitch: u8) -> u8 {
        let (degree, octave) = self.degree_of(pitch);
        self.pitch_at(degree, octave)
    }

    /// Move `degrees` scale steps from `pitch` (quantized first).
    pub fn transpose_degrees(&self, pitch: u8, degrees: i32) -> u8 {
        let (degree, octave) = self.degree_of(pitch);
        let len = self.scale.intervals().len() as i32;
        let absolute = octave * len + degree as i32 + degrees;
        self.pitch_at(absolute.rem_euclid(len) as usize, absolute.div_euclid(len))
    }

    /// Index of the nearest scale degree and the octave relative to the root
    /// at MIDI octave 0.
    fn degree_of(&self, pitch: u8) -> (usize, i32) {
        let intervals = self.scale.intervals();
        let relative = pitch as i32 - self.root as i32;
        let octave = relative.div_euclid(12);
        let class = relative.rem_euclid(12);

        let mut best = (0usize, octave, i32::MAX);
        // Candidates include the root of the next octave so that B snaps up
        // to C in C major rather than down to A.
        for (i, &interval) in intervals.iter().enumerate() {
            let distance = (class - interval as i32).abs();
            if distance < best.2 {
                best = (i, octave, distance);
            }
        }
        let up = 12 - class;
        if up < best.2 {
            best = (0, octave + 1, up);
        }
        (best.0, best.1)
    }

    fn pitch_at(&self, degree: usize, octave: i32) -> u8 {
        let intervals = self.scale.intervals();
        let pitch = self.root as i32 + octave * 12 + intervals[degree] as i32;
        pitch.clamp(0, 127) as u8
    }
}

/// First present override wins: node, then tree, then project.
pub fn resolve_key(node: Option<Key>, tree: Option<Key>, project: Key) -> Key {
    node.or(tree).unwrap_or(project)
}

#[cfg(test)]
mod tests {
    use super::*;

    const C_MAJOR: Key = Key {
        root: 0,
        scale: ScaleKind::Major,
    };

    #[test]
    fn test_quantize_snaps_to_scale() {
        assert_eq!(C_MAJOR.quantize(60), 60);
        assert_eq!(C_MAJOR.quantize(61), 60); // C# ties to C
        assert_eq!(C_MAJOR.quantize(66), 65); // F# ties to F
        assert_eq!(C_MAJOR.quantize(71), 71);
    }

    #[test]
    fn test_transpose_walks_degrees() {
        assert_eq!(C_MAJOR.transpose_degrees(60, 1), 62);
        assert_eq!(C_MAJOR.transpose_degrees(60, 2), 64);
        assert_eq!(C_MAJOR.transpose_degrees(60, 7), 72);
        assert_eq!(C_MAJOR.transpose_degrees(60, -1), 59);
        assert_eq!(C_MAJOR.transpose_degrees(0, -3), 0);
    }

    #[test]
    fn test_override_chain() {
        let node = Key::new(2, ScaleKind::Dorian);
        let tree = Key::new(9, ScaleKind::Minor);
        assert_eq!(resolve_key(Some(node), Some(tree), C_MAJOR), node);
        assert_eq!(resolve_key(None, Some(tree), C_MAJOR), tree);
        assert_eq!(resolve_key(None, None, C_MAJOR), C_MAJOR);
    }

    #[test]
    fn test_pentatonic_membership() {
        let key = Key::new(9, ScaleKind::MinorPentatonic);
        assert!(key.contains(57)); // A
        assert!(key.contains(60)); // C
        assert!(!key.contains(59)); // B
    }
}
