use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Render → control status, published once per block with relaxed stores.
///
/// Beat values are `f64` bit patterns in `AtomicU64`s.
pub struct Telemetry {
    playing: AtomicBool,
    transport_beats: AtomicU64,
    blocks: AtomicU64,
    positions: Box<[AtomicU64]>,
    cycles: Box<[AtomicU64]>,
    retire_overflows: AtomicU64,
}

impl Telemetry {
    pub fn new(slots: usize) -> Self {
        Self {
            playing: AtomicBool::new(false),
            transport_beats: AtomicU64::new(0f64.to_bits()),
            blocks: AtomicU64::new(0),
            positions: (0..slots).map(|_| AtomicU64::new(0f64.to_bits())).collect(),
            cycles: (0..slots).map(|_| AtomicU64::new(0)).collect(),
            retire_overflows: AtomicU64::new(0),
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    /// Beats since the transport started.
    pub fn transport_beats(&self) -> f64 {
        f64::from_bits(self.transport_beats.load(Ordering::Relaxed))
    }

    pub fn blocks_rendered(&self) -> u64 {
        self.blocks.load(Ordering::Relaxed)
    }

    /// Loop position of the node in `slot`, in beats.
    pub fn position(&self, slot: usize) -> Option<f64> {
        self.positions
            .get(slot)
            .map(|p| f64::from_bits(p.load(Ordering::Relaxed)))
    }

    pub fn cycle(&self, slot: usize) -> Option<u64> {
        self.cycles.get(slot).map(|c| c.load(Ordering::Relaxed))
    }

    /// Times the retired ring was full and an object had to wait a block.
    pub fn retire_overflows(&self) -> u64 {
        self.retire_overflows.load(Ordering::Relaxed)
    }

    pub(crate) fn publish_transport(&self, playing: bool, beats: f64) {
        self.playing.store(playing, Ordering::Relaxed);
        self.transport_beats.store(beats.to_bits(), Ordering::Relaxed);
        self.blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn publish_slot(&self, slot: usize, position: f64, cycle: u64) {
        if let (Some(p), Some(c)) = (self.positions.get(slot), self.cycles.get(slot)) {
            p.store(position.to_bits(), Ordering::Relaxed);
            c.store(cycle, Ordering::Relaxed);
        }
    }

    pub(crate) fn note_retire_overflow(&self) {
        self.retire_overflows.fetch_add(1, Ordering::Relaxed);
    }
}
