use tracing::info;

use super::sync::GraphSync;
use crate::tree::{clamp_bpm, DEFAULT_BPM};

/// Play/stop and tempo.
///
/// `start` is a single command: the renderer starts the master bus and every
/// sequencer on the same block, so their loop starts line up to the sample.
#[derive(Debug, Clone, Copy)]
pub struct Transport {
    bpm: f32,
    playing: bool,
}

impl Default for Transport {
    fn default() -> Self {
        Self::new(DEFAULT_BPM)
    }
}

impl Transport {
    pub fn new(bpm: f32) -> Self {
        Self {
            bpm: clamp_bpm(bpm),
            playing: false,
        }
    }

    pub fn bpm(&self) -> f32 {
        self.bpm
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn start(&mut self, sync: &mut GraphSync) {
        info!(bpm = self.bpm, "transport start");
        self.playing = true;
        sync.start_all(self.bpm);
    }

    /// Stop and rewind. There is no pause.
    pub fn stop(&mut self, sync: &mut GraphSync) {
        if !self.playing {
            return;
        }
        info!("transport stop");
        self.playing = false;
        sync.stop_all();
    }

    /// Clamp and store. While playing, only the rate of advance changes.
    /// Returns the tempo actually used.
    pub fn set_bpm(&mut self, bpm: f32, sync: &mut GraphSync) -> f32 {
        let bpm = clamp_bpm(bpm);
        if bpm == self.bpm {
            return bpm;
        }
        self.bpm = bpm;
        if self.playing {
            info!(bpm, "tempo change");
            sync.set_all_bpm(bpm);
        }
        bpm
    }

    /// Forget playing state after the graph was rebuilt.
    pub(crate) fn reset(&mut self, bpm: f32) {
        self.playing = false;
        self.bpm = clamp_bpm(bpm);
    }
}
