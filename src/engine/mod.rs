//! The realtime engine: a control-side handle and a render-side renderer
//! joined by two lock-free rings.
//!
//! ```text
//!  control thread                       audio callback
//!  ──────────────                       ──────────────
//!  EngineHandle ── EngineCommand ring ──> EngineRenderer
//!       ^                                     │
//!       └──────────── Retired ring ───────────┘
//!       └──────── Arc<Telemetry> (atomics) ───┘
//! ```

pub mod command;
pub mod renderer;
pub mod sync;
pub mod telemetry;
pub mod transport;

use std::sync::Arc;

use rtrb::RingBuffer;

pub use command::{EngineCommand, Retired, COMMAND_CAPACITY, RETIRED_CAPACITY};
pub use renderer::EngineRenderer;
pub use sync::GraphSync;
pub use telemetry::Telemetry;
pub use transport::Transport;

use crate::MAX_NODES;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub sample_rate: f32,
    /// Capacity of the command ring.
    pub command_capacity: usize,
    /// Node subgraphs the renderer can hold at once.
    pub max_nodes: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            command_capacity: COMMAND_CAPACITY,
            max_nodes: MAX_NODES,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(sample_rate: f32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }
}

/// Control-side end of the engine.
pub struct EngineHandle {
    sync: GraphSync,
    transport: Transport,
    telemetry: Arc<Telemetry>,
    config: EngineConfig,
}

impl EngineHandle {
    /// Create both halves. The renderer goes to the audio callback.
    pub fn new(config: EngineConfig) -> (Self, EngineRenderer) {
        let max_nodes = config.max_nodes.max(1);
        let (command_tx, command_rx) = RingBuffer::new(config.command_capacity.max(16));
        let (retired_tx, retired_rx) = RingBuffer::new(RETIRED_CAPACITY);
        let telemetry = Arc::new(Telemetry::new(max_nodes));

        let renderer = EngineRenderer::new(
            command_rx,
            retired_tx,
            Arc::clone(&telemetry),
            max_nodes,
            config.sample_rate,
        );
        let handle = Self {
            sync: GraphSync::new(command_tx, retired_rx, max_nodes, config.sample_rate),
            transport: Transport::default(),
            telemetry,
            config,
        };
        (handle, renderer)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sync(&self) -> &GraphSync {
        &self.sync
    }

    pub fn sync_mut(&mut self) -> &mut GraphSync {
        &mut self.sync
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn telemetry(&self) -> &Arc<Telemetry> {
        &self.telemetry
    }

    pub fn start(&mut self) {
        self.transport.start(&mut self.sync);
    }

    pub fn stop(&mut self) {
        self.transport.stop(&mut self.sync);
    }

    pub fn set_bpm(&mut self, bpm: f32) -> f32 {
        self.transport.set_bpm(bpm, &mut self.sync)
    }

    pub(crate) fn reset_transport(&mut self, bpm: f32) {
        self.transport.reset(bpm);
    }
}
