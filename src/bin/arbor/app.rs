//! Audio device setup and the glue between the session and the renderer.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use rtrb::RingBuffer;
use tracing::{error, info};

use arbor::{
    voices::{NodePreset, NodeTemplate},
    EngineConfig, Project, Session,
};

use super::ui::UiApp;

/// Samples kept for the oscilloscope.
const SCOPE_CAPACITY: usize = 8192;

enum Source {
    Demo,
    Json(String),
}

pub struct Arbor {
    source: Source,
}

impl Arbor {
    /// Three branches over a lead root: a two-bar bass, a three-beat pluck
    /// and a drum kit, so the loops drift and realign every 24 beats.
    pub fn demo() -> Self {
        Self {
            source: Source::Demo,
        }
    }

    pub fn from_json(json: String) -> Self {
        Self {
            source: Source::Json(json),
        }
    }

    pub fn run(self) -> EyreResult<()> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| eyre!("no default output device available"))?;
        let config = device
            .default_output_config()
            .wrap_err("failed to fetch default output config")?;

        let sample_rate = config.sample_rate().0 as f32;
        let channels = config.channels() as usize;
        info!(sample_rate, channels, "audio device opened");

        let engine_config = EngineConfig::with_sample_rate(sample_rate);
        let (session, mut renderer) = match self.source {
            Source::Demo => {
                let (mut session, renderer) = Session::new(engine_config);
                build_demo(&mut session)?;
                (session, renderer)
            }
            Source::Json(json) => {
                let project = Project::from_json(&json).wrap_err("invalid project document")?;
                Session::with_project(project, engine_config)?
            }
        };

        let (mut scope_tx, scope_rx) = RingBuffer::<f32>::new(SCOPE_CAPACITY);

        let stream = device.build_output_stream(
            &config.into(),
            move |data: &mut [f32], _| {
                renderer.render_interleaved(data, channels);
                // first channel only; a full scope just skips samples
                for frame in data.chunks_exact(channels) {
                    if scope_tx.push(frame[0]).is_err() {
                        break;
                    }
                }
            },
            |err| error!(%err, "audio stream error"),
            None,
        )?;
        stream.play()?;

        let mut app = UiApp::new(session, scope_rx, sample_rate);
        let mut terminal = ratatui::init();
        let result = app.run(&mut terminal);
        ratatui::restore();
        drop(stream);
        result
    }
}

fn build_demo(session: &mut Session) -> EyreResult<()> {
    let root = session.root_id();
    session.update_node(root, |node| *node = NodePreset::Lead.build())?;
    for preset in [NodePreset::Bass, NodePreset::Pluck, NodePreset::Drums] {
        session.add_child_node(root, NodeTemplate::Preset(preset))?;
    }
    Ok(())
}
