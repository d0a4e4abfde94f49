//! arbor - terminal host for a node-tree project
//!
//! Run with: cargo run [-- project.json]

mod app;
mod ui;

use std::fs::File;
use std::sync::Mutex;

use app::Arbor;
use color_eyre::eyre::{Result as EyreResult, WrapErr};

/// The terminal belongs to the TUI, so logs go to a file.
const LOG_FILE: &str = "arbor.log";

fn main() -> EyreResult<()> {
    color_eyre::install()?;

    let log = File::create(LOG_FILE).wrap_err("failed to create log file")?;
    tracing_subscriber::fmt()
        .with_writer(Mutex::new(log))
        .with_ansi(false)
        .init();

    let arbor = match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .wrap_err_with(|| format!("failed to read {path}"))?;
            Arbor::from_json(json)
        }
        None => Arbor::demo(),
    };
    arbor.run()
}
