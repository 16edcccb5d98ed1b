// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::warn;

use crate::audio;
use crate::controller::{self, keyboard};
use crate::display;
use crate::stems::Session;
use crate::transport::Transport;
use crate::waveform::StemSelection;

mod error;
mod session;

pub use error::ConfigError;
pub use session::Practice;

/// Parses a practice session configuration from a YAML file.
pub fn parse_practice(file: &PathBuf) -> Result<Practice, ConfigError> {
    Ok(serde_yml::from_str(&fs::read_to_string(file)?)?)
}

/// Initializes the transport and controller from a practice configuration.
/// The controller owns the transport and can be waited on until the user
/// quits. The returned backend handle, if any, must be kept alive for as
/// long as playback runs.
pub fn init_transport_and_controller(
    config_path: &PathBuf,
) -> Result<(controller::Controller, Option<audio::rodio::Backend>), Box<dyn Error>> {
    let practice = parse_practice(config_path)?;
    let session = Arc::new(Session::from_dir(&practice.song_dir())?);

    let (events_tx, events_rx) = crossbeam_channel::unbounded();
    let (sinks, backend) = audio::get_sinks(practice.device(), &session, events_tx)?;
    let mut transport = Transport::new(session, sinks, events_rx, practice.options()?);

    let _display = display::spawn(transport.subscribe());
    if let Err(e) = transport.select_waveform(StemSelection::All) {
        warn!(err = e.as_ref(), "Unable to summarize waveform");
    }

    let controller = controller::Controller::new(transport, Arc::new(keyboard::Driver::new()))?;
    Ok((controller, backend))
}
