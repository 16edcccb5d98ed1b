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
use std::thread;

use crossbeam_channel::Receiver;
use tracing::{info, span, warn, Level};

use crate::transport::Update;
use crate::util;

/// Renders transport updates as log lines until the transport hangs up.
/// Position updates arrive on every sink tick, so they are thinned to one
/// per timeline second.
pub fn spawn(updates: Receiver<Update>) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let span = span!(Level::INFO, "display");
        let _enter = span.enter();

        let mut last_position_secs = u64::MAX;
        for update in updates {
            match update {
                Update::Position(position) => {
                    let secs = position.as_secs();
                    if secs != last_position_secs {
                        last_position_secs = secs;
                        info!(position = %util::timestamp(position), "Position");
                    }
                }
                Update::Duration(duration) => {
                    info!(duration = %util::timestamp(duration), "Duration")
                }
                Update::State(state) => info!(state = %state, "State"),
                Update::Speed { control, rate } => info!(control, rate, "Speed"),
                Update::CheckpointsChanged => info!("Checkpoints changed"),
                Update::LoopChanged(Some(region)) => info!(region = %region, "Loop active"),
                Update::LoopChanged(None) => info!("Loop off"),
                Update::WaveformUpdated(summary) => {
                    info!(points = summary.left.len(), "Waveform updated")
                }
                Update::ChannelFailed { track, message } => {
                    warn!(channel = %track, cause = %message, "Channel failed")
                }
            }
        }
    })
}
