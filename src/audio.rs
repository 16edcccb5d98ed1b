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
use std::{error::Error, fmt, time::Duration};

use crossbeam_channel::Sender;

use crate::stems::{Session, TrackId};

pub mod mock;
pub mod rodio;

/// The playback state a sink reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkState {
    Playing,
    Paused,
    Stopped,
}

/// What a sink reports back to the transport.
#[derive(Clone, Debug)]
pub enum SinkEventKind {
    /// The playback position changed.
    PositionChanged(Duration),
    /// The media duration became known or changed.
    DurationChanged(Duration),
    /// The playback state changed.
    StateChanged(SinkState),
    /// The backend failed; the channel needs to be reloaded to recover.
    Failed(String),
}

/// A notification from one channel's sink. Delivered over a channel and
/// drained on the control thread; sinks never call into the transport.
#[derive(Clone, Debug)]
pub struct SinkEvent {
    /// The track the sink belongs to.
    pub track: TrackId,
    /// What happened.
    pub kind: SinkEventKind,
}

/// The transport primitives of one channel's audio backend. Implementations
/// must not block the caller; position and state notifications are reported
/// asynchronously through the event channel the sink was constructed with.
pub trait Sink: fmt::Display + Send {
    /// Starts or resumes playback.
    fn play(&self) -> Result<(), Box<dyn Error>>;

    /// Pauses playback.
    fn pause(&self) -> Result<(), Box<dyn Error>>;

    /// Seeks to an absolute position.
    fn seek(&self, position: Duration) -> Result<(), Box<dyn Error>>;

    /// Sets the playback rate.
    fn set_rate(&self, rate: f64) -> Result<(), Box<dyn Error>>;

    /// Sets the output gain.
    fn set_gain(&self, gain: f32) -> Result<(), Box<dyn Error>>;

    /// The current playback position.
    fn position(&self) -> Duration;

    /// The media duration.
    fn duration(&self) -> Duration;
}

/// Builds one sink per stem for the given device name. Device names starting
/// with `mock` select the simulated backend; the returned backend handle, if
/// any, must be kept alive for as long as the sinks play.
pub fn get_sinks(
    device: &str,
    session: &Session,
    events_tx: Sender<SinkEvent>,
) -> Result<(Vec<(TrackId, Box<dyn Sink>)>, Option<rodio::Backend>), Box<dyn Error>> {
    if device.starts_with("mock") {
        let sinks = session
            .stems()
            .iter()
            .map(|stem| {
                (
                    stem.id(),
                    Box::new(mock::Sink::new(stem.id(), stem.duration(), events_tx.clone()))
                        as Box<dyn Sink>,
                )
            })
            .collect();
        return Ok((sinks, None));
    }

    if device != "rodio" {
        return Err(format!("unknown audio device '{}'", device).into());
    }

    let backend = rodio::Backend::open()?;
    let mut sinks: Vec<(TrackId, Box<dyn Sink>)> = Vec::with_capacity(session.stems().len());
    for stem in session.stems() {
        sinks.push((stem.id(), Box::new(backend.sink(stem, events_tx.clone())?)));
    }
    Ok((sinks, Some(backend)))
}
