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
use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::time;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, Level};

use crate::stems::TrackId;
use crate::transport::Transport;
use crate::waveform::StemSelection;

pub mod keyboard;

/// How often pending sink notifications are drained while waiting for the
/// next command.
const PUMP_INTERVAL: Duration = Duration::from_millis(10);

/// Controller events that will trigger behavior in the transport.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Toggles between playing and paused.
    PlayPause,

    /// Restarts playback from the top.
    Restart,

    /// Stops playback and rewinds.
    Stop,

    /// Skips forward by the configured skip amount.
    SkipForward,

    /// Skips backward by the configured skip amount.
    SkipBack,

    /// Seeks to an absolute position.
    Seek(Duration),

    /// Sets the speed control value.
    Speed(u8),

    /// Marks (or unmarks) the current position at a checkpoint slot.
    SetCheckpoint(u8),

    /// Seeks to the checkpoint at a slot.
    LoadCheckpoint(u8),

    /// Seeks to the nearest checkpoint before the position.
    PrevCheckpoint,

    /// Seeks to the nearest checkpoint after the position.
    NextCheckpoint,

    /// Activates or deactivates the loop.
    ToggleLoop,

    /// Sets one channel's volume.
    Volume(TrackId, f32),

    /// Toggles one channel's mute.
    ToggleMute(TrackId),

    /// Toggles one channel's solo.
    ToggleSolo(TrackId),

    /// Sets the master volume.
    MasterVolume(f32),

    /// Toggles the master mute.
    ToggleMasterMute,

    /// Selects which stems the waveform summary covers.
    Waveform(StemSelection),
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Controls a transport.
pub struct Controller {
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(transport: Transport, driver: Arc<dyn Driver>) -> Result<Controller, Box<dyn Error>> {
        Ok(Controller {
            handle: tokio::spawn(
                async move { Controller::trigger_events(transport, driver).await },
            ),
        })
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Triggers transport commands by watching the driver and getting events
    /// from it. Sink notifications are drained on the same task between
    /// commands, so the transport is only ever touched from here.
    async fn trigger_events(mut transport: Transport, driver: Arc<dyn Driver>) {
        // The span guard must not be held across an await, so all logging
        // below goes through in_scope.
        let span = span!(Level::INFO, "controller");

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        span.in_scope(|| info!(session = transport.session().name(), "Controller started."));

        let mut pump = time::interval(PUMP_INTERVAL);
        loop {
            tokio::select! {
                _ = pump.tick() => transport.pump(),
                event = events_rx.recv() => match event {
                    Some(event) => span.in_scope(|| Controller::apply(&mut transport, event)),
                    None => {
                        span.in_scope(|| info!("Controller closing."));
                        transport.stop();
                        if let Err(e) = join_handle.await {
                            span.in_scope(|| error!("Error waiting for event monitor to stop: {}", e));
                        }
                        return;
                    }
                },
            }
        }
    }

    fn apply(transport: &mut Transport, event: Event) {
        info!(event = format!("{:?}", event), "Received event.");

        match event {
            Event::PlayPause => transport.play_pause(),
            Event::Restart => transport.restart(),
            Event::Stop => transport.stop(),
            Event::SkipForward => transport.skip_forward(),
            Event::SkipBack => transport.skip_back(),
            Event::Seek(position) => transport.seek(position),
            Event::Speed(control) => transport.set_speed(control),
            Event::SetCheckpoint(slot) => transport.set_checkpoint(slot),
            Event::LoadCheckpoint(slot) => {
                if let Err(e) = transport.load_checkpoint(slot) {
                    error!("Unable to load checkpoint: {}", e);
                }
            }
            Event::PrevCheckpoint => transport.prev_checkpoint(),
            Event::NextCheckpoint => transport.next_checkpoint(),
            Event::ToggleLoop => transport.toggle_loop(),
            Event::Volume(track, volume) => transport.set_volume(track, volume),
            Event::ToggleMute(track) => transport.toggle_muted(track),
            Event::ToggleSolo(track) => transport.toggle_soloed(track),
            Event::MasterVolume(volume) => transport.set_master_volume(volume),
            Event::ToggleMasterMute => transport.toggle_master_muted(),
            Event::Waveform(selection) => {
                if let Err(e) = transport.select_waveform(selection) {
                    error!("Unable to summarize waveform: {}", e);
                }
            }
        }
    }
}
