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
use std::{error::Error, fmt, fs::File, io::BufReader, sync::Arc, thread, time::Duration};

use crossbeam_channel::{tick, Sender};
use rodio::{source::Source, Decoder, OutputStream, OutputStreamHandle};
use tracing::info;

use crate::audio::{SinkEvent, SinkEventKind, SinkState};
use crate::stems::{Stem, TrackId};

/// How often a sink polls its playback position.
const POLL: Duration = Duration::from_millis(25);

/// Owns the audio output stream. Must be kept alive for as long as any sink
/// built from it plays; dropping it silences everything.
pub struct Backend {
    _stream: OutputStream,
    handle: OutputStreamHandle,
}

impl Backend {
    /// Opens the default audio output.
    pub fn open() -> Result<Backend, Box<dyn Error>> {
        let (stream, handle) = OutputStream::try_default()?;
        Ok(Backend {
            _stream: stream,
            handle,
        })
    }

    /// Creates a sink playing the given stem, paused at position zero.
    pub fn sink(&self, stem: &Stem, events_tx: Sender<SinkEvent>) -> Result<Sink, Box<dyn Error>> {
        let inner = Arc::new(rodio::Sink::try_new(&self.handle)?);
        let source = Decoder::new(BufReader::new(File::open(stem.path())?))?;
        let duration = source.total_duration().unwrap_or_else(|| stem.duration());
        let track = stem.id();

        inner.pause();
        inner.append(source);

        info!(
            track = track.to_string(),
            file = stem.path().display().to_string(),
            "Loaded stem into output sink."
        );

        let _ = events_tx.send(SinkEvent {
            track,
            kind: SinkEventKind::DurationChanged(duration),
        });

        // Poll the sink for positions; real position notifications are the
        // only way the transport learns where playback actually is.
        {
            let inner = inner.clone();
            let events_tx = events_tx.clone();
            thread::spawn(move || {
                let ticker = tick(POLL);
                let mut reported_end = false;
                while ticker.recv().is_ok() {
                    let kind = if inner.empty() {
                        if reported_end {
                            continue;
                        }
                        reported_end = true;
                        SinkEventKind::StateChanged(SinkState::Stopped)
                    } else if inner.is_paused() {
                        continue;
                    } else {
                        SinkEventKind::PositionChanged(inner.get_pos())
                    };

                    // The transport dropping its receiver shuts the poller down.
                    if events_tx.send(SinkEvent { track, kind }).is_err() {
                        return;
                    }
                }
            });
        }

        Ok(Sink {
            track,
            duration,
            inner,
            events_tx,
        })
    }
}

/// A playback sink for one stem, backed by a rodio output sink.
pub struct Sink {
    track: TrackId,
    duration: Duration,
    inner: Arc<rodio::Sink>,
    events_tx: Sender<SinkEvent>,
}

impl Sink {
    fn notify(&self, kind: SinkEventKind) {
        let _ = self.events_tx.send(SinkEvent {
            track: self.track,
            kind,
        });
    }
}

impl crate::audio::Sink for Sink {
    fn play(&self) -> Result<(), Box<dyn Error>> {
        self.inner.play();
        self.notify(SinkEventKind::StateChanged(SinkState::Playing));
        Ok(())
    }

    fn pause(&self) -> Result<(), Box<dyn Error>> {
        self.inner.pause();
        self.notify(SinkEventKind::StateChanged(SinkState::Paused));
        Ok(())
    }

    fn seek(&self, position: Duration) -> Result<(), Box<dyn Error>> {
        self.inner
            .try_seek(position)
            .map_err(|e| format!("seek failed: {}", e))?;
        self.notify(SinkEventKind::PositionChanged(self.inner.get_pos()));
        Ok(())
    }

    fn set_rate(&self, rate: f64) -> Result<(), Box<dyn Error>> {
        self.inner.set_speed(rate as f32);
        Ok(())
    }

    fn set_gain(&self, gain: f32) -> Result<(), Box<dyn Error>> {
        self.inner.set_volume(gain);
        Ok(())
    }

    fn position(&self) -> Duration {
        self.inner.get_pos()
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (rodio)", self.track)
    }
}
