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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use crossbeam_channel::{tick, Sender};

use crate::audio::{SinkEvent, SinkEventKind, SinkState};
use crate::stems::TrackId;

/// How often the simulated clock advances and reports its position.
const TICK: Duration = Duration::from_millis(25);

/// A mock sink. Simulates playback timing on a worker thread without touching
/// audio hardware: while playing, the position advances in real time scaled by
/// the commanded rate and is reported on every tick.
#[derive(Clone)]
pub struct Sink {
    track: TrackId,
    duration: Duration,
    shared: Arc<Shared>,
    events_tx: Sender<SinkEvent>,
}

struct Shared {
    position_us: AtomicU64,
    /// Rate in thousandths, to keep the worker lock-free.
    rate_milli: AtomicU64,
    /// Gain as f32 bits.
    gain_bits: AtomicU32,
    playing: AtomicBool,
    seeks: AtomicU64,
}

impl Sink {
    /// Creates a mock sink for the given track with a fixed media duration.
    pub fn new(track: TrackId, duration: Duration, events_tx: Sender<SinkEvent>) -> Sink {
        let shared = Arc::new(Shared {
            position_us: AtomicU64::new(0),
            rate_milli: AtomicU64::new(1000),
            gain_bits: AtomicU32::new(1.0f32.to_bits()),
            playing: AtomicBool::new(false),
            seeks: AtomicU64::new(0),
        });

        // The duration is known immediately, as if the media were preloaded.
        let _ = events_tx.send(SinkEvent {
            track,
            kind: SinkEventKind::DurationChanged(duration),
        });

        {
            let shared = shared.clone();
            let events_tx = events_tx.clone();
            thread::spawn(move || {
                let ticker = tick(TICK);
                while ticker.recv().is_ok() {
                    if !shared.playing.load(Ordering::Relaxed) {
                        continue;
                    }

                    let rate = shared.rate_milli.load(Ordering::Relaxed) as f64 / 1000.0;
                    let step = (TICK.as_micros() as f64 * rate) as u64;
                    let position = shared.position_us.load(Ordering::Relaxed) + step;
                    let duration_us = duration.as_micros() as u64;

                    let kind = if position >= duration_us {
                        shared.position_us.store(duration_us, Ordering::Relaxed);
                        shared.playing.store(false, Ordering::Relaxed);
                        SinkEventKind::StateChanged(SinkState::Stopped)
                    } else {
                        shared.position_us.store(position, Ordering::Relaxed);
                        SinkEventKind::PositionChanged(Duration::from_micros(position))
                    };

                    // The transport dropping its receiver shuts the worker down.
                    if events_tx.send(SinkEvent { track, kind }).is_err() {
                        return;
                    }
                }
            });
        }

        Sink {
            track,
            duration,
            shared,
            events_tx,
        }
    }

    fn notify(&self, kind: SinkEventKind) {
        let _ = self.events_tx.send(SinkEvent {
            track: self.track,
            kind,
        });
    }

    /// Returns true if the simulated clock is running.
    #[cfg(test)]
    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    /// The last commanded gain.
    #[cfg(test)]
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.shared.gain_bits.load(Ordering::Relaxed))
    }

    /// The last commanded rate.
    #[cfg(test)]
    pub fn rate(&self) -> f64 {
        self.shared.rate_milli.load(Ordering::Relaxed) as f64 / 1000.0
    }

    /// How many seeks this sink has been commanded.
    #[cfg(test)]
    pub fn seek_count(&self) -> u64 {
        self.shared.seeks.load(Ordering::Relaxed)
    }
}

impl crate::audio::Sink for Sink {
    fn play(&self) -> Result<(), Box<dyn Error>> {
        self.shared.playing.store(true, Ordering::Relaxed);
        self.notify(SinkEventKind::StateChanged(SinkState::Playing));
        Ok(())
    }

    fn pause(&self) -> Result<(), Box<dyn Error>> {
        self.shared.playing.store(false, Ordering::Relaxed);
        self.notify(SinkEventKind::StateChanged(SinkState::Paused));
        Ok(())
    }

    fn seek(&self, position: Duration) -> Result<(), Box<dyn Error>> {
        let position = position.min(self.duration);
        self.shared
            .position_us
            .store(position.as_micros() as u64, Ordering::Relaxed);
        self.shared.seeks.fetch_add(1, Ordering::Relaxed);
        self.notify(SinkEventKind::PositionChanged(position));
        Ok(())
    }

    fn set_rate(&self, rate: f64) -> Result<(), Box<dyn Error>> {
        self.shared
            .rate_milli
            .store((rate * 1000.0) as u64, Ordering::Relaxed);
        Ok(())
    }

    fn set_gain(&self, gain: f32) -> Result<(), Box<dyn Error>> {
        self.shared.gain_bits.store(gain.to_bits(), Ordering::Relaxed);
        Ok(())
    }

    fn position(&self) -> Duration {
        Duration::from_micros(self.shared.position_us.load(Ordering::Relaxed))
    }

    fn duration(&self) -> Duration {
        self.duration
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.track)
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use crate::audio::{Sink as _, SinkEvent, SinkEventKind};
    use crate::stems::TrackId;
    use crate::test::eventually;

    use super::Sink;

    #[test]
    fn test_mock_sink_reports_duration_then_advances() {
        let (tx, rx) = crossbeam_channel::unbounded::<SinkEvent>();
        let sink = Sink::new(TrackId::Drums, Duration::from_secs(10), tx);

        // The first event is the media duration.
        let event = rx.recv_timeout(Duration::from_secs(1)).expect("no event");
        assert!(matches!(
            event.kind,
            SinkEventKind::DurationChanged(d) if d == Duration::from_secs(10)
        ));

        assert_eq!(sink.position(), Duration::ZERO);
        sink.play().expect("play failed");
        assert!(sink.is_playing());

        eventually(
            || sink.position() > Duration::ZERO,
            "position never advanced",
        );

        sink.pause().expect("pause failed");
        let paused_at = sink.position();
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(sink.position(), paused_at);
    }

    #[test]
    fn test_mock_sink_seek_clamps_and_notifies() {
        let (tx, rx) = crossbeam_channel::unbounded::<SinkEvent>();
        let sink = Sink::new(TrackId::Bass, Duration::from_secs(5), tx);
        let _ = rx.recv_timeout(Duration::from_secs(1));

        sink.seek(Duration::from_secs(60)).expect("seek failed");
        assert_eq!(sink.position(), Duration::from_secs(5));
        assert_eq!(sink.seek_count(), 1);

        let event = rx.recv_timeout(Duration::from_secs(1)).expect("no event");
        assert!(matches!(
            event.kind,
            SinkEventKind::PositionChanged(p) if p == Duration::from_secs(5)
        ));
    }

    #[test]
    fn test_mock_sink_stops_at_end_of_media() {
        let (tx, rx) = crossbeam_channel::unbounded::<SinkEvent>();
        let sink = Sink::new(TrackId::Other, Duration::from_millis(50), tx);
        let _ = rx.recv_timeout(Duration::from_secs(1));

        sink.play().expect("play failed");
        eventually(|| !sink.is_playing(), "sink never reached end of media");
        assert_eq!(sink.position(), Duration::from_millis(50));
    }
}
