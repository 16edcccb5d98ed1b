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
use std::{collections::BTreeMap, error::Error, fmt, sync::Arc, time::Duration};

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use tracing::{error, info, span, warn, Level, Span};

use crate::audio::{Sink, SinkEvent, SinkEventKind, SinkState};
use crate::channel::Channel;
use crate::checkpoint::{self, CheckpointStore, Toggle};
use crate::looper::{LoopRegion, Looper};
use crate::speed::{self, control_to_rate};
use crate::stems::{Session, TrackId};
use crate::util;
use crate::waveform::{self, StemSelection, WaveformSummary};

/// How far a single skip command moves the timeline.
pub const DEFAULT_SKIP: Duration = Duration::from_millis(5000);

/// The lowest rate the transport will command. The speed control bottoms out
/// at zero, which sinks cannot honor as an actual rate.
pub const MIN_RATE: f64 = 0.05;

/// The playback state machine of the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    /// No playback has happened yet.
    Inactive,
    /// All channels are playing.
    Playing,
    /// All channels are paused mid-timeline.
    Paused,
    /// Playback ran out or was stopped; playing again restarts from zero.
    Stopped,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Inactive => write!(f, "inactive"),
            State::Playing => write!(f, "playing"),
            State::Paused => write!(f, "paused"),
            State::Stopped => write!(f, "stopped"),
        }
    }
}

/// What the transport reports to its subscribers. Display surfaces consume
/// these rather than polling the transport.
#[derive(Clone, Debug)]
pub enum Update {
    /// The authoritative position changed.
    Position(Duration),
    /// The authoritative duration changed.
    Duration(Duration),
    /// The playback state changed.
    State(State),
    /// The speed control changed.
    Speed { control: u8, rate: f64 },
    /// A checkpoint was set or cleared.
    CheckpointsChanged,
    /// The loop region was activated, deactivated, or replaced.
    LoopChanged(Option<LoopRegion>),
    /// A new waveform summary is available.
    WaveformUpdated(Arc<WaveformSummary>),
    /// A channel's backend failed and was paused.
    ChannelFailed { track: TrackId, message: String },
}

/// Errors from transport commands that carry a user-visible cause.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("no checkpoint at slot {0}")]
    MissingCheckpoint(u8),
}

/// Tunable transport behavior.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// How far skip commands move.
    pub skip: Duration,
    /// How close a checkpoint may be to the position and still be skipped
    /// past during navigation and loop derivation.
    pub dead_zone: Duration,
    /// How many points waveform summaries carry.
    pub visual_samples: usize,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            skip: DEFAULT_SKIP,
            dead_zone: checkpoint::DEAD_ZONE,
            visual_samples: waveform::VISUAL_SAMPLES,
        }
    }
}

/// The orchestrator: owns every channel, the checkpoint store, the looper,
/// and the playback state machine. All commands are issued from one control
/// thread; each command fans out to every channel in track order so no
/// command can leave the channels diverged. Sink notifications are drained
/// on the same thread via `pump`.
pub struct Transport {
    /// The session being practiced.
    session: Arc<Session>,
    /// One channel per stem, in track order.
    channels: BTreeMap<TrackId, Channel>,
    /// The channel whose notifications drive the authoritative position,
    /// duration, and state. Using a single reference avoids duplicate and
    /// conflicting updates from N sinks settling at different times.
    reference: TrackId,
    state: State,
    position: Duration,
    duration: Duration,
    /// The current speed control value.
    control: u8,
    master_volume: f32,
    master_muted: bool,
    checkpoints: CheckpointStore,
    looper: Looper,
    skip: Duration,
    dead_zone: Duration,
    visual_samples: usize,
    /// Set when a programmatic seek is issued and cleared by the next
    /// reference position notification. Stale positions queued from before
    /// the seek must not re-trigger the loop edge.
    suppress_loop_check: bool,
    events_rx: Receiver<SinkEvent>,
    subscribers: Vec<Sender<Update>>,
    /// The logging span.
    span: Span,
}

impl Transport {
    /// Creates a transport over the given sinks. The sink events receiver
    /// must be the counterpart of the sender the sinks were built with.
    pub fn new(
        session: Arc<Session>,
        sinks: Vec<(TrackId, Box<dyn Sink>)>,
        events_rx: Receiver<SinkEvent>,
        options: Options,
    ) -> Transport {
        let mut channels = BTreeMap::new();
        for (track, sink) in sinks {
            channels.insert(track, Channel::new(track, sink));
        }
        let reference = channels
            .keys()
            .next_back()
            .copied()
            .unwrap_or(TrackId::Other);
        let duration = session.duration();

        Transport {
            session,
            channels,
            reference,
            state: State::Inactive,
            position: Duration::ZERO,
            duration,
            control: speed::CONTROL_UNITY,
            master_volume: 1.0,
            master_muted: false,
            checkpoints: CheckpointStore::new(),
            looper: Looper::new(),
            skip: options.skip,
            dead_zone: options.dead_zone,
            visual_samples: options.visual_samples,
            suppress_loop_check: false,
            events_rx,
            subscribers: Vec::new(),
            span: span!(Level::INFO, "transport"),
        }
    }

    /// The current playback state.
    pub fn state(&self) -> State {
        self.state
    }

    /// The authoritative playback position.
    pub fn position(&self) -> Duration {
        self.position
    }

    /// The authoritative duration.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// The current speed control value.
    pub fn control(&self) -> u8 {
        self.control
    }

    /// The session being practiced.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The checkpoints of this session.
    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// The active loop region, if any.
    pub fn loop_region(&self) -> Option<LoopRegion> {
        self.looper.region()
    }

    /// Registers a subscriber for transport updates. Subscribers that hang
    /// up are dropped on the next publish.
    pub fn subscribe(&mut self) -> Receiver<Update> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.subscribers.push(tx);
        rx
    }

    /// Starts or resumes playback. From stopped this restarts from the top.
    pub fn play(&mut self) {
        let _enter = self.span.clone().entered();

        match self.state {
            State::Playing => info!("Already playing"),
            State::Stopped => self.restart(),
            State::Inactive | State::Paused => {
                info!("Playing");
                self.for_each_sink("play", |sink| sink.play());
                self.set_state(State::Playing);
            }
        }
    }

    /// Pauses playback. Only meaningful while playing.
    pub fn pause(&mut self) {
        let _enter = self.span.clone().entered();

        if self.state != State::Playing {
            info!(state = %self.state, "Not playing, ignoring pause");
            return;
        }

        info!("Pausing");
        self.for_each_sink("pause", |sink| sink.pause());
        self.set_state(State::Paused);
    }

    /// Toggles between playing and paused.
    pub fn play_pause(&mut self) {
        if self.state == State::Playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Seeks every channel to zero and plays.
    pub fn restart(&mut self) {
        let _enter = self.span.clone().entered();

        info!("Restarting");
        self.seek(Duration::ZERO);
        self.for_each_sink("play", |sink| sink.play());
        self.set_state(State::Playing);
    }

    /// Pauses every channel and rewinds to zero.
    pub fn stop(&mut self) {
        let _enter = self.span.clone().entered();

        info!("Stopping");
        self.for_each_sink("pause", |sink| sink.pause());
        self.seek(Duration::ZERO);
        self.set_state(State::Stopped);
    }

    /// Seeks every channel to the same absolute position, clamped to the
    /// known duration. Does not change the play state.
    pub fn seek(&mut self, position: Duration) {
        let _enter = self.span.clone().entered();

        let target = if self.duration > Duration::ZERO {
            position.min(self.duration)
        } else {
            position
        };
        info!(position = %util::timestamp(target), "Seeking");

        // Positions queued before this seek land must not be mistaken for
        // playback reaching a loop edge.
        self.suppress_loop_check = true;
        self.for_each_sink("seek", |sink| sink.seek(target));
        self.position = target;
        self.publish(Update::Position(target));
    }

    /// Skips forward by the configured skip amount.
    pub fn skip_forward(&mut self) {
        self.seek(self.position + self.skip);
    }

    /// Skips backward by the configured skip amount.
    pub fn skip_back(&mut self) {
        self.seek(self.position.saturating_sub(self.skip));
    }

    /// Sets the speed control and commands the mapped rate to every channel.
    /// The control value is clamped to its range and the rate is floored so
    /// the bottom of the control never commands a zero rate.
    pub fn set_speed(&mut self, control: u8) {
        let _enter = self.span.clone().entered();

        let control = control.min(speed::CONTROL_MAX);
        let rate = control_to_rate(control).max(MIN_RATE);
        info!(control, rate, "Setting speed");

        self.control = control;
        self.for_each_sink("set rate", |sink| sink.set_rate(rate));
        self.publish(Update::Speed { control, rate });
    }

    /// Sets one channel's volume and reapplies gains.
    pub fn set_volume(&mut self, track: TrackId, volume: f32) {
        if let Some(channel) = self.channels.get_mut(&track) {
            channel.set_volume(volume);
        }
        self.apply_gains();
    }

    /// Toggles one channel's mute and reapplies gains.
    pub fn toggle_muted(&mut self, track: TrackId) {
        let _enter = self.span.clone().entered();

        if let Some(channel) = self.channels.get_mut(&track) {
            let muted = channel.toggle_muted();
            info!(channel = %track, muted, "Toggled mute");
        }
        self.apply_gains();
    }

    /// Toggles one channel's solo and reapplies gains. Any soloed channel
    /// silences every channel that is not itself soloed.
    pub fn toggle_soloed(&mut self, track: TrackId) {
        let _enter = self.span.clone().entered();

        if let Some(channel) = self.channels.get_mut(&track) {
            let soloed = channel.toggle_soloed();
            info!(channel = %track, soloed, "Toggled solo");
        }
        self.apply_gains();
    }

    /// Sets the master volume and reapplies gains.
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
        self.apply_gains();
    }

    /// Toggles the master mute. Individual channel state is untouched; the
    /// master gain silences every channel's output.
    pub fn toggle_master_muted(&mut self) {
        self.master_muted = !self.master_muted;
        self.apply_gains();
    }

    /// Marks the current position at the given checkpoint slot, or clears
    /// the slot when re-marking the exact position it already holds.
    pub fn set_checkpoint(&mut self, slot: u8) {
        let _enter = self.span.clone().entered();

        if slot >= checkpoint::SLOTS {
            warn!(slot, "No such checkpoint slot");
            return;
        }

        match self.checkpoints.toggle(slot, self.position) {
            Toggle::Set => info!(slot, position = %util::timestamp(self.position), "Checkpoint set"),
            Toggle::Cleared => info!(slot, "Checkpoint cleared"),
        }
        self.publish(Update::CheckpointsChanged);
    }

    /// Seeks to the checkpoint at the given slot.
    pub fn load_checkpoint(&mut self, slot: u8) -> Result<(), TransportError> {
        let checkpoint = self
            .checkpoints
            .get(slot)
            .ok_or(TransportError::MissingCheckpoint(slot))?;
        self.seek(checkpoint.position);
        Ok(())
    }

    /// Seeks to the nearest checkpoint before the current position, or the
    /// track start when none qualifies.
    pub fn prev_checkpoint(&mut self) {
        let target = self
            .checkpoints
            .nearest_before(self.position, self.dead_zone)
            .unwrap_or(Duration::ZERO);
        self.seek(target);
    }

    /// Seeks to the nearest checkpoint after the current position, or the
    /// track end when none qualifies.
    pub fn next_checkpoint(&mut self) {
        let target = self
            .checkpoints
            .nearest_after(self.position, self.dead_zone)
            .unwrap_or(self.duration);
        self.seek(target);
    }

    /// Activates a loop around the current position, or deactivates the
    /// active loop.
    pub fn toggle_loop(&mut self) {
        let _enter = self.span.clone().entered();

        let region = self
            .looper
            .toggle(self.position, &self.checkpoints, self.duration, self.dead_zone);
        match region {
            Some(region) => info!(region = %region, "Loop activated"),
            None => info!("Loop deactivated"),
        }
        self.publish(Update::LoopChanged(region));
    }

    /// Summarizes the selected stems and publishes the result. Reads the
    /// stem files, so expect this to take a moment on large sessions.
    pub fn select_waveform(&mut self, selection: StemSelection) -> Result<(), Box<dyn Error>> {
        let _enter = self.span.clone().entered();

        info!(selection = %selection, "Summarizing waveform");
        let summary = waveform::summarize(&self.session, selection, self.visual_samples)?;
        self.publish(Update::WaveformUpdated(Arc::new(summary)));
        Ok(())
    }

    /// Drains all pending sink notifications. Call regularly from the
    /// control thread.
    pub fn pump(&mut self) {
        loop {
            match self.events_rx.try_recv() {
                Ok(event) => self.handle_sink_event(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return,
            }
        }
    }

    fn handle_sink_event(&mut self, event: SinkEvent) {
        // Failures matter from any channel. Everything else drives the
        // authoritative fields and so is taken from the reference only.
        if let SinkEventKind::Failed(message) = event.kind {
            self.on_sink_failure(event.track, message);
            return;
        }
        if event.track != self.reference {
            return;
        }

        match event.kind {
            SinkEventKind::PositionChanged(position) => self.on_position(position),
            SinkEventKind::DurationChanged(duration) => self.on_duration(duration),
            SinkEventKind::StateChanged(state) => self.on_sink_state(state),
            SinkEventKind::Failed(_) => {}
        }
    }

    fn on_position(&mut self, position: Duration) {
        self.position = position;
        self.publish(Update::Position(position));

        if self.suppress_loop_check {
            self.suppress_loop_check = false;
            return;
        }
        if self.state != State::Playing {
            return;
        }
        if let Some(start) = self.looper.crossed(position) {
            let _enter = self.span.clone().entered();
            info!(target = %util::timestamp(start), "Loop edge crossed");
            self.seek(start);
        }
    }

    fn on_duration(&mut self, duration: Duration) {
        if self.duration == duration {
            return;
        }
        self.duration = duration;
        self.publish(Update::Duration(duration));
    }

    fn on_sink_state(&mut self, state: SinkState) {
        match state {
            SinkState::Playing => self.set_state(State::Playing),
            // Paused and stopped reports only matter when we believe we are
            // playing; an explicit pause or stop already moved the state.
            SinkState::Paused => {
                if self.state == State::Playing {
                    self.set_state(State::Paused);
                }
            }
            SinkState::Stopped => {
                if self.state == State::Playing {
                    let _enter = self.span.clone().entered();
                    info!("Reference channel ran out");
                    self.set_state(State::Stopped);
                }
            }
        }
    }

    fn on_sink_failure(&mut self, track: TrackId, message: String) {
        let _enter = self.span.clone().entered();

        error!(channel = %track, cause = %message, "Channel backend failed, pausing it");
        if let Some(channel) = self.channels.get(&track) {
            if let Err(e) = channel.sink().pause() {
                error!(err = e.as_ref(), channel = %track, "Unable to pause failed channel");
            }
        }
        self.publish(Update::ChannelFailed { track, message });
    }

    fn set_state(&mut self, state: State) {
        if self.state == state {
            return;
        }
        info!(state = %state, "Transport state changed");
        self.state = state;
        self.publish(Update::State(state));
    }

    /// Recomputes and pushes every channel's effective gain.
    fn apply_gains(&mut self) {
        let any_solo = self.channels.values().any(Channel::soloed);
        let master_gain = if self.master_muted {
            0.0
        } else {
            self.master_volume
        };

        for channel in self.channels.values() {
            if let Err(e) = channel.apply_gain(master_gain, any_solo) {
                error!(err = e.as_ref(), channel = %channel.id(), "Unable to set channel gain");
            }
        }
    }

    /// Issues one sink call per channel, in track order. A failing channel
    /// is logged and skipped so the rest stay in sync.
    fn for_each_sink<F>(&self, action: &str, f: F)
    where
        F: Fn(&dyn Sink) -> Result<(), Box<dyn Error>>,
    {
        for channel in self.channels.values() {
            if let Err(e) = f(channel.sink()) {
                error!(err = e.as_ref(), channel = %channel.id(), "Sink command failed: {}", action);
            }
        }
    }

    fn publish(&mut self, update: Update) {
        self.subscribers.retain(|tx| tx.send(update.clone()).is_ok());
    }
}

#[cfg(test)]
mod test {
    use std::{collections::BTreeMap, sync::Arc, time::Duration};

    use crossbeam_channel::Sender;

    use crate::audio::{self, mock, SinkEvent, SinkEventKind, SinkState};
    use crate::stems::{Session, TrackId};
    use crate::testutil;

    use super::{Options, State, Transport, TransportError, Update};

    const DURATION: Duration = Duration::from_secs(10);

    struct Fixture {
        transport: Transport,
        events_tx: Sender<SinkEvent>,
        sinks: BTreeMap<TrackId, mock::Sink>,
        _dir: tempfile::TempDir,
    }

    fn new_fixture() -> Fixture {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        // 10 seconds at 8kHz.
        testutil::write_session(dir.path(), 80000, 8000);
        let session =
            Arc::new(Session::from_dir(dir.path()).expect("failed to build session"));

        let (events_tx, events_rx) = crossbeam_channel::unbounded();
        let mut sinks = BTreeMap::new();
        let mut boxed: Vec<(TrackId, Box<dyn audio::Sink>)> = Vec::new();
        for track in TrackId::ALL {
            let sink = mock::Sink::new(track, DURATION, events_tx.clone());
            sinks.insert(track, sink.clone());
            boxed.push((track, Box::new(sink)));
        }

        let mut transport = Transport::new(session, boxed, events_rx, Options::default());
        // Drain the initial duration notifications.
        transport.pump();
        Fixture {
            transport,
            events_tx,
            sinks,
            _dir: dir,
        }
    }

    fn inject(fixture: &Fixture, kind: SinkEventKind) {
        fixture
            .events_tx
            .send(SinkEvent {
                track: TrackId::Other,
                kind,
            })
            .expect("failed to inject event");
    }

    fn seek_counts(fixture: &Fixture) -> Vec<u64> {
        fixture.sinks.values().map(mock::Sink::seek_count).collect()
    }

    #[test]
    fn test_play_pause_stop() {
        let mut fixture = new_fixture();
        let transport = &mut fixture.transport;
        assert_eq!(transport.state(), State::Inactive);

        transport.play();
        assert_eq!(transport.state(), State::Playing);
        assert!(fixture.sinks.values().all(mock::Sink::is_playing));

        fixture.transport.pause();
        assert_eq!(fixture.transport.state(), State::Paused);
        assert!(!fixture.sinks.values().any(mock::Sink::is_playing));

        fixture.transport.play_pause();
        assert_eq!(fixture.transport.state(), State::Playing);
        fixture.transport.play_pause();
        assert_eq!(fixture.transport.state(), State::Paused);

        fixture.transport.stop();
        assert_eq!(fixture.transport.state(), State::Stopped);
        assert_eq!(fixture.transport.position(), Duration::ZERO);
    }

    #[test]
    fn test_pause_ignored_unless_playing() {
        let mut fixture = new_fixture();
        fixture.transport.pause();
        assert_eq!(fixture.transport.state(), State::Inactive);
    }

    #[test]
    fn test_play_from_stopped_restarts() {
        let mut fixture = new_fixture();

        fixture.transport.play();
        fixture.transport.seek(Duration::from_secs(4));
        inject(&fixture, SinkEventKind::StateChanged(SinkState::Stopped));
        fixture.transport.pump();
        assert_eq!(fixture.transport.state(), State::Stopped);

        fixture.transport.play();
        assert_eq!(fixture.transport.state(), State::Playing);
        assert_eq!(fixture.transport.position(), Duration::ZERO);
        assert!(fixture.sinks.values().all(mock::Sink::is_playing));
    }

    #[test]
    fn test_seek_clamps_and_fans_out() {
        let mut fixture = new_fixture();

        fixture.transport.seek(Duration::from_secs(30));
        assert_eq!(fixture.transport.position(), DURATION);
        assert_eq!(seek_counts(&fixture), vec![1, 1, 1, 1]);
    }

    #[test]
    fn test_skip() {
        let mut fixture = new_fixture();

        fixture.transport.seek(Duration::from_secs(9));
        fixture.transport.skip_forward();
        assert_eq!(fixture.transport.position(), DURATION);

        fixture.transport.skip_back();
        assert_eq!(fixture.transport.position(), Duration::from_secs(5));

        fixture.transport.seek(Duration::from_secs(2));
        fixture.transport.skip_back();
        assert_eq!(fixture.transport.position(), Duration::ZERO);
    }

    #[test]
    fn test_set_speed() {
        let mut fixture = new_fixture();

        fixture.transport.set_speed(99);
        assert_eq!(fixture.transport.control(), 99);
        for sink in fixture.sinks.values() {
            assert_eq!(sink.rate(), 2.0);
        }

        // The bottom of the control floors at the minimum rate.
        fixture.transport.set_speed(0);
        for sink in fixture.sinks.values() {
            assert_eq!(sink.rate(), super::MIN_RATE);
        }

        // Out-of-range control values clamp.
        fixture.transport.set_speed(120);
        assert_eq!(fixture.transport.control(), 99);
    }

    #[test]
    fn test_mixer_gains() {
        let mut fixture = new_fixture();

        fixture.transport.set_volume(TrackId::Drums, 0.5);
        assert_eq!(fixture.sinks[&TrackId::Drums].gain(), 0.5);
        assert_eq!(fixture.sinks[&TrackId::Bass].gain(), 1.0);

        // Reapplying the same state leaves the gains unchanged.
        fixture.transport.set_volume(TrackId::Drums, 0.5);
        assert_eq!(fixture.sinks[&TrackId::Drums].gain(), 0.5);

        // Soloing vocals silences everything else.
        fixture.transport.toggle_soloed(TrackId::Vocals);
        assert_eq!(fixture.sinks[&TrackId::Vocals].gain(), 1.0);
        assert_eq!(fixture.sinks[&TrackId::Drums].gain(), 0.0);
        assert_eq!(fixture.sinks[&TrackId::Bass].gain(), 0.0);
        fixture.transport.toggle_soloed(TrackId::Vocals);
        assert_eq!(fixture.sinks[&TrackId::Drums].gain(), 0.5);

        // Master mute silences everything without touching channel state.
        fixture.transport.toggle_master_muted();
        assert_eq!(fixture.sinks[&TrackId::Bass].gain(), 0.0);
        fixture.transport.toggle_master_muted();
        assert_eq!(fixture.sinks[&TrackId::Bass].gain(), 1.0);
        assert_eq!(fixture.sinks[&TrackId::Drums].gain(), 0.5);

        fixture.transport.set_master_volume(0.5);
        assert_eq!(fixture.sinks[&TrackId::Drums].gain(), 0.25);

        fixture.transport.toggle_muted(TrackId::Drums);
        assert_eq!(fixture.sinks[&TrackId::Drums].gain(), 0.0);
    }

    #[test]
    fn test_checkpoint_commands() {
        let mut fixture = new_fixture();

        fixture.transport.seek(Duration::from_secs(5));
        fixture.transport.set_checkpoint(0);
        fixture.transport.seek(Duration::from_secs(6));
        fixture.transport.set_checkpoint(1);

        fixture.transport.prev_checkpoint();
        assert_eq!(fixture.transport.position(), Duration::from_secs(5));

        fixture.transport.next_checkpoint();
        assert_eq!(fixture.transport.position(), Duration::from_secs(6));

        // Nothing ahead, so the track end is the fallback.
        fixture.transport.next_checkpoint();
        assert_eq!(fixture.transport.position(), DURATION);

        fixture
            .transport
            .load_checkpoint(0)
            .expect("failed to load checkpoint");
        assert_eq!(fixture.transport.position(), Duration::from_secs(5));

        assert!(matches!(
            fixture.transport.load_checkpoint(2),
            Err(TransportError::MissingCheckpoint(2))
        ));

        // Re-marking the same position clears the slot.
        fixture.transport.set_checkpoint(0);
        assert!(fixture.transport.checkpoints().get(0).is_none());

        // Out-of-range slots are ignored.
        fixture.transport.set_checkpoint(9);
        assert!(fixture.transport.checkpoints().get(9).is_none());
    }

    #[test]
    fn test_loop_crossing_seeks_back() {
        let mut fixture = new_fixture();

        fixture.transport.seek(Duration::from_millis(700));
        fixture.transport.set_checkpoint(0);
        fixture.transport.seek(Duration::from_millis(1400));
        fixture.transport.set_checkpoint(1);
        fixture.transport.seek(Duration::from_millis(1000));
        fixture.transport.toggle_loop();

        let region = fixture.transport.loop_region().expect("expected a loop");
        assert_eq!(region.start, Duration::from_millis(700));
        assert_eq!(region.end, Duration::from_millis(1400));

        // Move into the playing state without starting the mock clocks so
        // the injected positions below are the only ones in flight.
        inject(&fixture, SinkEventKind::StateChanged(SinkState::Playing));
        // Clear the suppression left by the last programmatic seek.
        inject(
            &fixture,
            SinkEventKind::PositionChanged(Duration::from_millis(1000)),
        );
        fixture.transport.pump();
        let seeks_before = seek_counts(&fixture);

        // A position inside the end window fires the loop; a stale position
        // queued behind it must not fire it again.
        inject(
            &fixture,
            SinkEventKind::PositionChanged(Duration::from_millis(1390)),
        );
        inject(
            &fixture,
            SinkEventKind::PositionChanged(Duration::from_millis(1395)),
        );
        fixture.transport.pump();

        assert_eq!(fixture.transport.position(), Duration::from_millis(700));
        let seeks_after = seek_counts(&fixture);
        for (before, after) in seeks_before.iter().zip(seeks_after.iter()) {
            assert_eq!(after - before, 1, "expected exactly one loop seek");
        }
    }

    #[test]
    fn test_loop_inert_while_paused() {
        let mut fixture = new_fixture();

        fixture.transport.seek(Duration::from_millis(1000));
        fixture.transport.toggle_loop();
        // With no checkpoints the loop covers the whole track.
        let region = fixture.transport.loop_region().expect("expected a loop");
        assert_eq!(region.start, Duration::ZERO);
        assert_eq!(region.end, DURATION);

        // Clear the seek suppression, then scrub into the end window while
        // not playing.
        inject(
            &fixture,
            SinkEventKind::PositionChanged(Duration::from_millis(1000)),
        );
        fixture.transport.pump();
        let seeks_before = seek_counts(&fixture);

        inject(&fixture, SinkEventKind::PositionChanged(DURATION));
        fixture.transport.pump();
        assert_eq!(seek_counts(&fixture), seeks_before);
    }

    #[test]
    fn test_failed_channel_is_paused_and_reported() {
        let mut fixture = new_fixture();
        let updates = fixture.transport.subscribe();

        fixture.transport.play();
        fixture
            .events_tx
            .send(SinkEvent {
                track: TrackId::Bass,
                kind: SinkEventKind::Failed(String::from("device lost")),
            })
            .expect("failed to inject event");
        fixture.transport.pump();

        assert!(!fixture.sinks[&TrackId::Bass].is_playing());
        assert!(updates.try_iter().any(|update| matches!(
            update,
            Update::ChannelFailed {
                track: TrackId::Bass,
                ..
            }
        )));
    }

    #[test]
    fn test_subscribers_receive_updates() {
        let mut fixture = new_fixture();
        let updates = fixture.transport.subscribe();

        fixture.transport.seek(Duration::from_secs(3));
        fixture.transport.set_speed(25);
        fixture.transport.play();

        let received: Vec<Update> = updates.try_iter().collect();
        assert!(received
            .iter()
            .any(|u| matches!(u, Update::Position(p) if *p == Duration::from_secs(3))));
        assert!(received
            .iter()
            .any(|u| matches!(u, Update::Speed { control: 25, .. })));
        assert!(received
            .iter()
            .any(|u| matches!(u, Update::State(State::Playing))));
    }

    #[test]
    fn test_waveform_summary_published() {
        let mut fixture = new_fixture();
        let updates = fixture.transport.subscribe();

        fixture
            .transport
            .select_waveform(crate::waveform::StemSelection::All)
            .expect("failed to summarize");

        let summary = updates
            .try_iter()
            .find_map(|update| match update {
                Update::WaveformUpdated(summary) => Some(summary),
                _ => None,
            })
            .expect("expected a waveform update");
        assert_eq!(summary.left.len(), crate::waveform::VISUAL_SAMPLES);
    }
}
