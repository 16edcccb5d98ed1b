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

use crate::audio::Sink;
use crate::stems::TrackId;

/// One mixer channel: a stem's sink plus its volume/mute/solo state. The
/// channel stores what the user set; the effective gain pushed to the sink
/// additionally factors in the master gain and the session's solo set.
pub struct Channel {
    id: TrackId,
    sink: Box<dyn Sink>,
    volume: f32,
    muted: bool,
    soloed: bool,
}

impl Channel {
    /// Creates a channel at full volume, unmuted and unsoloed.
    pub fn new(id: TrackId, sink: Box<dyn Sink>) -> Channel {
        Channel {
            id,
            sink,
            volume: 1.0,
            muted: false,
            soloed: false,
        }
    }

    /// The track this channel plays.
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// The sink this channel commands.
    pub fn sink(&self) -> &dyn Sink {
        self.sink.as_ref()
    }

    /// The stored volume.
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Sets the stored volume, clamped to [0, 1].
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Returns true if the channel is muted.
    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Flips the mute state and returns the new value.
    pub fn toggle_muted(&mut self) -> bool {
        self.muted = !self.muted;
        self.muted
    }

    /// Returns true if the channel is soloed.
    pub fn soloed(&self) -> bool {
        self.soloed
    }

    /// Flips the solo state and returns the new value.
    pub fn toggle_soloed(&mut self) -> bool {
        self.soloed = !self.soloed;
        self.soloed
    }

    /// The gain this channel should output given the master gain and whether
    /// any channel in the session is soloed. Muting wins over everything;
    /// a solo anywhere silences every non-soloed channel.
    pub fn effective_gain(&self, master_gain: f32, any_solo: bool) -> f32 {
        if self.muted || (any_solo && !self.soloed) {
            return 0.0;
        }
        self.volume * master_gain
    }

    /// Recomputes the effective gain and pushes it to the sink. Idempotent
    /// for a fixed (volume, muted, master gain, solo set) tuple.
    pub fn apply_gain(&self, master_gain: f32, any_solo: bool) -> Result<(), Box<dyn Error>> {
        self.sink.set_gain(self.effective_gain(master_gain, any_solo))
    }
}
