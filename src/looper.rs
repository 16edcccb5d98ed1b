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
use std::{fmt, time::Duration};

use crate::checkpoint::CheckpointStore;
use crate::util;

/// Half of the loop end detection window. Position notifications arrive at
/// irregular intervals and can skip over the exact end value, so the crossing
/// check is a window test rather than an equality test.
const HALF_WINDOW: Duration = Duration::from_millis(25);

/// A half-open timeline interval [start, end) that playback is held within.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopRegion {
    /// Where the loop jumps back to.
    pub start: Duration,
    /// Where the loop region ends.
    pub end: Duration,
}

impl fmt::Display for LoopRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            util::timestamp(self.start),
            util::timestamp(self.end)
        )
    }
}

/// Holds the optional active loop region. The region is derived from the
/// checkpoints nearest the current position at activation time and held fixed
/// until deactivated or the session ends.
#[derive(Default)]
pub struct Looper {
    region: Option<LoopRegion>,
}

impl Looper {
    /// Creates an inactive looper.
    pub fn new() -> Looper {
        Looper::default()
    }

    /// The active loop region, if any.
    pub fn region(&self) -> Option<LoopRegion> {
        self.region
    }

    /// Deactivates an active loop, or activates one around the given position:
    /// the start is the nearest qualifying checkpoint before the position (or
    /// the track start), the end the nearest after (or the track end). A
    /// degenerate derivation falls back to the full track. Returns the new
    /// region, or None if the looper is now inactive.
    pub fn toggle(
        &mut self,
        position: Duration,
        checkpoints: &CheckpointStore,
        duration: Duration,
        dead_zone: Duration,
    ) -> Option<LoopRegion> {
        if self.region.take().is_some() {
            return None;
        }

        let start = checkpoints
            .nearest_before(position, dead_zone)
            .unwrap_or(Duration::ZERO);
        let end = checkpoints
            .nearest_after(position, dead_zone)
            .unwrap_or(duration);

        let region = if start < end {
            LoopRegion { start, end }
        } else {
            LoopRegion {
                start: Duration::ZERO,
                end: duration,
            }
        };

        // With no known duration even the fallback is degenerate.
        if region.start >= region.end {
            return None;
        }

        self.region = Some(region);
        self.region
    }

    /// Checks whether the given position has reached the loop end window.
    /// Returns the loop start to seek back to if it has.
    pub fn crossed(&self, position: Duration) -> Option<Duration> {
        let region = self.region?;
        let window_start = region.end.saturating_sub(HALF_WINDOW);
        let window_end = region.end + HALF_WINDOW;

        if position >= window_start && position < window_end {
            Some(region.start)
        } else {
            None
        }
    }

    /// Deactivates any active loop.
    pub fn clear(&mut self) {
        self.region = None;
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{LoopRegion, Looper};
    use crate::checkpoint::{CheckpointStore, DEAD_ZONE};

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn test_toggle_derives_region_from_checkpoints() {
        let mut checkpoints = CheckpointStore::new();
        checkpoints.toggle(0, ms(700));
        checkpoints.toggle(1, ms(1400));

        let mut looper = Looper::new();
        let region = looper.toggle(ms(1000), &checkpoints, ms(10000), DEAD_ZONE);
        assert_eq!(
            region,
            Some(LoopRegion {
                start: ms(700),
                end: ms(1400)
            })
        );

        // Toggling again deactivates.
        assert_eq!(looper.toggle(ms(1000), &checkpoints, ms(10000), DEAD_ZONE), None);
        assert_eq!(looper.region(), None);
    }

    #[test]
    fn test_toggle_falls_back_to_track_boundaries() {
        let checkpoints = CheckpointStore::new();
        let mut looper = Looper::new();

        let region = looper.toggle(ms(1000), &checkpoints, ms(10000), DEAD_ZONE);
        assert_eq!(
            region,
            Some(LoopRegion {
                start: ms(0),
                end: ms(10000)
            })
        );
    }

    #[test]
    fn test_toggle_degenerate_region_with_no_duration() {
        let checkpoints = CheckpointStore::new();
        let mut looper = Looper::new();

        assert_eq!(looper.toggle(ms(0), &checkpoints, ms(0), DEAD_ZONE), None);
        assert_eq!(looper.region(), None);
    }

    #[test]
    fn test_crossing_window() {
        let mut checkpoints = CheckpointStore::new();
        checkpoints.toggle(0, ms(700));
        checkpoints.toggle(1, ms(1400));

        let mut looper = Looper::new();
        looper.toggle(ms(1000), &checkpoints, ms(10000), DEAD_ZONE);

        // The window is [end - 25, end + 25).
        assert_eq!(looper.crossed(ms(1374)), None);
        assert_eq!(looper.crossed(ms(1375)), Some(ms(700)));
        assert_eq!(looper.crossed(ms(1400)), Some(ms(700)));
        assert_eq!(looper.crossed(ms(1424)), Some(ms(700)));
        assert_eq!(looper.crossed(ms(1425)), None);

        looper.clear();
        assert_eq!(looper.crossed(ms(1400)), None);
    }
}
