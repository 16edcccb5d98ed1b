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
use std::{collections::BTreeMap, fmt, time::Duration};

/// The number of checkpoint slots available to the user.
pub const SLOTS: u8 = 4;

/// The minimum distance a checkpoint must be from the current position to
/// qualify for previous/next navigation. Without it, pressing "previous"
/// while sitting exactly on a checkpoint would re-select that checkpoint.
pub const DEAD_ZONE: Duration = Duration::from_millis(250);

/// The display color of a checkpoint marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Color {
    Red,
    Yellow,
    Green,
    Blue,
}

impl Color {
    /// The fixed display color for the given slot.
    pub fn for_slot(slot: u8) -> Color {
        match slot % SLOTS {
            0 => Color::Red,
            1 => Color::Yellow,
            2 => Color::Green,
            _ => Color::Blue,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::Red => write!(f, "red"),
            Color::Yellow => write!(f, "yellow"),
            Color::Green => write!(f, "green"),
            Color::Blue => write!(f, "blue"),
        }
    }
}

/// A marked timeline position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Checkpoint {
    /// The marked position.
    pub position: Duration,
    /// The display color of the marker.
    pub color: Color,
}

/// The result of toggling a checkpoint slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Toggle {
    /// The checkpoint was set or overwritten.
    Set,
    /// The checkpoint was removed by re-marking the same position.
    Cleared,
}

/// An ordered mapping of checkpoint slots to timeline positions. Each session
/// owns its own store; the store is cleared when the session ends.
#[derive(Default)]
pub struct CheckpointStore {
    checkpoints: BTreeMap<u8, Checkpoint>,
}

impl CheckpointStore {
    /// Creates an empty store.
    pub fn new() -> CheckpointStore {
        CheckpointStore::default()
    }

    /// Marks the given position at the given slot. Marking a slot at exactly
    /// the position it already holds removes the checkpoint instead; anything
    /// else inserts or overwrites. Positions are compared at integer
    /// millisecond granularity.
    pub fn toggle(&mut self, slot: u8, position: Duration) -> Toggle {
        let position = Duration::from_millis(position.as_millis() as u64);

        if self
            .checkpoints
            .get(&slot)
            .is_some_and(|existing| existing.position == position)
        {
            self.checkpoints.remove(&slot);
            return Toggle::Cleared;
        }

        self.checkpoints.insert(
            slot,
            Checkpoint {
                position,
                color: Color::for_slot(slot),
            },
        );
        Toggle::Set
    }

    /// Gets the checkpoint at the given slot.
    pub fn get(&self, slot: u8) -> Option<Checkpoint> {
        self.checkpoints.get(&slot).copied()
    }

    /// Finds the closest checkpoint position at least `dead_zone` before the
    /// given position.
    pub fn nearest_before(&self, position: Duration, dead_zone: Duration) -> Option<Duration> {
        self.checkpoints
            .values()
            .map(|checkpoint| checkpoint.position)
            .filter(|&marked| marked <= position && position - marked >= dead_zone)
            .max()
    }

    /// Finds the closest checkpoint position at least `dead_zone` after the
    /// given position.
    pub fn nearest_after(&self, position: Duration, dead_zone: Duration) -> Option<Duration> {
        self.checkpoints
            .values()
            .map(|checkpoint| checkpoint.position)
            .filter(|&marked| marked >= position && marked - position >= dead_zone)
            .min()
    }

    /// Removes all checkpoints.
    pub fn clear(&mut self) {
        self.checkpoints.clear();
    }

    /// Returns true if no checkpoints are set.
    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }
}
