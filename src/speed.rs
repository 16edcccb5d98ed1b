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
use std::cmp::Ordering;

/// The control value at which playback runs at normal speed.
pub const CONTROL_UNITY: u8 = 50;

/// The maximum control value, corresponding to double speed.
pub const CONTROL_MAX: u8 = 99;

/// Maps a speed control value in [0, 99] to a playback rate in [0, 2].
///
/// The mapping is piecewise-linear around the unity midpoint: the 49 steps
/// below it cover 0x-1x, the 48 steps above cover 1x-2x, which gives fine
/// control around normal speed where practicing actually happens.
pub fn control_to_rate(control: u8) -> f64 {
    let control = control.min(CONTROL_MAX);
    match control.cmp(&CONTROL_UNITY) {
        Ordering::Equal => 1.0,
        Ordering::Less => f64::from(control) / 49.0,
        Ordering::Greater => (f64::from(control) - 51.0) / 48.0 + 1.0,
    }
}

/// The inverse of [control_to_rate]: maps a playback rate back to the control
/// value, truncated to an integer step.
pub fn rate_to_control(rate: f64) -> u8 {
    if rate == 1.0 {
        CONTROL_UNITY
    } else if rate < 1.0 {
        (rate.max(0.0) * 49.0) as u8
    } else {
        (((rate.min(2.0) - 1.0) * 48.0) + 51.0) as u8
    }
}
