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
use std::time::Duration;

/// Formats a timeline position as `m:ss.cc`.
pub fn timestamp(position: Duration) -> String {
    let mins = position.as_secs() / 60;
    let secs = position.as_secs() % 60;
    let centis = position.subsec_millis() / 10;
    format!("{}:{:02}.{:02}", mins, secs, centis)
}
