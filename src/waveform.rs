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
use std::fmt;
use std::str::FromStr;

use crate::stems::{ParseTrackError, Session, StemSamples, TrackId};

/// The number of points a waveform summary carries by default. Enough for a
/// seek bar at any plausible terminal or window width.
pub const VISUAL_SAMPLES: usize = 200_000;

/// Which stems a waveform summary covers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StemSelection {
    /// Sum every stem into a single summary.
    All,
    /// Summarize a single stem.
    Single(TrackId),
}

impl fmt::Display for StemSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StemSelection::All => write!(f, "all"),
            StemSelection::Single(track) => write!(f, "{}", track),
        }
    }
}

impl FromStr for StemSelection {
    type Err = ParseTrackError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(StemSelection::All);
        }
        Ok(StemSelection::Single(s.parse()?))
    }
}

/// A downsampled stereo waveform. `times` holds the timeline position of each
/// point in seconds; `left` and `right` hold the corresponding amplitudes.
/// All three vectors share a length.
#[derive(Debug)]
pub struct WaveformSummary {
    pub times: Vec<f32>,
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

/// Summarizes the selected stems of a session into `visual_samples` points.
/// Reads the stem files from disk, so call this off the control path.
pub fn summarize(
    session: &Session,
    selection: StemSelection,
    visual_samples: usize,
) -> Result<WaveformSummary, Box<dyn Error>> {
    let mut stems = Vec::new();
    match selection {
        StemSelection::All => {
            for stem in session.stems() {
                stems.push(stem.samples()?);
            }
        }
        StemSelection::Single(track) => {
            if let Some(stem) = session.stem(track) {
                stems.push(stem.samples()?);
            }
        }
    }
    Ok(summarize_stems(&stems, visual_samples))
}

/// Decimates each stem to `visual_samples` points and sums the results. Each
/// stem is decimated on its own index axis, so stems of different lengths
/// still line up point for point even though only the tail of the longer
/// stem stretches. The time axis comes from the longest stem.
pub fn summarize_stems(stems: &[StemSamples], visual_samples: usize) -> WaveformSummary {
    let mut left = vec![0.0f32; visual_samples];
    let mut right = vec![0.0f32; visual_samples];
    let mut times = vec![0.0f32; visual_samples];

    let mut longest: Option<&StemSamples> = None;
    for stem in stems {
        if stem.is_empty() {
            continue;
        }
        for (k, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            if let Some(i) = pick_index(stem.len(), visual_samples, k) {
                *l += stem.left[i];
                *r += stem.right[i];
            }
        }
        if longest.is_none_or(|s| stem.len() > s.len()) {
            longest = Some(stem);
        }
    }

    if let Some(stem) = longest {
        for (k, t) in times.iter_mut().enumerate() {
            if let Some(i) = pick_index(stem.len(), visual_samples, k) {
                *t = i as f32 / stem.sample_rate as f32;
            }
        }
    }

    WaveformSummary { times, left, right }
}

/// The source index for visual point `k` of `n` when decimating a stem of
/// `len` frames. Spreads the points evenly with the endpoints pinned to the
/// first and last frame. Returns None when there is nothing to pick.
fn pick_index(len: usize, n: usize, k: usize) -> Option<usize> {
    if len == 0 || n == 0 {
        return None;
    }
    if n == 1 {
        return Some(0);
    }
    Some(k * (len - 1) / (n - 1))
}

#[cfg(test)]
mod test {
    use crate::stems::StemSamples;

    use super::{pick_index, summarize_stems, StemSelection};

    fn ramp_stem(len: usize, scale: f32) -> StemSamples {
        let left: Vec<f32> = (0..len).map(|i| i as f32 * scale).collect();
        let right = left.clone();
        StemSamples {
            sample_rate: 100,
            left,
            right,
        }
    }

    #[test]
    fn test_pick_index() {
        assert_eq!(pick_index(0, 4, 0), None);
        assert_eq!(pick_index(10, 0, 0), None);
        assert_eq!(pick_index(10, 1, 0), Some(0));

        // Endpoints pin to the first and last frame.
        assert_eq!(pick_index(1000, 4, 0), Some(0));
        assert_eq!(pick_index(1000, 4, 3), Some(999));
        assert_eq!(pick_index(1000, 4, 1), Some(333));
        assert_eq!(pick_index(1000, 4, 2), Some(666));
    }

    #[test]
    fn test_decimate_then_sum() {
        // Stems of different lengths are each decimated on their own axis
        // before summing, not summed and then decimated.
        let short = ramp_stem(1000, 1.0);
        let long = ramp_stem(2000, 1.0);
        let summary = summarize_stems(&[short, long], 4);

        assert_eq!(summary.left.len(), 4);
        for (k, value) in summary.left.iter().enumerate() {
            let expected = (k * 999 / 3) as f32 + (k * 1999 / 3) as f32;
            assert_eq!(*value, expected, "point {}", k);
        }

        // Time axis follows the longest stem at its own sample rate.
        assert_eq!(summary.times[0], 0.0);
        assert_eq!(summary.times[3], 1999.0 / 100.0);
    }

    #[test]
    fn test_empty_stems() {
        let summary = summarize_stems(&[], 8);
        assert_eq!(summary.left, vec![0.0; 8]);
        assert_eq!(summary.times, vec![0.0; 8]);
    }

    #[test]
    fn test_selection_parse() {
        assert_eq!("all".parse(), Ok(StemSelection::All));
        assert_eq!(
            "drums".parse(),
            Ok(StemSelection::Single(crate::stems::TrackId::Drums))
        );
        assert!("keys".parse::<StemSelection>().is_err());
    }
}
