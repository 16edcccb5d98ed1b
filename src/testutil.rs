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
use std::{error::Error, path::Path};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::stems::TrackId;

/// Writes a 16-bit stereo wav file from normalized samples.
pub fn write_stereo_wav(
    path: &Path,
    left: &[f32],
    right: &[f32],
    sample_rate: u32,
) -> Result<(), Box<dyn Error>> {
    assert_eq!(left.len(), right.len(), "Channel lengths must match");

    let mut writer = WavWriter::create(
        path,
        WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        },
    )?;

    for (l, r) in left.iter().zip(right.iter()) {
        writer.write_sample((l * f32::from(i16::MAX)) as i16)?;
        writer.write_sample((r * f32::from(i16::MAX)) as i16)?;
    }
    writer.finalize()?;

    Ok(())
}

/// Writes a complete set of stems into the given directory, each a quiet
/// ramp of the given length in frames.
pub fn write_session(dir: &Path, frames: usize, sample_rate: u32) {
    let samples: Vec<f32> = (0..frames).map(|i| (i % 100) as f32 / 1000.0).collect();
    for track in TrackId::ALL {
        write_stereo_wav(&dir.join(track.file_name()), &samples, &samples, sample_rate)
            .expect("unable to write stem");
    }
}
