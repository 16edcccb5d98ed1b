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
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use hound::{SampleFormat, WavReader};

use crate::util;

/// Identifies one stem of a separated song. The ordering is significant:
/// transport commands fan out in this order, and the last track is the
/// reference track whose notifications drive the authoritative position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TrackId {
    Drums,
    Bass,
    Vocals,
    Other,
}

impl TrackId {
    /// All track IDs, in fan-out order.
    pub const ALL: [TrackId; 4] = [
        TrackId::Drums,
        TrackId::Bass,
        TrackId::Vocals,
        TrackId::Other,
    ];

    /// The file name the separation tool uses for this stem.
    pub fn file_name(&self) -> &'static str {
        match self {
            TrackId::Drums => "drums.wav",
            TrackId::Bass => "bass.wav",
            TrackId::Vocals => "vocals.wav",
            TrackId::Other => "other.wav",
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackId::Drums => write!(f, "drums"),
            TrackId::Bass => write!(f, "bass"),
            TrackId::Vocals => write!(f, "vocals"),
            TrackId::Other => write!(f, "other"),
        }
    }
}

/// Typed error for track name parsing so mixer commands can't fall back to
/// stringly-typed routing.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
#[error("unknown track name: {0}")]
pub struct ParseTrackError(String);

impl FromStr for TrackId {
    type Err = ParseTrackError;

    fn from_str(s: &str) -> Result<TrackId, ParseTrackError> {
        match s.to_lowercase().as_str() {
            "drums" | "drum" => Ok(TrackId::Drums),
            "bass" => Ok(TrackId::Bass),
            "vocals" | "vocal" => Ok(TrackId::Vocals),
            "other" => Ok(TrackId::Other),
            _ => Err(ParseTrackError(s.to_string())),
        }
    }
}

/// One stem file of a separated song.
pub struct Stem {
    /// The track this stem belongs to.
    id: TrackId,
    /// The stem file on disk.
    path: PathBuf,
    /// The sample rate of the stem.
    sample_rate: u32,
    /// The number of channels in the stem file.
    channels: u16,
    /// The duration of the stem.
    duration: Duration,
}

impl Stem {
    /// Creates a stem by reading the WAV header of the given file.
    pub fn new(id: TrackId, path: PathBuf) -> Result<Stem, Box<dyn Error>> {
        let reader = WavReader::open(&path)?;
        let spec = reader.spec();
        let duration_ms = u64::from(reader.duration()) * 1000 / u64::from(spec.sample_rate);

        Ok(Stem {
            id,
            path,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            duration: Duration::from_millis(duration_ms),
        })
    }

    /// The track this stem belongs to.
    pub fn id(&self) -> TrackId {
        self.id
    }

    /// The stem file on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The sample rate of the stem.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// The duration of the stem.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Reads the raw samples of this stem as normalized stereo. Mono stems
    /// are duplicated into both sides.
    pub fn samples(&self) -> Result<StemSamples, Box<dyn Error>> {
        let mut reader = WavReader::open(&self.path)?;
        let spec = reader.spec();
        if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(format!(
                "expected 16-bit PCM for stem {}, got {}-bit {:?}",
                self.id, spec.bits_per_sample, spec.sample_format
            )
            .into());
        }

        let interleaved = reader
            .samples::<i16>()
            .collect::<Result<Vec<i16>, hound::Error>>()?;

        let normalize = |sample: &i16| f32::from(*sample) / f32::from(i16::MAX);
        let (left, right): (Vec<f32>, Vec<f32>) = match spec.channels {
            1 => {
                let channel: Vec<f32> = interleaved.iter().map(normalize).collect();
                (channel.clone(), channel)
            }
            2 => (
                interleaved.iter().step_by(2).map(normalize).collect(),
                interleaved.iter().skip(1).step_by(2).map(normalize).collect(),
            ),
            channels => {
                return Err(
                    format!("unsupported channel count {} in stem {}", channels, self.id).into(),
                )
            }
        };

        Ok(StemSamples {
            sample_rate: self.sample_rate,
            left,
            right,
        })
    }
}

impl fmt::Display for Stem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} Hz, {} ch, {}",
            self.id,
            self.sample_rate,
            self.channels,
            util::timestamp(self.duration),
        )
    }
}

/// The raw stereo samples of one stem, normalized to [-1, 1].
pub struct StemSamples {
    /// The sample rate the samples were recorded at.
    pub sample_rate: u32,
    /// The left channel.
    pub left: Vec<f32>,
    /// The right channel.
    pub right: Vec<f32>,
}

impl StemSamples {
    /// The number of frames in this stem.
    pub fn len(&self) -> usize {
        self.left.len()
    }

    /// Returns true if the stem holds no frames.
    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}

/// The fixed set of stems for one practice session. Built once from the
/// directory the separation tool produced and immutable afterwards.
pub struct Session {
    /// The name of the song, taken from the directory name.
    name: String,
    /// The stems, in track order.
    stems: Vec<Stem>,
}

impl Session {
    /// Builds a session from a separated song directory, which is expected to
    /// contain one WAV file per stem (drums, bass, vocals, other), the layout
    /// the separation tool writes under `<root>/<model>/<song>/`.
    pub fn from_dir(dir: &Path) -> Result<Session, Box<dyn Error>> {
        let name = dir
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("unnamed song")
            .to_string();

        let mut stems = Vec::with_capacity(TrackId::ALL.len());
        for id in TrackId::ALL {
            let path = dir.join(id.file_name());
            if !path.exists() {
                return Err(format!(
                    "missing stem '{}' in {}",
                    id.file_name(),
                    dir.display()
                )
                .into());
            }
            stems.push(Stem::new(id, path)?);
        }

        Ok(Session { name, stems })
    }

    /// The name of the song.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stems of this session, in track order.
    pub fn stems(&self) -> &[Stem] {
        &self.stems
    }

    /// Gets the stem for the given track.
    pub fn stem(&self, id: TrackId) -> Option<&Stem> {
        self.stems.iter().find(|stem| stem.id == id)
    }

    /// The duration of the session, taken from the longest stem.
    pub fn duration(&self) -> Duration {
        self.stems
            .iter()
            .map(|stem| stem.duration)
            .max()
            .unwrap_or(Duration::ZERO)
    }
}
