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
use std::{error::Error, path::PathBuf, time::Duration};

use duration_string::DurationString;
use serde::Deserialize;

use crate::{checkpoint, transport, waveform};

const DEFAULT_DEVICE: &str = "rodio";
const DEFAULT_MODEL: &str = "htdemucs";

/// The configuration for a practice session.
#[derive(Deserialize)]
pub struct Practice {
    /// The audio device to use.
    device: Option<String>,
    /// The directory separated stems are written under.
    separated: String,
    /// The separation model whose output to use.
    model: Option<String>,
    /// The song to practice.
    song: String,
    /// How far skip commands move.
    skip: Option<String>,
    /// How close a checkpoint may be to the position and still be skipped
    /// past during navigation and loop derivation.
    dead_zone: Option<String>,
    /// How many points waveform summaries carry.
    visual_samples: Option<usize>,
}

impl Practice {
    /// Returns the audio device from the configuration.
    pub fn device(&self) -> &str {
        self.device.as_deref().unwrap_or(DEFAULT_DEVICE)
    }

    /// Returns the song name from the configuration.
    pub fn song(&self) -> &str {
        &self.song
    }

    /// The directory holding the song's stems. Separators lay their output
    /// out as `<separated>/<model>/<song>/`.
    pub fn song_dir(&self) -> PathBuf {
        PathBuf::from(&self.separated)
            .join(self.model.as_deref().unwrap_or(DEFAULT_MODEL))
            .join(&self.song)
    }

    /// Returns the skip amount from the configuration.
    pub fn skip(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.skip {
            Some(skip) => Ok(DurationString::from_string(skip.clone())?.into()),
            None => Ok(transport::DEFAULT_SKIP),
        }
    }

    /// Returns the checkpoint dead zone from the configuration.
    pub fn dead_zone(&self) -> Result<Duration, Box<dyn Error>> {
        match &self.dead_zone {
            Some(dead_zone) => Ok(DurationString::from_string(dead_zone.clone())?.into()),
            None => Ok(checkpoint::DEAD_ZONE),
        }
    }

    /// The transport options this configuration amounts to.
    pub fn options(&self) -> Result<transport::Options, Box<dyn Error>> {
        Ok(transport::Options {
            skip: self.skip()?,
            dead_zone: self.dead_zone()?,
            visual_samples: self.visual_samples.unwrap_or(waveform::VISUAL_SAMPLES),
        })
    }
}

#[cfg(test)]
mod test {
    use std::{path::PathBuf, time::Duration};

    use super::Practice;

    #[test]
    fn test_full_config() {
        let practice: Practice = serde_yml::from_str(
            r#"
            device: mock-device
            separated: /music/separated
            model: mdx_extra
            song: Did You See The Words
            skip: 10s
            dead_zone: 500ms
            visual_samples: 1000
            "#,
        )
        .expect("failed to parse");

        assert_eq!(practice.device(), "mock-device");
        assert_eq!(
            practice.song_dir(),
            PathBuf::from("/music/separated/mdx_extra/Did You See The Words")
        );
        let options = practice.options().expect("failed to build options");
        assert_eq!(options.skip, Duration::from_secs(10));
        assert_eq!(options.dead_zone, Duration::from_millis(500));
        assert_eq!(options.visual_samples, 1000);
    }

    #[test]
    fn test_defaults() {
        let practice: Practice = serde_yml::from_str(
            r#"
            separated: separated
            song: Song 1
            "#,
        )
        .expect("failed to parse");

        assert_eq!(practice.device(), "rodio");
        assert_eq!(
            practice.song_dir(),
            PathBuf::from("separated/htdemucs/Song 1")
        );
        let options = practice.options().expect("failed to build options");
        assert_eq!(options.skip, crate::transport::DEFAULT_SKIP);
        assert_eq!(options.dead_zone, crate::checkpoint::DEAD_ZONE);
        assert_eq!(options.visual_samples, crate::waveform::VISUAL_SAMPLES);
    }

    #[test]
    fn test_bad_duration() {
        let practice: Practice = serde_yml::from_str(
            r#"
            separated: separated
            song: Song 1
            skip: not-a-duration
            "#,
        )
        .expect("failed to parse");

        assert!(practice.skip().is_err());
    }
}
