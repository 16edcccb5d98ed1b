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
use std::io;
use std::time::Duration;

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use crate::checkpoint;

use super::Event;

const PLAY: &str = "play";
const RESTART: &str = "restart";
const STOP: &str = "stop";
const FORWARD: &str = "fwd";
const BACK: &str = "back";
const SEEK: &str = "seek";
const SPEED: &str = "speed";
const MARK: &str = "mark";
const GOTO: &str = "goto";
const PREV: &str = "prev";
const NEXT: &str = "next";
const LOOP: &str = "loop";
const VOLUME: &str = "vol";
const MUTE: &str = "mute";
const SOLO: &str = "solo";
const MASTER: &str = "master";
const WAVE: &str = "wave";
const QUIT: &str = "quit";

const HELP: &str = "\
Commands:
  play                  toggle play/pause
  restart               play from the top
  stop                  stop and rewind
  fwd / back            skip forward/backward
  seek <seconds>        jump to an absolute position
  speed <0-99>          set the speed control (50 = normal)
  mark <1-4>            set/unset a checkpoint at the current position
  goto <1-4>            jump to a checkpoint
  prev / next           jump to the nearest checkpoint
  loop                  toggle the practice loop
  vol <track> <0-100>   set a track's volume
  mute <track|master>   toggle a mute
  solo <track>          toggle a solo
  master <0-100>        set the master volume
  wave <track|all>      select the waveform display
  quit                  exit";

/// A controller that controls a transport using the keyboard.
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Prompts for and forwards one command. Returns false when the driver
    /// should stop monitoring.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "spt> ")?;
        writer.flush()?;

        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }
        let input = input.trim();
        if input.is_empty() {
            return Ok(true);
        }
        if input.eq_ignore_ascii_case(QUIT) {
            return Ok(false);
        }

        match Self::parse(input) {
            Some(event) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            None => {
                warn!(input, "Unrecognized input");
                writeln!(writer, "{}", HELP)?;
            }
        }
        Ok(true)
    }

    fn parse(input: &str) -> Option<Event> {
        let mut words = input.split_whitespace();
        let command = words.next()?.to_lowercase();
        let arg = words.next();
        let arg2 = words.next();

        match command.as_str() {
            PLAY => Some(Event::PlayPause),
            RESTART => Some(Event::Restart),
            STOP => Some(Event::Stop),
            FORWARD => Some(Event::SkipForward),
            BACK => Some(Event::SkipBack),
            SEEK => {
                let secs: f64 = arg?.parse().ok()?;
                if !secs.is_finite() || secs < 0.0 {
                    return None;
                }
                Some(Event::Seek(Duration::from_secs_f64(secs)))
            }
            SPEED => Some(Event::Speed(arg?.parse().ok()?)),
            MARK => Some(Event::SetCheckpoint(Self::parse_slot(arg?)?)),
            GOTO => Some(Event::LoadCheckpoint(Self::parse_slot(arg?)?)),
            PREV => Some(Event::PrevCheckpoint),
            NEXT => Some(Event::NextCheckpoint),
            LOOP => Some(Event::ToggleLoop),
            VOLUME => Some(Event::Volume(
                arg?.parse().ok()?,
                Self::parse_percent(arg2?)?,
            )),
            MUTE => {
                let target = arg?;
                if target.eq_ignore_ascii_case(MASTER) {
                    Some(Event::ToggleMasterMute)
                } else {
                    Some(Event::ToggleMute(target.parse().ok()?))
                }
            }
            SOLO => Some(Event::ToggleSolo(arg?.parse().ok()?)),
            MASTER => Some(Event::MasterVolume(Self::parse_percent(arg?)?)),
            WAVE => Some(Event::Waveform(arg?.parse().ok()?)),
            _ => None,
        }
    }

    /// Parses a 1-based checkpoint slot into its 0-based index.
    fn parse_slot(arg: &str) -> Option<u8> {
        let slot: u8 = arg.parse().ok()?;
        if (1..=checkpoint::SLOTS).contains(&slot) {
            Some(slot - 1)
        } else {
            None
        }
    }

    fn parse_percent(arg: &str) -> Option<f32> {
        let percent: u8 = arg.parse().ok()?;
        Some(f32::from(percent.min(100)) / 100.0)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}

            info!("Keyboard driver stopped.");
            Ok(())
        })
    }
}
