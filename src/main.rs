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
mod audio;
mod channel;
mod checkpoint;
mod config;
mod controller;
mod display;
mod looper;
mod speed;
mod stems;
#[cfg(test)]
mod testutil;
mod transport;
mod util;
mod waveform;

use std::error::Error;
use std::path::PathBuf;

use clap::{crate_version, Parser, Subcommand};

use crate::stems::Session;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A multitrack practice player for separated song stems."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists and verifies the stems of a separated song.
    Stems {
        /// The path to the separated song directory.
        path: String,
    },
    /// Starts a practice session.
    Practice {
        /// The path to the practice session config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Stems { path } => {
            let session = Session::from_dir(&PathBuf::from(&path))?;

            println!(
                "Song: {} ({})",
                session.name(),
                util::timestamp(session.duration())
            );
            println!("Stems:");
            for stem in session.stems() {
                println!("- {}", stem);
            }
        }
        Commands::Practice { config_path } => {
            let (mut controller, _backend) =
                config::init_transport_and_controller(&PathBuf::from(config_path))?;
            controller.join().await?;
        }
    }

    Ok(())
}
