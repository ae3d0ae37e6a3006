// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
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
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use metronome::controller::{keyboard, Controller};
use metronome::generator::DEFAULT_BPM;
use metronome::samples::SampleDecoder;
use metronome::{audio, config, Metronome};

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A drift-free metronome."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Plays immediately and accepts commands from the keyboard.
    Play {
        /// Beats per minute.
        #[arg(
            short,
            long,
            default_value_t = DEFAULT_BPM,
            value_parser = clap::value_parser!(u32).range(1..)
        )]
        bpm: u32,
        /// The sample to play on every beat. Uses the built-in click when unset.
        #[arg(short, long)]
        sample: Option<PathBuf>,
        /// The device name to play through.
        #[arg(short, long, default_value = "default")]
        device: String,
    },
    /// Start will start the metronome from a config file.
    Start {
        /// The path to the metronome config.
        config_path: PathBuf,
    },
    /// Decodes a sample and prints its format.
    Check {
        /// The path to the sample.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Play {
            bpm,
            sample,
            device,
        } => {
            run(config::Metronome::new(
                bpm,
                sample,
                config::Audio::new(&device),
            ))
            .await?;
        }
        Commands::Start { config_path } => {
            run(config::Metronome::deserialize(&config_path)?).await?;
        }
        Commands::Check { path } => {
            let sample = SampleDecoder::decode_file(&path)?;
            println!(
                "{}: {} channel(s), {} Hz, {} frames ({:?})",
                path.display(),
                sample.channel_format().count(),
                sample.sample_rate(),
                sample.frames(),
                sample.duration()
            );
        }
    }

    Ok(())
}

/// Runs the metronome until the keyboard says quit or the process is interrupted.
async fn run(config: config::Metronome) -> Result<(), Box<dyn Error>> {
    let options = config.engine_options()?;
    let backend = audio::get_backend(config.audio())?;
    let metronome = Arc::new(Metronome::new(backend, options)?);
    if let Some(sample) = config.sample() {
        metronome.set_sample_path(&sample)?;
    }
    metronome.start();

    let mut controller = Controller::new(metronome.clone(), Arc::new(keyboard::Driver::new()));
    tokio::select! {
        result = controller.join() => result?,
        result = tokio::signal::ctrl_c() => {
            result?;
            info!("Interrupted");
        }
    }

    metronome.stop();
    controller.shutdown().await;
    // Dropping the last handle joins the beat thread and releases the backend.
    match Arc::into_inner(metronome) {
        Some(metronome) => drop(metronome),
        None => warn!("Metronome still in use at exit"),
    }

    // The keyboard driver is parked on a blocking stdin read that would hold
    // up runtime shutdown indefinitely.
    std::process::exit(0);
}
