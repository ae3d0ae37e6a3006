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
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::{Audio, ConfigError};
use crate::engine::{EngineOptions, DEFAULT_POLL_INTERVAL, DEFAULT_SPIN_THRESHOLD};
use crate::generator::{BeatConfig, DEFAULT_BPM};

/// A YAML representation of the metronome configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Metronome {
    /// Beats per minute (default: 40).
    bpm: Option<u32>,

    /// The sample played on every beat. The built-in click when unset.
    sample: Option<PathBuf>,

    /// Longest slice the beat thread waits before re-polling (default: 20ms).
    poll_interval: Option<String>,

    /// Waits shorter than this are spun instead of slept (default: 2ms).
    spin_threshold: Option<String>,

    /// Priority (0-99) of the beat thread.
    thread_priority: Option<u8>,

    /// The audio output.
    #[serde(default)]
    audio: Audio,

    /// Directory relative sample paths are resolved against.
    #[serde(skip)]
    base_path: Option<PathBuf>,
}

impl Metronome {
    /// Creates a configuration from command line settings.
    pub fn new(bpm: u32, sample: Option<PathBuf>, audio: Audio) -> Metronome {
        Metronome {
            bpm: Some(bpm),
            sample,
            poll_interval: None,
            spin_threshold: None,
            thread_priority: None,
            audio,
            base_path: None,
        }
    }

    /// Loads the configuration from the given file.
    pub fn deserialize(path: &Path) -> Result<Metronome, ConfigError> {
        let mut metronome: Metronome = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        metronome.base_path = path.parent().map(Path::to_path_buf);
        Ok(metronome)
    }

    /// Returns the tempo.
    pub fn bpm(&self) -> u32 {
        self.bpm.unwrap_or(DEFAULT_BPM)
    }

    /// Returns the sample path, resolved against the config file's directory.
    pub fn sample(&self) -> Option<PathBuf> {
        let sample = self.sample.as_ref()?;
        Some(match &self.base_path {
            Some(base_path) if sample.is_relative() => base_path.join(sample),
            _ => sample.clone(),
        })
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the poll interval.
    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        let interval = parse_duration(
            "poll_interval",
            self.poll_interval.as_deref(),
            DEFAULT_POLL_INTERVAL,
        )?;
        if interval.is_zero() {
            return Err(ConfigError::InvalidDuration {
                field: "poll_interval",
                value: "0".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(interval)
    }

    /// Returns the spin threshold.
    pub fn spin_threshold(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "spin_threshold",
            self.spin_threshold.as_deref(),
            DEFAULT_SPIN_THRESHOLD,
        )
    }

    /// Returns the beat thread priority, if configured.
    pub fn thread_priority(&self) -> Result<Option<u8>, ConfigError> {
        match self.thread_priority {
            Some(priority) if priority > 99 => Err(ConfigError::InvalidThreadPriority(priority)),
            priority => Ok(priority),
        }
    }

    /// Builds the engine options described by this configuration.
    /// The spin threshold must be shorter than the poll interval.
    pub fn engine_options(&self) -> Result<EngineOptions, ConfigError> {
        let poll_interval = self.poll_interval()?;
        let spin_threshold = self.spin_threshold()?;
        if spin_threshold >= poll_interval {
            return Err(ConfigError::InvalidDuration {
                field: "spin_threshold",
                value: format!("{:?}", spin_threshold),
                reason: format!("must be shorter than poll_interval ({:?})", poll_interval),
            });
        }

        Ok(EngineOptions {
            config: BeatConfig::new(self.bpm())?,
            poll_interval,
            spin_threshold,
            thread_priority: self.thread_priority()?,
        })
    }
}

fn parse_duration(
    field: &'static str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    match value {
        Some(value) => DurationString::from_string(value.to_string())
            .map(Duration::from)
            .map_err(|e| ConfigError::InvalidDuration {
                field,
                value: value.to_string(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}
