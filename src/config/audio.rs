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
use serde::Deserialize;

const DEFAULT_DEVICE: &str = "default";

fn default_device() -> String {
    DEFAULT_DEVICE.to_string()
}

/// A YAML representation of the audio configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Audio {
    /// The output device. "default" picks the host's default output, names
    /// starting with "mock" open the in-process mock.
    #[serde(default = "default_device")]
    device: String,

    /// Preferred output sample rate in Hz. The device default when unset.
    sample_rate: Option<u32>,

    /// Priority (0-99) of the output callback thread.
    thread_priority: Option<u8>,

    /// Whether to attempt realtime scheduling for the output callback thread
    /// (default: true).
    realtime: Option<bool>,
}

impl Audio {
    /// New will create a new Audio configuration.
    pub fn new(device: &str) -> Audio {
        Audio {
            device: device.to_string(),
            sample_rate: None,
            thread_priority: None,
            realtime: None,
        }
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the preferred sample rate, if any.
    pub fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    /// Returns the configured output thread priority, if any.
    pub fn thread_priority(&self) -> Option<u8> {
        self.thread_priority
    }

    /// Returns whether realtime scheduling should be attempted.
    pub fn realtime(&self) -> bool {
        self.realtime.unwrap_or(true)
    }
}

impl Default for Audio {
    fn default() -> Self {
        Audio::new(DEFAULT_DEVICE)
    }
}

#[cfg(test)]
mod test {
    use config::{Config, File, FileFormat};

    use super::*;

    #[test]
    fn test_defaults() {
        let audio: Audio = Config::builder()
            .add_source(File::from_str("sample_rate: 44100", FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(audio.device(), "default");
        assert_eq!(audio.sample_rate(), Some(44100));
        assert_eq!(audio.thread_priority(), None);
        assert!(audio.realtime());
    }

    #[test]
    fn test_full() {
        let yaml = r#"
            device: mock-output
            thread_priority: 80
            realtime: false
        "#;
        let audio: Audio = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(audio.device(), "mock-output");
        assert_eq!(audio.sample_rate(), None);
        assert_eq!(audio.thread_priority(), Some(80));
        assert!(!audio.realtime());
    }
}
