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
use std::{fmt, sync::Arc, time::Duration};

use crate::config;
use crate::samples::DecodedSample;

pub mod cpal;
pub mod error;
pub mod mixer;
pub mod mock;
pub mod thread_priority;

pub use error::AudioError;

/// The playback state reported by a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// The voice has never been started, or its buffer was cleared.
    Idle,
    /// The voice is rendering its buffer.
    Playing,
    /// The voice was stopped or reached the end of its buffer.
    Stopped,
}

/// Decoded audio uploaded to a backend, ready to be attached to voices.
/// The sample data is stored in an Arc so any number of voices can share it.
#[derive(Clone)]
pub struct Buffer {
    /// Interleaved samples.
    data: Arc<Vec<f32>>,
    /// Number of channels in the buffer.
    channel_count: u16,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl Buffer {
    /// Creates a buffer from interleaved samples.
    pub fn new(data: Vec<f32>, channel_count: u16, sample_rate: u32) -> Buffer {
        Buffer {
            data: Arc::new(data),
            channel_count,
            sample_rate,
        }
    }

    /// Returns the interleaved sample data.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> u16 {
        self.channel_count
    }

    /// Returns the sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        match self.channel_count {
            0 => 0,
            channels => self.data.len() / channels as usize,
        }
    }

    /// Returns the playback length of the buffer.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        frames_to_duration(self.frames(), self.sample_rate)
    }
}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("channels", &self.channel_count)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Converts a frame count at the given rate into a duration, to the nanosecond.
pub(crate) fn frames_to_duration(frames: usize, sample_rate: u32) -> Duration {
    let nanos = frames as u128 * 1_000_000_000 / u128::from(sample_rate);
    Duration::from_nanos(nanos as u64)
}

/// A single playback channel owned by a backend. Dropping the voice releases
/// whatever the backend allocated for it.
pub trait Voice: Send {
    /// Attaches a buffer. Takes effect on the next `play`.
    fn set_buffer(&mut self, buffer: Buffer);

    /// Detaches the current buffer, leaving the voice idle.
    fn clear_buffer(&mut self);

    /// Sets whether playback wraps around at the end of the buffer.
    fn set_looping(&mut self, looping: bool);

    /// Starts playing the attached buffer from the beginning.
    fn play(&mut self) -> Result<(), AudioError>;

    /// Stops playback immediately.
    fn stop(&mut self);

    /// Returns the state as currently reported by the backend.
    fn state(&self) -> VoiceState;
}

/// An opened audio output able to create buffers and voices.
pub trait Backend: fmt::Display + Send + Sync {
    /// The rate at which the backend renders audio.
    fn sample_rate(&self) -> u32;

    /// Creates a new voice.
    fn create_voice(&self) -> Result<Box<dyn Voice>, AudioError>;

    /// Uploads decoded audio, converting it to the backend's sample rate.
    fn create_buffer(&self, sample: &DecodedSample) -> Result<Buffer, AudioError> {
        let target_rate = self.sample_rate();
        if sample.sample_rate() == target_rate {
            return Ok(Buffer::new(
                sample.samples().to_vec(),
                sample.channel_format().count(),
                target_rate,
            ));
        }

        let resampled = sample.resampled(target_rate);
        Ok(Buffer::new(
            resampled.samples().to_vec(),
            resampled.channel_format().count(),
            target_rate,
        ))
    }
}

/// Lists the output devices known to cpal.
pub fn list_devices() -> Result<Vec<String>, AudioError> {
    cpal::Backend::list()
}

/// Opens the backend described by the given configuration. Device names
/// starting with "mock" open an in-process mock backend.
pub fn get_backend(config: &config::Audio) -> Result<Arc<dyn Backend>, AudioError> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Backend::get(device)));
    }

    Ok(Arc::new(cpal::Backend::get(config)?))
}
