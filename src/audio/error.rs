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
/// Error types for audio backend operations
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("No output device found with name {0}")]
    DeviceNotFound(String),

    #[error("No default output device available")]
    NoDefaultDevice,

    #[error("Voice limit reached ({0} voices)")]
    VoiceLimit(usize),

    #[error("Voice creation failed: {0}")]
    VoiceCreation(String),

    #[error("Unsupported output sample format: {0}")]
    UnsupportedSampleFormat(String),

    #[error("Output stream stopped before it started")]
    StreamClosed,

    #[error("Unable to enumerate devices: {0}")]
    Devices(#[from] cpal::DevicesError),

    #[error("Unable to read device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("Unable to read output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("Unable to query output configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Unable to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("Unable to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),

    #[error("Audio host unavailable: {0}")]
    Host(#[from] cpal::HostUnavailable),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
