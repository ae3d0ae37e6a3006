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
use std::path::PathBuf;

/// Error types for sample decoding
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio file error: {0}")]
    Audio(#[from] symphonia::core::errors::Error),

    #[error("No audio track found")]
    NoTrack,

    #[error("Sample rate not specified")]
    MissingSampleRate,

    #[error("Unsupported channel count {0}: only mono and stereo samples can be played")]
    UnsupportedChannelCount(usize),

    #[error("Sample contains no audio")]
    Empty,

    #[error("{len} samples do not divide into {channels} channels")]
    UnalignedFrames { len: usize, channels: u16 },

    #[error("Failed to load sample {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<DecodeError>,
    },
}
