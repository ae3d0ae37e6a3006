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

//! Sample decoding and triggered playback.
//!
//! This module provides:
//! - Decoding of sound files and in-memory audio into interleaved PCM
//! - A built-in click used when no sample file is configured
//! - The voice pool that plays the current sample on every beat

mod click;
mod decoder;
mod error;
mod pool;

pub use click::default_click;
pub use decoder::{ChannelFormat, DecodedSample, SampleDecoder};
pub use error::DecodeError;
pub use pool::{PoolError, VoiceId, VoicePool};
