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

//! A metronome that fires drift-free beats and plays a sample on each one.
//!
//! The crate is split into three layers:
//! - [`generator`]: converts a BPM into fire/wait decisions.
//! - [`samples`]: decodes samples and dispatches them onto a recycling voice pool.
//! - [`engine`]: the control thread tying both together behind a thread-safe API.

pub mod audio;
pub mod clock;
pub mod config;
pub mod controller;
pub mod engine;
pub mod generator;
pub mod samples;
#[cfg(test)]
mod testutil;

pub use engine::{EngineError, Metronome};
