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

//! Voice allocation for beat playback.
//!
//! Voices are created lazily and kept in an arena keyed by id. Every trigger
//! first reclaims voices the backend reports as no longer playing, then reuses
//! the lowest reclaimed id before minting a new one, so the pool only grows
//! when beats genuinely overlap.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tracing::debug;

use crate::audio::{AudioError, Backend, Buffer, Voice, VoiceState};

/// Identifies a voice for the lifetime of its pool.
pub type VoiceId = u32;

/// Error types for voice pool operations
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("No sample loaded")]
    NoSample,

    #[error("Voice id space exhausted")]
    IdSpaceExhausted,

    #[error("Audio backend error: {0}")]
    Audio(#[from] AudioError),
}

/// Plays the current sample on backend voices, recycling finished ones.
pub struct VoicePool {
    backend: Arc<dyn Backend>,
    /// Every allocated voice.
    voices: BTreeMap<VoiceId, Box<dyn Voice>>,
    /// Allocated voices known to be free for reuse.
    reclaimed: BTreeSet<VoiceId>,
    /// The id handed to the next newly created voice.
    next_id: Option<VoiceId>,
    sample: Option<Buffer>,
}

impl VoicePool {
    /// Creates an empty pool on the given backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            voices: BTreeMap::new(),
            reclaimed: BTreeSet::new(),
            next_id: Some(0),
            sample: None,
        }
    }

    /// Replaces the sample. Existing voices are stopped and released.
    pub fn set_sample(&mut self, sample: Buffer) {
        self.clear();
        self.sample = Some(sample);
    }

    /// Returns the current sample, if any.
    pub fn sample(&self) -> Option<&Buffer> {
        self.sample.as_ref()
    }

    /// Stops and releases every voice.
    pub fn clear(&mut self) {
        for voice in self.voices.values_mut() {
            voice.stop();
            voice.clear_buffer();
        }
        self.voices.clear();
        self.reclaimed.clear();
    }

    /// Stops every voice, keeping them around for reuse.
    pub fn stop_all(&mut self) {
        for (id, voice) in self.voices.iter_mut() {
            voice.stop();
            self.reclaimed.insert(*id);
        }
    }

    /// Returns the number of allocated voices.
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Returns the number of voices currently playing.
    pub fn active_count(&self) -> usize {
        self.voices
            .values()
            .filter(|voice| voice.state() == VoiceState::Playing)
            .count()
    }

    /// Plays the current sample from the start on a free voice.
    pub fn trigger(&mut self) -> Result<VoiceId, PoolError> {
        let sample = self.sample.clone().ok_or(PoolError::NoSample)?;

        for (id, voice) in self.voices.iter() {
            if voice.state() != VoiceState::Playing {
                self.reclaimed.insert(*id);
            }
        }

        let (id, mut voice) = match self.reclaimed.pop_first() {
            Some(id) => match self.voices.remove(&id) {
                Some(voice) => (id, voice),
                None => self.create_voice()?,
            },
            None => self.create_voice()?,
        };

        voice.stop();
        voice.set_buffer(sample);
        voice.set_looping(false);
        let played = voice.play();
        self.voices.insert(id, voice);

        match played {
            Ok(()) => {
                debug!(voice = id, voices = self.voices.len(), "Triggered voice");
                Ok(id)
            }
            Err(e) => {
                self.reclaimed.insert(id);
                Err(e.into())
            }
        }
    }

    /// Creates a voice under a fresh id. The id is only consumed on success.
    fn create_voice(&mut self) -> Result<(VoiceId, Box<dyn Voice>), PoolError> {
        let id = self.next_id.ok_or(PoolError::IdSpaceExhausted)?;
        let voice = self.backend.create_voice()?;
        self.next_id = id.checked_add(1);
        debug!(voice = id, "Created voice");
        Ok((id, voice))
    }

    #[cfg(test)]
    fn with_first_id(backend: Arc<dyn Backend>, first_id: VoiceId) -> Self {
        let mut pool = Self::new(backend);
        pool.next_id = Some(first_id);
        pool
    }
}

impl std::fmt::Debug for VoicePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoicePool")
            .field("backend", &self.backend.to_string())
            .field("voices", &self.voices.len())
            .field("reclaimed", &self.reclaimed)
            .field("sample", &self.sample)
            .finish()
    }
}
