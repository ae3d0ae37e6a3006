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
use std::{
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use parking_lot::Mutex;
use tracing::debug;

use super::{AudioError, Buffer, VoiceState};

const DEFAULT_MOCK_SAMPLE_RATE: u32 = 48000;

/// What a mock voice has been asked to do.
struct Record {
    state: VoiceState,
    buffer: Option<Buffer>,
    looping: bool,
    started: Option<Instant>,
}

/// A mock backend. Doesn't actually play anything, but records every voice it
/// hands out so tests can inspect and finish them.
pub struct Backend {
    name: String,
    sample_rate: u32,
    /// Voices finish on their own once their buffer duration has elapsed.
    auto_finish: bool,
    /// Voices in creation order.
    records: Mutex<Vec<Arc<Mutex<Record>>>>,
    /// Start time of every play request.
    play_times: Arc<Mutex<Vec<Instant>>>,
    fail_creation: AtomicBool,
}

impl Backend {
    /// Gets the given mock backend. Its voices finish like real ones would.
    pub fn get(name: &str) -> Backend {
        Backend {
            name: name.to_string(),
            sample_rate: DEFAULT_MOCK_SAMPLE_RATE,
            auto_finish: true,
            records: Mutex::new(Vec::new()),
            play_times: Arc::new(Mutex::new(Vec::new())),
            fail_creation: AtomicBool::new(false),
        }
    }

    /// Creates a mock backend whose voices keep playing until finished by hand.
    pub fn new(sample_rate: u32) -> Backend {
        Backend {
            name: "mock".to_string(),
            sample_rate,
            auto_finish: false,
            records: Mutex::new(Vec::new()),
            play_times: Arc::new(Mutex::new(Vec::new())),
            fail_creation: AtomicBool::new(false),
        }
    }

    /// Makes subsequent voice creation fail.
    pub fn fail_voice_creation(&self, fail: bool) {
        self.fail_creation.store(fail, Ordering::Relaxed);
    }

    /// Returns the number of voices ever created.
    pub fn voices_created(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns the number of voices that have not been dropped.
    pub fn live_voices(&self) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|record| Arc::strong_count(record) > 1)
            .count()
    }

    /// Returns the number of voices currently playing.
    pub fn playing_voices(&self) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|record| record.lock().state == VoiceState::Playing)
            .count()
    }

    /// Returns the number of voices set to loop.
    pub fn looping_voices(&self) -> usize {
        self.records
            .lock()
            .iter()
            .filter(|record| record.lock().looping)
            .count()
    }

    /// Returns the total number of play requests.
    pub fn plays(&self) -> usize {
        self.play_times.lock().len()
    }

    /// Returns when each play request was made.
    pub fn play_times(&self) -> Vec<Instant> {
        self.play_times.lock().clone()
    }

    /// Simulates the voice created at `index` reaching the end of its buffer.
    pub fn finish(&self, index: usize) {
        if let Some(record) = self.records.lock().get(index) {
            let mut record = record.lock();
            if record.state == VoiceState::Playing {
                record.state = VoiceState::Stopped;
            }
        }
    }

    /// Simulates every voice reaching the end of its buffer.
    pub fn finish_all(&self) {
        for index in 0..self.voices_created() {
            self.finish(index);
        }
    }
}

impl crate::audio::Backend for Backend {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn create_voice(&self) -> Result<Box<dyn crate::audio::Voice>, AudioError> {
        if self.fail_creation.load(Ordering::Relaxed) {
            return Err(AudioError::VoiceCreation(format!(
                "{} refused to create a voice",
                self.name
            )));
        }

        let record = Arc::new(Mutex::new(Record {
            state: VoiceState::Idle,
            buffer: None,
            looping: false,
            started: None,
        }));
        self.records.lock().push(record.clone());
        debug!(device = self.name, "Created mock voice");

        Ok(Box::new(Voice {
            record,
            play_times: self.play_times.clone(),
            auto_finish: self.auto_finish,
        }))
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

/// A voice handed out by the mock backend.
pub struct Voice {
    record: Arc<Mutex<Record>>,
    play_times: Arc<Mutex<Vec<Instant>>>,
    auto_finish: bool,
}

impl crate::audio::Voice for Voice {
    fn set_buffer(&mut self, buffer: Buffer) {
        self.record.lock().buffer = Some(buffer);
    }

    fn clear_buffer(&mut self) {
        let mut record = self.record.lock();
        record.buffer = None;
        record.state = VoiceState::Idle;
    }

    fn set_looping(&mut self, looping: bool) {
        self.record.lock().looping = looping;
    }

    fn play(&mut self) -> Result<(), AudioError> {
        let mut record = self.record.lock();
        if record.buffer.is_none() {
            return Err(AudioError::VoiceCreation(
                "play requested without a buffer".to_string(),
            ));
        }
        let now = Instant::now();
        record.state = VoiceState::Playing;
        record.started = Some(now);
        self.play_times.lock().push(now);
        Ok(())
    }

    fn stop(&mut self) {
        let mut record = self.record.lock();
        if record.state == VoiceState::Playing {
            record.state = VoiceState::Stopped;
        }
    }

    fn state(&self) -> VoiceState {
        let mut record = self.record.lock();
        if self.auto_finish && record.state == VoiceState::Playing && !record.looping {
            let finished = match (&record.buffer, record.started) {
                (Some(buffer), Some(started)) => started.elapsed() >= buffer.duration(),
                _ => true,
            };
            if finished {
                record.state = VoiceState::Stopped;
            }
        }
        record.state
    }
}

#[cfg(test)]
mod test {
    use std::{thread, time::Duration};

    use super::*;
    use crate::audio::{Backend as _, Voice as _};

    #[test]
    fn test_manual_voices_play_until_finished() {
        let backend = Backend::new(48000);
        let mut voice = backend.create_voice().unwrap();
        assert_eq!(voice.state(), VoiceState::Idle);

        voice.set_buffer(Buffer::new(vec![0.0; 10], 1, 48000));
        voice.play().unwrap();
        assert_eq!(voice.state(), VoiceState::Playing);
        assert_eq!(backend.playing_voices(), 1);

        backend.finish(0);
        assert_eq!(voice.state(), VoiceState::Stopped);
        assert_eq!(backend.plays(), 1);
    }

    #[test]
    fn test_auto_finish() {
        let backend = Backend::get("mock-auto");
        let mut voice = backend.create_voice().unwrap();
        voice.set_buffer(Buffer::new(vec![0.0; 48], 1, 48000));
        voice.play().unwrap();

        thread::sleep(Duration::from_millis(5));
        assert_eq!(voice.state(), VoiceState::Stopped);
    }

    #[test]
    fn test_dropped_voices_are_not_live() {
        let backend = Backend::new(48000);
        let voice = backend.create_voice().unwrap();
        let _kept = backend.create_voice().unwrap();
        assert_eq!(backend.live_voices(), 2);

        drop(voice);
        assert_eq!(backend.live_voices(), 1);
        assert_eq!(backend.voices_created(), 2);
    }

    #[test]
    fn test_failed_creation() {
        let backend = Backend::new(48000);
        backend.fail_voice_creation(true);
        assert!(backend.create_voice().is_err());
        assert_eq!(backend.voices_created(), 0);
    }
}
