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

//! The beat engine.
//!
//! A single worker thread owns the timing loop. All state shared with callers
//! lives behind one mutex; the loop holds it while deciding and triggering,
//! and releases it for every wait so setters never queue behind a sleep.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, error, info, span, warn, Level};

use crate::audio::thread_priority::{configure_thread_priority, thread_priority_value};
use crate::audio::{AudioError, Backend};
use crate::clock::EngineClock;
use crate::generator::{BeatConfig, IntervalGenerator, InvalidBpm};
use crate::samples::{
    default_click, DecodeError, DecodedSample, PoolError, SampleDecoder, VoicePool,
};

/// Longest slice the beat thread waits before re-polling, unless configured.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(20);
/// Waits at or below this are spun, unless configured.
pub const DEFAULT_SPIN_THRESHOLD: Duration = Duration::from_millis(2);

/// Error types for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    InvalidBpm(#[from] InvalidBpm),

    #[error("Unable to load sample: {0}")]
    Decode(#[from] DecodeError),

    #[error("Audio backend error: {0}")]
    Audio(#[from] AudioError),

    #[error("Unable to start beat thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Tunables for the beat engine.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// The starting tempo.
    pub config: BeatConfig,
    /// Longest slice the beat thread waits before re-polling.
    pub poll_interval: Duration,
    /// Waits shorter than this are spun instead of slept.
    pub spin_threshold: Duration,
    /// Priority (0-99) of the beat thread.
    pub thread_priority: Option<u8>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            config: BeatConfig::default(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            spin_threshold: DEFAULT_SPIN_THRESHOLD,
            thread_priority: None,
        }
    }
}

struct EngineState {
    config: BeatConfig,
    generator: IntervalGenerator<EngineClock>,
    pool: VoicePool,
    playing: bool,
    shutdown: bool,
}

struct Shared {
    state: Mutex<EngineState>,
    /// Signalled on every state change.
    wake: Condvar,
    /// Mirror of `EngineState::playing` for lock-free reads.
    playing: AtomicBool,
}

/// A running metronome. Every method may be called from any thread.
pub struct Metronome {
    shared: Arc<Shared>,
    backend: Arc<dyn Backend>,
    worker: Option<thread::JoinHandle<()>>,
}

impl Metronome {
    /// Creates a stopped metronome loaded with the built-in click, and starts
    /// its beat thread.
    pub fn new(
        backend: Arc<dyn Backend>,
        options: EngineOptions,
    ) -> Result<Metronome, EngineError> {
        let click = backend.create_buffer(&default_click(backend.sample_rate()))?;
        let mut pool = VoicePool::new(backend.clone());
        pool.set_sample(click);

        let shared = Arc::new(Shared {
            state: Mutex::new(EngineState {
                config: options.config,
                generator: IntervalGenerator::with_clock(options.config, EngineClock::default()),
                pool,
                playing: false,
                shutdown: false,
            }),
            wake: Condvar::new(),
            playing: AtomicBool::new(false),
        });

        let config = options.config;
        let worker = {
            let shared = shared.clone();
            thread::Builder::new()
                .name("beat".to_string())
                .spawn(move || Metronome::run(shared, options))?
        };

        info!(
            backend = backend.to_string(),
            %config,
            "Metronome ready"
        );

        Ok(Metronome {
            shared,
            backend,
            worker: Some(worker),
        })
    }

    /// Starts playing. The next beat sounds immediately, even when already
    /// playing.
    pub fn start(&self) {
        let mut state = self.shared.state.lock();
        self.set_playing(&mut state, true);
    }

    /// Stops playing and silences every voice before returning.
    pub fn stop(&self) {
        let mut state = self.shared.state.lock();
        self.set_playing(&mut state, false);
    }

    /// Starts when stopped and stops when playing.
    pub fn toggle(&self) {
        let mut state = self.shared.state.lock();
        let playing = !state.playing;
        self.set_playing(&mut state, playing);
    }

    /// Returns whether the metronome is playing. Reads a lock-free mirror of
    /// the state, so a concurrent `start` or `stop` may not be visible yet.
    pub fn is_playing(&self) -> bool {
        self.shared.playing.load(Ordering::Relaxed)
    }

    /// Changes the tempo. Takes effect on the next beat; while playing, that
    /// beat sounds immediately.
    pub fn set_bpm(&self, bpm: u32) -> Result<(), EngineError> {
        let config = BeatConfig::new(bpm)?;

        let mut state = self.shared.state.lock();
        state.config = config;
        state.generator.set_config(config);
        if state.playing {
            state.generator.reset();
        }
        self.shared.wake.notify_all();
        info!(%config, "Tempo changed");
        Ok(())
    }

    /// Returns the current tempo.
    pub fn bpm(&self) -> u32 {
        self.shared.state.lock().config.bpm()
    }

    /// Loads the sample at the given path. On failure the current sample is
    /// kept.
    pub fn set_sample_path(&self, path: &Path) -> Result<(), EngineError> {
        let sample = SampleDecoder::decode_file(path)?;
        self.install_sample(&sample)?;
        info!(path = ?path, "Sample changed");
        Ok(())
    }

    /// Loads a sample from an in-memory sound file. On failure the current
    /// sample is kept.
    pub fn set_sample_data(&self, bytes: Vec<u8>) -> Result<(), EngineError> {
        let sample = SampleDecoder::decode_bytes(bytes)?;
        self.install_sample(&sample)?;
        info!("Sample changed");
        Ok(())
    }

    /// Goes back to the built-in click.
    pub fn use_default_sample(&self) -> Result<(), EngineError> {
        self.install_sample(&default_click(self.backend.sample_rate()))?;
        info!("Using built-in click");
        Ok(())
    }

    /// Returns the length of the current sample.
    pub fn sample_duration(&self) -> Option<Duration> {
        self.shared.state.lock().pool.sample().map(|sample| sample.duration())
    }

    /// Returns the number of voices currently sounding.
    pub fn active_voices(&self) -> usize {
        self.shared.state.lock().pool.active_count()
    }

    /// Uploads the sample outside the lock, then swaps it in.
    fn install_sample(&self, sample: &DecodedSample) -> Result<(), EngineError> {
        let buffer = self.backend.create_buffer(sample)?;
        debug!(buffer = ?buffer, "Sample uploaded");

        let mut state = self.shared.state.lock();
        state.pool.set_sample(buffer);
        if state.playing {
            state.generator.reset();
        }
        self.shared.wake.notify_all();
        Ok(())
    }

    fn set_playing(&self, state: &mut EngineState, playing: bool) {
        if playing {
            state.generator.reset();
            if !state.playing {
                info!(config = %state.config, "Started");
            }
        } else {
            state.pool.stop_all();
            if state.playing {
                info!("Stopped");
            }
        }
        state.playing = playing;
        self.shared.playing.store(playing, Ordering::Relaxed);
        self.shared.wake.notify_all();
    }

    /// The beat loop. Runs until shutdown.
    fn run(shared: Arc<Shared>, options: EngineOptions) {
        let span = span!(Level::INFO, "beat loop");
        let _enter = span.enter();

        let mut priority_set = false;
        configure_thread_priority(
            "beat",
            thread_priority_value(options.thread_priority),
            false,
            &mut priority_set,
        );

        let mut state = shared.state.lock();
        loop {
            if state.shutdown {
                break;
            }
            if !state.playing {
                shared.wake.wait(&mut state);
                continue;
            }

            let wait = state.generator.poll();
            if wait.is_zero() {
                Self::beat(&mut state);
                continue;
            }

            if wait <= options.spin_threshold {
                MutexGuard::unlocked(&mut state, || spin_sleep::sleep(wait));
            } else {
                let slice = (wait - options.spin_threshold).min(options.poll_interval);
                shared.wake.wait_for(&mut state, slice);
            }
        }

        info!("Beat loop finished");
    }

    fn beat(state: &mut EngineState) {
        match state.pool.trigger() {
            Ok(voice) => debug!(voice, bpm = state.config.bpm(), "Beat"),
            Err(PoolError::NoSample) => warn!("No sample loaded, skipping beat"),
            Err(e) => error!(err = %e, "Dropped beat"),
        }
    }
}

impl Drop for Metronome {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.shutdown = true;
            self.shared.wake.notify_all();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Beat thread panicked");
            }
        }
        self.shared.state.lock().pool.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use serial_test::serial;

    use super::*;
    use crate::audio::mock;
    use crate::testutil::{eventually, wav_bytes};

    fn metronome(bpm: u32) -> (Metronome, Arc<mock::Backend>) {
        let backend = Arc::new(mock::Backend::new(48000));
        let options = EngineOptions {
            config: BeatConfig::new(bpm).unwrap(),
            ..Default::default()
        };
        let metronome = Metronome::new(backend.clone(), options).unwrap();
        (metronome, backend)
    }

    #[test]
    #[serial]
    fn test_silent_until_started() {
        let (metronome, backend) = metronome(600);
        thread::sleep(Duration::from_millis(150));
        assert!(!metronome.is_playing());
        assert_eq!(backend.plays(), 0);
        assert_eq!(metronome.bpm(), 600);
    }

    #[test]
    #[serial]
    fn test_first_beat_is_immediate() {
        let (metronome, backend) = metronome(1);
        let started = Instant::now();
        metronome.start();
        assert!(metronome.is_playing());

        eventually(|| backend.plays() == 1, "First beat never sounded");
        assert!(started.elapsed() < Duration::from_millis(500));
        metronome.stop();
    }

    #[test]
    #[serial]
    fn test_beats_at_tempo() {
        let (metronome, backend) = metronome(120);
        metronome.start();
        thread::sleep(Duration::from_millis(2050));
        metronome.stop();

        // Beats at 0, 0.5, 1.0, 1.5 and 2.0 seconds.
        assert_eq!(backend.plays(), 5);
    }

    #[test]
    #[serial]
    fn test_tempo_change_applies_to_following_beats() {
        let (metronome, backend) = metronome(60);
        metronome.start();
        thread::sleep(Duration::from_millis(1100));

        let changed = Instant::now();
        metronome.set_bpm(120).unwrap();
        thread::sleep(Duration::from_millis(1150));
        metronome.stop();

        let after: Vec<Instant> = backend
            .play_times()
            .into_iter()
            .filter(|time| *time >= changed)
            .collect();
        assert_eq!(after.len(), 3, "beats after tempo change: {:?}", after);
        for gap in after.windows(2).map(|w| w[1] - w[0]) {
            assert!(
                gap > Duration::from_millis(460) && gap < Duration::from_millis(540),
                "gap {:?}",
                gap
            );
        }
    }

    #[test]
    #[serial]
    fn test_invalid_bpm_is_rejected() {
        let (metronome, _backend) = metronome(90);
        assert!(matches!(
            metronome.set_bpm(0),
            Err(EngineError::InvalidBpm(InvalidBpm(0)))
        ));
        assert_eq!(metronome.bpm(), 90);
    }

    #[test]
    #[serial]
    fn test_corrupt_sample_keeps_state() {
        let (metronome, _backend) = metronome(60);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.wav");
        std::fs::write(&path, b"RIFF nonsense").unwrap();

        metronome.start();
        let before = metronome.sample_duration();
        assert!(matches!(
            metronome.set_sample_path(&path),
            Err(EngineError::Decode(_))
        ));
        assert!(metronome.is_playing());
        assert_eq!(metronome.sample_duration(), before);
        metronome.stop();
    }

    #[test]
    #[serial]
    fn test_set_sample_data() {
        let (metronome, _backend) = metronome(60);
        metronome
            .set_sample_data(wav_bytes(vec![vec![0_i32; 480]], 48000, 16))
            .unwrap();
        assert_eq!(metronome.sample_duration(), Some(Duration::from_millis(10)));

        metronome.use_default_sample().unwrap();
        assert_eq!(metronome.sample_duration(), Some(Duration::from_millis(30)));
    }

    #[test]
    #[serial]
    fn test_start_while_playing_restarts_phase() {
        let (metronome, backend) = metronome(30);
        metronome.start();
        eventually(|| backend.plays() == 1, "First beat never sounded");
        thread::sleep(Duration::from_millis(200));

        let restarted = Instant::now();
        metronome.start();
        eventually(|| backend.plays() == 2, "Restart beat never sounded");
        assert!(
            restarted.elapsed() < Duration::from_millis(300),
            "restart beat took {:?}",
            restarted.elapsed()
        );
        assert!(metronome.is_playing());
        metronome.stop();
    }

    #[test]
    #[serial]
    fn test_sample_change_while_playing_restarts_phase() {
        let (metronome, backend) = metronome(30);
        metronome.start();
        eventually(|| backend.plays() == 1, "First beat never sounded");
        thread::sleep(Duration::from_millis(200));

        let changed = Instant::now();
        metronome
            .set_sample_data(wav_bytes(vec![vec![0_i32; 480]], 48000, 16))
            .unwrap();
        eventually(|| backend.plays() == 2, "Beat after sample change never sounded");
        assert!(
            changed.elapsed() < Duration::from_millis(500),
            "beat after sample change took {:?}",
            changed.elapsed()
        );
        metronome.stop();
    }

    #[test]
    #[serial]
    fn test_sample_change_while_stopped_is_silent() {
        let (metronome, backend) = metronome(600);
        metronome
            .set_sample_data(wav_bytes(vec![vec![0_i32; 480]], 48000, 16))
            .unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(!metronome.is_playing());
        assert_eq!(backend.plays(), 0);

        metronome.start();
        eventually(|| backend.plays() >= 1, "Beat never sounded");
        metronome.stop();
    }

    #[test]
    #[serial]
    fn test_stop_silences_voices() {
        let (metronome, backend) = metronome(600);
        metronome.start();
        eventually(|| backend.plays() >= 2, "Beats never sounded");

        metronome.stop();
        assert!(!metronome.is_playing());
        assert_eq!(backend.playing_voices(), 0);
        assert_eq!(metronome.active_voices(), 0);

        let plays = backend.plays();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(backend.plays(), plays);
    }

    #[test]
    #[serial]
    fn test_stop_twice() {
        let (metronome, backend) = metronome(60);
        metronome.stop();
        metronome.stop();
        assert!(!metronome.is_playing());

        metronome.toggle();
        assert!(metronome.is_playing());
        eventually(|| backend.plays() == 1, "Beat never sounded");
        metronome.toggle();
        metronome.stop();
        assert!(!metronome.is_playing());
    }

    #[test]
    #[serial]
    fn test_drop_releases_voices() {
        let (metronome, backend) = metronome(600);
        metronome.start();
        eventually(|| backend.plays() >= 3, "Beats never sounded");
        assert!(backend.live_voices() > 0);

        drop(metronome);
        assert_eq!(backend.live_voices(), 0);
    }
}
