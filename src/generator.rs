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

//! Drift-compensating beat timing.
//!
//! The generator does not schedule wake-up deadlines. Instead it accumulates the
//! wall-clock time that actually elapsed between polls and fires once a full
//! period has passed. A late poll delays that beat and never shortens the next.

use std::fmt;
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};

const NANOSECONDS_PER_MINUTE: u64 = 60_000_000_000;

/// The tempo a metronome starts at.
pub const DEFAULT_BPM: u32 = 40;

/// Returned when a BPM of zero is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid BPM {0}: must be greater than zero")]
pub struct InvalidBpm(pub u32);

/// A tempo and the beat period derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatConfig {
    bpm: u32,
    period: Duration,
}

impl BeatConfig {
    /// Creates a beat configuration for the given tempo.
    pub fn new(bpm: u32) -> Result<BeatConfig, InvalidBpm> {
        if bpm == 0 {
            return Err(InvalidBpm(bpm));
        }

        Ok(BeatConfig {
            bpm,
            period: Duration::from_nanos(NANOSECONDS_PER_MINUTE / u64::from(bpm)),
        })
    }

    /// The tempo in beats per minute.
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    /// The time between two beats.
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Default for BeatConfig {
    fn default() -> Self {
        BeatConfig {
            bpm: DEFAULT_BPM,
            period: Duration::from_nanos(NANOSECONDS_PER_MINUTE / DEFAULT_BPM as u64),
        }
    }
}

impl fmt::Display for BeatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BPM ({:?})", self.bpm, self.period)
    }
}

/// Converts a beat period into fire/wait decisions.
pub struct IntervalGenerator<C: Clock = SystemClock> {
    clock: C,
    period: Duration,
    last_update: Instant,
    accumulator: Duration,
}

impl IntervalGenerator<SystemClock> {
    /// Creates a generator on the system clock.
    pub fn new(config: BeatConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> IntervalGenerator<C> {
    /// Creates a generator on the given clock. The generator starts primed, so
    /// the first poll fires.
    pub fn with_clock(config: BeatConfig, clock: C) -> Self {
        let last_update = clock.now();
        Self {
            clock,
            period: config.period(),
            last_update,
            accumulator: config.period(),
        }
    }

    /// Sets the target period for subsequent polls.
    pub fn set_period(&mut self, period: Duration) {
        self.period = period;
    }

    /// Sets the target period from a beat configuration.
    pub fn set_config(&mut self, config: BeatConfig) {
        self.set_period(config.period());
    }

    /// Returns the current target period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Starts a fresh measurement window that fires on the next poll. Must be
    /// called when resuming after a pause, otherwise the idle time would count
    /// towards the next beat.
    pub fn reset(&mut self) {
        self.last_update = self.clock.now();
        self.accumulator = self.period;
    }

    /// Advances the generator by the time elapsed since the previous poll.
    ///
    /// Returns [`Duration::ZERO`] when a beat is due. Otherwise returns how long
    /// the caller may wait before the next beat becomes due.
    pub fn poll(&mut self) -> Duration {
        let now = self.clock.now();
        self.accumulator += now.saturating_duration_since(self.last_update);
        self.last_update = now;

        if self.accumulator < self.period {
            return self.period - self.accumulator;
        }

        // Lateness is not carried over, so no gap is ever shorter than a period
        // and missed beats are never replayed.
        self.accumulator = Duration::ZERO;
        Duration::ZERO
    }
}

impl<C: Clock> fmt::Debug for IntervalGenerator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IntervalGenerator")
            .field("period", &self.period)
            .field("accumulator", &self.accumulator)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn generator(bpm: u32) -> (IntervalGenerator<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let generator =
            IntervalGenerator::with_clock(BeatConfig::new(bpm).unwrap(), clock.clone());
        (generator, clock)
    }

    /// Polls in small irregular steps until `total` has elapsed and counts fires.
    fn count_fires(
        generator: &mut IntervalGenerator<ManualClock>,
        clock: &ManualClock,
        total: Duration,
        mut next_step: impl FnMut() -> Duration,
    ) -> u64 {
        let mut elapsed = Duration::ZERO;
        let mut fires = 0;
        while elapsed < total {
            let step = next_step().min(total - elapsed);
            clock.advance(step);
            elapsed += step;
            if generator.poll().is_zero() {
                fires += 1;
            }
        }
        fires
    }

    #[test]
    fn test_beat_config_period() {
        assert_eq!(
            BeatConfig::new(60).unwrap().period(),
            Duration::from_secs(1)
        );
        assert_eq!(
            BeatConfig::new(120).unwrap().period(),
            Duration::from_millis(500)
        );
        assert_eq!(
            BeatConfig::new(40).unwrap().period(),
            Duration::from_millis(1500)
        );
        assert_eq!(BeatConfig::new(0), Err(InvalidBpm(0)));
        assert_eq!(BeatConfig::default(), BeatConfig::new(DEFAULT_BPM).unwrap());
    }

    #[test]
    fn test_first_poll_after_reset_fires() {
        for bpm in [1, 40, 60, 120, 300, 1000, u32::MAX] {
            let (mut generator, clock) = generator(bpm);
            clock.advance(Duration::from_millis(3));
            generator.reset();
            assert!(generator.poll().is_zero(), "{} BPM did not fire", bpm);
            assert!(!generator.poll().is_zero());
        }
    }

    #[test]
    fn test_wait_hint() {
        let (mut generator, clock) = generator(120);
        assert!(generator.poll().is_zero());

        clock.advance(Duration::from_millis(100));
        assert_eq!(generator.poll(), Duration::from_millis(400));

        clock.advance(Duration::from_millis(350));
        assert_eq!(generator.poll(), Duration::from_millis(50));

        clock.advance(Duration::from_millis(50));
        assert!(generator.poll().is_zero());
    }

    #[test]
    fn test_irregular_polling_does_not_drift() {
        let (mut generator, clock) = generator(120);
        generator.reset();

        // Deterministic jitter between 1ms and 8ms.
        let mut seed: u32 = 0x9E37_79B9;
        let fires = count_fires(&mut generator, &clock, Duration::from_secs(60), || {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            Duration::from_micros(1000 + u64::from(seed % 7000))
        });

        // 60s at 0.5s per beat, within one beat.
        assert!((119..=121).contains(&fires), "fired {} times", fires);
    }

    #[test]
    fn test_coarse_polling_never_fires_early() {
        let (mut generator, clock) = generator(120);
        generator.reset();

        // Every poll is off the 500ms grid.
        let mut fire_times = Vec::new();
        let mut elapsed = Duration::ZERO;
        while elapsed < Duration::from_secs(10) {
            if generator.poll().is_zero() {
                fire_times.push(elapsed);
            }
            clock.advance(Duration::from_millis(300));
            elapsed += Duration::from_millis(300);
        }

        assert!(fire_times.len() > 2);
        for gap in fire_times.windows(2).map(|w| w[1] - w[0]) {
            assert_eq!(gap, Duration::from_millis(600), "fires {:?}", fire_times);
        }
    }

    #[test]
    fn test_no_burst_after_stall() {
        let (mut generator, clock) = generator(120);
        assert!(generator.poll().is_zero());

        // Nobody polled for ten seconds.
        clock.advance(Duration::from_secs(10));
        assert!(generator.poll().is_zero());
        assert!(!generator.poll().is_zero());
        assert!(!generator.poll().is_zero());
    }

    #[test]
    fn test_reset_discards_idle_time() {
        let (mut generator, clock) = generator(60);
        assert!(generator.poll().is_zero());

        clock.advance(Duration::from_millis(700));
        generator.reset();
        assert!(generator.poll().is_zero());

        clock.advance(Duration::from_millis(700));
        assert_eq!(generator.poll(), Duration::from_millis(300));
    }

    #[test]
    fn test_new_period_applies_without_blending() {
        let (mut generator, clock) = generator(60);
        assert!(generator.poll().is_zero());
        clock.advance(Duration::from_millis(750));
        assert!(!generator.poll().is_zero());

        generator.set_config(BeatConfig::new(120).unwrap());
        generator.reset();

        let mut fire_times = Vec::new();
        let mut elapsed = Duration::ZERO;
        while fire_times.len() < 4 {
            if generator.poll().is_zero() {
                fire_times.push(elapsed);
            }
            clock.advance(Duration::from_millis(10));
            elapsed += Duration::from_millis(10);
        }

        for gap in fire_times.windows(2).map(|w| w[1] - w[0]) {
            assert_eq!(gap, Duration::from_millis(500));
        }
    }
}
