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
use std::f32::consts::PI;
use std::time::Duration;

use super::{ChannelFormat, DecodedSample};

const CLICK_FREQUENCY: f32 = 1000.0;
const CLICK_LENGTH: Duration = Duration::from_millis(30);
const CLICK_AMPLITUDE: f32 = 0.8;
/// Amplitude left at the end of the click, relative to the start.
const CLICK_TAIL: f32 = 0.001;
const MIN_SAMPLE_RATE: u32 = 8000;

/// Synthesizes the built-in click: a short mono sine burst with an
/// exponential decay, rendered at the given rate.
pub fn default_click(sample_rate: u32) -> DecodedSample {
    let sample_rate = sample_rate.max(MIN_SAMPLE_RATE);
    let frames = (sample_rate as f32 * CLICK_LENGTH.as_secs_f32()).round() as usize;
    let decay = CLICK_TAIL.ln() / frames as f32;

    let samples = (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            CLICK_AMPLITUDE * (decay * i as f32).exp() * (2.0 * PI * CLICK_FREQUENCY * t).sin()
        })
        .collect();

    DecodedSample::from_parts(samples, ChannelFormat::Mono, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_click() {
        let click = default_click(48000);
        assert_eq!(click.channel_format(), ChannelFormat::Mono);
        assert_eq!(click.sample_rate(), 48000);
        assert_eq!(click.frames(), 1440);
        assert!(click.samples().iter().all(|s| s.abs() <= CLICK_AMPLITUDE));

        let head = click.samples()[..100].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        let tail = click.samples()[1340..].iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(tail < head / 10.0);
    }

    #[test]
    fn test_default_click_follows_rate() {
        assert_eq!(default_click(44100).frames(), 1323);
        assert_eq!(default_click(0).sample_rate(), MIN_SAMPLE_RATE);
    }
}
