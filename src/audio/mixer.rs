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
// Core voice mixing logic, independent of any audio backend
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::{Buffer, VoiceState};

/// Playback position and settings of one voice.
struct Playback {
    buffer: Option<Buffer>,
    /// Next frame to render.
    frame: usize,
    state: VoiceState,
    looping: bool,
}

/// A voice as seen by the mixer. The voice handle and the mixer each hold a
/// reference; once the handle is dropped the mixer releases the slot.
pub struct VoiceSlot {
    playback: Mutex<Playback>,
}

impl VoiceSlot {
    fn new() -> Self {
        Self {
            playback: Mutex::new(Playback {
                buffer: None,
                frame: 0,
                state: VoiceState::Idle,
                looping: false,
            }),
        }
    }

    /// Attaches a buffer and rewinds.
    pub fn set_buffer(&self, buffer: Option<Buffer>) {
        let mut playback = self.playback.lock();
        if buffer.is_none() {
            playback.state = VoiceState::Idle;
        }
        playback.buffer = buffer;
        playback.frame = 0;
    }

    /// Sets whether playback wraps around.
    pub fn set_looping(&self, looping: bool) {
        self.playback.lock().looping = looping;
    }

    /// Starts from the first frame. Returns false when no buffer is attached.
    pub fn play(&self) -> bool {
        let mut playback = self.playback.lock();
        if playback.buffer.is_none() {
            return false;
        }
        playback.frame = 0;
        playback.state = VoiceState::Playing;
        true
    }

    /// Stops playback.
    pub fn stop(&self) {
        let mut playback = self.playback.lock();
        if playback.state == VoiceState::Playing {
            playback.state = VoiceState::Stopped;
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> VoiceState {
        self.playback.lock().state
    }
}

/// Mixes all playing voices into an interleaved output buffer.
#[derive(Clone)]
pub struct AudioMixer {
    /// Voices registered with the mixer
    voices: Arc<RwLock<Vec<Arc<VoiceSlot>>>>,
    /// Number of output channels
    num_channels: u16,
}

impl AudioMixer {
    /// Creates a new audio mixer
    pub fn new(num_channels: u16) -> Self {
        Self {
            voices: Arc::new(RwLock::new(Vec::new())),
            num_channels,
        }
    }

    /// Registers a new voice and returns the slot shared with its handle.
    pub fn add_voice(&self) -> Arc<VoiceSlot> {
        let slot = Arc::new(VoiceSlot::new());
        self.voices.write().push(slot.clone());
        slot
    }

    /// Drops slots whose handles no longer exist.
    pub fn remove_released(&self) {
        self.voices.write().retain(|slot| Arc::strong_count(slot) > 1);
    }

    /// Returns the number of registered voices.
    pub fn voice_count(&self) -> usize {
        self.voices.read().len()
    }

    /// Renders `frames` frames into `output`, which must hold at least
    /// `frames * num_channels` samples.
    pub fn process_into_output(&self, output: &mut [f32], frames: usize) {
        let num_channels = self.num_channels as usize;
        let len = (frames * num_channels).min(output.len());
        let output = &mut output[..len];
        output.fill(0.0);

        if num_channels == 0 {
            return;
        }

        let mut voices = self.voices.write();
        voices.retain(|slot| Arc::strong_count(slot) > 1);

        for slot in voices.iter() {
            let mut playback = slot.playback.lock();
            if playback.state != VoiceState::Playing {
                continue;
            }
            let Some(buffer) = playback.buffer.clone() else {
                continue;
            };

            let channels = buffer.channel_count() as usize;
            let total_frames = buffer.frames();
            let data = buffer.data();

            for out_frame in output.chunks_exact_mut(num_channels) {
                if playback.frame >= total_frames {
                    if playback.looping && total_frames > 0 {
                        playback.frame = 0;
                    } else {
                        playback.state = VoiceState::Stopped;
                        break;
                    }
                }

                let src = &data[playback.frame * channels..(playback.frame + 1) * channels];
                for (out_ch, out) in out_frame.iter_mut().enumerate() {
                    // Mono is spread across every output; otherwise channels map 1:1.
                    let sample = if channels == 1 {
                        src[0]
                    } else if out_ch < channels {
                        src[out_ch]
                    } else {
                        continue;
                    };
                    *out += sample;
                }
                playback.frame += 1;
            }

            if playback.frame >= total_frames && !playback.looping {
                playback.state = VoiceState::Stopped;
            }
        }

        for sample in output.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_voice_spreads_to_all_channels() {
        let mixer = AudioMixer::new(2);
        let slot = mixer.add_voice();
        slot.set_buffer(Some(Buffer::new(vec![0.25, 0.5], 1, 48000)));
        assert!(slot.play());

        let mut output = vec![0.0; 6];
        mixer.process_into_output(&mut output, 3);

        assert_eq!(output, vec![0.25, 0.25, 0.5, 0.5, 0.0, 0.0]);
        assert_eq!(slot.state(), VoiceState::Stopped);
    }

    #[test]
    fn test_voices_are_summed_and_clamped() {
        let mixer = AudioMixer::new(1);
        let a = mixer.add_voice();
        let b = mixer.add_voice();
        a.set_buffer(Some(Buffer::new(vec![0.75; 4], 1, 48000)));
        b.set_buffer(Some(Buffer::new(vec![0.1, 0.75, 0.75, 0.75], 1, 48000)));
        a.play();
        b.play();

        let mut output = vec![0.0; 2];
        mixer.process_into_output(&mut output, 2);

        assert!((output[0] - 0.85).abs() < 1e-6);
        assert_eq!(output[1], 1.0);
    }

    #[test]
    fn test_stereo_voice_maps_channels() {
        let mixer = AudioMixer::new(4);
        let slot = mixer.add_voice();
        slot.set_buffer(Some(Buffer::new(vec![0.1, -0.1], 2, 48000)));
        slot.play();

        let mut output = vec![0.0; 4];
        mixer.process_into_output(&mut output, 1);

        assert_eq!(output, vec![0.1, -0.1, 0.0, 0.0]);
    }

    #[test]
    fn test_looping_voice_wraps() {
        let mixer = AudioMixer::new(1);
        let slot = mixer.add_voice();
        slot.set_buffer(Some(Buffer::new(vec![0.1, 0.2], 1, 48000)));
        slot.set_looping(true);
        slot.play();

        let mut output = vec![0.0; 5];
        mixer.process_into_output(&mut output, 5);

        assert_eq!(output, vec![0.1, 0.2, 0.1, 0.2, 0.1]);
        assert_eq!(slot.state(), VoiceState::Playing);
    }

    #[test]
    fn test_stopped_voice_is_silent() {
        let mixer = AudioMixer::new(1);
        let slot = mixer.add_voice();
        slot.set_buffer(Some(Buffer::new(vec![0.5; 8], 1, 48000)));
        slot.play();
        slot.stop();

        let mut output = vec![1.0; 4];
        mixer.process_into_output(&mut output, 4);

        assert!(output.iter().all(|s| *s == 0.0));
        assert_eq!(slot.state(), VoiceState::Stopped);
    }

    #[test]
    fn test_play_without_buffer() {
        let mixer = AudioMixer::new(1);
        let slot = mixer.add_voice();
        assert!(!slot.play());
        assert_eq!(slot.state(), VoiceState::Idle);
    }

    #[test]
    fn test_released_voices_are_removed() {
        let mixer = AudioMixer::new(2);
        let kept = mixer.add_voice();
        let released = mixer.add_voice();
        assert_eq!(mixer.voice_count(), 2);

        drop(released);
        mixer.remove_released();
        assert_eq!(mixer.voice_count(), 1);
        drop(kept);

        let mut output = vec![0.0; 2];
        mixer.process_into_output(&mut output, 1);
        assert_eq!(mixer.voice_count(), 0);
    }
}
