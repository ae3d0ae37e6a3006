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
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info, warn};

use super::DecodeError;

/// The channel layouts a sample may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelFormat {
    Mono,
    Stereo,
}

impl ChannelFormat {
    /// Maps a channel count onto a layout. Anything other than one or two
    /// channels is rejected.
    pub fn from_count(count: usize) -> Result<ChannelFormat, DecodeError> {
        match count {
            1 => Ok(ChannelFormat::Mono),
            2 => Ok(ChannelFormat::Stereo),
            count => Err(DecodeError::UnsupportedChannelCount(count)),
        }
    }

    /// The number of interleaved channels.
    pub fn count(&self) -> u16 {
        match self {
            ChannelFormat::Mono => 1,
            ChannelFormat::Stereo => 2,
        }
    }
}

/// Fully decoded audio, held in memory.
#[derive(Clone)]
pub struct DecodedSample {
    /// Interleaved samples.
    samples: Vec<f32>,
    channel_format: ChannelFormat,
    sample_rate: u32,
}

impl DecodedSample {
    /// Creates a decoded sample, checking that it holds at least one whole
    /// frame at a non-zero rate.
    pub fn new(
        samples: Vec<f32>,
        channel_format: ChannelFormat,
        sample_rate: u32,
    ) -> Result<DecodedSample, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::MissingSampleRate);
        }
        if samples.is_empty() {
            return Err(DecodeError::Empty);
        }
        let channels = channel_format.count();
        if samples.len() % channels as usize != 0 {
            return Err(DecodeError::UnalignedFrames {
                len: samples.len(),
                channels,
            });
        }

        Ok(DecodedSample {
            samples,
            channel_format,
            sample_rate,
        })
    }

    /// Builds a sample whose invariants the caller already upholds.
    pub(super) fn from_parts(
        samples: Vec<f32>,
        channel_format: ChannelFormat,
        sample_rate: u32,
    ) -> DecodedSample {
        DecodedSample {
            samples,
            channel_format,
            sample_rate,
        }
    }

    /// Returns the interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channel_format(&self) -> ChannelFormat {
        self.channel_format
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channel_format.count() as usize
    }

    pub fn duration(&self) -> Duration {
        crate::audio::frames_to_duration(self.frames(), self.sample_rate)
    }

    /// Converts the sample to another rate using linear interpolation, which
    /// is plenty for short one-shot clicks.
    pub fn resampled(&self, target_rate: u32) -> DecodedSample {
        if target_rate == self.sample_rate || target_rate == 0 {
            return self.clone();
        }

        let channels = self.channel_format.count() as usize;
        let source_frames = self.frames();
        let source_rate = u64::from(self.sample_rate);
        let target_frames = ((source_frames as u64 * u64::from(target_rate) + source_rate - 1)
            / source_rate) as usize;
        let ratio = f64::from(target_rate) / f64::from(self.sample_rate);

        let mut output = Vec::with_capacity(target_frames * channels);
        for target_frame in 0..target_frames {
            let source_pos = target_frame as f64 / ratio;
            let source_frame = source_pos.floor() as usize;
            let frac = source_pos.fract() as f32;

            for channel in 0..channels {
                let s0 = self
                    .samples
                    .get(source_frame * channels + channel)
                    .copied()
                    .unwrap_or(0.0);
                let s1 = self
                    .samples
                    .get((source_frame + 1) * channels + channel)
                    .copied()
                    .unwrap_or(s0);
                output.push(s0 + (s1 - s0) * frac);
            }
        }

        DecodedSample {
            samples: output,
            channel_format: self.channel_format,
            sample_rate: target_rate,
        }
    }
}

impl std::fmt::Debug for DecodedSample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedSample")
            .field("channel_format", &self.channel_format)
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Decodes sound files into memory with symphonia. Supports WAV, FLAC, OGG,
/// MP3 and the other formats symphonia ships with.
pub struct SampleDecoder;

impl SampleDecoder {
    /// Decodes the file at the given path.
    pub fn decode_file(path: &Path) -> Result<DecodedSample, DecodeError> {
        info!(path = ?path, "Decoding sample");

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        File::open(path)
            .map_err(DecodeError::from)
            .and_then(|file| Self::decode(Box::new(file), hint))
            .map_err(|e| DecodeError::File {
                path: path.to_path_buf(),
                source: Box::new(e),
            })
    }

    /// Decodes an in-memory sound file.
    pub fn decode_bytes(bytes: Vec<u8>) -> Result<DecodedSample, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        Self::decode(Box::new(Cursor::new(bytes)), Hint::new())
    }

    fn decode(source: Box<dyn MediaSource>, hint: Hint) -> Result<DecodedSample, DecodeError> {
        let mss = MediaSourceStream::new(source, Default::default());
        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoTrack)?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or(DecodeError::MissingSampleRate)?;

        // Reject unplayable layouts before decoding anything.
        let mut channels = match track.codec_params.channels {
            Some(channels) => Some(ChannelFormat::from_count(channels.count())?),
            None => None,
        };

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder = get_codecs().make(&track.codec_params, &decoder_opts)?;

        let mut samples = Vec::new();
        let mut skipped = 0usize;
        while let Some(packet) = Self::next_packet(format_reader.as_mut())? {
            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!(error = e, "Skipping undecodable packet");
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let spec = *decoded.spec();
            let format = ChannelFormat::from_count(spec.channels.count())?;
            if *channels.get_or_insert(format) != format {
                return Err(DecodeError::UnsupportedChannelCount(spec.channels.count()));
            }

            let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }

        let channel_format = channels.ok_or(DecodeError::Empty)?;
        let sample = DecodedSample::new(samples, channel_format, sample_rate)?;
        debug!(
            channels = channel_format.count(),
            sample_rate,
            frames = sample.frames(),
            skipped_packets = skipped,
            "Sample decoded"
        );
        Ok(sample)
    }

    /// Reads the next packet, treating end of stream as `None`.
    fn next_packet(
        format_reader: &mut dyn FormatReader,
    ) -> Result<Option<symphonia::core::formats::Packet>, DecodeError> {
        loop {
            match format_reader.next_packet() {
                Ok(packet) => return Ok(Some(packet)),
                Err(SymphoniaError::ResetRequired) => continue,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None)
                }
                // Some readers report a decode error at the end of the stream.
                Err(SymphoniaError::DecodeError(_)) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
