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
    error::Error,
    fs::File,
    io::{Cursor, Seek, Write},
    path::PathBuf,
};

use hound::{SampleFormat, WavSpec, WavWriter};

/// Writes one vector of samples per channel to a WAV file, interleaving them.
pub fn write_wav_with_bits<S: hound::Sample + Copy + 'static>(
    path: PathBuf,
    samples: Vec<Vec<S>>,
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<(), Box<dyn Error>> {
    let tempwav = File::create(path)?;
    write_interleaved(tempwav, &samples, sample_rate, bits_per_sample)
}

/// Same as `write_wav_with_bits`, but returns the file contents.
pub fn wav_bytes<S: hound::Sample + Copy + 'static>(
    samples: Vec<Vec<S>>,
    sample_rate: u32,
    bits_per_sample: u16,
) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    write_interleaved(&mut cursor, &samples, sample_rate, bits_per_sample)
        .expect("unable to write wav to memory");
    cursor.into_inner()
}

fn write_interleaved<W: Write + Seek, S: hound::Sample + Copy + 'static>(
    writer: W,
    samples: &[Vec<S>],
    sample_rate: u32,
    bits_per_sample: u16,
) -> Result<(), Box<dyn Error>> {
    // Determine sample format based on the type
    let sample_format = if std::any::TypeId::of::<S>() == std::any::TypeId::of::<f32>() {
        SampleFormat::Float
    } else if std::any::TypeId::of::<S>() == std::any::TypeId::of::<i32>()
        || std::any::TypeId::of::<S>() == std::any::TypeId::of::<i16>()
    {
        SampleFormat::Int
    } else {
        return Err("Unsupported sample format".into());
    };

    let num_channels = samples.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let frames = samples.first().map(Vec::len).unwrap_or(0);
    assert!(
        samples.iter().all(|channel| channel.len() == frames),
        "Channels differ in length!"
    );
    let mut writer = WavWriter::new(
        writer,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample,
            sample_format,
        },
    )?;

    for frame in 0..frames {
        for channel in samples {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}
