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
use std::{fmt, sync::Arc, thread};

use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    FromSample, SizedSample,
};
use tracing::{error, info, span, Level};

use super::{
    mixer::{AudioMixer, VoiceSlot},
    thread_priority::{configure_thread_priority, thread_priority_value},
    AudioError, Buffer, VoiceState,
};
use crate::config;

/// Upper bound on simultaneously allocated voices per output stream.
const MAX_VOICES: usize = 256;

/// An opened cpal output device. All voices are mixed into a single output
/// stream that lives on its own thread, since cpal streams aren't Send on
/// every platform.
pub struct Backend {
    /// The name of the device.
    name: String,
    /// The host ID of the device.
    host_id: cpal::HostId,
    /// The rate the stream runs at.
    sample_rate: u32,
    /// The number of output channels.
    num_channels: u16,
    /// The mixer feeding the stream.
    mixer: AudioMixer,
    /// Dropping the sender stops the stream.
    shutdown_tx: Option<crossbeam_channel::Sender<()>>,
    /// Owns the stream.
    output_thread: Option<thread::JoinHandle<()>>,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}, Rate={}) ({})",
            self.name,
            self.num_channels,
            self.sample_rate,
            self.host_id.name()
        )
    }
}

impl Backend {
    /// Lists output devices across every available host.
    pub fn list() -> Result<Vec<String>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices = Vec::new();
        for host_id in cpal::available_hosts() {
            let host_devices = match cpal::host_from_id(host_id)?.output_devices() {
                Ok(host_devices) => host_devices,
                Err(e) => {
                    error!(
                        err = e.to_string(),
                        host = host_id.name(),
                        "Unable to list devices for host"
                    );
                    continue;
                }
            };

            for device in host_devices {
                let Ok(output_configs) = device.supported_output_configs() else {
                    continue;
                };
                let max_channels = output_configs
                    .map(|config| config.channels())
                    .max()
                    .unwrap_or(0);

                if max_channels > 0 {
                    devices.push(format!(
                        "{} (Channels={}) ({})",
                        device.name()?,
                        max_channels,
                        host_id.name()
                    ));
                }
            }
        }

        devices.sort();
        Ok(devices)
    }

    /// Opens the configured device and starts its output stream.
    pub fn get(config: &config::Audio) -> Result<Backend, AudioError> {
        let host = cpal::default_host();
        let name = config.device();
        let device = if name == "default" {
            host.default_output_device()
                .ok_or(AudioError::NoDefaultDevice)?
        } else {
            let mut found = None;
            for device in host.output_devices()? {
                if device.name()?.trim() == name {
                    found = Some(device);
                    break;
                }
            }
            found.ok_or_else(|| AudioError::DeviceNotFound(name.to_string()))?
        };

        let supported = Self::stream_config(&device, config.sample_rate())?;
        let sample_format = supported.sample_format();
        let stream_config: cpal::StreamConfig = supported.into();
        let sample_rate = stream_config.sample_rate.0;
        let num_channels = stream_config.channels;
        let mixer = AudioMixer::new(num_channels);

        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<(), AudioError>>(1);
        let priority = thread_priority_value(config.thread_priority());
        let realtime = config.realtime();
        let stream_mixer = mixer.clone();
        let device_name = name.to_string();

        let output_thread = thread::Builder::new()
            .name("audio output".to_string())
            .spawn(move || {
                let span = span!(Level::INFO, "audio output", device = device_name);
                let _enter = span.enter();

                let stream = match sample_format {
                    cpal::SampleFormat::F32 => build_stream::<f32>(
                        &device,
                        &stream_config,
                        stream_mixer,
                        priority,
                        realtime,
                    ),
                    cpal::SampleFormat::I16 => build_stream::<i16>(
                        &device,
                        &stream_config,
                        stream_mixer,
                        priority,
                        realtime,
                    ),
                    cpal::SampleFormat::U16 => build_stream::<u16>(
                        &device,
                        &stream_config,
                        stream_mixer,
                        priority,
                        realtime,
                    ),
                    cpal::SampleFormat::I32 => build_stream::<i32>(
                        &device,
                        &stream_config,
                        stream_mixer,
                        priority,
                        realtime,
                    ),
                    format => Err(AudioError::UnsupportedSampleFormat(format!("{:?}", format))),
                };

                let stream = match stream.and_then(|stream| {
                    stream.play()?;
                    Ok(stream)
                }) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                info!("Output stream started");
                let _ = ready_tx.send(Ok(()));

                // Blocks until the backend is dropped.
                let _ = shutdown_rx.recv();
                drop(stream);
                info!("Output stream stopped");
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = output_thread.join();
                return Err(e);
            }
            Err(_) => {
                let _ = output_thread.join();
                return Err(AudioError::StreamClosed);
            }
        }

        info!(
            device = name,
            sample_rate,
            channels = num_channels,
            format = ?sample_format,
            "Opened audio device"
        );

        Ok(Backend {
            name: name.to_string(),
            host_id: host.id(),
            sample_rate,
            num_channels,
            mixer,
            shutdown_tx: Some(shutdown_tx),
            output_thread: Some(output_thread),
        })
    }

    /// Picks the device's default config, switched to the preferred sample
    /// rate when some supported config offers it.
    fn stream_config(
        device: &cpal::Device,
        preferred_rate: Option<u32>,
    ) -> Result<cpal::SupportedStreamConfig, AudioError> {
        let default = device.default_output_config()?;
        let Some(rate) = preferred_rate else {
            return Ok(default);
        };
        if default.sample_rate().0 == rate {
            return Ok(default);
        }

        let rate = cpal::SampleRate(rate);
        let matching = device.supported_output_configs()?.find(|range| {
            range.channels() == default.channels()
                && range.sample_format() == default.sample_format()
                && range.min_sample_rate() <= rate
                && rate <= range.max_sample_rate()
        });
        Ok(match matching {
            Some(range) => range.with_sample_rate(rate),
            None => default,
        })
    }
}

/// Builds an output stream that renders the mixer into samples of type T.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: AudioMixer,
    priority: u8,
    realtime: bool,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let num_channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();
    let mut priority_set = false;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            configure_thread_priority("audio callback", priority, realtime, &mut priority_set);

            if scratch.len() < data.len() {
                scratch.resize(data.len(), 0.0);
            }
            let frames = data.len() / num_channels.max(1);
            let scratch = &mut scratch[..data.len()];
            mixer.process_into_output(scratch, frames);

            for (dst, src) in data.iter_mut().zip(scratch.iter()) {
                *dst = T::from_sample(*src);
            }
        },
        |err| error!(err = err.to_string(), "Output stream error"),
        None,
    )?;
    Ok(stream)
}

impl super::Backend for Backend {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn create_voice(&self) -> Result<Box<dyn super::Voice>, AudioError> {
        self.mixer.remove_released();
        if self.mixer.voice_count() >= MAX_VOICES {
            return Err(AudioError::VoiceLimit(MAX_VOICES));
        }

        Ok(Box::new(Voice {
            slot: self.mixer.add_voice(),
        }))
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.shutdown_tx.take();
        if let Some(thread) = self.output_thread.take() {
            let _ = thread.join();
        }
    }
}

/// A voice mixed into the cpal output stream.
pub struct Voice {
    slot: Arc<VoiceSlot>,
}

impl super::Voice for Voice {
    fn set_buffer(&mut self, buffer: Buffer) {
        self.slot.set_buffer(Some(buffer));
    }

    fn clear_buffer(&mut self) {
        self.slot.set_buffer(None);
    }

    fn set_looping(&mut self, looping: bool) {
        self.slot.set_looping(looping);
    }

    fn play(&mut self) -> Result<(), AudioError> {
        if self.slot.play() {
            Ok(())
        } else {
            Err(AudioError::VoiceCreation(
                "play requested without a buffer".to_string(),
            ))
        }
    }

    fn stop(&mut self) {
        self.slot.stop();
    }

    fn state(&self) -> VoiceState {
        self.slot.state()
    }
}
