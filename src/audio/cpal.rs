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
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, error, info, span, Level};

use super::{AudioClip, AudioError, ClipFormat, Device as AudioDevice};

/// How long to wait past the end of a clip before giving up on the stream.
const COMPLETION_GRACE: Duration = Duration::from_secs(2);

/// How long to keep the stream open once the last frame was handed to the backend,
/// so the hardware buffer drains before the stream is dropped.
const DRAIN_TIME: Duration = Duration::from_millis(60);

/// A cpal output device.
pub struct Device {
    name: String,
    max_channels: u16,
    host_id: cpal::HostId,
    device: cpal::Device,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (Channels={}) ({})",
            self.name,
            self.max_channels,
            self.host_id.name()
        )
    }
}

/// The read position into the clip currently being streamed.
struct Cursor {
    clip: AudioClip,
    position: AtomicUsize,
    finished: AtomicBool,
}

impl Cursor {
    /// Fills the output with the next samples of the clip, padding with silence once the
    /// clip is exhausted. Returns true the first time the clip runs out.
    fn fill<T>(&self, output: &mut [T]) -> bool
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        let samples = self.clip.samples();
        let start = self.position.load(Ordering::Acquire).min(samples.len());
        let available = samples.len() - start;
        let to_copy = available.min(output.len());

        for (out, sample) in output.iter_mut().zip(&samples[start..start + to_copy]) {
            *out = T::from_sample(*sample);
        }
        for out in output[to_copy..].iter_mut() {
            *out = T::EQUILIBRIUM;
        }
        self.position.store(start + to_copy, Ordering::Release);

        start + to_copy >= samples.len() && !self.finished.swap(true, Ordering::AcqRel)
    }
}

impl Device {
    /// Lists cpal devices and produces the Device trait.
    pub fn list() -> Result<Vec<Box<dyn AudioDevice>>, AudioError> {
        Ok(Device::list_cpal_devices()?
            .into_iter()
            .map(|device| {
                let device: Box<dyn AudioDevice> = Box::new(device);
                device
            })
            .collect())
    }

    /// Lists cpal devices.
    fn list_cpal_devices() -> Result<Vec<Device>, AudioError> {
        // Suppress noisy output here.
        let _shh_stdout = shh::stdout()?;
        let _shh_stderr = shh::stderr()?;

        let mut devices: Vec<Device> = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = cpal::host_from_id(host_id).map_err(device_error)?;
            let host_devices = match host.output_devices() {
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
                let max_channels = match device.supported_output_configs() {
                    Ok(configs) => configs.map(|config| config.channels()).max().unwrap_or(0),
                    Err(_) => continue,
                };

                if max_channels > 0 {
                    devices.push(Device {
                        name: device.name().map_err(device_error)?,
                        max_channels,
                        host_id,
                        device,
                    })
                }
            }
        }

        devices.sort_by_key(|device| device.name.to_string());
        Ok(devices)
    }

    /// Gets the given cpal device. The name "default" picks the default output device
    /// of the default host.
    pub fn get(name: &str) -> Result<Device, AudioError> {
        if name == "default" {
            let host = cpal::default_host();
            let device = host
                .default_output_device()
                .ok_or_else(|| AudioError::Device("no default output device".to_string()))?;
            let max_channels = device
                .supported_output_configs()
                .map_err(device_error)?
                .map(|config| config.channels())
                .max()
                .unwrap_or(0);
            return Ok(Device {
                name: device.name().map_err(device_error)?,
                max_channels,
                host_id: host.id(),
                device,
            });
        }

        Device::list_cpal_devices()?
            .into_iter()
            .find(|device| device.name.trim() == name)
            .ok_or_else(|| AudioError::Device(format!("no device found with name {}", name)))
    }

    /// Builds an output stream that pulls samples from the cursor.
    fn build_stream<T>(
        &self,
        config: &cpal::StreamConfig,
        cursor: Arc<Cursor>,
        done_tx: crossbeam_channel::Sender<()>,
    ) -> Result<cpal::Stream, AudioError>
    where
        T: cpal::SizedSample + cpal::FromSample<f32>,
    {
        self.device
            .build_output_stream(
                config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    if cursor.fill(data) {
                        let _ = done_tx.try_send(());
                    }
                },
                |err| error!("CPAL output stream error: {}", err),
                None,
            )
            .map_err(device_error)
    }
}

/// One range of stream configurations an output device accepts.
#[derive(Debug, Clone, Copy, PartialEq)]
struct OutputSupport {
    channels: u16,
    min_sample_rate: u32,
    max_sample_rate: u32,
    sample_format: cpal::SampleFormat,
}

impl OutputSupport {
    fn accepts(&self, format: ClipFormat) -> bool {
        self.channels == format.channels
            && (self.min_sample_rate..=self.max_sample_rate).contains(&format.sample_rate)
    }
}

/// Picks the stream format for a clip. The clip's own format is used if the device
/// accepts it, preferring the default sample format. Otherwise the device default is
/// used and the clip has to be converted to it.
fn choose_stream_format(
    wanted: ClipFormat,
    supported: &[OutputSupport],
    default: (ClipFormat, cpal::SampleFormat),
) -> (ClipFormat, cpal::SampleFormat) {
    let (default_format, default_sample_format) = default;
    let accepting: Vec<&OutputSupport> = supported
        .iter()
        .filter(|support| support.accepts(wanted))
        .collect();
    match accepting
        .iter()
        .find(|support| support.sample_format == default_sample_format)
        .or(accepting.first())
    {
        Some(support) => (wanted, support.sample_format),
        None => (default_format, default_sample_format),
    }
}

impl Device {
    /// Works out the format the device will be opened with for the given clip.
    fn stream_format(
        &self,
        wanted: ClipFormat,
    ) -> Result<(ClipFormat, cpal::SampleFormat), AudioError> {
        let default = self
            .device
            .default_output_config()
            .map_err(device_error)?;
        let default_config = default.config();
        let default_format =
            ClipFormat::new(default_config.sample_rate, default_config.channels)?;

        let supported: Vec<OutputSupport> = self
            .device
            .supported_output_configs()
            .map_err(device_error)?
            .map(|range| OutputSupport {
                channels: range.channels(),
                min_sample_rate: range.min_sample_rate(),
                max_sample_rate: range.max_sample_rate(),
                sample_format: range.sample_format(),
            })
            .collect();

        Ok(choose_stream_format(
            wanted,
            &supported,
            (default_format, default.sample_format()),
        ))
    }
}

impl AudioDevice for Device {
    /// Streams the clip to the device and waits for it to finish. A clip in a format
    /// the device doesn't accept is converted to the device's default format first.
    fn play(&self, clip: &AudioClip) -> Result<(), AudioError> {
        let span = span!(Level::INFO, "play clip (cpal)");
        let _enter = span.enter();

        if clip.is_empty() {
            return Ok(());
        }

        let (format, sample_format) = self.stream_format(clip.format())?;
        if format != clip.format() {
            debug!(
                device = %self.name,
                from = %clip.format(),
                to = %format,
                "Converting clip to the device format"
            );
        }
        let clip = clip.conform(format);

        info!(
            device = %self.name,
            format = %format,
            duration_ms = clip.duration().as_millis() as u64,
            "Playing clip."
        );

        let config = cpal::StreamConfig {
            channels: format.channels,
            sample_rate: format.sample_rate,
            buffer_size: cpal::BufferSize::Default,
        };
        let duration = clip.duration();
        let cursor = Arc::new(Cursor {
            clip,
            position: AtomicUsize::new(0),
            finished: AtomicBool::new(false),
        });
        let (done_tx, done_rx) = crossbeam_channel::bounded::<()>(1);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => self.build_stream::<f32>(&config, cursor, done_tx)?,
            cpal::SampleFormat::I16 => self.build_stream::<i16>(&config, cursor, done_tx)?,
            cpal::SampleFormat::I32 => self.build_stream::<i32>(&config, cursor, done_tx)?,
            cpal::SampleFormat::U16 => self.build_stream::<u16>(&config, cursor, done_tx)?,
            other => {
                return Err(AudioError::Device(format!(
                    "unsupported device sample format {:?}",
                    other
                )))
            }
        };
        stream.play().map_err(device_error)?;

        if done_rx.recv_timeout(duration + COMPLETION_GRACE).is_err() {
            return Err(AudioError::Device(format!(
                "device {} did not finish playing the clip",
                self.name
            )));
        }
        thread::sleep(DRAIN_TIME);

        Ok(())
    }
}

fn device_error<E: std::error::Error>(e: E) -> AudioError {
    AudioError::Device(e.to_string())
}
