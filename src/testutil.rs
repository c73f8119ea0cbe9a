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
    any::TypeId,
    error::Error,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use tracing::Level;

/// Wait for the given predicate to return true or fail.
#[inline]
pub fn eventually<F>(predicate: F, error_msg: &str)
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        if start.elapsed() > timeout {
            panic!("{}", error_msg);
        }
        if predicate() {
            return;
        }
        thread::sleep(tick);
    }
}

/// Writes a wav file. Each inner vector is one channel; the channels are interleaved
/// on write. The bit depth follows the sample type.
pub fn write_wav<S>(path: PathBuf, samples: Vec<Vec<S>>, sample_rate: u32) -> Result<(), Box<dyn Error>>
where
    S: hound::Sample + Copy + 'static,
{
    let (sample_format, bits_per_sample) = if TypeId::of::<S>() == TypeId::of::<f32>() {
        (SampleFormat::Float, 32)
    } else if TypeId::of::<S>() == TypeId::of::<i16>() {
        (SampleFormat::Int, 16)
    } else if TypeId::of::<S>() == TypeId::of::<i32>() {
        (SampleFormat::Int, 32)
    } else {
        return Err("Unsupported sample format".into());
    };

    let num_channels = samples.len();
    assert!(num_channels > 0, "No channels!");
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let frames = samples[0].len();
    assert!(
        samples.iter().all(|channel| channel.len() == frames),
        "Channels have different lengths!"
    );

    let mut writer = WavWriter::new(
        File::create(path)?,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample,
            sample_format,
        },
    )?;
    for frame in 0..frames {
        for channel in &samples {
            writer.write_sample(channel[frame])?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Writes a key's sample directory under the given base. Every sample is a constant
/// level so it's easy to spot in rendered output.
pub fn write_key(
    base: &Path,
    key: &str,
    samples: &[(&str, usize, f32)],
    sample_rate: u32,
) -> Result<PathBuf, Box<dyn Error>> {
    let dir = base.join(format!("{}_harp", key));
    fs::create_dir_all(&dir)?;
    for (label, frames, level) in samples {
        write_wav(
            dir.join(format!("{}.wav", label)),
            vec![vec![*level; *frames]],
            sample_rate,
        )?;
    }
    Ok(dir)
}

/// Collects formatted log lines in memory.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs the function with a subscriber that records everything logged on this
/// thread, and returns the function's result along with the log output.
pub fn capture_logs<T, F>(f: F) -> (T, String)
where
    F: FnOnce() -> T,
{
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(Level::TRACE)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock()).into_owned();
    (result, logs)
}
