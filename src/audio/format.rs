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

use std::{fmt, time::Duration};

use super::error::AudioError;

/// The in-memory format shared by every clip a library or renderer produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

impl ClipFormat {
    /// Creates a new ClipFormat
    pub fn new(sample_rate: u32, channels: u16) -> Result<Self, AudioError> {
        if sample_rate == 0 {
            return Err(AudioError::InvalidFormat(
                "sample rate must be greater than 0".to_string(),
            ));
        }
        if channels == 0 {
            return Err(AudioError::InvalidFormat(
                "channel count must be greater than 0".to_string(),
            ));
        }

        Ok(ClipFormat {
            sample_rate,
            channels,
        })
    }

    /// Converts a duration in milliseconds to a frame count, rounding to the nearest frame.
    /// Saturates instead of overflowing.
    pub fn frames_for_ms(&self, ms: u64) -> usize {
        let frames = ms.saturating_mul(self.sample_rate as u64).saturating_add(500) / 1000;
        usize::try_from(frames).unwrap_or(usize::MAX)
    }

    /// Returns the wall-clock duration of the given number of frames.
    pub fn duration_of(&self, frames: usize) -> Duration {
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

impl Default for ClipFormat {
    /// 44.1kHz mono, which is what the harmonica sample sets are rendered at.
    fn default() -> Self {
        ClipFormat {
            sample_rate: 44100,
            channels: 1,
        }
    }
}

impl fmt::Display for ClipFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Hz/{}ch", self.sample_rate, self.channels)
    }
}
