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
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
};

use parking_lot::Mutex;
use tracing::{info, span, Level};

use super::{AudioClip, AudioError};

/// A mock device. Doesn't actually play anything, but takes as long as the clip would
/// and remembers every clip it was given.
#[derive(Clone)]
pub struct Device {
    name: String,
    is_playing: Arc<AtomicBool>,
    played: Arc<Mutex<Vec<AudioClip>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            is_playing: Arc::new(AtomicBool::new(false)),
            played: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns true if the device is currently playing.
    pub fn is_playing(&self) -> bool {
        self.is_playing.load(Ordering::Relaxed)
    }

    /// Returns every clip played so far, in order.
    pub fn played(&self) -> Vec<AudioClip> {
        self.played.lock().clone()
    }

    /// Returns the number of clips played so far.
    pub fn play_count(&self) -> usize {
        self.played.lock().len()
    }
}

impl super::Device for Device {
    /// Sleeps for the duration of the clip.
    fn play(&self, clip: &AudioClip) -> Result<(), AudioError> {
        let span = span!(Level::INFO, "play clip (mock)");
        let _enter = span.enter();

        info!(
            device = %self.name,
            frames = clip.frames(),
            duration_ms = clip.duration().as_millis() as u64,
            "Playing clip."
        );

        self.is_playing.store(true, Ordering::Relaxed);
        thread::sleep(clip.duration());
        self.played.lock().push(clip.clone());
        self.is_playing.store(false, Ordering::Relaxed);

        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
