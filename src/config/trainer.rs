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
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::audio::Audio;
use crate::sequence::MissingSamplePolicy;

const DEFAULT_SAMPLES_PATH: &str = "audio_samples";
const DEFAULT_LICKS_PATH: &str = "licks/example_licks.json";
const DEFAULT_KEY: &str = "G";
const DEFAULT_BPM: f64 = 120.0;
const DEFAULT_ACCENT_CLICK: &str = "click_accent.wav";
const DEFAULT_NORMAL_CLICK: &str = "click_normal.wav";

/// The configuration for the ear trainer.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Trainer {
    /// The directory holding the per-key sample directories and the click sounds.
    samples_path: Option<String>,
    /// The lick file.
    licks_path: Option<String>,
    /// The harmonica key loaded at startup.
    key: Option<String>,
    /// The tempo used when none is given on the command line.
    bpm: Option<f64>,
    /// The audio configuration.
    #[serde(default)]
    audio: Audio,
    /// The metronome click configuration.
    #[serde(default)]
    clicks: Clicks,
    /// What to do with tabs that have no sample.
    #[serde(default)]
    missing_samples: MissingSamplePolicy,
}

/// The configuration for the metronome clicks.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct Clicks {
    /// The accent click file, relative to the samples path.
    accent: Option<String>,
    /// The normal click file, relative to the samples path.
    normal: Option<String>,
    /// Generate the clicks when the files can't be found.
    #[serde(default)]
    synthesize: bool,
}

impl Trainer {
    /// Returns the samples directory.
    pub fn samples_path(&self) -> PathBuf {
        PathBuf::from(
            self.samples_path
                .as_deref()
                .unwrap_or(DEFAULT_SAMPLES_PATH),
        )
    }

    /// Returns the lick file.
    pub fn licks_path(&self) -> PathBuf {
        PathBuf::from(self.licks_path.as_deref().unwrap_or(DEFAULT_LICKS_PATH))
    }

    /// Returns the harmonica key.
    pub fn key(&self) -> &str {
        self.key.as_deref().unwrap_or(DEFAULT_KEY)
    }

    /// Returns the default tempo.
    pub fn bpm(&self) -> f64 {
        self.bpm.unwrap_or(DEFAULT_BPM)
    }

    /// Returns the audio configuration.
    pub fn audio(&self) -> &Audio {
        &self.audio
    }

    /// Returns the click configuration.
    pub fn clicks(&self) -> &Clicks {
        &self.clicks
    }

    /// Returns the missing sample policy.
    pub fn missing_samples(&self) -> MissingSamplePolicy {
        self.missing_samples
    }

    /// Resolves relative paths in the configuration against the given directory.
    pub(super) fn resolve_relative_to(&mut self, base: &Path) {
        let resolve = |path: &mut Option<String>, default: &str| {
            let current = PathBuf::from(path.as_deref().unwrap_or(default));
            if current.is_relative() {
                *path = Some(base.join(current).to_string_lossy().to_string());
            }
        };
        resolve(&mut self.samples_path, DEFAULT_SAMPLES_PATH);
        resolve(&mut self.licks_path, DEFAULT_LICKS_PATH);
    }
}

impl Clicks {
    /// Returns the accent click file name.
    pub fn accent(&self) -> &str {
        self.accent.as_deref().unwrap_or(DEFAULT_ACCENT_CLICK)
    }

    /// Returns the normal click file name.
    pub fn normal(&self) -> &str {
        self.normal.as_deref().unwrap_or(DEFAULT_NORMAL_CLICK)
    }

    /// Returns true if missing clicks should be generated.
    pub fn synthesize(&self) -> bool {
        self.synthesize
    }
}
