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

//! Metronome click tracks.
//!
//! A click track is a run of beats, each exactly one quarter note long, with the
//! accent click on the first beat of every measure and the normal click everywhere
//! else. The time signature's beat unit is read but doesn't change the beat length:
//! 3/8 clicks like 3/4.

use std::f32::consts::PI;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use tracing::{info, warn};

use crate::audio::{decode::decode_file, AudioClip, ClipBuilder, ClipFormat};
use crate::error::EngineError;
use crate::sequence::{RenderedBuffer, Segment, SegmentSource, Tempo};

/// Slack allowed when rounding a beat count up, so float sums like 2.9999999 or
/// 3.0000001 still count as three beats.
const BEAT_EPSILON: f64 = 1e-6;

/// A time signature such as 4/4 or 3/4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSignature {
    /// The number of beats in a measure. Decides where accents go.
    pub beats_per_measure: u32,
    /// The note value of a beat. Accepted but not used for timing.
    pub beat_unit: u32,
}

impl TimeSignature {
    /// Creates a new time signature.
    pub fn new(beats_per_measure: u32, beat_unit: u32) -> Result<TimeSignature, EngineError> {
        if beats_per_measure == 0 || beat_unit == 0 {
            return Err(EngineError::InvalidTimeSignature(format!(
                "{}/{}",
                beats_per_measure, beat_unit
            )));
        }
        Ok(TimeSignature {
            beats_per_measure,
            beat_unit,
        })
    }

    /// Parses a time signature, falling back to 4/4 with a warning if it's malformed.
    pub fn parse_or_default(s: &str) -> TimeSignature {
        match s.parse() {
            Ok(time_signature) => time_signature,
            Err(e) => {
                warn!(time_signature = s, err = %e, "Falling back to 4/4");
                TimeSignature::default()
            }
        }
    }

    /// Returns which click plays on the given beat (counted from zero).
    pub fn click_for_beat(&self, beat: u32) -> ClickKind {
        if beat % self.beats_per_measure == 0 {
            ClickKind::Accent
        } else {
            ClickKind::Normal
        }
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            beats_per_measure: 4,
            beat_unit: 4,
        }
    }
}

impl FromStr for TimeSignature {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || EngineError::InvalidTimeSignature(s.to_string());
        let (beats, unit) = s.trim().split_once('/').ok_or_else(invalid)?;
        let beats = beats.trim().parse::<u32>().map_err(|_| invalid())?;
        let unit = unit.trim().parse::<u32>().map_err(|_| invalid())?;
        TimeSignature::new(beats, unit).map_err(|_| invalid())
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.beats_per_measure, self.beat_unit)
    }
}

/// The two metronome sounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    /// The first beat of a measure.
    Accent,
    /// Every other beat.
    Normal,
}

impl ClickKind {
    fn name(self) -> &'static str {
        match self {
            ClickKind::Accent => "accent",
            ClickKind::Normal => "normal",
        }
    }
}

/// Returns the click of every beat of a track of the given length.
pub fn click_pattern(total_beats: u32, time_signature: &TimeSignature) -> Vec<ClickKind> {
    (0..total_beats)
        .map(|beat| time_signature.click_for_beat(beat))
        .collect()
}

/// Returns the number of whole beats needed to cover the given number of beats.
pub fn beats_to_cover(beats: f64) -> u32 {
    if !beats.is_finite() || beats <= 0.0 {
        return 0;
    }
    (beats - BEAT_EPSILON).ceil().max(0.0) as u32
}

/// The accent and normal click sounds. Either may be missing, in which case no click
/// track can be built.
#[derive(Debug, Clone)]
pub struct ClickSounds {
    format: ClipFormat,
    accent: Option<AudioClip>,
    normal: Option<AudioClip>,
}

impl ClickSounds {
    /// Creates click sounds from already decoded clips.
    pub fn new(format: ClipFormat, accent: Option<AudioClip>, normal: Option<AudioClip>) -> Self {
        ClickSounds {
            format,
            accent: accent.map(|clip| clip.conform(format)),
            normal: normal.map(|clip| clip.conform(format)),
        }
    }

    /// Loads the two click files from a directory. A file that can't be loaded is
    /// reported and left out.
    pub fn load(dir: &Path, accent_file: &str, normal_file: &str, format: ClipFormat) -> Self {
        let load = |file: &str| match decode_file(dir.join(file), format) {
            Ok(clip) => Some(clip),
            Err(e) => {
                warn!(file, err = %e, "Unable to load metronome click");
                None
            }
        };

        let sounds = ClickSounds {
            format,
            accent: load(accent_file),
            normal: load(normal_file),
        };
        info!(
            accent = sounds.accent.is_some(),
            normal = sounds.normal.is_some(),
            "Loaded metronome clicks"
        );
        sounds
    }

    /// Generates both clicks: short decaying sine bursts, the accent higher and louder.
    pub fn synthesized(format: ClipFormat) -> Self {
        ClickSounds {
            format,
            accent: Some(synthesize_click(format, 1200.0, 0.6)),
            normal: Some(synthesize_click(format, 800.0, 0.4)),
        }
    }

    /// Fills in any missing click with a generated one.
    pub fn or_synthesized(self) -> Self {
        let generated = ClickSounds::synthesized(self.format);
        ClickSounds {
            format: self.format,
            accent: self.accent.or(generated.accent),
            normal: self.normal.or(generated.normal),
        }
    }

    /// Returns true if both clicks are loaded.
    pub fn is_complete(&self) -> bool {
        self.accent.is_some() && self.normal.is_some()
    }

    /// Returns the clip of the given click.
    pub fn get(&self, kind: ClickKind) -> Option<&AudioClip> {
        match kind {
            ClickKind::Accent => self.accent.as_ref(),
            ClickKind::Normal => self.normal.as_ref(),
        }
    }

    /// Returns the format of the clicks.
    pub fn format(&self) -> ClipFormat {
        self.format
    }
}

/// Click length in milliseconds.
const CLICK_DURATION_MS: u64 = 15;

fn synthesize_click(format: ClipFormat, frequency: f32, amplitude: f32) -> AudioClip {
    let frames = format.frames_for_ms(CLICK_DURATION_MS);
    let phase_increment = 2.0 * PI * frequency / format.sample_rate as f32;
    let channels = format.channels as usize;

    let mut samples = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        // Exponential decay envelope
        let t = i as f32 / frames as f32;
        let envelope = (-t * 8.0).exp();
        let sample = (i as f32 * phase_increment).sin() * envelope * amplitude;
        samples.extend(std::iter::repeat(sample).take(channels));
    }

    AudioClip::from_interleaved(samples, format)
}

/// Builds click tracks from a pair of click sounds.
#[derive(Debug, Clone)]
pub struct MetronomeClickTrack {
    sounds: ClickSounds,
}

impl MetronomeClickTrack {
    /// Creates a new click track builder.
    pub fn new(sounds: ClickSounds) -> MetronomeClickTrack {
        MetronomeClickTrack { sounds }
    }

    /// Returns the click sounds.
    pub fn sounds(&self) -> &ClickSounds {
        &self.sounds
    }

    /// Returns true if both clicks are loaded and tracks can be built.
    pub fn is_ready(&self) -> bool {
        self.sounds.is_complete()
    }

    /// Fails with the first click that isn't loaded.
    pub fn ensure_ready(&self) -> Result<(), EngineError> {
        for kind in [ClickKind::Accent, ClickKind::Normal] {
            if self.sounds.get(kind).is_none() {
                return Err(EngineError::MissingClick(kind.name()));
            }
        }
        Ok(())
    }

    /// Builds a click track of the given number of beats. Every beat is one quarter
    /// note: a longer click is cut off, a shorter one is followed by silence.
    pub fn build(
        &self,
        total_beats: u32,
        tempo: Tempo,
        time_signature: &TimeSignature,
    ) -> Result<RenderedBuffer, EngineError> {
        let accent = self
            .sounds
            .get(ClickKind::Accent)
            .ok_or(EngineError::MissingClick("accent"))?;
        let normal = self
            .sounds
            .get(ClickKind::Normal)
            .ok_or(EngineError::MissingClick("normal"))?;

        let format = self.sounds.format();
        let beat_ms = tempo.slot_ms("beat", 1.0)?;
        let beat_frames = format.frames_for_ms(beat_ms);

        let mut builder = ClipBuilder::new(format);
        let mut segments = Vec::with_capacity(total_beats as usize);
        for kind in click_pattern(total_beats, time_signature) {
            let clip = match kind {
                ClickKind::Accent => accent,
                ClickKind::Normal => normal,
            };
            let played = builder.push_clip(clip, beat_frames);
            builder.push_silence(beat_frames - played);

            segments.push(Segment {
                label: kind.name().to_string(),
                source: SegmentSource::Sample,
                requested_ms: beat_ms,
                frames: beat_frames,
            });
        }

        Ok(RenderedBuffer::new(builder.build(), segments))
    }

    /// Builds a click track from a time signature string, falling back to 4/4 if it
    /// can't be parsed.
    pub fn build_from_str(
        &self,
        total_beats: u32,
        tempo: Tempo,
        time_signature: &str,
    ) -> Result<RenderedBuffer, EngineError> {
        self.build(
            total_beats,
            tempo,
            &TimeSignature::parse_or_default(time_signature),
        )
    }
}
