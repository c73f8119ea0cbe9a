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
use crate::audio::AudioError;

/// Errors raised by the sequencing and playback engine. Missing data never shows up
/// here unless strict rendering was asked for; it degrades to silence instead.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid tempo {0}: must be a positive number of beats per minute")]
    InvalidTempo(f64),

    #[error("Invalid duration {beats} for '{label}': must be a positive number of beats")]
    InvalidDuration { label: String, beats: f64 },

    #[error("'{label}' would last {ms}ms at this tempo, longer than the {max_ms}ms limit")]
    SlotTooLong { label: String, ms: u64, max_ms: u64 },

    #[error("Invalid time signature '{0}': expected N/D")]
    InvalidTimeSignature(String),

    #[error("No sample loaded for tab '{0}'")]
    MissingSample(String),

    #[error("The {0} metronome click is not loaded")]
    MissingClick(&'static str),

    #[error("Nothing to play: the sequence has no events")]
    EmptySequence,

    #[error("Unable to start the call and response worker: {0}")]
    Worker(std::io::Error),

    #[error(transparent)]
    Audio(#[from] AudioError),
}
