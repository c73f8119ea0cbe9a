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

//! Sequencing and playback engine for a harmonica ear trainer.
//!
//! Licks are lists of tab labels and beat durations. The engine renders them against
//! a key's samples, plays them, and loops a lick against a metronome click track so
//! a learner can play it back.

pub mod audio;
pub mod config;
pub mod error;
pub mod lick;
pub mod metronome;
pub mod player;
pub mod samples;
pub mod sequence;
pub mod transport;
pub mod verify;

#[cfg(test)]
mod testutil;

pub use error::EngineError;
