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

//! Licks and the JSON lick book they're stored in.

use std::fs;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::metronome::TimeSignature;
use crate::sequence::{total_beats, NoteEvent};

/// The time signature of a lick that doesn't name one.
pub const DEFAULT_TIME_SIGNATURE: &str = "4/4";

/// The register that matches licks of every register.
const ALL_REGISTERS: &str = "all";

#[derive(Debug, thiserror::Error)]
pub enum LickError {
    #[error("Lick file {0} not found")]
    NotFound(PathBuf),

    #[error("Unable to read lick file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to parse lick file: {0}")]
    Json(#[from] serde_json::Error),
}

/// A short phrase to play and echo back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lick {
    #[serde(default)]
    pub name: String,
    /// A coarse pitch range, such as low, middle or high.
    #[serde(default)]
    pub register: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<String>,
    #[serde(default)]
    pub lick_data: Vec<NoteEvent>,
}

impl Lick {
    /// Returns the time signature as written, or 4/4 if there isn't one.
    pub fn time_signature_str(&self) -> &str {
        self.time_signature
            .as_deref()
            .unwrap_or(DEFAULT_TIME_SIGNATURE)
    }

    /// Returns the parsed time signature. A malformed one falls back to 4/4.
    pub fn time_signature(&self) -> TimeSignature {
        TimeSignature::parse_or_default(self.time_signature_str())
    }

    /// Returns the note events.
    pub fn events(&self) -> &[NoteEvent] {
        &self.lick_data
    }

    /// Returns the length of the lick in beats.
    pub fn total_beats(&self) -> f64 {
        total_beats(&self.lick_data)
    }

    /// Returns the tabs of the lick in display form, rests included.
    pub fn display_tabs(&self) -> Vec<String> {
        self.lick_data
            .iter()
            .map(|event| display_tab(&event.label))
            .collect()
    }
}

/// Turns a file-safe tab name into its display form: `_p` marks a half step bend
/// and becomes `'`, `_pp` a whole step bend and becomes `''`.
pub fn display_tab(tab: &str) -> String {
    if tab.contains("_pp") {
        tab.replace("_pp", "''")
    } else if tab.contains("_p") {
        tab.replace("_p", "'")
    } else {
        tab.to_string()
    }
}

#[derive(Deserialize)]
struct LickFile {
    #[serde(default)]
    licks: Vec<Lick>,
}

/// A collection of licks.
#[derive(Debug, Clone, Default)]
pub struct LickBook {
    licks: Vec<Lick>,
}

impl LickBook {
    /// Creates a lick book from licks in memory.
    pub fn new(licks: Vec<Lick>) -> LickBook {
        LickBook { licks }
    }

    /// Loads a lick book from a JSON file of the form `{"licks": [...]}`.
    pub fn load(path: &Path) -> Result<LickBook, LickError> {
        if !path.exists() {
            return Err(LickError::NotFound(path.to_path_buf()));
        }
        let book = LickBook::parse(&fs::read_to_string(path)?)?;
        info!(path = ?path, licks = book.len(), "Loaded licks");
        Ok(book)
    }

    /// Parses a lick book from JSON.
    pub fn parse(json: &str) -> Result<LickBook, LickError> {
        let file: LickFile = serde_json::from_str(json)?;
        Ok(LickBook { licks: file.licks })
    }

    /// Returns every lick.
    pub fn all(&self) -> &[Lick] {
        &self.licks
    }

    /// Finds a lick by name.
    pub fn find(&self, name: &str) -> Option<&Lick> {
        self.licks.iter().find(|lick| lick.name == name)
    }

    /// Picks a random lick.
    pub fn random(&self) -> Option<&Lick> {
        self.random_with(&mut rand::thread_rng())
    }

    /// Picks a random lick with the given random number generator.
    pub fn random_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&Lick> {
        self.licks.choose(rng)
    }

    /// Picks a random lick of the given register. The register "all" matches
    /// everything.
    pub fn random_in_register(&self, register: &str) -> Option<&Lick> {
        self.random_in_register_with(register, &mut rand::thread_rng())
    }

    /// Picks a random lick of the given register with the given random number
    /// generator.
    pub fn random_in_register_with<R: Rng + ?Sized>(
        &self,
        register: &str,
        rng: &mut R,
    ) -> Option<&Lick> {
        if register.eq_ignore_ascii_case(ALL_REGISTERS) {
            return self.random_with(rng);
        }
        let matching: Vec<&Lick> = self
            .licks
            .iter()
            .filter(|lick| lick.register.eq_ignore_ascii_case(register))
            .collect();
        matching.choose(rng).copied()
    }

    pub fn len(&self) -> usize {
        self.licks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.licks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    const LICKS: &str = r#"{
        "licks": [
            {
                "name": "Blues Shuffle",
                "register": "low",
                "time_signature": "4/4",
                "lick_data": [
                    {"tab": "-2", "duration": 1.0},
                    {"tab": "rest", "duration": 0.5},
                    {"tab": "-3_p", "duration": 0.5}
                ]
            },
            {
                "name": "Waltz",
                "register": "middle",
                "time_signature": "3/4",
                "lick_data": [
                    {"tab": "4", "duration": 1.0},
                    {"tab": "-4", "duration": 2.0}
                ]
            },
            {
                "name": "Bend",
                "register": "Low",
                "lick_data": [
                    {"tab": "-2_pp", "duration": 1.5}
                ]
            }
        ]
    }"#;

    #[test]
    fn test_parse() {
        let book = LickBook::parse(LICKS).unwrap();
        assert_eq!(book.len(), 3);

        let shuffle = book.find("Blues Shuffle").unwrap();
        assert_eq!(shuffle.register, "low");
        assert_eq!(shuffle.lick_data[2], NoteEvent::new("-3_p", 0.5));
        assert_eq!(shuffle.total_beats(), 2.0);
        assert_eq!(shuffle.time_signature(), TimeSignature::default());

        let waltz = book.find("Waltz").unwrap();
        assert_eq!(waltz.time_signature().beats_per_measure, 3);
    }

    #[test]
    fn test_missing_time_signature() {
        let book = LickBook::parse(LICKS).unwrap();
        let bend = book.find("Bend").unwrap();
        assert_eq!(bend.time_signature, None);
        assert_eq!(bend.time_signature_str(), "4/4");
        assert_eq!(bend.time_signature(), TimeSignature::default());
    }

    #[test]
    fn test_display_tab() {
        assert_eq!(display_tab("-3_p"), "-3'");
        assert_eq!(display_tab("-2_pp"), "-2''");
        assert_eq!(display_tab("4"), "4");
        assert_eq!(display_tab("rest"), "rest");

        let book = LickBook::parse(LICKS).unwrap();
        assert_eq!(
            book.find("Blues Shuffle").unwrap().display_tabs(),
            vec!["-2", "rest", "-3'"]
        );
    }

    #[test]
    fn test_random_in_register() {
        let book = LickBook::parse(LICKS).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let lick = book.random_in_register_with("LOW", &mut rng).unwrap();
            assert!(lick.name == "Blues Shuffle" || lick.name == "Bend");
            assert_eq!(
                book.random_in_register_with("middle", &mut rng).unwrap().name,
                "Waltz"
            );
        }
        assert!(book.random_in_register_with("high", &mut rng).is_none());
        assert!(book.random_in_register_with("all", &mut rng).is_some());
    }

    #[test]
    fn test_empty_book() {
        let book = LickBook::parse("{}").unwrap();
        assert!(book.is_empty());
        assert!(book.random().is_none());
        assert!(book.random_in_register("low").is_none());
    }

    #[test]
    fn test_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("licks.json");
        assert!(matches!(LickBook::load(&path), Err(LickError::NotFound(_))));

        fs::write(&path, "{not json").unwrap();
        assert!(matches!(LickBook::load(&path), Err(LickError::Json(_))));

        fs::write(&path, LICKS).unwrap();
        assert_eq!(LickBook::load(&path).unwrap().len(), 3);
    }
}
