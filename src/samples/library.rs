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
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::loader::load_directory;
use crate::audio::{AudioClip, ClipFormat};
use crate::sequence::REST;

/// The in-memory samples for one harmonica key.
///
/// Loading a key builds a complete new mapping and then swaps it in, so the library
/// always holds exactly one key's samples or nothing at all.
pub struct SampleLibrary {
    /// The directory holding one `<KEY>_harp` directory per key.
    base_path: PathBuf,
    /// The format every clip is converted to.
    format: ClipFormat,
    /// The currently loaded key, if any.
    key: Option<String>,
    /// The samples of the loaded key, by tab label.
    clips: HashMap<String, AudioClip>,
}

impl SampleLibrary {
    /// Creates an empty library. Nothing is loaded until `load` is called.
    pub fn new(base_path: &Path, format: ClipFormat) -> SampleLibrary {
        SampleLibrary {
            base_path: base_path.to_path_buf(),
            format,
            key: None,
            clips: HashMap::new(),
        }
    }

    /// Creates a library that already holds the given clips.
    pub fn from_clips(
        key: &str,
        format: ClipFormat,
        clips: HashMap<String, AudioClip>,
    ) -> SampleLibrary {
        let clips = clips
            .into_iter()
            .filter(|(label, _)| label != REST)
            .map(|(label, clip)| (label, clip.conform(format)))
            .collect();
        SampleLibrary {
            base_path: PathBuf::new(),
            format,
            key: Some(key.to_uppercase()),
            clips,
        }
    }

    /// Returns the sample directory for the given key.
    pub fn key_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}_harp", key.to_uppercase()))
    }

    /// Loads every sample for the given key, replacing whatever was loaded before.
    /// Returns false, leaving the library empty, if the key has no sample directory.
    pub fn load(&mut self, key: &str) -> bool {
        let key_path = self.key_path(key);
        if !key_path.is_dir() {
            warn!(key, path = ?key_path, "Sample directory not found");
            self.clear();
            return false;
        }

        info!(key, path = ?key_path, "Loading samples");
        let clips = match load_directory(&key_path, self.format) {
            Ok(clips) => clips,
            Err(e) => {
                warn!(key, err = %e, "Unable to read sample directory");
                self.clear();
                return false;
            }
        };

        self.clips = clips;
        self.key = Some(key.to_uppercase());
        info!(key, count = self.clips.len(), "Loaded samples");
        true
    }

    /// Unloads everything.
    pub fn clear(&mut self) {
        self.clips = HashMap::new();
        self.key = None;
    }

    /// Gets the sample for a tab label. Absence is normal and means "play a rest".
    pub fn get(&self, label: &str) -> Option<&AudioClip> {
        if label == REST {
            return None;
        }
        self.clips.get(label)
    }

    /// Returns the currently loaded key.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Returns the format of every clip in the library.
    pub fn format(&self) -> ClipFormat {
        self.format
    }

    /// Returns the base sample directory.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the loaded labels, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: Vec<&str> = self.clips.keys().map(String::as_str).collect();
        labels.sort();
        labels
    }

    /// Returns the number of loaded samples.
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// Returns true if nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl fmt::Debug for SampleLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleLibrary")
            .field("base_path", &self.base_path)
            .field("format", &self.format)
            .field("key", &self.key)
            .field("samples", &self.clips.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::testutil;

    fn format() -> ClipFormat {
        ClipFormat::new(1000, 1).unwrap()
    }

    fn write_key(base: &Path, key: &str, labels: &[&str]) {
        let samples: Vec<(&str, usize, f32)> = labels.iter().map(|label| (*label, 20, 0.5)).collect();
        testutil::write_key(base, key, &samples, 1000).unwrap();
    }

    #[test]
    fn test_new_library_is_empty() {
        let library = SampleLibrary::new(Path::new("/nowhere"), format());
        assert!(library.is_empty());
        assert_eq!(library.key(), None);
        assert!(library.get("-2").is_none());
    }

    #[test]
    fn test_load_key() {
        let dir = tempdir().unwrap();
        write_key(dir.path(), "G", &["-2", "-3_p", "4"]);

        let mut library = SampleLibrary::new(dir.path(), format());
        assert!(library.load("g"));
        assert_eq!(library.key(), Some("G"));
        assert_eq!(library.labels(), vec!["-2", "-3_p", "4"]);
        assert_eq!(library.get("-2").unwrap().frames(), 20);
        assert!(library.get("rest").is_none());
        assert!(library.get("10").is_none());
    }

    #[test]
    fn test_load_replaces_previous_key() {
        let dir = tempdir().unwrap();
        write_key(dir.path(), "G", &["-2", "-3_p"]);
        write_key(dir.path(), "A", &["6"]);

        let mut library = SampleLibrary::new(dir.path(), format());
        assert!(library.load("G"));
        assert!(library.load("A"));
        assert_eq!(library.key(), Some("A"));
        assert_eq!(library.labels(), vec!["6"]);
        assert!(library.get("-2").is_none());
    }

    #[test]
    fn test_load_missing_key_empties_library() {
        let dir = tempdir().unwrap();
        write_key(dir.path(), "G", &["-2"]);

        let mut library = SampleLibrary::new(dir.path(), format());
        assert!(library.load("G"));
        assert!(!library.load("Z"));
        assert!(library.is_empty());
        assert_eq!(library.key(), None);
        for label in ["-2", "rest", "4", ""] {
            assert!(library.get(label).is_none());
        }
    }

    #[test]
    fn test_from_clips_conforms_and_drops_rest() {
        let clips = HashMap::from([
            (
                "-2".to_string(),
                AudioClip::from_interleaved(vec![0.5; 10], ClipFormat::new(500, 1).unwrap()),
            ),
            ("rest".to_string(), AudioClip::silence(format(), 10)),
        ]);
        let library = SampleLibrary::from_clips("c", format(), clips);
        assert_eq!(library.key(), Some("C"));
        assert_eq!(library.len(), 1);
        assert_eq!(library.get("-2").unwrap().format(), format());
        assert_eq!(library.get("-2").unwrap().frames(), 20);
    }
}
