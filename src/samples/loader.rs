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

//! Decodes a directory of samples into memory.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::audio::{decode::decode_file, AudioClip, AudioError, ClipFormat};
use crate::sequence::REST;

/// The extension sample files must have to be picked up.
const SAMPLE_EXTENSION: &str = "wav";

/// Lists the sample files in a directory along with the label each one is stored
/// under (the file stem). The reserved rest label is never listed.
pub fn sample_files(dir: &Path) -> Result<Vec<(String, PathBuf)>, AudioError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file()
            || !path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(SAMPLE_EXTENSION))
        {
            continue;
        }

        let Some(label) = path.file_stem().and_then(|stem| stem.to_str()) else {
            warn!(path = ?path, "Skipping sample with unreadable file name");
            continue;
        };
        if label == REST {
            warn!(path = ?path, "Skipping sample named after the reserved rest label");
            continue;
        }
        let label = label.to_string();
        files.push((label, path));
    }

    files.sort();
    Ok(files)
}

/// Decodes every sample in the directory in parallel. Samples that fail to decode
/// are skipped so that one bad file doesn't take down a whole key.
pub fn load_directory(
    dir: &Path,
    format: ClipFormat,
) -> Result<HashMap<String, AudioClip>, AudioError> {
    let files = sample_files(dir)?;

    let clips = files
        .into_par_iter()
        .filter_map(|(label, path)| match decode_file(&path, format) {
            Ok(clip) => {
                debug!(label = %label, frames = clip.frames(), "Loaded sample");
                Some((label, clip))
            }
            Err(e) => {
                warn!(path = ?path, err = %e, "Failed to load sample");
                None
            }
        })
        .collect();

    Ok(clips)
}
