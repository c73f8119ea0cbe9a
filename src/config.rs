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
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use config::{Config, File};
use parking_lot::RwLock;
use tracing::{info, warn};

use crate::metronome::{ClickSounds, MetronomeClickTrack};
use crate::samples::SampleLibrary;
use crate::sequence::SequenceRenderer;
use crate::transport::PlaybackTransport;

mod audio;
mod error;
mod trainer;

pub use audio::Audio;
pub use error::ConfigError;
pub use trainer::{Clicks, Trainer};

/// Loads the trainer configuration from a YAML file. Relative paths inside the file
/// are resolved against the file's directory.
pub fn load_trainer(path: &Path) -> Result<Trainer, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }

    let mut trainer: Trainer = Config::builder()
        .add_source(File::from(path))
        .build()?
        .try_deserialize()?;

    if let Some(base) = path.parent() {
        trainer.resolve_relative_to(base);
    }

    info!(
        path = %path.display(),
        key = trainer.key(),
        bpm = trainer.bpm(),
        device = trainer.audio().device(),
        "Loaded trainer configuration"
    );
    Ok(trainer)
}

/// The engine pieces a trainer configuration describes.
pub struct Engine {
    pub library: Arc<RwLock<SampleLibrary>>,
    pub transport: PlaybackTransport,
    pub metronome: Arc<MetronomeClickTrack>,
}

/// Opens the configured device, loads the given key's samples and the metronome
/// clicks. A key without samples isn't an error: the library is left empty.
pub fn init_engine(trainer: &Trainer, key: &str) -> Result<Engine, Box<dyn Error>> {
    let format = trainer.audio().clip_format()?;
    let device = crate::audio::get_device(trainer.audio())?;
    let samples_path = trainer.samples_path();

    let mut library = SampleLibrary::new(&samples_path, format);
    if !library.load(key) {
        warn!(key, "No samples loaded, everything will play as rests");
    }

    let clicks = trainer.clicks();
    let mut sounds = ClickSounds::load(&samples_path, clicks.accent(), clicks.normal(), format);
    if clicks.synthesize() && !sounds.is_complete() {
        info!("Generating missing metronome clicks");
        sounds = sounds.or_synthesized();
    }

    let library = Arc::new(RwLock::new(library));
    let transport = PlaybackTransport::new(
        library.clone(),
        device,
        SequenceRenderer::new(trainer.missing_samples()),
    );

    Ok(Engine {
        library,
        transport,
        metronome: Arc::new(MetronomeClickTrack::new(sounds)),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_load_trainer() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trainer.yaml");
        fs::write(&path, "key: D\nbpm: 80\naudio:\n  device: mock-device\n").unwrap();

        let trainer = load_trainer(&path).unwrap();
        assert_eq!(trainer.key(), "D");
        assert_eq!(trainer.bpm(), 80.0);
        assert_eq!(trainer.samples_path(), dir.path().join("audio_samples"));
    }

    #[test]
    fn test_load_trainer_missing_file() {
        let dir = tempdir().unwrap();
        let result = load_trainer(&dir.path().join("missing.yaml"));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_init_engine() {
        let dir = tempdir().unwrap();
        crate::testutil::write_key(
            &dir.path().join("audio_samples"),
            "G",
            &[("-2", 10, 0.5), ("4", 10, 0.5)],
            44100,
        )
        .unwrap();
        let path = dir.path().join("trainer.yaml");
        fs::write(
            &path,
            "audio:\n  device: mock-device\nclicks:\n  synthesize: true\n",
        )
        .unwrap();

        let trainer = load_trainer(&path).unwrap();
        let engine = init_engine(&trainer, trainer.key()).unwrap();
        assert_eq!(engine.library.read().labels(), vec!["-2", "4"]);
        assert!(engine.metronome.is_ready());
        assert_eq!(
            engine.transport.device().to_string(),
            "mock-device (Mock)"
        );

        // An unknown key leaves the library empty and the clicks missing without
        // synthesis.
        fs::write(&path, "key: Z\naudio:\n  device: mock-device\n").unwrap();
        let trainer = load_trainer(&path).unwrap();
        let engine = init_engine(&trainer, trainer.key()).unwrap();
        assert!(engine.library.read().is_empty());
        assert!(!engine.metronome.is_ready());
    }

    #[test]
    fn test_load_trainer_bad_yaml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("trainer.yaml");
        fs::write(&path, "bpm: [fast").unwrap();
        assert!(matches!(load_trainer(&path), Err(ConfigError::Load(_))));
    }
}
