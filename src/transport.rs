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
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, span, warn, Level};

use crate::audio::Device;
use crate::error::EngineError;
use crate::samples::SampleLibrary;
use crate::sequence::{NoteEvent, RenderedBuffer, SequenceRenderer, Tempo};

/// The result of a one-shot playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The events were rendered and played to completion.
    Played,
    /// Nothing was played because no key is loaded.
    NothingLoaded,
}

/// Renders note events and plays them, blocking until the device is done.
#[derive(Clone)]
pub struct PlaybackTransport {
    library: Arc<RwLock<SampleLibrary>>,
    device: Arc<dyn Device>,
    renderer: SequenceRenderer,
}

impl PlaybackTransport {
    /// Creates a new transport.
    pub fn new(
        library: Arc<RwLock<SampleLibrary>>,
        device: Arc<dyn Device>,
        renderer: SequenceRenderer,
    ) -> PlaybackTransport {
        PlaybackTransport {
            library,
            device,
            renderer,
        }
    }

    /// Returns the shared sample library.
    pub fn library(&self) -> &Arc<RwLock<SampleLibrary>> {
        &self.library
    }

    /// Returns the output device.
    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Renders the events. The library is only locked while rendering.
    pub fn render(&self, events: &[NoteEvent], tempo: Tempo) -> Result<RenderedBuffer, EngineError> {
        let library = self.library.read();
        self.renderer.render(&library, events, tempo)
    }

    /// Renders and plays the events. An empty library is a normal state, not an
    /// error: it's logged and nothing is played.
    pub fn play(&self, events: &[NoteEvent], bpm: f64) -> Result<PlayOutcome, EngineError> {
        let span = span!(Level::INFO, "transport", device = %self.device);
        let _enter = span.enter();

        let tempo = Tempo::new(bpm)?;
        // The emptiness check and the render have to see the same key.
        let rendered = {
            let library = self.library.read();
            if library.is_empty() {
                warn!("No samples loaded, not playing anything");
                return Ok(PlayOutcome::NothingLoaded);
            }
            self.renderer.render(&library, events, tempo)?
        };
        info!(
            events = events.len(),
            tempo = %tempo,
            duration = ?rendered.duration(),
            "Playing"
        );
        self.play_rendered(&rendered)?;
        Ok(PlayOutcome::Played)
    }

    /// Plays an already rendered buffer.
    pub fn play_rendered(&self, rendered: &RenderedBuffer) -> Result<(), EngineError> {
        if rendered.clip().is_empty() {
            return Ok(());
        }
        Ok(self.device.play(rendered.clip())?)
    }
}
