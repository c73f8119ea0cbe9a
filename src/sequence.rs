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

//! Turns a list of note and rest events into a single audio clip.
//!
//! Every event gets a slot of `round(60000 / bpm * beats)` milliseconds. Rests fill
//! their slot with silence. Notes fill it with their sample cut off at the end of the
//! slot; samples are never looped, stretched or padded, so a sample shorter than its
//! slot makes the rendered clip shorter than the requested total.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::audio::{AudioClip, ClipBuilder};
use crate::error::EngineError;
use crate::samples::SampleLibrary;

/// The label that marks a rest. It is never looked up as a sample.
pub const REST: &str = "rest";

/// A single note or rest of a lick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// The tab label of the sample to play, or "rest".
    #[serde(rename = "tab", alias = "label")]
    pub label: String,
    /// The length of the event in quarter-note beats.
    #[serde(rename = "duration", alias = "duration_beats")]
    pub duration_beats: f64,
}

impl NoteEvent {
    /// Creates a new note event.
    pub fn new(label: &str, duration_beats: f64) -> NoteEvent {
        NoteEvent {
            label: label.to_string(),
            duration_beats,
        }
    }

    /// Creates a new rest.
    pub fn rest(duration_beats: f64) -> NoteEvent {
        NoteEvent::new(REST, duration_beats)
    }

    /// Returns true if the event is a rest.
    pub fn is_rest(&self) -> bool {
        self.label == REST
    }

    /// Fails if the duration isn't a positive number of beats.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.duration_beats.is_finite() && self.duration_beats > 0.0 {
            Ok(())
        } else {
            Err(EngineError::InvalidDuration {
                label: self.label.clone(),
                beats: self.duration_beats,
            })
        }
    }
}

/// Returns the summed length of the events in beats.
pub fn total_beats(events: &[NoteEvent]) -> f64 {
    events.iter().map(|event| event.duration_beats).sum()
}

/// The longest slot a single event or beat may render to.
pub const MAX_SLOT_MS: u64 = 10 * 60 * 1000;

/// A tempo in beats per minute. Any positive tempo is accepted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tempo(f64);

impl Tempo {
    /// Creates a new tempo, failing on zero, negative or non-finite values.
    pub fn new(bpm: f64) -> Result<Tempo, EngineError> {
        if bpm.is_finite() && bpm > 0.0 {
            Ok(Tempo(bpm))
        } else {
            Err(EngineError::InvalidTempo(bpm))
        }
    }

    /// Returns the tempo in beats per minute.
    pub fn bpm(&self) -> f64 {
        self.0
    }

    /// Returns the length of a quarter note in milliseconds.
    pub fn quarter_note_ms(&self) -> f64 {
        60000.0 / self.0
    }

    /// Returns the length of the given number of beats in whole milliseconds.
    pub fn duration_ms(&self, beats: f64) -> u64 {
        (self.quarter_note_ms() * beats).round() as u64
    }

    /// Returns the slot length of the given number of beats, failing if it's longer
    /// than [MAX_SLOT_MS].
    pub fn slot_ms(&self, label: &str, beats: f64) -> Result<u64, EngineError> {
        let ms = self.duration_ms(beats);
        if ms > MAX_SLOT_MS {
            return Err(EngineError::SlotTooLong {
                label: label.to_string(),
                ms,
                max_ms: MAX_SLOT_MS,
            });
        }
        Ok(ms)
    }
}

impl fmt::Display for Tempo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} BPM", self.0)
    }
}

/// What to do with a note whose sample isn't loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingSamplePolicy {
    /// Play the note as a rest of the same length.
    #[default]
    Rest,
    /// Fail the render. Useful for checking lick files.
    Strict,
}

/// Where the audio of a segment came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentSource {
    Sample,
    Rest,
    MissingSample,
}

/// One rendered event.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// The label of the event.
    pub label: String,
    /// Where the audio came from.
    pub source: SegmentSource,
    /// The slot length the event asked for.
    pub requested_ms: u64,
    /// The number of frames actually rendered.
    pub frames: usize,
}

/// The result of a render. Never cached: a new tempo or key means a new render.
#[derive(Debug, Clone)]
pub struct RenderedBuffer {
    clip: AudioClip,
    segments: Vec<Segment>,
    requested_ms: u64,
}

impl RenderedBuffer {
    /// Assembles a rendered buffer.
    pub(crate) fn new(clip: AudioClip, segments: Vec<Segment>) -> RenderedBuffer {
        let requested_ms = segments.iter().map(|segment| segment.requested_ms).sum();
        RenderedBuffer {
            clip,
            segments,
            requested_ms,
        }
    }

    /// Returns the rendered audio.
    pub fn clip(&self) -> &AudioClip {
        &self.clip
    }

    /// Consumes the buffer, returning the rendered audio.
    pub fn into_clip(self) -> AudioClip {
        self.clip
    }

    /// Returns the per-event segments, in order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the sum of the requested slot lengths in milliseconds.
    pub fn requested_ms(&self) -> u64 {
        self.requested_ms
    }

    /// Returns the length of the rendered audio, which is shorter than the requested
    /// length when samples were shorter than their slots.
    pub fn duration(&self) -> Duration {
        self.clip.duration()
    }
}

/// Renders note events against a sample library.
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceRenderer {
    policy: MissingSamplePolicy,
}

impl SequenceRenderer {
    /// Creates a renderer with the given missing sample policy.
    pub fn new(policy: MissingSamplePolicy) -> SequenceRenderer {
        SequenceRenderer { policy }
    }

    /// Returns the missing sample policy.
    pub fn policy(&self) -> MissingSamplePolicy {
        self.policy
    }

    /// Renders the events, in order, into one clip in the library's format.
    pub fn render(
        &self,
        library: &SampleLibrary,
        events: &[NoteEvent],
        tempo: Tempo,
    ) -> Result<RenderedBuffer, EngineError> {
        let format = library.format();
        let mut builder = ClipBuilder::new(format);
        let mut segments = Vec::with_capacity(events.len());

        for event in events {
            event.validate()?;
            let requested_ms = tempo.slot_ms(&event.label, event.duration_beats)?;
            let slot = format.frames_for_ms(requested_ms);

            let (source, frames) = if event.is_rest() {
                (SegmentSource::Rest, builder.push_silence(slot))
            } else {
                match library.get(&event.label) {
                    Some(clip) => (SegmentSource::Sample, builder.push_clip(clip, slot)),
                    None => match self.policy {
                        MissingSamplePolicy::Rest => {
                            warn!(
                                tab = %event.label,
                                key = library.key().unwrap_or("none"),
                                "Sample not found, treating as a rest"
                            );
                            (SegmentSource::MissingSample, builder.push_silence(slot))
                        }
                        MissingSamplePolicy::Strict => {
                            return Err(EngineError::MissingSample(event.label.clone()))
                        }
                    },
                }
            };

            segments.push(Segment {
                label: event.label.clone(),
                source,
                requested_ms,
                frames,
            });
        }

        Ok(RenderedBuffer::new(builder.build(), segments))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::audio::ClipFormat;

    fn format() -> ClipFormat {
        ClipFormat::new(1000, 1).unwrap()
    }

    /// A library where every sample is a constant level so segments are easy to spot.
    fn library(samples: &[(&str, usize, f32)]) -> SampleLibrary {
        let clips = samples
            .iter()
            .map(|(label, frames, level)| {
                (
                    label.to_string(),
                    AudioClip::from_interleaved(vec![*level; *frames], format()),
                )
            })
            .collect::<HashMap<_, _>>();
        SampleLibrary::from_clips("G", format(), clips)
    }

    #[test]
    fn test_tempo_validation() {
        assert!(matches!(Tempo::new(0.0), Err(EngineError::InvalidTempo(_))));
        assert!(matches!(Tempo::new(-60.0), Err(EngineError::InvalidTempo(_))));
        assert!(Tempo::new(f64::NAN).is_err());
        assert!(Tempo::new(f64::INFINITY).is_err());

        // Outside of what a UI would offer, but still valid.
        assert!(Tempo::new(1.0).is_ok());
        assert!(Tempo::new(500.0).is_ok());
        assert!(Tempo::new(0.5).is_ok());
    }

    #[test]
    fn test_slot_ms_limit() {
        let tempo = Tempo::new(1.0).unwrap();
        assert_eq!(tempo.slot_ms("-2", 10.0).unwrap(), MAX_SLOT_MS);
        assert!(matches!(
            tempo.slot_ms("-2", 11.0),
            Err(EngineError::SlotTooLong { ms: 660000, .. })
        ));

        // Far too slow to render, and far past what fits in a u64 of milliseconds.
        assert!(Tempo::new(1e-12).unwrap().slot_ms("rest", 1.0).is_err());
        assert_eq!(Tempo::new(1e-300).unwrap().duration_ms(1.0), u64::MAX);
        assert!(Tempo::new(1e-300).unwrap().slot_ms("rest", 1.0).is_err());
    }

    #[test]
    fn test_tempo_durations() {
        let tempo = Tempo::new(120.0).unwrap();
        assert_eq!(tempo.quarter_note_ms(), 500.0);
        assert_eq!(tempo.duration_ms(1.0), 500);
        assert_eq!(tempo.duration_ms(0.5), 250);

        // 60000 / 90 * 1/3 = 222.2 rounds down.
        let tempo = Tempo::new(90.0).unwrap();
        assert_eq!(tempo.duration_ms(1.0 / 3.0), 222);
        assert_eq!(tempo.duration_ms(0.75), 500);

        // 60000 / 70 = 857.14, * 1.5 = 1285.7 rounds up.
        let tempo = Tempo::new(70.0).unwrap();
        assert_eq!(tempo.duration_ms(1.5), 1286);
    }

    #[test]
    fn test_render_scenario() {
        // The -3' sample is shorter than its slot.
        let library = library(&[("-2", 2000, 0.5), ("-3'", 100, -0.5)]);
        let events = vec![
            NoteEvent::new("-2", 1.0),
            NoteEvent::rest(0.5),
            NoteEvent::new("-3'", 0.5),
        ];

        let rendered = SequenceRenderer::default()
            .render(&library, &events, Tempo::new(120.0).unwrap())
            .unwrap();

        let requested: Vec<u64> = rendered.segments().iter().map(|s| s.requested_ms).collect();
        assert_eq!(requested, vec![500, 250, 250]);
        assert_eq!(rendered.requested_ms(), 1000);

        let frames: Vec<usize> = rendered.segments().iter().map(|s| s.frames).collect();
        assert_eq!(frames, vec![500, 250, 100]);
        assert_eq!(rendered.duration(), Duration::from_millis(850));

        let samples = rendered.clip().samples();
        assert!(samples[..500].iter().all(|s| *s == 0.5));
        assert!(samples[500..750].iter().all(|s| *s == 0.0));
        assert!(samples[750..].iter().all(|s| *s == -0.5));
    }

    #[test]
    fn test_render_all_rests_is_silence() {
        let library = library(&[("-2", 2000, 0.5)]);
        let events = vec![NoteEvent::rest(1.0), NoteEvent::rest(0.25), NoteEvent::rest(2.0)];
        let tempo = Tempo::new(100.0).unwrap();

        let rendered = SequenceRenderer::default()
            .render(&library, &events, tempo)
            .unwrap();

        let expected_ms: u64 = events.iter().map(|e| tempo.duration_ms(e.duration_beats)).sum();
        assert_eq!(rendered.requested_ms(), expected_ms);
        assert_eq!(rendered.clip().frames(), expected_ms as usize);
        assert!(rendered.clip().samples().iter().all(|s| *s == 0.0));
        assert!(rendered
            .segments()
            .iter()
            .all(|s| s.source == SegmentSource::Rest));
    }

    #[test]
    fn test_render_rests_without_any_samples() {
        let library = SampleLibrary::from_clips("G", format(), HashMap::new());
        let rendered = SequenceRenderer::default()
            .render(&library, &[NoteEvent::rest(1.0)], Tempo::new(60.0).unwrap())
            .unwrap();
        assert_eq!(rendered.clip().frames(), 1000);
    }

    #[test]
    fn test_missing_sample_renders_like_rest() {
        let library = library(&[("-2", 2000, 0.5)]);
        let tempo = Tempo::new(132.0).unwrap();
        let renderer = SequenceRenderer::default();

        let with_missing = renderer
            .render(
                &library,
                &[NoteEvent::new("-2", 1.0), NoteEvent::new("-7_pp", 1.5)],
                tempo,
            )
            .unwrap();
        let with_rest = renderer
            .render(
                &library,
                &[NoteEvent::new("-2", 1.0), NoteEvent::rest(1.5)],
                tempo,
            )
            .unwrap();

        assert_eq!(with_missing.clip(), with_rest.clip());
        assert_eq!(with_missing.requested_ms(), with_rest.requested_ms());
        assert_eq!(
            with_missing.segments()[1].source,
            SegmentSource::MissingSample
        );
    }

    #[test]
    fn test_strict_policy_rejects_missing_sample() {
        let library = library(&[("-2", 2000, 0.5)]);
        let renderer = SequenceRenderer::new(MissingSamplePolicy::Strict);

        let result = renderer.render(
            &library,
            &[NoteEvent::new("-2", 1.0), NoteEvent::new("11", 1.0)],
            Tempo::new(120.0).unwrap(),
        );
        assert!(matches!(result, Err(EngineError::MissingSample(label)) if label == "11"));

        // Rests are still fine.
        assert!(renderer
            .render(&library, &[NoteEvent::rest(1.0)], Tempo::new(120.0).unwrap())
            .is_ok());
    }

    #[test]
    fn test_render_rejects_bad_durations() {
        let library = library(&[("-2", 2000, 0.5)]);
        let renderer = SequenceRenderer::default();
        let tempo = Tempo::new(120.0).unwrap();

        for beats in [0.0, -1.0, f64::NAN] {
            let result = renderer.render(&library, &[NoteEvent::new("-2", beats)], tempo);
            assert!(matches!(result, Err(EngineError::InvalidDuration { .. })));
        }
    }

    #[test]
    fn test_render_rejects_overlong_slots() {
        let library = library(&[("-2", 2000, 0.5)]);
        let renderer = SequenceRenderer::default();

        // Ten minutes fits, one more beat doesn't.
        let rendered = renderer
            .render(&library, &[NoteEvent::rest(10.0)], Tempo::new(1.0).unwrap())
            .unwrap();
        assert_eq!(rendered.requested_ms(), MAX_SLOT_MS);

        let result = renderer.render(
            &library,
            &[NoteEvent::new("-2", 11.0)],
            Tempo::new(1.0).unwrap(),
        );
        assert!(matches!(
            result,
            Err(EngineError::SlotTooLong { ref label, ms: 660000, .. }) if label == "-2"
        ));

        let result = renderer.render(
            &library,
            &[NoteEvent::rest(1e300)],
            Tempo::new(120.0).unwrap(),
        );
        assert!(matches!(result, Err(EngineError::SlotTooLong { .. })));

        let result = renderer.render(&library, &[NoteEvent::rest(1.0)], Tempo::new(1e-12).unwrap());
        assert!(matches!(result, Err(EngineError::SlotTooLong { .. })));
    }

    #[test]
    fn test_render_does_not_touch_library_clips() {
        let library = library(&[("-2", 2000, 0.5)]);
        SequenceRenderer::default()
            .render(&library, &[NoteEvent::new("-2", 0.1)], Tempo::new(120.0).unwrap())
            .unwrap();
        assert_eq!(library.get("-2").unwrap().frames(), 2000);
    }

    #[test]
    fn test_empty_events() {
        let library = library(&[]);
        let rendered = SequenceRenderer::default()
            .render(&library, &[], Tempo::new(120.0).unwrap())
            .unwrap();
        assert!(rendered.clip().is_empty());
        assert_eq!(rendered.requested_ms(), 0);
    }

    #[test]
    fn test_note_event_json() {
        let event: NoteEvent = serde_json::from_str(r#"{"tab": "-3_p", "duration": 0.5}"#).unwrap();
        assert_eq!(event, NoteEvent::new("-3_p", 0.5));

        let event: NoteEvent =
            serde_json::from_str(r#"{"label": "rest", "duration_beats": 1}"#).unwrap();
        assert!(event.is_rest());
        assert_eq!(event.duration_beats, 1.0);
    }

    #[test]
    fn test_total_beats() {
        let events = vec![
            NoteEvent::new("-2", 1.0),
            NoteEvent::rest(0.5),
            NoteEvent::new("4", 1.5),
        ];
        assert_eq!(total_beats(&events), 3.0);
    }
}
