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

//! Immutable in-memory audio clips.
//!
//! A clip is decoded once and then shared between every render that uses it, so
//! nothing here mutates a clip in place. Truncation, concatenation and format
//! conversion all produce new clips.

use std::{fmt, sync::Arc, time::Duration};

use super::format::ClipFormat;

/// A decoded audio buffer. The sample data is interleaved f32 and stored in an Arc so
/// that cloning a clip never copies audio.
#[derive(Clone, PartialEq)]
pub struct AudioClip {
    data: Arc<Vec<f32>>,
    format: ClipFormat,
}

impl AudioClip {
    /// Creates a clip from interleaved samples. Any trailing partial frame is dropped.
    pub fn from_interleaved(mut samples: Vec<f32>, format: ClipFormat) -> AudioClip {
        let channels = format.channels as usize;
        samples.truncate(samples.len() - samples.len() % channels);
        AudioClip {
            data: Arc::new(samples),
            format,
        }
    }

    /// Creates a clip of digital silence.
    pub fn silence(format: ClipFormat, frames: usize) -> AudioClip {
        AudioClip {
            data: Arc::new(vec![0.0; frames * format.channels as usize]),
            format,
        }
    }

    /// Returns the format of the clip.
    pub fn format(&self) -> ClipFormat {
        self.format
    }

    /// Returns the interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.data.len() / self.format.channels as usize
    }

    /// Returns the playing time of the clip.
    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.frames())
    }

    /// Returns true if the clip holds no audio.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the interleaved samples of the first `frames` frames, or the whole clip
    /// if it is shorter.
    pub fn head(&self, frames: usize) -> &[f32] {
        let end = frames.min(self.frames()) * self.format.channels as usize;
        &self.data[..end]
    }

    /// Returns a new clip holding at most `frames` frames of this one. Never pads.
    pub fn truncated(&self, frames: usize) -> AudioClip {
        if frames >= self.frames() {
            return self.clone();
        }
        AudioClip {
            data: Arc::new(self.head(frames).to_vec()),
            format: self.format,
        }
    }

    /// Returns a copy of this clip converted to the given format. Sample rate conversion
    /// uses linear interpolation, which is plenty for short one-shot samples.
    pub fn conform(&self, target: ClipFormat) -> AudioClip {
        if self.format == target {
            return self.clone();
        }

        let remixed = remix_channels(&self.data, self.format.channels, target.channels);
        let resampled = if self.format.sample_rate != target.sample_rate {
            resample_linear(
                &remixed,
                target.channels,
                self.format.sample_rate,
                target.sample_rate,
            )
        } else {
            remixed
        };

        AudioClip::from_interleaved(resampled, target)
    }
}

impl fmt::Debug for AudioClip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioClip")
            .field("format", &self.format)
            .field("frames", &self.frames())
            .finish()
    }
}

/// Concatenates clip slices and silence into a single new clip.
pub struct ClipBuilder {
    samples: Vec<f32>,
    format: ClipFormat,
}

impl ClipBuilder {
    /// Creates an empty builder for the given format.
    pub fn new(format: ClipFormat) -> ClipBuilder {
        ClipBuilder {
            samples: Vec::new(),
            format,
        }
    }

    /// Appends at most `max_frames` frames of the clip and returns the number of frames
    /// appended. The clip must already be in the builder's format.
    pub fn push_clip(&mut self, clip: &AudioClip, max_frames: usize) -> usize {
        debug_assert_eq!(clip.format(), self.format, "clip format mismatch");
        let head = clip.head(max_frames);
        self.samples.extend_from_slice(head);
        head.len() / self.format.channels as usize
    }

    /// Appends the given number of frames of silence.
    pub fn push_silence(&mut self, frames: usize) -> usize {
        let new_len = self.samples.len() + frames * self.format.channels as usize;
        self.samples.resize(new_len, 0.0);
        frames
    }

    /// Returns the number of frames appended so far.
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels as usize
    }

    /// Finishes the builder and returns the concatenated clip.
    pub fn build(self) -> AudioClip {
        AudioClip::from_interleaved(self.samples, self.format)
    }
}

/// Converts interleaved samples between channel counts. Mono is copied to every output
/// channel, anything else is averaged down to mono first.
fn remix_channels(samples: &[f32], from: u16, to: u16) -> Vec<f32> {
    if from == to {
        return samples.to_vec();
    }

    let from = from as usize;
    let to = to as usize;
    let frames = samples.len() / from;
    let mut output = Vec::with_capacity(frames * to);
    for frame in samples.chunks_exact(from) {
        let mono = frame.iter().sum::<f32>() / from as f32;
        output.extend(std::iter::repeat(mono).take(to));
    }
    output
}

/// Resamples interleaved samples from one sample rate to another using linear interpolation.
fn resample_linear(samples: &[f32], channels: u16, source_rate: u32, target_rate: u32) -> Vec<f32> {
    let ratio = target_rate as f64 / source_rate as f64;
    let channels = channels as usize;
    let source_frames = samples.len() / channels;
    let target_frames = (source_frames as f64 * ratio).ceil() as usize;

    let mut output = Vec::with_capacity(target_frames * channels);

    for target_frame in 0..target_frames {
        let source_pos = target_frame as f64 / ratio;
        let source_frame = source_pos.floor() as usize;
        let frac = source_pos.fract() as f32;

        for channel in 0..channels {
            let idx0 = source_frame * channels + channel;
            let idx1 = (source_frame + 1) * channels + channel;

            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);

            output.push(s0 + (s1 - s0) * frac);
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono(rate: u32) -> ClipFormat {
        ClipFormat::new(rate, 1).unwrap()
    }

    #[test]
    fn test_truncated_never_pads() {
        let clip = AudioClip::from_interleaved(vec![0.5; 100], mono(1000));

        let short = clip.truncated(40);
        assert_eq!(short.frames(), 40);
        // The original is untouched.
        assert_eq!(clip.frames(), 100);

        let long = clip.truncated(400);
        assert_eq!(long.frames(), 100);
    }

    #[test]
    fn test_from_interleaved_drops_partial_frame() {
        let clip = AudioClip::from_interleaved(vec![0.1, 0.2, 0.3], ClipFormat::new(1000, 2).unwrap());
        assert_eq!(clip.frames(), 1);
        assert_eq!(clip.samples(), &[0.1, 0.2]);
    }

    #[test]
    fn test_builder_concatenates_in_order() {
        let format = mono(1000);
        let a = AudioClip::from_interleaved(vec![1.0; 10], format);
        let b = AudioClip::from_interleaved(vec![-1.0; 10], format);

        let mut builder = ClipBuilder::new(format);
        assert_eq!(builder.push_clip(&a, 5), 5);
        assert_eq!(builder.push_silence(3), 3);
        assert_eq!(builder.push_clip(&b, 50), 10);
        let clip = builder.build();

        assert_eq!(clip.frames(), 18);
        assert_eq!(&clip.samples()[..5], &[1.0; 5]);
        assert_eq!(&clip.samples()[5..8], &[0.0; 3]);
        assert_eq!(&clip.samples()[8..], &[-1.0; 10]);
    }

    #[test]
    fn test_conform_mono_to_stereo() {
        let clip = AudioClip::from_interleaved(vec![0.25, 0.5], mono(1000));
        let stereo = clip.conform(ClipFormat::new(1000, 2).unwrap());
        assert_eq!(stereo.samples(), &[0.25, 0.25, 0.5, 0.5]);
    }

    #[test]
    fn test_conform_stereo_to_mono() {
        let clip =
            AudioClip::from_interleaved(vec![1.0, 0.0, 0.5, 0.5], ClipFormat::new(1000, 2).unwrap());
        let mono_clip = clip.conform(mono(1000));
        assert_eq!(mono_clip.samples(), &[0.5, 0.5]);
    }

    #[test]
    fn test_conform_resamples() {
        let source_rate = 44100;
        let samples: Vec<f32> = (0..4410)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / source_rate as f32).sin())
            .collect();
        let clip = AudioClip::from_interleaved(samples, mono(source_rate));

        let resampled = clip.conform(mono(48000));
        let expected_len = (4410.0_f64 * 48000.0 / 44100.0).ceil() as usize;
        assert_eq!(resampled.frames(), expected_len);
        assert_eq!(resampled.format().sample_rate, 48000);
    }

    #[test]
    fn test_duration() {
        let clip = AudioClip::silence(mono(8000), 2000);
        assert_eq!(clip.duration(), Duration::from_millis(250));
        assert!(clip.samples().iter().all(|s| *s == 0.0));
    }
}
