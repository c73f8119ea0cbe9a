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
use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use super::clip::AudioClip;
use super::error::AudioError;
use super::format::ClipFormat;

/// Decodes an entire audio file (WAV, FLAC, MP3, etc.) into memory and converts it to the
/// given target format.
pub fn decode_file<P: AsRef<Path>>(path: P, target: ClipFormat) -> Result<AudioClip, AudioError> {
    let path = path.as_ref();
    let file_path = path.to_string_lossy().to_string();

    // Include the path in the error so the user sees which file failed.
    let file = File::open(path).map_err(|e| {
        AudioError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let meta_opts: MetadataOptions = Default::default();
    let fmt_opts: FormatOptions = Default::default();
    let probed = get_probe()
        .format(&hint, mss, &fmt_opts, &meta_opts)
        .map_err(|e| AudioError::DecodeFailed(format!("'{}': {}", file_path, e)))?;
    let mut format_reader = probed.format;

    let track = format_reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::DecodeFailed(format!("'{}': no audio track found", file_path)))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let sample_rate = params.sample_rate.ok_or_else(|| {
        AudioError::DecodeFailed(format!("'{}': sample rate not specified", file_path))
    })?;

    let decoder_opts: DecoderOptions = Default::default();
    let mut decoder = get_codecs()
        .make(&params, &decoder_opts)
        .map_err(|e| AudioError::DecodeFailed(format!("'{}': {}", file_path, e)))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut channels = params.channels.map(|c| c.count() as u16).unwrap_or(0);

    while let Some(packet) = next_packet(format_reader.as_mut())? {
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                decoder.decode(&packet)?
            }
            // A corrupt packet is skipped rather than failing the whole sample.
            Err(SymphoniaError::DecodeError(e)) => {
                debug!(path = file_path, err = e, "Skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if channels == 0 {
            channels = decoded.spec().channels.count() as u16;
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        samples.extend_from_slice(buffer.samples());
    }

    if channels == 0 {
        return Err(AudioError::DecodeFailed(format!(
            "'{}': channels not specified",
            file_path
        )));
    }

    let source_format = ClipFormat::new(sample_rate, channels)?;
    let clip = AudioClip::from_interleaved(samples, source_format);
    debug!(
        path = file_path,
        source = %source_format,
        target = %target,
        frames = clip.frames(),
        "Decoded clip"
    );

    Ok(clip.conform(target))
}

/// Reads the next packet, mapping the end of the stream to None.
fn next_packet(format_reader: &mut dyn FormatReader) -> Result<Option<Packet>, AudioError> {
    match format_reader.next_packet() {
        Ok(packet) => Ok(Some(packet)),
        Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            Ok(None)
        }
        // Some demuxers report the end of the stream as a decode error.
        Err(SymphoniaError::DecodeError(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
