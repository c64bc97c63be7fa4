//! In-memory media decoding
//!
//! Probes the container from content alone (there is no file name to hint
//! with), decodes the first audio track to interleaved `f32` and resamples
//! it to the context rate.

use crate::context::{AudioBuffer, AudioError};
use rubato::{FftFixedInOut, Resampler};
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Frames per resampler chunk
const CHUNK_FRAMES: usize = 1024;

/// Decoded interleaved audio at its native rate
struct Pcm {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
}

fn decode_err(e: impl std::fmt::Display) -> AudioError {
    AudioError::Decode(e.to_string())
}

/// Decode a complete media file and resample it to `target_sample_rate`
pub fn decode(bytes: &[u8], target_sample_rate: u32) -> Result<AudioBuffer, AudioError> {
    let pcm = read_pcm(bytes)?;
    debug!(
        "Decoded {} frames at {} Hz ({} channels)",
        pcm.samples.len() / pcm.channels as usize,
        pcm.sample_rate,
        pcm.channels
    );

    let samples = if pcm.sample_rate == target_sample_rate {
        pcm.samples
    } else {
        resample(&pcm.samples, pcm.channels, pcm.sample_rate, target_sample_rate)?
    };
    AudioBuffer::from_samples(samples, target_sample_rate, pcm.channels)
}

fn read_pcm(bytes: &[u8]) -> Result<Pcm, AudioError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut format = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(decode_err)?
        .format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::Decode("no audio track".into()))?;
    let track_id = track.id;
    let params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut pcm = Pcm {
        samples: Vec::new(),
        sample_rate: params.sample_rate.unwrap_or(44100),
        channels: params.channels.map_or(0, |c| c.count() as u16),
    };

    // Any read error, end of stream included, ends the track
    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                debug!("Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => return Err(decode_err(e)),
        };

        let spec = *decoded.spec();
        if pcm.channels == 0 {
            pcm.channels = spec.channels.count() as u16;
        }
        let mut interleaved = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        interleaved.copy_interleaved_ref(decoded);
        pcm.samples.extend_from_slice(interleaved.samples());
    }

    if pcm.samples.is_empty() || pcm.channels == 0 {
        return Err(AudioError::Decode("no audio samples".into()));
    }
    Ok(pcm)
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let mut planar = vec![Vec::with_capacity(samples.len() / channels); channels];
    for frame in samples.chunks_exact(channels) {
        for (plane, &s) in planar.iter_mut().zip(frame) {
            plane.push(s);
        }
    }
    planar
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
    (0..frames)
        .flat_map(|f| planar.iter().map(move |plane| plane[f]))
        .collect()
}

/// Resample interleaved audio, keeping the channel layout
fn resample(samples: &[f32], channels: u16, from: u32, to: u32) -> Result<Vec<f32>, AudioError> {
    let channels = channels as usize;
    let planar = deinterleave(samples, channels);
    let frames = planar[0].len();
    let expected = (frames as u64 * to as u64 / from as u64) as usize;

    let mut resampler =
        FftFixedInOut::<f32>::new(from as usize, to as usize, CHUNK_FRAMES, channels)
            .map_err(decode_err)?;
    let mut output = vec![Vec::with_capacity(expected + CHUNK_FRAMES); channels];

    let mut pos = 0;
    while pos < frames {
        let needed = resampler.input_frames_next();
        let end = (pos + needed).min(frames);
        let chunk: Vec<&[f32]> = planar.iter().map(|plane| &plane[pos..end]).collect();

        // The last chunk is zero-padded by the resampler
        let block = if end - pos == needed {
            resampler.process(chunk.as_slice(), None)
        } else {
            resampler.process_partial(Some(chunk.as_slice()), None)
        }
        .map_err(decode_err)?;

        for (plane, data) in output.iter_mut().zip(block) {
            plane.extend(data);
        }
        pos = end;
    }

    for plane in output.iter_mut() {
        plane.truncate(expected);
    }
    Ok(interleave(&output))
}
