//! Audio decoding using symphonia
//!
//! Decodes source files to mono f32 at the analysis sample rate. Rendering
//! never goes through this path; the encoder reads the sources itself.

use crate::error::{MixError, Result};
use crate::types::AudioBuffer;
use rubato::{FftFixedInOut, Resampler};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Sample rate used for onset, energy and tempo analysis
///
/// Everything the analyzer looks at sits well below 11 kHz.
pub const ANALYSIS_SAMPLE_RATE: u32 = 22050;

/// Files larger than this are refused rather than decoded into memory
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Rubato chunk length
const RESAMPLE_CHUNK: usize = 1024;

/// An opened source: demuxer, decoder and stream parameters
struct OpenedSource {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: usize,
}

/// Decode an audio file to a mono AudioBuffer at [`ANALYSIS_SAMPLE_RATE`]
pub fn decode(path: &Path) -> Result<AudioBuffer> {
    let mut source = open(path)?;

    debug!(
        "Decoding: {} @ {}Hz, {} channels",
        path.display(),
        source.sample_rate,
        source.channels
    );

    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match source.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => {
                return Err(MixError::decode_error(path, format!("Failed to read packet: {}", e)));
            }
        };

        if packet.track_id() != source.track_id {
            continue;
        }

        let decoded = match source.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                trace!("Skipping corrupted frame: {}", e);
                continue;
            }
            Err(e) => {
                return Err(MixError::decode_error(path, format!("Decode error: {}", e)));
            }
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        mono.extend(to_mono(sample_buf.samples(), spec.channels.count()));
    }

    if mono.is_empty() {
        return Err(MixError::decode_error(path, "No audio samples decoded"));
    }

    let samples = resample(&mono, source.sample_rate, ANALYSIS_SAMPLE_RATE);

    debug!(
        "Decoded {} samples ({:.2}s)",
        samples.len(),
        samples.len() as f64 / ANALYSIS_SAMPLE_RATE as f64
    );

    Ok(AudioBuffer::new(samples, ANALYSIS_SAMPLE_RATE))
}

fn open(path: &Path) -> Result<OpenedSource> {
    let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => MixError::FileNotFound(path.to_path_buf()),
        _ => MixError::decode_error(path, format!("Failed to read file metadata: {}", e)),
    })?;

    if metadata.len() > MAX_FILE_SIZE {
        return Err(MixError::decode_error(
            path,
            format!(
                "File too large ({:.1} GB). Maximum supported size is 2 GB.",
                metadata.len() as f64 / (1024.0 * 1024.0 * 1024.0)
            ),
        ));
    }

    let file = std::fs::File::open(path)
        .map_err(|e| MixError::decode_error(path, format!("Failed to open file: {}", e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| MixError::decode_error(path, format!("Failed to probe format: {}", e)))?;

    let format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| MixError::decode_error(path, "No audio tracks found"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params.sample_rate.unwrap_or(44100);
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

    let decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| MixError::decode_error(path, format!("Failed to create decoder: {}", e)))?;

    Ok(OpenedSource {
        format,
        decoder,
        track_id,
        sample_rate,
        channels,
    })
}

/// Average interleaved channels down to mono
fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// FFT resampling with rubato, falling back to linear interpolation if the
/// resampler cannot be built for this rate pair
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let mut resampler =
        match FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 1) {
            Ok(r) => r,
            Err(e) => {
                debug!("Rubato initialization failed ({}), using linear resampling", e);
                return resample_linear(samples, from_rate, to_rate);
            }
        };

    let chunk_in = resampler.input_frames_next();
    let chunk_out = resampler.output_frames_next();
    let ratio = to_rate as f64 / from_rate as f64;
    let mut output = Vec::with_capacity((samples.len() as f64 * ratio).ceil() as usize);

    let mut pos = 0;
    while pos < samples.len() {
        let end = (pos + chunk_in).min(samples.len());
        let mut chunk = samples[pos..end].to_vec();
        let valid_in = chunk.len();
        chunk.resize(chunk_in, 0.0);

        match resampler.process(&[chunk], None) {
            Ok(resampled) => {
                if let Some(channel) = resampled.first() {
                    let valid_out = if valid_in < chunk_in {
                        ((valid_in as f64 * ratio).ceil() as usize).min(chunk_out)
                    } else {
                        chunk_out
                    };
                    output.extend_from_slice(&channel[..valid_out.min(channel.len())]);
                }
            }
            Err(e) => {
                debug!("Rubato processing error ({}), resampling remainder linearly", e);
                output.extend(resample_linear(&samples[pos..], from_rate, to_rate));
                break;
            }
        }

        pos += chunk_in;
    }

    output
}

fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let step = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / step) as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let src = i as f64 * step;
            let idx = src as usize;
            let frac = (src - idx as f64) as f32;
            if idx < last {
                samples[idx] * (1.0 - frac) + samples[idx + 1] * frac
            } else {
                samples[last]
            }
        })
        .collect()
}
