//! Decoding uploaded audio into the 16 kHz mono f32 whisper.cpp consumes.

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Sample rate whisper.cpp expects its input at.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;

/// Decode any supported container at `path`, mix it down to mono and
/// resample to [`WHISPER_SAMPLE_RATE`]. The file extension is used as a
/// probe hint.
pub fn decode_for_whisper(path: &Path) -> Result<Vec<f32>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| anyhow::anyhow!("unsupported or corrupt audio: {e}"))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow::anyhow!("no audio track found"))?;
    let track_id = track.id;
    let mut source_rate = track.codec_params.sample_rate;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| anyhow::anyhow!("unsupported audio codec: {e}"))?;

    let mut mono: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => anyhow::bail!("packet read failed: {e}"),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::warn!("Skipping undecodable audio packet: {}", e);
                continue;
            }
            Err(e) => anyhow::bail!("decode failed: {e}"),
        };

        let spec = *decoded.spec();
        if source_rate.is_none() {
            source_rate = Some(spec.rate);
        }
        let channels = spec.channels.count().max(1);
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        let samples = sample_buf.samples();

        if channels > 1 {
            mono.extend(
                samples
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        } else {
            mono.extend_from_slice(samples);
        }
    }

    if mono.is_empty() {
        anyhow::bail!("no audio samples decoded");
    }

    let rate = source_rate.unwrap_or(WHISPER_SAMPLE_RATE);
    if rate != WHISPER_SAMPLE_RATE {
        tracing::debug!("Resampling {} Hz audio to {} Hz", rate, WHISPER_SAMPLE_RATE);
        mono = resample(&mono, rate, WHISPER_SAMPLE_RATE)?;
    }
    Ok(mono)
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let chunk_size = 1024;

    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, chunk_size, 1)
        .map_err(|e| anyhow::anyhow!("resampler init failed: {e}"))?;

    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + chunk_size);
    for chunk in samples.chunks(chunk_size) {
        let mut padded = chunk.to_vec();
        // Last chunk is zero-padded; the padding is trimmed below.
        padded.resize(chunk_size, 0.0);
        let input = vec![padded];
        let resampled = resampler
            .process(&input, None)
            .map_err(|e| anyhow::anyhow!("resampling failed: {e}"))?;
        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
    }
    output.truncate(expected);
    Ok(output)
}
