//! Audio decoding for track loading
//!
//! Decodes a fetched audio resource (mp3, flac, wav, aac, ogg, ...) into a
//! stereo [`Clip`] and resamples it to the output device rate so the render
//! path never has to rate-convert per frame. Runs on the loader thread only.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::LoadError;
use crate::media::Clip;
use crate::types::StereoSample;

/// Decode an in-memory audio resource into a clip at `target_sample_rate`
///
/// Mono sources are duplicated to both channels; sources with more than two
/// channels keep their first stereo pair.
pub fn decode_bytes(bytes: Vec<u8>, target_sample_rate: u32) -> Result<Clip, LoadError> {
    let stream = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| LoadError::FormatUnsupported(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| LoadError::FormatUnsupported("no audio track in container".to_string()))?;
    let track_id = track.id;
    let mut source_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| LoadError::FormatUnsupported(e.to_string()))?;

    let mut samples: Vec<StereoSample> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(LoadError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(LoadError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        if source_rate.is_none() {
            source_rate = Some(spec.rate);
        }
        let channels = spec.channels.count();
        if channels == 0 {
            continue;
        }

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        let interleaved = buffer.samples();

        if channels == 1 {
            samples.extend(interleaved.iter().map(|&v| StereoSample::mono(v)));
        } else {
            samples.extend(
                interleaved
                    .chunks_exact(channels)
                    .map(|frame| StereoSample::new(frame[0], frame[1])),
            );
        }
    }

    let source_rate =
        source_rate.ok_or_else(|| LoadError::Decode("unknown sample rate".to_string()))?;
    if samples.is_empty() {
        return Err(LoadError::Decode("no audio frames decoded".to_string()));
    }

    let out_rate = if target_sample_rate > 0 {
        target_sample_rate
    } else {
        source_rate
    };
    if source_rate != out_rate {
        log::debug!(
            "resampling {} frames from {}Hz to {}Hz",
            samples.len(),
            source_rate,
            out_rate
        );
        samples = resample(&samples, source_rate, out_rate)?;
    }

    Ok(Clip {
        samples,
        sample_rate: out_rate,
    })
}

/// One-shot whole-clip resample
///
/// FastFixedIn with a septic polynomial is a good quality/CPU tradeoff for
/// offline conversion; this is not on the render path.
fn resample(
    input: &[StereoSample],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<StereoSample>, LoadError> {
    use rubato::{FastFixedIn, PolynomialDegree, Resampler};

    if input.is_empty() {
        return Ok(Vec::new());
    }

    // rubato expects planar input
    let planar = vec![
        input.iter().map(|s| s.left).collect::<Vec<f32>>(),
        input.iter().map(|s| s.right).collect::<Vec<f32>>(),
    ];

    let mut resampler = FastFixedIn::<f32>::new(
        target_rate as f64 / source_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        input.len(),
        2,
    )
    .map_err(|e| LoadError::Decode(format!("failed to create resampler: {}", e)))?;

    let output = resampler
        .process(&planar, None)
        .map_err(|e| LoadError::Decode(format!("resampling failed: {}", e)))?;

    Ok(output[0]
        .iter()
        .zip(output[1].iter())
        .map(|(&left, &right)| StereoSample::new(left, right))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, frames: usize) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                let value = ((i as f32 * 0.05).sin() * 8000.0) as i16;
                writer.write_sample(value).unwrap();
                writer.write_sample(value).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_decode_wav() {
        let bytes = wav_bytes(44100, 4410);
        let clip = decode_bytes(bytes, 44100).unwrap();
        assert_eq!(clip.sample_rate, 44100);
        assert_eq!(clip.samples.len(), 4410);
        assert!((clip.duration() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_decode_resamples_to_target_rate() {
        let bytes = wav_bytes(22050, 2205);
        let clip = decode_bytes(bytes, 44100).unwrap();
        assert_eq!(clip.sample_rate, 44100);
        // ~2x the input frames, allowing for resampler edge behavior
        let frames = clip.samples.len() as i64;
        assert!((frames - 4410).abs() <= 32, "got {} frames", frames);
    }

    #[test]
    fn test_garbage_is_format_unsupported() {
        let result = decode_bytes(vec![0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01], 44100);
        assert!(matches!(result, Err(LoadError::FormatUnsupported(_))));
    }
}
