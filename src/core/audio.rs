//! Advisory audio quality estimates.
//!
//! The SNR heuristic here is a coarse signal: RMS over the whole clip
//! against the 10th percentile of absolute amplitudes as a noise floor.
//! It is recorded for diagnostics and never gates enrollment.

use std::io::Cursor;

use hound::{SampleFormat, WavReader};

/// Ceiling returned when no noise floor is measurable
pub const MAX_SNR_DB: f64 = 60.0;

/// Interleaved samples read per clip for the estimate (one minute of 16 kHz mono)
pub const MAX_ANALYZED_SAMPLES: usize = 960_000;

/// Estimate signal-to-noise ratio in dB, clamped to [0, 60].
pub fn estimate_snr(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }

    let mean_square = samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64;
    let rms = mean_square.sqrt();

    let mut magnitudes: Vec<f64> = samples.iter().map(|s| s.abs()).collect();
    magnitudes.sort_by(f64::total_cmp);
    let noise_floor = magnitudes[(magnitudes.len() as f64 * 0.1).floor() as usize];

    if noise_floor == 0.0 {
        return MAX_SNR_DB;
    }

    (20.0 * (rms / noise_floor).log10()).clamp(0.0, MAX_SNR_DB)
}

/// Decode the start of a PCM WAV payload into mono samples normalized to [-1, 1].
///
/// At most [`MAX_ANALYZED_SAMPLES`] interleaved samples are read. Returns
/// `None` for anything hound cannot read (compressed formats, truncated
/// files). Multi-channel audio is averaged per frame.
pub fn decode_wav(bytes: &[u8]) -> Option<Vec<f64>> {
    decode_wav_prefix(bytes, MAX_ANALYZED_SAMPLES)
}

/// Like [`decode_wav`] with an explicit interleaved-sample limit
pub fn decode_wav_prefix(bytes: &[u8], limit: usize) -> Option<Vec<f64>> {
    let reader = WavReader::new(Cursor::new(bytes)).ok()?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));
    // Whole frames only
    let limit = (limit / channels).max(1) * channels;

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .take(limit)
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()
            .ok()?,
        SampleFormat::Int => {
            let scale = f64::from(1u32 << (spec.bits_per_sample.clamp(1, 32) - 1));
            reader
                .into_samples::<i32>()
                .take(limit)
                .map(|s| s.map(|v| f64::from(v) / scale))
                .collect::<Result<_, _>>()
                .ok()?
        }
    };

    if interleaved.is_empty() {
        return None;
    }

    Some(
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f64>() / frame.len() as f64)
            .collect(),
    )
}

/// SNR of a WAV payload, or `None` when it cannot be decoded.
pub fn estimate_wav_snr(bytes: &[u8]) -> Option<f64> {
    decode_wav(bytes).map(|samples| estimate_snr(&samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn wav_bytes(samples: &[i16]) -> Vec<u8> {
        let spec = WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            for s in samples {
                writer.write_sample(*s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(estimate_snr(&[]), 0.0);
    }

    #[test]
    fn test_silent_floor_hits_ceiling() {
        // More than 10% exact zeros puts the noise floor at 0
        let mut samples = vec![0.0; 20];
        samples.extend(std::iter::repeat(0.5).take(80));
        assert_eq!(estimate_snr(&samples), MAX_SNR_DB);
    }

    #[test]
    fn test_constant_signal_is_zero_db() {
        let samples = vec![0.25; 100];
        assert!(estimate_snr(&samples).abs() < 1e-9);
    }

    #[test]
    fn test_result_is_clamped() {
        let mut samples = vec![1e-9; 10];
        samples.extend(std::iter::repeat(1.0).take(90));
        let snr = estimate_snr(&samples);
        assert!((0.0..=MAX_SNR_DB).contains(&snr));
    }

    #[test]
    fn test_decode_wav_roundtrip_scale() {
        let bytes = wav_bytes(&[0, 16384, -16384, 32767]);
        let samples = decode_wav(&bytes).unwrap();
        assert_eq!(samples.len(), 4);
        assert!((samples[1] - 0.5).abs() < 1e-9);
        assert!((samples[2] + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_decode_stops_at_limit() {
        let bytes = wav_bytes(&[1000; 50]);
        assert_eq!(decode_wav_prefix(&bytes, 8).unwrap().len(), 8);
        assert_eq!(decode_wav(&bytes).unwrap().len(), 50);
    }

    #[test]
    fn test_non_wav_is_none() {
        assert!(decode_wav(b"definitely not a riff header").is_none());
        assert!(estimate_wav_snr(&[]).is_none());
    }
}
