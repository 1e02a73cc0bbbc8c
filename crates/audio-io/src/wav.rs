//! WAV Decoding and Encoding

use crate::{AudioClip, AudioError};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use tracing::debug;

/// Full scale of 16-bit PCM; float files are rescaled to this range
pub const I16_FULL_SCALE: f64 = 32768.0;

/// Load a WAV file as a mono clip.
///
/// Integer PCM keeps its native integer scale (so 24-bit samples range over
/// ±2^23). Float WAV is rescaled to the 16-bit range. Channels are averaged.
pub fn load_wav(path: &Path) -> Result<AudioClip, AudioError> {
    let wav_err = |source| AudioError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = WavReader::open(path).map_err(wav_err)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f64> = match spec.sample_format {
        SampleFormat::Int => reader
            .samples::<i32>()
            .map(|s| s.map(f64::from))
            .collect::<Result<_, _>>()
            .map_err(wav_err)?,
        SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|v| f64::from(v) * I16_FULL_SCALE))
            .collect::<Result<_, _>>()
            .map_err(wav_err)?,
    };

    if interleaved.is_empty() {
        return Err(AudioError::Empty(path.to_path_buf()));
    }

    let samples = to_mono(&interleaved, channels);

    debug!(
        "Loaded {}: {} samples @ {}Hz, {} channel(s)",
        path.display(),
        samples.len(),
        spec.sample_rate,
        channels
    );

    Ok(AudioClip::new(path, samples, spec.sample_rate))
}

/// Write mono samples (16-bit integer scale) as 16-bit PCM
pub fn write_wav(path: &Path, samples: &[f64], sample_rate: u32) -> Result<(), AudioError> {
    let wav_err = |source| AudioError::Wav {
        path: path.to_path_buf(),
        source,
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).map_err(wav_err)?;
    for &sample in samples {
        let clamped = sample.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
        writer.write_sample(clamped).map_err(wav_err)?;
    }
    writer.finalize().map_err(wav_err)?;
    Ok(())
}

fn to_mono(interleaved: &[f64], channels: usize) -> Vec<f64> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f64>() / frame.len() as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_16bit() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let samples: Vec<f64> = (0..1000)
            .map(|i| (i as f64 * 0.1).sin() * 10000.0)
            .collect();

        write_wav(&path, &samples, 32000).unwrap();
        let clip = load_wav(&path).unwrap();

        assert_eq!(clip.sample_rate, 32000);
        assert_eq!(clip.samples.len(), 1000);
        for (a, b) in samples.iter().zip(&clip.samples) {
            assert!((a - b).abs() <= 0.5);
        }
    }

    #[test]
    fn test_stereo_float_mixdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..10 {
            writer.write_sample(0.5f32).unwrap();
            writer.write_sample(-0.25f32).unwrap();
        }
        writer.finalize().unwrap();

        let clip = load_wav(&path).unwrap();
        assert_eq!(clip.samples.len(), 10);
        assert!((clip.samples[0] - 0.125 * I16_FULL_SCALE).abs() < 1e-6);
    }

    #[test]
    fn test_24bit_keeps_native_scale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 48000,
            bits_per_sample: 24,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for v in [1_000_000i32, -1_000_000, 8_388_607, 0] {
            writer.write_sample(v).unwrap();
        }
        writer.finalize().unwrap();

        let clip = load_wav(&path).unwrap();
        assert_eq!(clip.samples, vec![1_000_000.0, -1_000_000.0, 8_388_607.0, 0.0]);
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        write_wav(&path, &[], 8000).unwrap();
        assert!(matches!(load_wav(&path), Err(AudioError::Empty(_))));
    }

    #[test]
    fn test_missing_file() {
        let err = load_wav(Path::new("/nonexistent/file.wav")).unwrap_err();
        assert!(matches!(err, AudioError::Wav { .. }));
    }
}
