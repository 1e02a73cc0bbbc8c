//! Audio Input/Output
//!
//! Loads recordings, reads and writes segment annotations, and discovers
//! audio files in data directories.

mod annotation;
mod discovery;
mod wav;

pub use annotation::{read_annotation_csv, write_annotation_csv};
pub use discovery::{discover_format, find_annotation_files, list_audio_files, AudioFormat};
pub use wav::{load_wav, write_wav, I16_FULL_SCALE};

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Label given to segments with no ground truth (e.g. found by the segmenter)
pub const UNLABELED: &str = "-";

/// Errors while reading audio or annotations
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to read WAV file '{path}': {source}")]
    Wav {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },
    #[error("Unsupported audio format '{format}' for '{path}' (only .wav is supported)")]
    UnsupportedFormat { path: PathBuf, format: String },
    #[error("Audio file '{0}' contains no samples")]
    Empty(PathBuf),
    #[error("No audio files found in {0}")]
    NoAudioFiles(PathBuf),
    #[error("Found more than one audio format in {0}, set the file format explicitly")]
    AmbiguousFormat(PathBuf),
    #[error("Invalid segment in '{path}': onset {onset_s}s is not before offset {offset_s}s")]
    InvalidSegment {
        path: PathBuf,
        onset_s: f64,
        offset_s: f64,
    },
    #[error("Annotation CSV error in '{path}': {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A labeled time interval of a recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// Onset in seconds
    pub onset_s: f64,
    /// Offset in seconds
    pub offset_s: f64,
    /// Ground-truth label, [`UNLABELED`] when unknown
    pub label: String,
}

impl Segment {
    pub fn new(onset_s: f64, offset_s: f64, label: impl Into<String>) -> Self {
        Self {
            onset_s,
            offset_s,
            label: label.into(),
        }
    }

    /// Build a segment from a half-open sample range
    pub fn from_samples(range: Range<usize>, sample_rate: u32, label: impl Into<String>) -> Self {
        let sr = f64::from(sample_rate);
        Self::new(range.start as f64 / sr, range.end as f64 / sr, label)
    }

    pub fn duration_s(&self) -> f64 {
        self.offset_s - self.onset_s
    }

    /// Half-open sample range at the given sample rate
    pub fn sample_range(&self, sample_rate: u32) -> Range<usize> {
        let sr = f64::from(sample_rate);
        let start = (self.onset_s * sr).round().max(0.0) as usize;
        let end = (self.offset_s * sr).round().max(0.0) as usize;
        start..end.max(start)
    }

    pub fn is_labeled(&self) -> bool {
        self.label != UNLABELED
    }
}

/// All segments of one audio file, ordered by onset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub audio_path: PathBuf,
    pub segments: Vec<Segment>,
}

impl Annotation {
    pub fn new(audio_path: impl Into<PathBuf>, mut segments: Vec<Segment>) -> Self {
        segments.sort_by(|a, b| a.onset_s.total_cmp(&b.onset_s));
        Self {
            audio_path: audio_path.into(),
            segments,
        }
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().map(|s| s.label.as_str())
    }
}

/// Mono recording at its native sample rate
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub path: PathBuf,
    /// Samples in the file's native integer scale (16-bit range for float files)
    pub samples: Vec<f64>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(path: impl AsRef<Path>, samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            samples,
            sample_rate,
        }
    }

    pub fn duration_s(&self) -> f64 {
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }

    /// Samples covered by a segment, clamped to the clip
    pub fn segment_samples(&self, segment: &Segment) -> &[f64] {
        let range = segment.sample_range(self.sample_rate);
        let end = range.end.min(self.samples.len());
        let start = range.start.min(end);
        &self.samples[start..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_range_rounds() {
        let seg = Segment::from_samples(441..882, 44100, "a");
        assert_eq!(seg.sample_range(44100), 441..882);
        assert!((seg.duration_s() - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_annotation_sorts_by_onset() {
        let ann = Annotation::new(
            "song.wav",
            vec![Segment::new(0.5, 0.6, "b"), Segment::new(0.1, 0.2, "a")],
        );
        assert_eq!(ann.labels().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_segment_samples_clamped() {
        let clip = AudioClip::new("x.wav", vec![1.0; 100], 1000);
        let seg = Segment::new(0.05, 0.5, "a");
        assert_eq!(clip.segment_samples(&seg).len(), 50);

        let outside = Segment::new(0.2, 0.3, "a");
        assert!(clip.segment_samples(&outside).is_empty());
    }
}
