//! Amplitude-Threshold Segmentation
//!
//! Finds syllables as runs where the smoothed RMS envelope exceeds a
//! threshold, then merges runs split by very short silences and drops runs
//! that are too short to be syllables.

use crate::FeatureError;
use audio_io::{Annotation, AudioClip, Segment, UNLABELED};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use tracing::debug;

/// Parameters for finding segments in unannotated audio
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentParams {
    /// Envelope threshold, in native sample units
    pub threshold: f64,
    /// Shortest kept segment (s)
    pub min_syl_dur: f64,
    /// Silences shorter than this are merged away (s)
    pub min_silent_dur: f64,
    /// Boxcar smoothing window of the envelope (s)
    pub smooth_window: f64,
}

impl Default for SegmentParams {
    fn default() -> Self {
        Self {
            threshold: 1500.0,
            min_syl_dur: 0.02,
            min_silent_dur: 0.002,
            smooth_window: 0.002,
        }
    }
}

impl SegmentParams {
    pub fn validate(&self) -> Result<(), FeatureError> {
        let fields = [
            ("threshold", self.threshold),
            ("min_syl_dur", self.min_syl_dur),
            ("min_silent_dur", self.min_silent_dur),
            ("smooth_window", self.smooth_window),
        ];
        for (name, value) in fields {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(FeatureError::InvalidSegmentParams(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

pub struct Segmenter {
    params: SegmentParams,
}

impl Segmenter {
    pub fn new(params: SegmentParams) -> Result<Self, FeatureError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &SegmentParams {
        &self.params
    }

    /// Centred moving RMS of the signal
    pub fn envelope(&self, samples: &[f64], sample_rate: u32) -> Vec<f64> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }
        let width = ((self.params.smooth_window * f64::from(sample_rate)).round() as usize).max(1);

        let mut cumsum = Vec::with_capacity(n + 1);
        cumsum.push(0.0);
        for &s in samples {
            let last = cumsum[cumsum.len() - 1];
            cumsum.push(last + s * s);
        }

        let half = width / 2;
        (0..n)
            .map(|i| {
                let start = i.saturating_sub(half);
                let end = (start + width).min(n);
                let mean_sq = (cumsum[end] - cumsum[start]) / (end - start) as f64;
                mean_sq.max(0.0).sqrt()
            })
            .collect()
    }

    /// Sample ranges of the detected segments
    pub fn find_ranges(&self, samples: &[f64], sample_rate: u32) -> Vec<Range<usize>> {
        let sr = f64::from(sample_rate);
        let min_silent = (self.params.min_silent_dur * sr).round() as usize;
        let min_syl = (self.params.min_syl_dur * sr).round() as usize;

        let envelope = self.envelope(samples, sample_rate);
        let mut runs: Vec<Range<usize>> = Vec::new();
        let mut start: Option<usize> = None;
        for (i, &v) in envelope.iter().enumerate() {
            match (v > self.params.threshold, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    runs.push(s..i);
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            runs.push(s..envelope.len());
        }

        let mut merged: Vec<Range<usize>> = Vec::with_capacity(runs.len());
        for run in runs {
            match merged.last_mut() {
                Some(prev) if run.start - prev.end < min_silent => prev.end = run.end,
                _ => merged.push(run),
            }
        }

        merged.retain(|r| r.end - r.start >= min_syl);
        merged
    }

    /// Segment a clip; every segment is labeled [`UNLABELED`]
    pub fn segment(&self, clip: &AudioClip) -> Annotation {
        let segments: Vec<Segment> = self
            .find_ranges(&clip.samples, clip.sample_rate)
            .into_iter()
            .map(|r| Segment::from_samples(r, clip.sample_rate, UNLABELED))
            .collect();

        debug!(
            "Segmented {}: {} segments",
            clip.path.display(),
            segments.len()
        );
        Annotation::new(&clip.path, segments)
    }
}
