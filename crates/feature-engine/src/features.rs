//! Feature Vector Assembly

use crate::fft::{Spectrogram, SpectrogramMaker, SpectrogramParams};
use crate::registry::{Feature, FeatureKind, FeatureSet};
use crate::segmenter::{SegmentParams, Segmenter};
use crate::statistics::{SpectralMoments, StatisticalFeatures};
use crate::FeatureError;
use audio_io::{Annotation, AudioClip, Segment};
use ndarray::{concatenate, s, Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Default number of cepstral coefficients per frame
pub const DEFAULT_CEPSTRAL_COEFFS: usize = 20;

/// Default number of frames in the flattened spectrogram window
pub const DEFAULT_WINDOW_FRAMES: usize = 32;

/// Feature vector of one segment: a row of a [`FeatureMatrix`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }
}

impl From<Vec<f64>> for FeatureVector {
    fn from(values: Vec<f64>) -> Self {
        Self::new(values)
    }
}

/// Segments x columns matrix; `column_ids[c]` is the feature-list index that
/// produced column `c`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMatrix {
    pub values: Array2<f64>,
    pub column_ids: Vec<usize>,
}

impl FeatureMatrix {
    pub fn new(values: Array2<f64>, column_ids: Vec<usize>) -> Result<Self, FeatureError> {
        if values.ncols() != column_ids.len() {
            return Err(FeatureError::ColumnMismatch {
                ids: column_ids.len(),
                width: values.ncols(),
            });
        }
        Ok(Self { values, column_ids })
    }

    /// Matrix with rows but no columns yet
    pub fn with_rows(n_rows: usize) -> Self {
        Self {
            values: Array2::zeros((n_rows, 0)),
            column_ids: Vec::new(),
        }
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_columns(&self) -> usize {
        self.values.ncols()
    }

    /// Number of distinct features represented
    pub fn feature_count(&self) -> usize {
        self.column_ids.iter().collect::<BTreeSet<_>>().len()
    }

    pub fn row(&self, i: usize) -> FeatureVector {
        FeatureVector::new(self.values.row(i).to_vec())
    }

    /// Append the columns of one feature
    pub fn push_block(&mut self, block: Array2<f64>, feature_index: usize) -> Result<(), FeatureError> {
        let width = block.ncols();
        self.values = concatenate(Axis(1), &[self.values.view(), block.view()])?;
        self.column_ids
            .extend(std::iter::repeat(feature_index).take(width));
        Ok(())
    }

    /// Column positions belonging to the given feature-list indices
    pub fn columns_for_features(&self, feature_indices: &[usize]) -> Vec<usize> {
        let wanted: BTreeSet<usize> = feature_indices.iter().copied().collect();
        self.column_ids
            .iter()
            .enumerate()
            .filter(|(_, id)| wanted.contains(*id))
            .map(|(c, _)| c)
            .collect()
    }

    /// Sub-matrix holding only the columns of the given features
    pub fn select_features(&self, feature_indices: &[usize]) -> FeatureMatrix {
        let columns = self.columns_for_features(feature_indices);
        FeatureMatrix {
            values: self.values.select(Axis(1), &columns),
            column_ids: columns.iter().map(|&c| self.column_ids[c]).collect(),
        }
    }
}

/// Which segment labels to extract features from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "LabelFilterRepr", into = "LabelFilterRepr")]
pub enum LabelFilter {
    #[default]
    All,
    Only(BTreeSet<String>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LabelFilterRepr {
    Text(String),
    List(Vec<String>),
}

impl From<LabelFilterRepr> for LabelFilter {
    fn from(repr: LabelFilterRepr) -> Self {
        match repr {
            LabelFilterRepr::Text(text) => LabelFilter::parse(&text),
            LabelFilterRepr::List(labels) => LabelFilter::Only(labels.into_iter().collect()),
        }
    }
}

impl From<LabelFilter> for LabelFilterRepr {
    fn from(filter: LabelFilter) -> Self {
        match filter {
            LabelFilter::All => LabelFilterRepr::Text("all".to_string()),
            LabelFilter::Only(labels) => LabelFilterRepr::List(labels.into_iter().collect()),
        }
    }
}

impl LabelFilter {
    /// `"all"`, or a string whose characters are the single-character labels to keep
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("all") {
            LabelFilter::All
        } else {
            LabelFilter::Only(text.chars().map(String::from).collect())
        }
    }

    pub fn accepts(&self, label: &str) -> bool {
        match self {
            LabelFilter::All => true,
            LabelFilter::Only(labels) => labels.contains(label),
        }
    }
}

impl fmt::Display for LabelFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LabelFilter::All => f.write_str("all"),
            LabelFilter::Only(labels) => {
                let joined: Vec<&str> = labels.iter().map(String::as_str).collect();
                write!(f, "{}", joined.join(","))
            }
        }
    }
}

fn default_cepstral_coeffs() -> usize {
    DEFAULT_CEPSTRAL_COEFFS
}

fn default_window_frames() -> usize {
    DEFAULT_WINDOW_FRAMES
}

/// Everything needed to reproduce a feature matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorParams {
    #[serde(default)]
    pub spect: SpectrogramParams,
    #[serde(default)]
    pub segment: Option<SegmentParams>,
    pub features: FeatureSet,
    #[serde(default = "default_cepstral_coeffs")]
    pub num_cepstral_coeffs: usize,
    #[serde(default = "default_window_frames")]
    pub window_frames: usize,
}

impl ExtractorParams {
    pub fn new(features: FeatureSet) -> Self {
        Self {
            spect: SpectrogramParams::default(),
            segment: None,
            features,
            num_cepstral_coeffs: DEFAULT_CEPSTRAL_COEFFS,
            window_frames: DEFAULT_WINDOW_FRAMES,
        }
    }
}

/// Features extracted from one audio file
#[derive(Debug, Clone)]
pub struct FileFeatures {
    pub audio_path: PathBuf,
    pub sample_rate: u32,
    /// Segments that passed the label filter, one per matrix row
    pub segments: Vec<Segment>,
    pub features: FeatureMatrix,
}

impl FileFeatures {
    pub fn labels(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.label.clone()).collect()
    }
}

struct SegmentAnalysis<'a> {
    samples: &'a [f64],
    duration_s: f64,
    spect: Option<Spectrogram>,
    moments: Vec<SpectralMoments>,
}

/// Feature extractor for annotated recordings
pub struct FeatureExtractor {
    params: ExtractorParams,
    spect_maker: SpectrogramMaker,
    segmenter: Option<Segmenter>,
}

impl FeatureExtractor {
    /// Create a new feature extractor
    pub fn new(params: ExtractorParams) -> Result<Self, FeatureError> {
        if params.features.is_empty() {
            return Err(FeatureError::EmptyFeatureList);
        }
        let spect_maker = SpectrogramMaker::new(params.spect.clone())?;
        let segmenter = params.segment.clone().map(Segmenter::new).transpose()?;
        Ok(Self {
            params,
            spect_maker,
            segmenter,
        })
    }

    pub fn params(&self) -> &ExtractorParams {
        &self.params
    }

    pub fn can_segment(&self) -> bool {
        self.segmenter.is_some()
    }

    /// Find segments in an unannotated clip
    pub fn segment(&self, clip: &AudioClip) -> Result<Annotation, FeatureError> {
        self.segmenter
            .as_ref()
            .map(|s| s.segment(clip))
            .ok_or(FeatureError::NoSegmentParams)
    }

    /// Number of columns a feature produces at a sample rate
    pub fn feature_width(&self, feature: Feature, sample_rate: u32) -> usize {
        let n_bins = self.spect_maker.n_freq_bins(sample_rate);
        match feature {
            Feature::MeanSpectrum | Feature::MeanDeltaSpectrum => n_bins,
            Feature::MeanCepstrum | Feature::MeanDeltaCepstrum => self.params.num_cepstral_coeffs,
            Feature::FlattenedSpectrogram => n_bins * self.params.window_frames,
            _ => 1,
        }
    }

    /// Extract features from the segments of one file whose labels pass
    /// `labels_to_use`.
    ///
    /// Returns `None` when no segment label matches. Features that cannot be
    /// computed for a segment (e.g. it is shorter than one spectrogram frame)
    /// are NaN.
    pub fn extract_file(
        &mut self,
        clip: &AudioClip,
        annotation: &Annotation,
        labels_to_use: &LabelFilter,
    ) -> Result<Option<FileFeatures>, FeatureError> {
        let mask: Vec<bool> = annotation
            .segments
            .iter()
            .map(|s| labels_to_use.accepts(&s.label))
            .collect();

        if !mask.iter().any(|&m| m) {
            warn!(
                "No labels in {} matched labels to use ({}), did not extract features from file",
                clip.path.display(),
                labels_to_use
            );
            return Ok(None);
        }

        let kept: Vec<Segment> = annotation
            .segments
            .iter()
            .zip(&mask)
            .filter(|(_, m)| **m)
            .map(|(s, _)| s.clone())
            .collect();
        let n = kept.len();

        let features = &self.params.features.features;
        let needs_single = features.iter().any(|f| f.kind() != FeatureKind::MultiSegment);
        let needs_spect = features.iter().any(|f| f.needs_spectrogram());

        let analyses: Vec<SegmentAnalysis<'_>> = if needs_single {
            let maker = &mut self.spect_maker;
            kept.iter()
                .map(|seg| analyze(maker, clip, seg, needs_spect))
                .collect()
        } else {
            Vec::new()
        };

        let mut matrix = FeatureMatrix::with_rows(n);
        for (idx, &feature) in self.params.features.features.iter().enumerate() {
            let block = match feature.kind() {
                FeatureKind::MultiSegment => {
                    let column: Vec<f64> = multi_segment_feature(feature, &annotation.segments)
                        .into_iter()
                        .zip(&mask)
                        .filter(|(_, m)| **m)
                        .map(|(v, _)| v)
                        .collect();
                    Array2::from_shape_vec((n, 1), column)?
                }
                FeatureKind::SingleScalar | FeatureKind::SingleVector => {
                    let width = self.feature_width(feature, clip.sample_rate);
                    let mut block = Array2::from_elem((n, width), f64::NAN);
                    for (row, analysis) in analyses.iter().enumerate() {
                        match self.single_segment_feature(feature, analysis) {
                            Some(values) if values.len() == width => {
                                block.row_mut(row).assign(&values);
                            }
                            _ => {}
                        }
                    }
                    block
                }
            };
            matrix.push_block(block, idx)?;
        }

        debug!(
            "Extracted {} x {} features from {}",
            matrix.n_rows(),
            matrix.n_columns(),
            clip.path.display()
        );

        Ok(Some(FileFeatures {
            audio_path: clip.path.clone(),
            sample_rate: clip.sample_rate,
            segments: kept,
            features: matrix,
        }))
    }

    fn single_segment_feature(&self, feature: Feature, a: &SegmentAnalysis<'_>) -> Option<Array1<f64>> {
        let scalar = |v: f64| Some(Array1::from_elem(1, v));

        match feature {
            Feature::Duration => return scalar(a.duration_s),
            Feature::ZeroCrossingRate => {
                if a.samples.is_empty() || a.duration_s <= 0.0 {
                    return None;
                }
                let stats = StatisticalFeatures::compute(a.samples);
                return scalar(stats.zero_crossings as f64 / a.duration_s);
            }
            _ => {}
        }

        let spect = a.spect.as_ref()?;
        let mean_moment = |get: fn(&SpectralMoments) -> f64| {
            scalar(a.moments.iter().map(get).sum::<f64>() / a.moments.len() as f64)
        };

        match feature {
            Feature::MeanAmplitude => {
                let floor = spect.log_floor();
                let total: f64 = spect
                    .power
                    .axis_iter(Axis(0))
                    .map(|frame| 10.0 * frame.sum().max(floor).log10())
                    .sum();
                scalar(total / spect.n_frames() as f64)
            }
            Feature::MeanSpectralEntropy => mean_moment(|m| m.entropy),
            Feature::MeanSpectralCentroid => mean_moment(|m| m.centroid),
            Feature::MeanSpectralSpread => mean_moment(|m| m.spread),
            Feature::MeanSpectralSkewness => mean_moment(|m| m.skewness),
            Feature::MeanSpectralKurtosis => mean_moment(|m| m.kurtosis),
            Feature::MeanSpectralFlatness => mean_moment(|m| m.flatness),
            Feature::MeanSpectralSlope => mean_moment(|m| m.slope),
            Feature::MeanDominantFrequency => mean_moment(|m| m.dominant_frequency),
            Feature::MeanSpectrum => spect.scaled().mean_axis(Axis(0)),
            Feature::MeanDeltaSpectrum => mean_abs_delta(&spect.scaled()),
            Feature::MeanCepstrum => cepstra(spect, self.params.num_cepstral_coeffs).mean_axis(Axis(0)),
            Feature::MeanDeltaCepstrum => {
                mean_abs_delta(&cepstra(spect, self.params.num_cepstral_coeffs))
            }
            Feature::FlattenedSpectrogram => Some(flatten_window(spect, self.params.window_frames)),
            _ => None,
        }
    }
}

fn analyze<'a>(
    maker: &mut SpectrogramMaker,
    clip: &'a AudioClip,
    segment: &Segment,
    with_spect: bool,
) -> SegmentAnalysis<'a> {
    let samples = clip.segment_samples(segment);
    let spect = if with_spect {
        maker.compute(samples, clip.sample_rate)
    } else {
        None
    };
    let moments = spect
        .as_ref()
        .map(|s| {
            (0..s.n_frames())
                .map(|t| SpectralMoments::compute(&s.freqs, s.frame(t)))
                .collect()
        })
        .unwrap_or_default();

    SegmentAnalysis {
        samples,
        duration_s: segment.duration_s(),
        spect,
        moments,
    }
}

/// Values of a neighbour-based feature for every segment of a file.
/// Segments at the edges of the file get 0.
fn multi_segment_feature(feature: Feature, segments: &[Segment]) -> Vec<f64> {
    (0..segments.len())
        .map(|i| {
            let prev = i.checked_sub(1).map(|p| &segments[p]);
            let next = segments.get(i + 1);
            let current = &segments[i];
            match feature {
                Feature::PrecedingSyllableDuration => prev.map_or(0.0, Segment::duration_s),
                Feature::FollowingSyllableDuration => next.map_or(0.0, Segment::duration_s),
                Feature::PrecedingSilentGapDuration => {
                    prev.map_or(0.0, |p| current.onset_s - p.offset_s)
                }
                Feature::FollowingSilentGapDuration => {
                    next.map_or(0.0, |n| n.onset_s - current.offset_s)
                }
                _ => f64::NAN,
            }
        })
        .collect()
}

/// Mean absolute frame-to-frame difference; needs two frames
fn mean_abs_delta(frames: &Array2<f64>) -> Option<Array1<f64>> {
    if frames.nrows() < 2 {
        return None;
    }
    let delta = &frames.slice(s![1.., ..]) - &frames.slice(s![..-1, ..]);
    delta.mapv(f64::abs).mean_axis(Axis(0))
}

/// DCT-II of each frame's log spectrum, first `n_coeffs` coefficients
fn cepstra(spect: &Spectrogram, n_coeffs: usize) -> Array2<f64> {
    let log_power = spect.log_power();
    let n = log_power.ncols() as f64;
    let mut out = Array2::zeros((log_power.nrows(), n_coeffs));
    for (frame, mut coeffs) in log_power.axis_iter(Axis(0)).zip(out.axis_iter_mut(Axis(0))) {
        for (k, c) in coeffs.iter_mut().enumerate() {
            *c = frame
                .iter()
                .enumerate()
                .map(|(i, &x)| x * (std::f64::consts::PI * k as f64 * (i as f64 + 0.5) / n).cos())
                .sum();
        }
    }
    out
}

/// Fixed-width window of the scaled spectrogram, centre-cropped or padded,
/// flattened frequency-major
fn flatten_window(spect: &Spectrogram, window_frames: usize) -> Array1<f64> {
    let scaled = spect.scaled();
    let n = scaled.nrows();
    let mut window = Array2::from_elem((window_frames, scaled.ncols()), spect.pad_value());
    if n >= window_frames {
        let start = (n - window_frames) / 2;
        window.assign(&scaled.slice(s![start..start + window_frames, ..]));
    } else {
        let offset = (window_frames - n) / 2;
        window.slice_mut(s![offset..offset + n, ..]).assign(&scaled);
    }
    window.t().iter().copied().collect()
}
