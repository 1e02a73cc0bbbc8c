//! Named Features and Feature Groups

use crate::FeatureError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// How a feature is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    /// Needs the neighbouring segments of the file
    MultiSegment,
    /// One value from a single segment
    SingleScalar,
    /// Several columns from a single segment
    SingleVector,
}

/// Acoustic features that can be extracted from a segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Feature {
    Duration,
    PrecedingSyllableDuration,
    FollowingSyllableDuration,
    PrecedingSilentGapDuration,
    FollowingSilentGapDuration,
    MeanAmplitude,
    MeanSpectralEntropy,
    MeanSpectralCentroid,
    MeanSpectralSpread,
    MeanSpectralSkewness,
    MeanSpectralKurtosis,
    MeanSpectralFlatness,
    MeanSpectralSlope,
    MeanDominantFrequency,
    ZeroCrossingRate,
    MeanSpectrum,
    MeanDeltaSpectrum,
    MeanCepstrum,
    MeanDeltaCepstrum,
    FlattenedSpectrogram,
}

impl Feature {
    pub const ALL: [Feature; 20] = [
        Feature::Duration,
        Feature::PrecedingSyllableDuration,
        Feature::FollowingSyllableDuration,
        Feature::PrecedingSilentGapDuration,
        Feature::FollowingSilentGapDuration,
        Feature::MeanAmplitude,
        Feature::MeanSpectralEntropy,
        Feature::MeanSpectralCentroid,
        Feature::MeanSpectralSpread,
        Feature::MeanSpectralSkewness,
        Feature::MeanSpectralKurtosis,
        Feature::MeanSpectralFlatness,
        Feature::MeanSpectralSlope,
        Feature::MeanDominantFrequency,
        Feature::ZeroCrossingRate,
        Feature::MeanSpectrum,
        Feature::MeanDeltaSpectrum,
        Feature::MeanCepstrum,
        Feature::MeanDeltaCepstrum,
        Feature::FlattenedSpectrogram,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Duration => "duration",
            Feature::PrecedingSyllableDuration => "preceding syllable duration",
            Feature::FollowingSyllableDuration => "following syllable duration",
            Feature::PrecedingSilentGapDuration => "preceding silent gap duration",
            Feature::FollowingSilentGapDuration => "following silent gap duration",
            Feature::MeanAmplitude => "mean amplitude",
            Feature::MeanSpectralEntropy => "mean spectral entropy",
            Feature::MeanSpectralCentroid => "mean spectral centroid",
            Feature::MeanSpectralSpread => "mean spectral spread",
            Feature::MeanSpectralSkewness => "mean spectral skewness",
            Feature::MeanSpectralKurtosis => "mean spectral kurtosis",
            Feature::MeanSpectralFlatness => "mean spectral flatness",
            Feature::MeanSpectralSlope => "mean spectral slope",
            Feature::MeanDominantFrequency => "mean dominant frequency",
            Feature::ZeroCrossingRate => "zero crossing rate",
            Feature::MeanSpectrum => "mean spectrum",
            Feature::MeanDeltaSpectrum => "mean delta spectrum",
            Feature::MeanCepstrum => "mean cepstrum",
            Feature::MeanDeltaCepstrum => "mean delta cepstrum",
            Feature::FlattenedSpectrogram => "flattened spectrogram",
        }
    }

    pub fn kind(&self) -> FeatureKind {
        match self {
            Feature::PrecedingSyllableDuration
            | Feature::FollowingSyllableDuration
            | Feature::PrecedingSilentGapDuration
            | Feature::FollowingSilentGapDuration => FeatureKind::MultiSegment,
            Feature::MeanSpectrum
            | Feature::MeanDeltaSpectrum
            | Feature::MeanCepstrum
            | Feature::MeanDeltaCepstrum
            | Feature::FlattenedSpectrogram => FeatureKind::SingleVector,
            _ => FeatureKind::SingleScalar,
        }
    }

    /// Whether the feature needs the segment's spectrogram
    pub fn needs_spectrogram(&self) -> bool {
        !matches!(
            self,
            Feature::Duration | Feature::ZeroCrossingRate
        ) && self.kind() != FeatureKind::MultiSegment
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('_', " ");
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| FeatureError::UnknownFeature(s.to_string()))
    }
}

impl Serialize for Feature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Feature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Predefined feature lists, each tied to a model family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureGroup {
    Knn,
    Svm,
    Neuralnet,
}

impl FeatureGroup {
    pub fn features(&self) -> &'static [Feature] {
        match self {
            FeatureGroup::Knn => &[
                Feature::Duration,
                Feature::PrecedingSyllableDuration,
                Feature::FollowingSyllableDuration,
                Feature::PrecedingSilentGapDuration,
                Feature::FollowingSilentGapDuration,
                Feature::MeanAmplitude,
                Feature::MeanSpectralEntropy,
            ],
            FeatureGroup::Svm => &[
                Feature::MeanSpectrum,
                Feature::MeanDeltaSpectrum,
                Feature::MeanCepstrum,
                Feature::MeanDeltaCepstrum,
                Feature::Duration,
                Feature::MeanSpectralCentroid,
                Feature::MeanSpectralSpread,
                Feature::MeanSpectralSkewness,
                Feature::MeanSpectralKurtosis,
                Feature::MeanSpectralFlatness,
                Feature::MeanSpectralSlope,
                Feature::MeanDominantFrequency,
                Feature::MeanAmplitude,
                Feature::ZeroCrossingRate,
            ],
            FeatureGroup::Neuralnet => &[Feature::FlattenedSpectrogram],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FeatureGroup::Knn => "knn",
            FeatureGroup::Svm => "svm",
            FeatureGroup::Neuralnet => "neuralnet",
        }
    }
}

impl FromStr for FeatureGroup {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "knn" => Ok(FeatureGroup::Knn),
            "svm" => Ok(FeatureGroup::Svm),
            "neuralnet" | "neural_net" | "mlp" => Ok(FeatureGroup::Neuralnet),
            _ => Err(FeatureError::UnknownGroup(s.to_string())),
        }
    }
}

/// Ordered feature list, optionally tagged with the group each entry came from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub features: Vec<Feature>,
    /// Same length as `features`: index into `groups`
    #[serde(default)]
    pub group_ids: Option<Vec<usize>>,
    #[serde(default)]
    pub groups: Vec<FeatureGroup>,
}

impl FeatureSet {
    pub fn from_features(features: Vec<Feature>) -> Result<Self, FeatureError> {
        if features.is_empty() {
            return Err(FeatureError::EmptyFeatureList);
        }
        Ok(Self {
            features,
            group_ids: None,
            groups: Vec::new(),
        })
    }

    /// Concatenate the lists of several groups; duplicates across groups are kept
    pub fn from_groups(groups: &[FeatureGroup]) -> Result<Self, FeatureError> {
        if groups.is_empty() {
            return Err(FeatureError::EmptyFeatureList);
        }
        let mut features = Vec::new();
        let mut group_ids = Vec::new();
        for (id, group) in groups.iter().enumerate() {
            features.extend_from_slice(group.features());
            group_ids.extend(std::iter::repeat(id).take(group.features().len()));
        }
        Ok(Self {
            features,
            group_ids: Some(group_ids),
            groups: groups.to_vec(),
        })
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Feature-list indices for a group.
    ///
    /// With group tags the tagged entries are returned; otherwise every
    /// occurrence of the group's features is matched by name.
    pub fn indices_for_group(&self, group: FeatureGroup) -> Vec<usize> {
        if let Some(ids) = &self.group_ids {
            if let Some(gid) = self.groups.iter().position(|g| *g == group) {
                return ids
                    .iter()
                    .enumerate()
                    .filter(|(_, id)| **id == gid)
                    .map(|(i, _)| i)
                    .collect();
            }
        }
        let wanted: BTreeSet<Feature> = group.features().iter().copied().collect();
        let mut seen = BTreeSet::new();
        self.features
            .iter()
            .enumerate()
            .filter(|(_, f)| wanted.contains(*f) && seen.insert(**f))
            .map(|(i, _)| i)
            .collect()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.features.iter().map(|f| f.name()).collect()
    }
}
