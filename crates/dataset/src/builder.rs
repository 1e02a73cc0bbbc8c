//! Labeled Datasets

use crate::DatasetError;
use audio_io::Segment;
use feature_engine::{FeatureGroup, FeatureMatrix, FeatureSet, FileFeatures, LabelFilter};
use ndarray::{concatenate, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Feature rows with their labels and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub features: FeatureMatrix,
    pub labels: Vec<String>,
    /// Index into `files` for every row
    pub file_ids: Vec<usize>,
    pub files: Vec<PathBuf>,
    /// Source segment of every row
    pub segments: Vec<Segment>,
    /// Feature list that `features.column_ids` index into
    pub feature_set: FeatureSet,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_columns(&self) -> usize {
        self.features.n_columns()
    }

    pub fn file_path(&self, row: usize) -> Option<&Path> {
        self.file_ids
            .get(row)
            .and_then(|&id| self.files.get(id))
            .map(PathBuf::as_path)
    }

    /// Sorted distinct labels
    pub fn classes(&self) -> Vec<String> {
        self.labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn class_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(label.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Labels as indices into `classes`
    pub fn encode_labels(&self, classes: &[String]) -> Result<Vec<usize>, DatasetError> {
        let index: BTreeMap<&str, usize> = classes
            .iter()
            .enumerate()
            .map(|(i, c)| (c.as_str(), i))
            .collect();
        self.labels
            .iter()
            .map(|l| {
                index
                    .get(l.as_str())
                    .copied()
                    .ok_or_else(|| DatasetError::UnknownLabel(l.clone()))
            })
            .collect()
    }

    /// Keep only the columns of the given feature-list indices
    pub fn select_features(&self, feature_indices: &[usize]) -> Dataset {
        Dataset {
            features: self.features.select_features(feature_indices),
            ..self.clone()
        }
    }

    /// Keep only the columns of a feature group
    pub fn select_group(&self, group: FeatureGroup) -> Result<Dataset, DatasetError> {
        let indices = self.feature_set.indices_for_group(group);
        let selected = self.select_features(&indices);
        if selected.n_columns() == 0 {
            return Err(DatasetError::EmptyGroup(group.name().to_string()));
        }
        Ok(selected)
    }

    /// Rows containing NaN or infinite values
    pub fn non_finite_rows(&self) -> Vec<usize> {
        self.features
            .values
            .axis_iter(Axis(0))
            .enumerate()
            .filter(|(_, row)| row.iter().any(|v| !v.is_finite()))
            .map(|(i, _)| i)
            .collect()
    }

    /// Remove rows with non-finite features, returning how many were removed
    pub fn drop_non_finite(&mut self) -> usize {
        let bad: BTreeSet<usize> = self.non_finite_rows().into_iter().collect();
        if bad.is_empty() {
            return 0;
        }
        let keep: Vec<usize> = (0..self.len()).filter(|i| !bad.contains(i)).collect();
        *self = self.subset(&keep);
        bad.len()
    }

    /// Dataset made of the given rows, in the given order
    pub fn subset(&self, rows: &[usize]) -> Dataset {
        Dataset {
            features: FeatureMatrix {
                values: self.features.values.select(Axis(0), rows),
                column_ids: self.features.column_ids.clone(),
            },
            labels: rows.iter().map(|&r| self.labels[r].clone()).collect(),
            file_ids: rows.iter().map(|&r| self.file_ids[r]).collect(),
            files: self.files.clone(),
            segments: rows.iter().map(|&r| self.segments[r].clone()).collect(),
            feature_set: self.feature_set.clone(),
        }
    }

    /// Rows whose label passes the filter
    pub fn filter_labels(&self, filter: &LabelFilter) -> Dataset {
        let rows: Vec<usize> = self
            .labels
            .iter()
            .enumerate()
            .filter(|(_, l)| filter.accepts(l))
            .map(|(i, _)| i)
            .collect();
        self.subset(&rows)
    }
}

/// Accumulates per-file features into a [`Dataset`]
pub struct DatasetBuilder {
    feature_set: FeatureSet,
    column_ids: Option<Vec<usize>>,
    blocks: Vec<Array2<f64>>,
    labels: Vec<String>,
    file_ids: Vec<usize>,
    files: Vec<PathBuf>,
    segments: Vec<Segment>,
}

impl DatasetBuilder {
    pub fn new(feature_set: FeatureSet) -> Self {
        Self {
            feature_set,
            column_ids: None,
            blocks: Vec::new(),
            labels: Vec::new(),
            file_ids: Vec::new(),
            files: Vec::new(),
            segments: Vec::new(),
        }
    }

    /// Rows added so far
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Append one file's rows; every file must share the same column layout
    pub fn push(&mut self, file: FileFeatures) -> Result<(), DatasetError> {
        match &self.column_ids {
            Some(ids) if *ids != file.features.column_ids => {
                return Err(DatasetError::ColumnLayoutChanged(file.audio_path));
            }
            Some(_) => {}
            None => self.column_ids = Some(file.features.column_ids.clone()),
        }

        let file_id = self.files.len();
        let n = file.segments.len();
        debug!("Adding {} rows from {}", n, file.audio_path.display());

        self.labels.extend(file.segments.iter().map(|s| s.label.clone()));
        self.file_ids.extend(std::iter::repeat(file_id).take(n));
        self.segments.extend(file.segments);
        self.blocks.push(file.features.values);
        self.files.push(file.audio_path);
        Ok(())
    }

    pub fn build(self) -> Result<Dataset, DatasetError> {
        let column_ids = self.column_ids.ok_or(DatasetError::Empty)?;
        let views: Vec<ArrayView2<'_, f64>> = self.blocks.iter().map(|b| b.view()).collect();
        let values = concatenate(Axis(0), &views)?;

        Ok(Dataset {
            features: FeatureMatrix { values, column_ids },
            labels: self.labels,
            file_ids: self.file_ids,
            files: self.files,
            segments: self.segments,
            feature_set: self.feature_set,
        })
    }
}
