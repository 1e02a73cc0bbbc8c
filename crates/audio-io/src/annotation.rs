//! Annotation CSV Files
//!
//! One row per segment: `filename,onset_s,offset_s,label`. Rows of the same
//! file are grouped into one [`Annotation`] in first-seen order.

use crate::{Annotation, AudioError, Segment};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Serialize, Deserialize)]
struct AnnotationRow {
    filename: String,
    onset_s: f64,
    offset_s: f64,
    label: String,
}

/// Read an annotation CSV.
///
/// Relative filenames are resolved against the CSV's own directory.
pub fn read_annotation_csv(path: &Path) -> Result<Vec<Annotation>, AudioError> {
    let csv_err = |source| AudioError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(csv_err)?;

    let mut order: Vec<PathBuf> = Vec::new();
    let mut grouped: HashMap<PathBuf, Vec<Segment>> = HashMap::new();

    for row in reader.deserialize::<AnnotationRow>() {
        let row = row.map_err(csv_err)?;
        if !(row.onset_s < row.offset_s) {
            return Err(AudioError::InvalidSegment {
                path: path.to_path_buf(),
                onset_s: row.onset_s,
                offset_s: row.offset_s,
            });
        }

        let audio_path = {
            let p = PathBuf::from(&row.filename);
            if p.is_absolute() {
                p
            } else {
                base.join(p)
            }
        };

        grouped
            .entry(audio_path.clone())
            .or_insert_with(|| {
                order.push(audio_path);
                Vec::new()
            })
            .push(Segment::new(row.onset_s, row.offset_s, row.label));
    }

    let annotations: Vec<Annotation> = order
        .into_iter()
        .map(|p| {
            let segments = grouped.remove(&p).unwrap_or_default();
            Annotation::new(p, segments)
        })
        .collect();

    debug!(
        "Read {} annotated files from {}",
        annotations.len(),
        path.display()
    );
    Ok(annotations)
}

/// Write annotations as a CSV with one row per segment
pub fn write_annotation_csv(path: &Path, annotations: &[Annotation]) -> Result<(), AudioError> {
    let csv_err = |source| AudioError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    for annotation in annotations {
        let filename = annotation.audio_path.to_string_lossy().into_owned();
        for segment in &annotation.segments {
            writer
                .serialize(AnnotationRow {
                    filename: filename.clone(),
                    onset_s: segment.onset_s,
                    offset_s: segment.offset_s,
                    label: segment.label.clone(),
                })
                .map_err(csv_err)?;
        }
    }
    writer.flush()?;
    Ok(())
}
