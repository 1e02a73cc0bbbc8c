//! Dataset Validation

use crate::error::ValidationError;
use crate::Dataset;
use serde::{Deserialize, Serialize};

/// Validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Minimum samples every class needs
    pub min_samples_per_class: usize,
    /// Minimum number of distinct classes
    pub min_classes: usize,
    /// Accept rows containing NaN or infinite values
    pub allow_non_finite: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_samples_per_class: 1,
            min_classes: 2,
            allow_non_finite: false,
        }
    }
}

/// Result of validation
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the dataset passed every check
    pub valid: bool,
    /// List of validation errors
    pub errors: Vec<ValidationError>,
    /// Number of rows validated
    pub rows_checked: usize,
}

impl ValidationResult {
    pub fn valid(rows_checked: usize) -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            rows_checked,
        }
    }

    pub fn invalid(errors: Vec<ValidationError>, rows_checked: usize) -> Self {
        Self {
            valid: false,
            errors,
            rows_checked,
        }
    }
}

/// Checks a dataset is fit for training
pub struct DatasetValidator {
    config: ValidationConfig,
}

impl DatasetValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Run every check and collect the failures
    pub fn validate(&self, dataset: &Dataset) -> ValidationResult {
        let mut errors = Vec::new();

        if let Err(e) = self.validate_shape(dataset) {
            errors.push(e);
        }
        if !self.config.allow_non_finite {
            if let Err(e) = self.validate_finite(dataset) {
                errors.push(e);
            }
        }
        errors.extend(self.validate_classes(dataset));

        if errors.is_empty() {
            ValidationResult::valid(dataset.len())
        } else {
            ValidationResult::invalid(errors, dataset.len())
        }
    }

    /// Per-row metadata must have one entry per matrix row
    pub fn validate_shape(&self, dataset: &Dataset) -> Result<(), ValidationError> {
        let rows = dataset.features.n_rows();
        let checks = [
            ("labels", dataset.labels.len()),
            ("file ids", dataset.file_ids.len()),
            ("segments", dataset.segments.len()),
        ];
        for (what, actual) in checks {
            if actual != rows {
                return Err(ValidationError::ShapeMismatch {
                    what,
                    expected: rows,
                    actual,
                });
            }
        }
        let columns = dataset.features.n_columns();
        if dataset.features.column_ids.len() != columns {
            return Err(ValidationError::ShapeMismatch {
                what: "column ids",
                expected: columns,
                actual: dataset.features.column_ids.len(),
            });
        }
        Ok(())
    }

    pub fn validate_finite(&self, dataset: &Dataset) -> Result<(), ValidationError> {
        let rows = dataset.non_finite_rows().len();
        if rows > 0 {
            Err(ValidationError::NonFinite { rows })
        } else {
            Ok(())
        }
    }

    pub fn validate_classes(&self, dataset: &Dataset) -> Vec<ValidationError> {
        let counts = dataset.class_counts();
        let mut errors = Vec::new();
        if counts.len() < self.config.min_classes {
            errors.push(ValidationError::TooFewClasses {
                found: counts.len(),
                required: self.config.min_classes,
            });
        }
        for (class, count) in counts {
            if count < self.config.min_samples_per_class {
                errors.push(ValidationError::TooFewSamples {
                    class,
                    count,
                    required: self.config.min_samples_per_class,
                });
            }
        }
        errors
    }
}

impl Default for DatasetValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::toy_dataset;

    #[test]
    fn test_valid_dataset() {
        let ds = toy_dataset(&["a", "b", "a", "b"]);
        let result = DatasetValidator::default().validate(&ds);
        assert!(result.valid);
        assert_eq!(result.rows_checked, 4);
    }

    #[test]
    fn test_single_class_rejected() {
        let ds = toy_dataset(&["a", "a", "a"]);
        let result = DatasetValidator::default().validate(&ds);
        assert!(!result.valid);
        assert_eq!(
            result.errors,
            vec![ValidationError::TooFewClasses { found: 1, required: 2 }]
        );
    }

    #[test]
    fn test_class_support() {
        let ds = toy_dataset(&["a", "b", "a", "a"]);
        let validator = DatasetValidator::new(ValidationConfig {
            min_samples_per_class: 2,
            ..Default::default()
        });
        let errors = validator.validate_classes(&ds);
        assert_eq!(
            errors,
            vec![ValidationError::TooFewSamples {
                class: "b".to_string(),
                count: 1,
                required: 2
            }]
        );
    }

    #[test]
    fn test_non_finite_rows() {
        let mut ds = toy_dataset(&["a", "b", "a", "b"]);
        ds.features.values[[1, 0]] = f64::NAN;
        ds.features.values[[3, 1]] = f64::INFINITY;

        let validator = DatasetValidator::default();
        assert_eq!(
            validator.validate_finite(&ds),
            Err(ValidationError::NonFinite { rows: 2 })
        );

        let lenient = DatasetValidator::new(ValidationConfig {
            allow_non_finite: true,
            ..Default::default()
        });
        assert!(lenient.validate(&ds).valid);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut ds = toy_dataset(&["a", "b"]);
        ds.labels.pop();
        assert!(matches!(
            DatasetValidator::default().validate_shape(&ds),
            Err(ValidationError::ShapeMismatch { what: "labels", .. })
        ));
    }
}
