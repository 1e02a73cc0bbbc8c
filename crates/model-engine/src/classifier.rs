//! Classifier Interface

use crate::InferenceError;
use ndarray::{Array2, ArrayView2, Axis};

/// A multi-class classifier over dense feature rows.
///
/// Classes are `0..n_classes`; probabilities are one row per sample.
pub trait Classifier {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<(), InferenceError>;

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64>;

    /// Most probable class per row; ties go to the lowest class index
    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<usize> {
        argmax_rows(&self.predict_proba(x))
    }
}

pub(crate) fn argmax_rows(scores: &Array2<f64>) -> Vec<usize> {
    scores
        .axis_iter(Axis(0))
        .map(|row| {
            let mut best = 0;
            for (i, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = i;
                }
            }
            best
        })
        .collect()
}

/// Row-wise softmax in place
pub(crate) fn softmax_rows(scores: &mut Array2<f64>) {
    for mut row in scores.axis_iter_mut(Axis(0)) {
        let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        if sum > 0.0 {
            row /= sum;
        }
    }
}

/// Common argument checks for `fit`
pub(crate) fn check_training_data(
    x: &ArrayView2<'_, f64>,
    y: &[usize],
    n_classes: usize,
) -> Result<(), InferenceError> {
    if x.nrows() == 0 {
        return Err(InferenceError::TrainingFailed("no training samples".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(InferenceError::InvalidInputShape {
            expected: format!("{} labels", x.nrows()),
            actual: format!("{} labels", y.len()),
        });
    }
    if let Some(&bad) = y.iter().find(|&&c| c >= n_classes) {
        return Err(InferenceError::TrainingFailed(format!(
            "class index {} out of range for {} classes",
            bad, n_classes
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Gaussian-ish blobs around well separated centres, one per class
    pub fn blobs(per_class: usize, centres: &[[f64; 2]], seed: u64) -> (Array2<f64>, Vec<usize>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = per_class * centres.len();
        let mut x = Array2::zeros((n, 2));
        let mut y = Vec::with_capacity(n);
        for (class, centre) in centres.iter().enumerate() {
            for i in 0..per_class {
                let row = class * per_class + i;
                x[[row, 0]] = centre[0] + rng.gen_range(-0.5..0.5);
                x[[row, 1]] = centre[1] + rng.gen_range(-0.5..0.5);
                y.push(class);
            }
        }
        (x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use proptest::prelude::*;

    #[test]
    fn test_argmax_ties_to_lowest() {
        let scores = array![[0.5, 0.5], [0.1, 0.9], [0.3, 0.3]];
        assert_eq!(argmax_rows(&scores), vec![0, 1, 0]);
    }

    #[test]
    fn test_softmax_normalizes() {
        let mut scores = array![[1000.0, 1000.0], [0.0, 2.0_f64.ln()]];
        softmax_rows(&mut scores);
        assert!((scores[[0, 0]] - 0.5).abs() < 1e-12);
        assert!((scores[[1, 1]] - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_training_data_checks() {
        let x = array![[1.0], [2.0]];
        assert!(check_training_data(&x.view(), &[0, 1], 2).is_ok());
        assert!(check_training_data(&x.view(), &[0], 2).is_err());
        assert!(check_training_data(&x.view(), &[0, 2], 2).is_err());
    }

    proptest! {
        #[test]
        fn prop_softmax_rows_are_distributions(
            rows in prop::collection::vec(prop::collection::vec(-500.0f64..500.0, 3), 1..16)
        ) {
            let flat: Vec<f64> = rows.concat();
            let mut scores = Array2::from_shape_vec((rows.len(), 3), flat).unwrap();
            let order = argmax_rows(&scores);
            softmax_rows(&mut scores);
            for row in scores.axis_iter(Axis(0)) {
                prop_assert!((row.sum() - 1.0).abs() < 1e-9);
                prop_assert!(row.iter().all(|&p| (0.0..=1.0).contains(&p)));
            }
            // softmax is monotone, so the winner is unchanged
            prop_assert_eq!(argmax_rows(&scores), order);
        }

        #[test]
        fn prop_argmax_picks_first_maximum(row in prop::collection::vec(0u8..4, 1..12)) {
            let values: Vec<f64> = row.iter().map(|&v| f64::from(v)).collect();
            let scores = Array2::from_shape_vec((1, values.len()), values.clone()).unwrap();
            let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let first = values.iter().position(|&v| v == max).unwrap();
            prop_assert_eq!(argmax_rows(&scores), vec![first]);
        }
    }
}
