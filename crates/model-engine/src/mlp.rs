//! Multilayer Perceptron

use crate::classifier::{check_training_data, softmax_rows, Classifier};
use crate::config::MlpParams;
use crate::InferenceError;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One hidden ReLU layer with a softmax output, trained by mini-batch SGD
/// on cross-entropy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    params: MlpParams,
    seed: u64,
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
}

fn xavier(rng: &mut StdRng, fan_in: usize, fan_out: usize) -> Array2<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit))
}

impl Mlp {
    pub fn new(params: MlpParams, seed: u64) -> Result<Self, InferenceError> {
        if params.hidden_units == 0 || params.epochs == 0 || params.batch_size == 0 {
            return Err(InferenceError::InvalidConfig(
                "MLP needs hidden_units, epochs and batch_size above zero".to_string(),
            ));
        }
        if !(params.learning_rate > 0.0) {
            return Err(InferenceError::InvalidConfig(format!(
                "MLP learning rate must be positive, got {}",
                params.learning_rate
            )));
        }
        Ok(Self {
            params,
            seed,
            w1: Array2::zeros((0, 0)),
            b1: Array1::zeros(0),
            w2: Array2::zeros((0, 0)),
            b2: Array1::zeros(0),
        })
    }

    /// Hidden pre-activations and output probabilities
    fn forward(&self, x: &ArrayView2<'_, f64>) -> (Array2<f64>, Array2<f64>) {
        let z1 = x.dot(&self.w1) + &self.b1;
        let a1 = z1.mapv(|v| v.max(0.0));
        let mut out = a1.dot(&self.w2) + &self.b2;
        softmax_rows(&mut out);
        (z1, out)
    }

    fn step(&mut self, x: ArrayView2<'_, f64>, y: &[usize]) -> f64 {
        let m = x.nrows() as f64;
        let (z1, proba) = self.forward(&x);
        let a1 = z1.mapv(|v| v.max(0.0));

        let mut loss = 0.0;
        let mut dz2 = proba;
        for (mut row, &class) in dz2.axis_iter_mut(Axis(0)).zip(y) {
            loss -= row[class].max(1e-12).ln();
            row[class] -= 1.0;
        }
        dz2 /= m;

        let dw2 = a1.t().dot(&dz2);
        let db2 = dz2.sum_axis(Axis(0));
        let mut dz1 = dz2.dot(&self.w2.t());
        dz1.zip_mut_with(&z1, |g, &z| {
            if z <= 0.0 {
                *g = 0.0;
            }
        });
        let dw1 = x.t().dot(&dz1);
        let db1 = dz1.sum_axis(Axis(0));

        let lr = self.params.learning_rate;
        self.w2.scaled_add(-lr, &dw2);
        self.b2.scaled_add(-lr, &db2);
        self.w1.scaled_add(-lr, &dw1);
        self.b1.scaled_add(-lr, &db1);
        loss / m
    }
}

impl Classifier for Mlp {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<(), InferenceError> {
        check_training_data(&x, y, n_classes)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        let hidden = self.params.hidden_units;

        self.w1 = xavier(&mut rng, x.ncols(), hidden);
        self.b1 = Array1::zeros(hidden);
        self.w2 = xavier(&mut rng, hidden, n_classes);
        self.b2 = Array1::zeros(n_classes);

        let mut order: Vec<usize> = (0..x.nrows()).collect();
        let mut last_loss = f64::NAN;
        for epoch in 0..self.params.epochs {
            order.shuffle(&mut rng);
            let mut total = 0.0;
            let mut batches = 0;
            for chunk in order.chunks(self.params.batch_size) {
                let xb = x.select(Axis(0), chunk);
                let yb: Vec<usize> = chunk.iter().map(|&i| y[i]).collect();
                total += self.step(xb.view(), &yb);
                batches += 1;
            }
            last_loss = total / batches as f64;
            if !last_loss.is_finite() {
                return Err(InferenceError::TrainingFailed(format!(
                    "MLP loss diverged at epoch {}",
                    epoch
                )));
            }
        }

        debug!(
            "Fitted MLP: {} -> {} -> {}, final loss {:.4}",
            x.ncols(),
            hidden,
            n_classes,
            last_loss
        );
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        self.forward(&x).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::fixtures::blobs;

    fn params() -> MlpParams {
        MlpParams {
            hidden_units: 16,
            learning_rate: 0.1,
            epochs: 200,
            batch_size: 8,
        }
    }

    #[test]
    fn test_invalid_params() {
        let zero_hidden = MlpParams {
            hidden_units: 0,
            ..params()
        };
        assert!(Mlp::new(zero_hidden, 0).is_err());
        let bad_rate = MlpParams {
            learning_rate: 0.0,
            ..params()
        };
        assert!(Mlp::new(bad_rate, 0).is_err());
    }

    #[test]
    fn test_learns_separable_blobs() {
        let (x, y) = blobs(15, &[[-2.0, -2.0], [2.0, 2.0], [-2.0, 2.0]], 9);
        let mut mlp = Mlp::new(params(), 4).unwrap();
        mlp.fit(x.view(), &y, 3).unwrap();

        let predicted = mlp.predict(x.view());
        let correct = predicted.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / y.len() as f64 > 0.95);
    }

    #[test]
    fn test_same_seed_same_model() {
        let (x, y) = blobs(5, &[[-1.0, 0.0], [1.0, 0.0]], 2);
        let mut a = Mlp::new(params(), 7).unwrap();
        let mut b = Mlp::new(params(), 7).unwrap();
        a.fit(x.view(), &y, 2).unwrap();
        b.fit(x.view(), &y, 2).unwrap();
        assert_eq!(a.predict_proba(x.view()), b.predict_proba(x.view()));
    }
}
