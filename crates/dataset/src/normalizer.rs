//! Feature Scaling

use crate::DatasetError;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Scaling method
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingMethod {
    /// Zero mean, unit variance per column
    #[default]
    Standard,
    /// Min-max scaling to [0, 1]
    MinMax,
    /// No scaling
    None,
}

/// Per-column affine scaler fitted on training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    method: ScalingMethod,
    /// Subtracted from each column
    offset: Array1<f64>,
    /// Multiplied after the offset; 0 for constant columns
    factor: Array1<f64>,
}

impl Scaler {
    /// Fit a scaler to the columns of `x`
    pub fn fit(method: ScalingMethod, x: &Array2<f64>) -> Self {
        let n_cols = x.ncols();
        let (offset, spread) = match method {
            ScalingMethod::Standard => {
                let mean = x
                    .mean_axis(Axis(0))
                    .unwrap_or_else(|| Array1::zeros(n_cols));
                let std = x.std_axis(Axis(0), 0.0);
                (mean, std)
            }
            ScalingMethod::MinMax => {
                let min = x.fold_axis(Axis(0), f64::INFINITY, |acc, &v| acc.min(v));
                let max = x.fold_axis(Axis(0), f64::NEG_INFINITY, |acc, &v| acc.max(v));
                let range = &max - &min;
                (min, range)
            }
            ScalingMethod::None => (Array1::zeros(n_cols), Array1::ones(n_cols)),
        };

        let offset = offset.mapv(|v| if v.is_finite() { v } else { 0.0 });
        let factor = spread.mapv(|s| if s.is_finite() && s > 1e-12 { 1.0 / s } else { 0.0 });

        Self {
            method,
            offset,
            factor,
        }
    }

    pub fn method(&self) -> ScalingMethod {
        self.method
    }

    pub fn n_columns(&self) -> usize {
        self.offset.len()
    }

    /// Scale `x` with the fitted parameters
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, DatasetError> {
        if x.ncols() != self.n_columns() {
            return Err(DatasetError::ScalerMismatch {
                expected: self.n_columns(),
                actual: x.ncols(),
            });
        }
        Ok((x - &self.offset) * &self.factor)
    }

    pub fn fit_transform(method: ScalingMethod, x: &Array2<f64>) -> (Self, Array2<f64>) {
        let scaler = Self::fit(method, x);
        let scaled = (x - &scaler.offset) * &scaler.factor;
        (scaler, scaled)
    }
}
