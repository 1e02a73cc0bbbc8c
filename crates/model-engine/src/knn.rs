//! k-Nearest Neighbours

use crate::classifier::{check_training_data, Classifier};
use crate::InferenceError;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Euclidean k-NN with majority vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KNearestNeighbors {
    k: usize,
    n_classes: usize,
    train_x: Array2<f64>,
    train_y: Vec<usize>,
}

/// Vote tally for one query row
struct Votes {
    counts: Vec<usize>,
    /// Rank of each class's nearest neighbour among the k
    nearest: Vec<usize>,
    k: usize,
}

impl KNearestNeighbors {
    pub fn new(k: usize) -> Result<Self, InferenceError> {
        if k == 0 {
            return Err(InferenceError::InvalidConfig("k must be at least 1".to_string()));
        }
        Ok(Self {
            k,
            n_classes: 0,
            train_x: Array2::zeros((0, 0)),
            train_y: Vec::new(),
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn votes(&self, query: ArrayView1<'_, f64>) -> Votes {
        let mut dists: Vec<(f64, usize)> = self
            .train_x
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(i, row)| {
                let d: f64 = row
                    .iter()
                    .zip(query.iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                (d, i)
            })
            .collect();
        dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

        let k = self.k.min(dists.len());
        let mut counts = vec![0; self.n_classes];
        let mut nearest = vec![usize::MAX; self.n_classes];
        for (rank, &(_, i)) in dists.iter().take(k).enumerate() {
            let class = self.train_y[i];
            counts[class] += 1;
            nearest[class] = nearest[class].min(rank);
        }
        Votes { counts, nearest, k }
    }
}

impl Classifier for KNearestNeighbors {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[usize], n_classes: usize) -> Result<(), InferenceError> {
        check_training_data(&x, y, n_classes)?;
        self.n_classes = n_classes;
        self.train_x = x.to_owned();
        self.train_y = y.to_vec();
        Ok(())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut proba = Array2::zeros((x.nrows(), self.n_classes));
        for (query, mut out) in x.axis_iter(Axis(0)).zip(proba.axis_iter_mut(Axis(0))) {
            let votes = self.votes(query);
            for (p, &c) in out.iter_mut().zip(&votes.counts) {
                *p = c as f64 / votes.k.max(1) as f64;
            }
        }
        proba
    }

    /// Majority vote; tied classes are decided by whichever has the nearer neighbour
    fn predict(&self, x: ArrayView2<'_, f64>) -> Vec<usize> {
        x.axis_iter(Axis(0))
            .map(|query| {
                let votes = self.votes(query);
                (0..self.n_classes)
                    .max_by(|&a, &b| {
                        votes.counts[a]
                            .cmp(&votes.counts[b])
                            .then(votes.nearest[b].cmp(&votes.nearest[a]))
                    })
                    .unwrap_or(0)
            })
            .collect()
    }
}
