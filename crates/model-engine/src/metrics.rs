//! Classification Metrics

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fraction of positions where `predicted` equals `truth`
pub fn accuracy<T: PartialEq>(truth: &[T], predicted: &[T]) -> f64 {
    if truth.is_empty() {
        return 0.0;
    }
    let correct = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    correct as f64 / truth.len() as f64
}

/// Counts of (true label, predicted label) pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    /// Sorted union of true and predicted labels
    pub classes: Vec<String>,
    /// `counts[true][predicted]`
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    pub fn from_labels(truth: &[String], predicted: &[String]) -> Self {
        let mut index: BTreeMap<&str, usize> = truth
            .iter()
            .chain(predicted)
            .map(|l| (l.as_str(), 0))
            .collect();
        for (i, value) in index.values_mut().enumerate() {
            *value = i;
        }

        let n = index.len();
        let mut counts = vec![vec![0; n]; n];
        for (t, p) in truth.iter().zip(predicted) {
            counts[index[t.as_str()]][index[p.as_str()]] += 1;
        }
        Self {
            classes: index.keys().map(|k| k.to_string()).collect(),
            counts,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let diagonal: usize = (0..self.classes.len()).map(|i| self.counts[i][i]).sum();
        diagonal as f64 / total as f64
    }

    /// Recall of each class; `None` for classes with no true samples
    pub fn recall(&self) -> Vec<Option<f64>> {
        self.counts
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let support: usize = row.iter().sum();
                (support > 0).then(|| row[i] as f64 / support as f64)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(spec: &str) -> Vec<String> {
        spec.chars().map(String::from).collect()
    }

    #[test]
    fn test_accuracy() {
        assert_eq!(accuracy(&[0, 1, 1, 2], &[0, 1, 2, 2]), 0.75);
        assert_eq!(accuracy::<usize>(&[], &[]), 0.0);
    }

    #[test]
    fn test_confusion_matrix() {
        let cm = ConfusionMatrix::from_labels(&labels("aabbc"), &labels("abbbd"));
        assert_eq!(cm.classes, vec!["a", "b", "c", "d"]);
        assert_eq!(cm.counts[0], vec![1, 1, 0, 0]);
        assert_eq!(cm.counts[1], vec![0, 2, 0, 0]);
        assert_eq!(cm.counts[2], vec![0, 0, 0, 1]);
        assert_eq!(cm.total(), 5);
        assert!((cm.accuracy() - 0.6).abs() < 1e-12);
        assert_eq!(cm.recall(), vec![Some(0.5), Some(1.0), Some(0.0), None]);
    }
}
