//! Train/Test Splitting

use crate::DatasetError;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// How to draw a training set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitParams {
    pub num_train: usize,
    /// Cap on the test set; all remaining rows when unset
    #[serde(default)]
    pub num_test: Option<usize>,
    #[serde(default)]
    pub seed: u64,
    /// Put at least one sample of every class in the training set when possible
    #[serde(default = "default_stratified")]
    pub stratified: bool,
}

fn default_stratified() -> bool {
    true
}

impl SplitParams {
    pub fn new(num_train: usize, seed: u64) -> Self {
        Self {
            num_train,
            num_test: None,
            seed,
            stratified: true,
        }
    }
}

/// Row indices of a train/test split, each sorted ascending
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split rows labeled by `labels` into disjoint train and test sets.
///
/// At least one row must be left for testing.
pub fn train_test_split(labels: &[String], params: &SplitParams) -> Result<Split, DatasetError> {
    let n = labels.len();
    if params.num_train == 0 || params.num_train >= n {
        return Err(DatasetError::NotEnoughSamples {
            requested: params.num_train,
            available: n,
        });
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut rng);

    let mut train = Vec::with_capacity(params.num_train);
    let mut taken = vec![false; n];

    if params.stratified {
        let mut seen = BTreeSet::new();
        for &i in &order {
            if train.len() == params.num_train {
                break;
            }
            if seen.insert(labels[i].as_str()) {
                train.push(i);
                taken[i] = true;
            }
        }
    }
    for &i in &order {
        if train.len() == params.num_train {
            break;
        }
        if !taken[i] {
            train.push(i);
            taken[i] = true;
        }
    }

    let mut test: Vec<usize> = order.into_iter().filter(|&i| !taken[i]).collect();
    if let Some(cap) = params.num_test {
        test.truncate(cap);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn labels(spec: &str) -> Vec<String> {
        spec.chars().map(String::from).collect()
    }

    #[test]
    fn test_sizes_and_determinism() {
        let y = labels("aaaaabbbbbccccc");
        let params = SplitParams::new(6, 7);
        let a = train_test_split(&y, &params).unwrap();
        let b = train_test_split(&y, &params).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.train.len(), 6);
        assert_eq!(a.test.len(), 9);
    }

    #[test]
    fn test_stratified_covers_classes() {
        let y = labels("aaaaaaaaaaaaaaaaaabc");
        for seed in 0..20 {
            let split = train_test_split(&y, &SplitParams::new(3, seed)).unwrap();
            let classes: BTreeSet<&str> = split.train.iter().map(|&i| y[i].as_str()).collect();
            assert_eq!(classes.len(), 3);
        }
    }

    #[test]
    fn test_test_cap() {
        let y = labels("ababababab");
        let params = SplitParams {
            num_test: Some(2),
            ..SplitParams::new(4, 1)
        };
        let split = train_test_split(&y, &params).unwrap();
        assert_eq!(split.test.len(), 2);
    }

    #[test]
    fn test_too_many_train_samples() {
        let y = labels("abab");
        assert!(matches!(
            train_test_split(&y, &SplitParams::new(4, 0)),
            Err(DatasetError::NotEnoughSamples { requested: 4, available: 4 })
        ));
        assert!(train_test_split(&y, &SplitParams::new(0, 0)).is_err());
    }

    proptest! {
        #[test]
        fn prop_split_disjoint(n in 2usize..80, frac in 0.01f64..0.99, seed in any::<u64>(), stratified in any::<bool>()) {
            let y: Vec<String> = (0..n).map(|i| (i % 3).to_string()).collect();
            let num_train = ((n as f64 * frac) as usize).clamp(1, n - 1);
            let params = SplitParams { num_train, num_test: None, seed, stratified };
            let split = train_test_split(&y, &params).unwrap();

            prop_assert_eq!(split.train.len(), num_train);
            prop_assert_eq!(split.train.len() + split.test.len(), n);
            let train: BTreeSet<usize> = split.train.iter().copied().collect();
            prop_assert!(split.test.iter().all(|i| !train.contains(i)));
        }
    }
}
