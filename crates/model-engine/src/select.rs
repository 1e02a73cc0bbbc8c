//! Model Selection
//!
//! Trains every candidate configuration on several training-set sizes and
//! replicate splits, scores each run on its held-out rows, and keeps the best
//! model per configuration.

use crate::config::{ModelConfig, ModelKind};
use crate::metrics::ConfusionMatrix;
use crate::model::{ModelTrainer, TrainedModel};
use crate::InferenceError;
use dataset::{train_test_split, Dataset, SplitParams};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info};

fn default_replicates() -> usize {
    1
}

fn default_max_concurrent() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn default_stratified() -> bool {
    true
}

/// Training-set sizes and replicates to evaluate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionParams {
    pub num_train_samples: Vec<usize>,
    #[serde(default)]
    pub num_test_samples: Option<usize>,
    #[serde(default = "default_replicates")]
    pub num_replicates: usize,
    /// Base seed; replicate `r` splits with `seed + r`
    #[serde(default)]
    pub seed: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default = "default_stratified")]
    pub stratified: bool,
}

impl SelectionParams {
    pub fn new(num_train_samples: Vec<usize>) -> Self {
        Self {
            num_train_samples,
            num_test_samples: None,
            num_replicates: default_replicates(),
            seed: 0,
            max_concurrent: default_max_concurrent(),
            stratified: true,
        }
    }
}

/// Score of one trained replicate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub config_index: usize,
    pub kind: ModelKind,
    pub num_train: usize,
    pub replicate: usize,
    pub num_test: usize,
    pub accuracy: f64,
    pub confusion: ConfusionMatrix,
}

/// Mean score of a configuration at one training-set size
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSummary {
    pub config_index: usize,
    pub kind: ModelKind,
    pub num_train: usize,
    pub mean_accuracy: f64,
    pub std_accuracy: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectionReport {
    pub runs: Vec<RunResult>,
    pub summaries: Vec<ConfigSummary>,
}

/// Highest-scoring model of one configuration
#[derive(Debug, Clone)]
pub struct BestModel {
    pub config_index: usize,
    pub model: TrainedModel,
    pub accuracy: f64,
}

#[derive(Debug, Clone)]
pub struct SelectionOutcome {
    pub report: SelectionReport,
    pub best: Vec<BestModel>,
}

struct Job {
    config_index: usize,
    num_train: usize,
    replicate: usize,
}

fn run_job(
    job: &Job,
    config: &ModelConfig,
    dataset: &Dataset,
    params: &SelectionParams,
) -> Result<(RunResult, TrainedModel), InferenceError> {
    let split = train_test_split(
        &dataset.labels,
        &SplitParams {
            num_train: job.num_train,
            num_test: params.num_test_samples,
            seed: params.seed.wrapping_add(job.replicate as u64),
            stratified: params.stratified,
        },
    )?;
    let train = dataset.subset(&split.train);
    let test = dataset.subset(&split.test);

    let mut config = config.clone();
    config.seed = config.seed.wrapping_add(job.replicate as u64);
    let model = ModelTrainer::fit(&config, &train)?;

    let predicted = model.predict_labels(&test.features)?;
    let confusion = ConfusionMatrix::from_labels(&test.labels, &predicted);
    let result = RunResult {
        config_index: job.config_index,
        kind: config.kind(),
        num_train: job.num_train,
        replicate: job.replicate,
        num_test: test.len(),
        accuracy: confusion.accuracy(),
        confusion,
    };
    debug!(
        "Config {} ({}), {} train samples, replicate {}: accuracy {:.3}",
        result.config_index, result.kind, result.num_train, result.replicate, result.accuracy
    );
    Ok((result, model))
}

fn summarize(runs: &[RunResult]) -> Vec<ConfigSummary> {
    let mut keys: Vec<(usize, usize, ModelKind)> = runs
        .iter()
        .map(|r| (r.config_index, r.num_train, r.kind))
        .collect();
    keys.dedup();

    keys.into_iter()
        .map(|(config_index, num_train, kind)| {
            let scores: Vec<f64> = runs
                .iter()
                .filter(|r| r.config_index == config_index && r.num_train == num_train)
                .map(|r| r.accuracy)
                .collect();
            let n = scores.len() as f64;
            let mean = scores.iter().sum::<f64>() / n;
            let var = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
            ConfigSummary {
                config_index,
                kind,
                num_train,
                mean_accuracy: mean,
                std_accuracy: var.sqrt(),
            }
        })
        .collect()
}

/// Evaluate every configuration; replicates train concurrently on the
/// blocking pool, at most `max_concurrent` at a time.
pub async fn select_models(
    dataset: Arc<Dataset>,
    configs: &[ModelConfig],
    params: &SelectionParams,
) -> Result<SelectionOutcome, InferenceError> {
    if configs.is_empty() {
        return Err(InferenceError::InvalidConfig("no model configurations".to_string()));
    }
    if params.num_train_samples.is_empty() || params.num_replicates == 0 {
        return Err(InferenceError::InvalidConfig(
            "need at least one training-set size and one replicate".to_string(),
        ));
    }

    let mut jobs = Vec::new();
    for config_index in 0..configs.len() {
        for &num_train in &params.num_train_samples {
            for replicate in 0..params.num_replicates {
                jobs.push(Job {
                    config_index,
                    num_train,
                    replicate,
                });
            }
        }
    }
    info!(
        "Model selection: {} configs, {} training sizes, {} replicates ({} runs) on {} samples",
        configs.len(),
        params.num_train_samples.len(),
        params.num_replicates,
        jobs.len(),
        dataset.len()
    );

    let semaphore = Arc::new(Semaphore::new(params.max_concurrent.max(1)));
    let mut set = JoinSet::new();
    let n_jobs = jobs.len();
    for (slot, job) in jobs.into_iter().enumerate() {
        let permit = semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| InferenceError::TaskFailed(e.to_string()))?;
        let dataset = Arc::clone(&dataset);
        let config = configs[job.config_index].clone();
        let params = params.clone();
        set.spawn_blocking(move || {
            let _permit = permit;
            (slot, run_job(&job, &config, &dataset, &params))
        });
    }

    let mut finished: Vec<Option<(RunResult, TrainedModel)>> = (0..n_jobs).map(|_| None).collect();
    while let Some(joined) = set.join_next().await {
        let (slot, outcome) = joined.map_err(|e| InferenceError::TaskFailed(e.to_string()))?;
        finished[slot] = Some(outcome?);
    }

    let mut runs = Vec::with_capacity(n_jobs);
    let mut best: Vec<Option<BestModel>> = (0..configs.len()).map(|_| None).collect();
    for (result, model) in finished.into_iter().flatten() {
        let slot = &mut best[result.config_index];
        let better = slot.as_ref().map_or(true, |b| result.accuracy > b.accuracy);
        if better {
            *slot = Some(BestModel {
                config_index: result.config_index,
                model,
                accuracy: result.accuracy,
            });
        }
        runs.push(result);
    }

    let summaries = summarize(&runs);
    for s in &summaries {
        info!(
            "Config {} ({}) with {} training samples: mean accuracy {:.3} (std {:.3})",
            s.config_index, s.kind, s.num_train, s.mean_accuracy, s.std_accuracy
        );
    }

    Ok(SelectionOutcome {
        report: SelectionReport { runs, summaries },
        best: best.into_iter().flatten().collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierParams, KnnParams, SvmParams};
    use crate::test_support::two_group_dataset;

    fn configs() -> Vec<ModelConfig> {
        vec![
            ModelConfig::new(ClassifierParams::Knn(KnnParams { k: 3 })),
            ModelConfig::new(ClassifierParams::Svm(SvmParams::default())),
        ]
    }

    #[tokio::test]
    async fn test_selection_runs_every_combination() {
        let ds = Arc::new(two_group_dataset(20, 8));
        let params = SelectionParams {
            num_replicates: 3,
            max_concurrent: 2,
            ..SelectionParams::new(vec![10, 20])
        };

        let outcome = select_models(ds, &configs(), &params).await.unwrap();
        let report = &outcome.report;
        assert_eq!(report.runs.len(), 2 * 2 * 3);
        assert_eq!(report.summaries.len(), 4);
        // results come back in job order regardless of completion order
        assert_eq!(report.runs[0].config_index, 0);
        assert_eq!(report.runs[0].num_train, 10);
        assert_eq!(report.runs[5].replicate, 2);
        assert_eq!(report.runs[6].config_index, 1);

        for run in &report.runs {
            assert_eq!(run.num_test, 40 - run.num_train);
            assert_eq!(run.confusion.total(), run.num_test);
            assert!(run.accuracy > 0.8);
        }

        assert_eq!(outcome.best.len(), 2);
        assert_eq!(outcome.best[1].model.kind, ModelKind::Svm);
    }

    #[tokio::test]
    async fn test_selection_is_deterministic() {
        let ds = Arc::new(two_group_dataset(15, 9));
        let params = SelectionParams {
            num_replicates: 2,
            ..SelectionParams::new(vec![12])
        };
        let a = select_models(Arc::clone(&ds), &configs(), &params).await.unwrap();
        let b = select_models(ds, &configs(), &params).await.unwrap();
        let scores = |o: &SelectionOutcome| o.report.runs.iter().map(|r| r.accuracy).collect::<Vec<_>>();
        assert_eq!(scores(&a), scores(&b));
    }

    #[tokio::test]
    async fn test_oversized_training_set_fails() {
        let ds = Arc::new(two_group_dataset(5, 10));
        let result = select_models(ds, &configs(), &SelectionParams::new(vec![10])).await;
        assert!(matches!(result, Err(InferenceError::Dataset(_))));
    }

    #[test]
    fn test_concurrency_defaults_to_cpu_count() {
        let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        assert_eq!(SelectionParams::new(vec![10]).max_concurrent, cpus);

        let parsed: SelectionParams =
            serde_json::from_str(r#"{"num_train_samples": [10]}"#).unwrap();
        assert_eq!(parsed.max_concurrent, cpus);
        assert!(parsed.max_concurrent >= 1);
    }

    #[tokio::test]
    async fn test_empty_configs_rejected() {
        let ds = Arc::new(two_group_dataset(5, 11));
        let result = select_models(ds, &[], &SelectionParams::new(vec![4])).await;
        assert!(matches!(result, Err(InferenceError::InvalidConfig(_))));
    }
}
