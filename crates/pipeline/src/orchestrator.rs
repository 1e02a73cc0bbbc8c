//! Pipeline Orchestrator

use crate::settings::{Config, ExtractConfig, PredictConfig, SelectConfig};
use crate::PipelineError;
use audio_io::{
    discover_format, find_annotation_files, list_audio_files, load_wav, read_annotation_csv,
    write_annotation_csv, Annotation, AudioFormat, Segment,
};
use dataset::{DatasetBuilder, DatasetError, DatasetValidator};
use feature_engine::{ExtractorParams, FeatureExtractor, FileFeatures, LabelFilter};
use model_engine::{
    request_prediction, select_models, ModelKind, Prediction, PredictionBatcher, Predictor,
    SelectionReport,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::{ArtifactStore, FeatureFile, ModelRecord};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Result of an extract run
#[derive(Debug, Clone)]
pub struct ExtractOutput {
    pub feature_file_path: PathBuf,
    pub output_dir: PathBuf,
    pub feature_file: FeatureFile,
}

/// A best model written by a select run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedModel {
    pub config_index: usize,
    pub kind: ModelKind,
    pub path: PathBuf,
    pub test_accuracy: f64,
}

/// Contents of `select_summary.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectSummary {
    pub feature_file: PathBuf,
    pub num_samples: usize,
    pub dropped_non_finite: usize,
    pub classes: Vec<String>,
    pub models: Vec<SavedModel>,
    pub report: SelectionReport,
}

#[derive(Debug, Clone)]
pub struct SelectOutput {
    pub output_dir: PathBuf,
    pub summary_path: PathBuf,
    pub summary: SelectSummary,
}

#[derive(Debug, Clone)]
pub struct PredictOutput {
    pub csv_path: PathBuf,
    /// Input annotations with predicted labels
    pub annotations: Vec<Annotation>,
    pub unclassified: usize,
    /// Agreement with the input labels, when every input segment was labeled
    pub ground_truth_accuracy: Option<f64>,
}

/// An audio file with its annotation, or `None` to segment it
struct FileJob {
    audio_path: PathBuf,
    annotation: Option<Annotation>,
}

/// Where the audio for a run comes from
struct AudioSource<'a> {
    section: &'static str,
    data_dirs: &'a [PathBuf],
    annotation_file: Option<&'a Path>,
    file_format: Option<AudioFormat>,
    segment: bool,
}

impl AudioSource<'_> {
    fn jobs(&self) -> Result<Vec<FileJob>, PipelineError> {
        match (self.data_dirs.is_empty(), self.annotation_file) {
            (false, Some(_)) => {
                return Err(PipelineError::Config(format!(
                    "{}: data_dirs and annotation_file cannot both be specified",
                    self.section
                )))
            }
            (true, None) => {
                return Err(PipelineError::Config(format!(
                    "{}: either data_dirs or annotation_file must be specified",
                    self.section
                )))
            }
            _ => {}
        }

        if let Some(csv) = self.annotation_file {
            if self.segment {
                return Err(PipelineError::Config(format!(
                    "{}: segmenting needs data_dirs, not an annotation_file",
                    self.section
                )));
            }
            return Ok(read_annotation_csv(csv)?
                .into_iter()
                .map(|a| FileJob {
                    audio_path: a.audio_path.clone(),
                    annotation: Some(a),
                })
                .collect());
        }

        let mut jobs = Vec::new();
        for dir in self.data_dirs {
            if !dir.is_dir() {
                return Err(PipelineError::DataDirNotFound(dir.clone()));
            }
            let format = match self.file_format {
                Some(format) => format,
                None => discover_format(dir)?,
            };
            format.ensure_supported(dir)?;

            if self.segment {
                jobs.extend(
                    list_audio_files(std::slice::from_ref(dir), format)?
                        .into_iter()
                        .map(|audio_path| FileJob {
                            audio_path,
                            annotation: None,
                        }),
                );
            } else {
                let csvs = find_annotation_files(dir)?;
                if csvs.is_empty() {
                    return Err(PipelineError::NoAnnotations(dir.clone()));
                }
                for csv in csvs {
                    jobs.extend(read_annotation_csv(&csv)?.into_iter().map(|a| FileJob {
                        audio_path: a.audio_path.clone(),
                        annotation: Some(a),
                    }));
                }
            }
        }
        Ok(jobs)
    }
}

fn extract_one(
    job: FileJob,
    params: ExtractorParams,
    filter: LabelFilter,
) -> Result<Option<FileFeatures>, PipelineError> {
    if let Some(format) = AudioFormat::from_path(&job.audio_path) {
        format.ensure_supported(&job.audio_path)?;
    }
    let clip = load_wav(&job.audio_path)?;
    let mut extractor = FeatureExtractor::new(params)?;
    let annotation = match job.annotation {
        Some(annotation) => annotation,
        None => {
            let found = extractor.segment(&clip)?;
            debug!("Found {} segments in {}", found.len(), clip.path.display());
            found
        }
    };
    Ok(extractor.extract_file(&clip, &annotation, &filter)?)
}

/// Runs extraction, model selection and prediction
#[derive(Debug, Clone)]
pub struct Pipeline {
    /// Files processed at once when a config does not say
    default_concurrency: usize,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        let default_concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            default_concurrency,
        }
    }

    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            default_concurrency: concurrency.max(1),
        }
    }

    /// Extract every job on the blocking pool; results keep job order and
    /// files without matching labels are left out
    async fn extract_files(
        &self,
        jobs: Vec<FileJob>,
        params: &ExtractorParams,
        filter: &LabelFilter,
        max_concurrent: Option<usize>,
    ) -> Result<Vec<FileFeatures>, PipelineError> {
        let limit = max_concurrent.unwrap_or(self.default_concurrency).max(1);
        let n_jobs = jobs.len();
        info!("Extracting features from {} files ({} at a time)", n_jobs, limit);

        let semaphore = Arc::new(Semaphore::new(limit));
        let mut set = JoinSet::new();
        for (slot, job) in jobs.into_iter().enumerate() {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| PipelineError::Config(e.to_string()))?;
            let params = params.clone();
            let filter = filter.clone();
            set.spawn_blocking(move || {
                let _permit = permit;
                (slot, extract_one(job, params, filter))
            });
        }

        let mut results: Vec<Option<FileFeatures>> = (0..n_jobs).map(|_| None).collect();
        while let Some(joined) = set.join_next().await {
            let (slot, outcome) = joined?;
            results[slot] = outcome?;
        }
        Ok(results.into_iter().flatten().collect())
    }

    pub async fn extract(&self, config: &ExtractConfig) -> Result<ExtractOutput, PipelineError> {
        info!("=== Extracting features ===");
        if config.segment && config.segment_params.is_none() {
            return Err(PipelineError::Config(
                "extract: segment is true but no segment_params were given".to_string(),
            ));
        }
        let feature_set = config.feature_set()?;
        let params = ExtractorParams {
            spect: config.spect_params.clone(),
            segment: config.segment_params.clone(),
            features: feature_set.clone(),
            num_cepstral_coeffs: config.num_cepstral_coeffs,
            window_frames: config.window_frames,
        };
        // fail on bad parameters before touching any audio
        FeatureExtractor::new(params.clone())?;

        let jobs = AudioSource {
            section: "extract",
            data_dirs: &config.data_dirs,
            annotation_file: config.annotation_file.as_deref(),
            file_format: config.file_format,
            segment: config.segment,
        }
        .jobs()?;

        let files = self
            .extract_files(jobs, &params, &config.labels_to_use, config.max_concurrent_files)
            .await?;
        if files.is_empty() {
            return Err(PipelineError::NoFeatures);
        }

        let mut builder = DatasetBuilder::new(feature_set);
        for file in files {
            builder.push(file)?;
        }
        let dataset = builder.build()?;
        info!(
            "Extracted {} x {} features from {} files, classes {:?}",
            dataset.len(),
            dataset.n_columns(),
            dataset.files.len(),
            dataset.classes()
        );

        let store = ArtifactStore::new(&config.output_dir)?;
        let store = if config.timestamped_subdir {
            store.create_run_dir("extract_output")?
        } else {
            store
        };
        let feature_file = FeatureFile::new(params, config.labels_to_use.to_string(), dataset);
        let feature_file_path = store.save_features(&feature_file)?;

        Ok(ExtractOutput {
            feature_file_path,
            output_dir: store.root().to_path_buf(),
            feature_file,
        })
    }

    pub async fn select(&self, config: &SelectConfig) -> Result<SelectOutput, PipelineError> {
        info!("=== Selecting models ===");
        let feature_path = config.feature_file.as_deref().ok_or_else(|| {
            PipelineError::Config("select: feature_file is required".to_string())
        })?;

        let store = ArtifactStore::new(&config.output_dir)?;
        let feature_file = store.load_features(feature_path)?;

        let mut dataset = feature_file.dataset.filter_labels(&config.labels_to_use);
        let dropped = dataset.drop_non_finite();
        if dropped > 0 {
            warn!(
                "Dropped {} samples with non-finite features (segments too short for a spectrogram?)",
                dropped
            );
        }

        let validation = DatasetValidator::new(config.validation.clone()).validate(&dataset);
        if !validation.valid {
            return Err(DatasetError::Invalid(validation.errors).into());
        }
        info!(
            "Training on {} samples, class counts {:?}",
            dataset.len(),
            dataset.class_counts()
        );

        let classes = dataset.classes();
        let num_samples = dataset.len();
        let outcome = select_models(Arc::new(dataset), &config.models, &config.selection).await?;

        let run = store.create_run_dir("select_output")?;
        let mut models = Vec::with_capacity(outcome.best.len());
        for best in outcome.best {
            let kind = best.model.kind;
            let record = ModelRecord::new(best.model, feature_file.params.clone(), best.accuracy);
            let path = run.save_model(&record)?;
            models.push(SavedModel {
                config_index: best.config_index,
                kind,
                path,
                test_accuracy: best.accuracy,
            });
        }

        let summary = SelectSummary {
            feature_file: feature_path.to_path_buf(),
            num_samples,
            dropped_non_finite: dropped,
            classes,
            models,
            report: outcome.report,
        };
        let summary_path = run.write_summary("select_summary.json", &summary)?;

        Ok(SelectOutput {
            output_dir: run.root().to_path_buf(),
            summary_path,
            summary,
        })
    }

    pub async fn predict(&self, config: &PredictConfig) -> Result<PredictOutput, PipelineError> {
        info!("=== Predicting labels ===");
        let store = ArtifactStore::new(&config.output_dir)?;
        let record = store.load_model(&config.model_file)?;
        info!(
            "Loaded {} model {} (test accuracy {:.3})",
            record.model.kind, record.id, record.test_accuracy
        );

        let mut params = record.extractor.clone();
        if let Some(segment) = &config.segment_params {
            params.segment = Some(segment.clone());
        }
        if config.segment && params.segment.is_none() {
            return Err(PipelineError::Config(
                "predict: segment is true but neither the model nor the config has segment_params"
                    .to_string(),
            ));
        }

        let jobs = AudioSource {
            section: "predict",
            data_dirs: &config.data_dirs,
            annotation_file: config.annotation_file.as_deref(),
            file_format: config.file_format,
            segment: config.segment,
        }
        .jobs()?;
        let files = self
            .extract_files(jobs, &params, &LabelFilter::All, config.max_concurrent_files)
            .await?;

        let labeled = predict_files(
            Predictor::new(record.model),
            config.batch_size,
            config.batch_timeout_ms,
            files,
        )
        .await?;

        let mut annotations = Vec::with_capacity(labeled.len());
        let mut unclassified = 0;
        let mut compared = 0;
        let mut agreed = 0;
        let mut all_labeled = true;

        for (file, predictions) in labeled {
            let segments: Vec<Segment> = file
                .segments
                .iter()
                .zip(predictions)
                .map(|(segment, prediction)| {
                    if prediction.probabilities.is_empty() {
                        unclassified += 1;
                    }
                    if segment.is_labeled() {
                        compared += 1;
                        if segment.label == prediction.label {
                            agreed += 1;
                        }
                    } else {
                        all_labeled = false;
                    }
                    Segment::new(segment.onset_s, segment.offset_s, prediction.label)
                })
                .collect();
            debug!("Labeled {} segments of {}", segments.len(), file.audio_path.display());
            annotations.push(Annotation::new(file.audio_path, segments));
        }

        if unclassified > 0 {
            warn!("{} segments could not be classified and were labeled '-'", unclassified);
        }
        let ground_truth_accuracy = (all_labeled && compared > 0).then(|| agreed as f64 / compared as f64);
        if let Some(acc) = ground_truth_accuracy {
            info!("Agreement with existing labels: {:.3}", acc);
        }

        let csv_path = store.root().join("predictions.csv");
        write_annotation_csv(&csv_path, &annotations)?;
        info!(
            "Wrote predictions for {} files to {}",
            annotations.len(),
            csv_path.display()
        );

        Ok(PredictOutput {
            csv_path,
            annotations,
            unclassified,
            ground_truth_accuracy,
        })
    }

    /// Run every configured section; `select` without a feature file uses
    /// the one just extracted
    pub async fn run(&self, config: &Config) -> Result<(), PipelineError> {
        let mut extracted = None;
        if let Some(extract) = &config.extract {
            extracted = Some(self.extract(extract).await?.feature_file_path);
        }

        if let Some(select) = &config.select {
            let mut select = select.clone();
            if select.feature_file.is_none() {
                select.feature_file = extracted.clone();
            }
            self.select(&select).await?;
        }

        if let Some(predict) = &config.predict {
            self.predict(predict).await?;
        }
        Ok(())
    }
}

/// Label every row of every file through a batching prediction service.
/// The service task is always drained and joined before returning, even
/// when a request fails.
async fn predict_files(
    predictor: Predictor,
    batch_size: usize,
    batch_timeout_ms: u64,
    files: Vec<FileFeatures>,
) -> Result<Vec<(FileFeatures, Vec<Prediction>)>, PipelineError> {
    let (tx, mut batcher) = PredictionBatcher::channel(batch_size, batch_timeout_ms);
    let service = tokio::spawn(async move { batcher.run(&predictor).await });

    let labeled = async {
        let mut labeled = Vec::with_capacity(files.len());
        for file in files {
            let mut requests = JoinSet::new();
            for row in 0..file.features.n_rows() {
                let tx = tx.clone();
                let vector = file.features.row(row);
                requests.spawn(async move { (row, request_prediction(&tx, vector).await) });
            }
            let mut predictions: Vec<Option<Prediction>> = vec![None; file.features.n_rows()];
            while let Some(joined) = requests.join_next().await {
                let (row, prediction) = joined?;
                predictions[row] = Some(prediction?);
            }
            let predictions = predictions
                .into_iter()
                .map(|p| p.unwrap_or_else(Prediction::unclassified))
                .collect();
            labeled.push((file, predictions));
        }
        Ok::<_, PipelineError>(labeled)
    }
    .await;

    // Batcher exits once every sender is dropped
    drop(tx);
    let served = service.await;
    let labeled = labeled?;
    served??;
    Ok(labeled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use audio_io::write_wav;
    use feature_engine::FeatureMatrix;
    use model_engine::{ClassifierParams, InferenceError, KnnParams, ModelConfig, ModelTrainer};
    use serde_json::json;
    use std::f64::consts::PI;
    use tempfile::TempDir;

    const SAMPLE_RATE: u32 = 32_000;

    /// Alternating "a" (short, loud, low) and "b" (long, quiet, high) tones
    fn write_song(path: &Path, n_syllables: usize) -> Vec<Segment> {
        let sr = f64::from(SAMPLE_RATE);
        let mut samples = vec![0.0; (0.05 * sr) as usize];
        let mut segments = Vec::new();
        for i in 0..n_syllables {
            let (label, dur, freq, amp) = if i % 2 == 0 {
                ("a", 0.06, 1500.0, 8000.0)
            } else {
                ("b", 0.10, 5000.0, 3000.0)
            };
            let onset = samples.len() as f64 / sr;
            let n = (dur * sr) as usize;
            samples.extend((0..n).map(|t| amp * (2.0 * PI * freq * t as f64 / sr).sin()));
            segments.push(Segment::new(onset, onset + dur, label));
            samples.extend(std::iter::repeat(0.0).take((0.04 * sr) as usize));
        }
        samples.extend(std::iter::repeat(0.0).take((0.05 * sr) as usize));
        write_wav(path, &samples, SAMPLE_RATE).unwrap();
        segments
    }

    fn bird_dir(root: &Path) -> PathBuf {
        let dir = root.join("bird1");
        std::fs::create_dir_all(&dir).unwrap();
        let annotations: Vec<Annotation> = ["song1.wav", "song2.wav"]
            .iter()
            .map(|name| Annotation::new(*name, write_song(&dir.join(name), 12)))
            .collect();
        write_annotation_csv(&dir.join("annotations.csv"), &annotations).unwrap();
        dir
    }

    fn extract_config(data_dir: &Path, output_dir: &Path) -> ExtractConfig {
        serde_json::from_value(json!({
            "data_dirs": [data_dir],
            "feature_groups": ["knn"],
            "labels_to_use": "ab",
            "output_dir": output_dir,
        }))
        .unwrap()
    }

    fn select_config(feature_file: Option<&Path>, output_dir: &Path) -> SelectConfig {
        serde_json::from_value(json!({
            "feature_file": feature_file,
            "models": [{"kind": "knn", "k": 1}],
            "num_train_samples": [8],
            "num_replicates": 2,
            "seed": 7,
            "output_dir": output_dir,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_extract_select_predict() {
        let tmp = TempDir::new().unwrap();
        let data = bird_dir(tmp.path());
        let out = tmp.path().join("out");
        let pipeline = Pipeline::with_concurrency(2);

        let extracted = pipeline.extract(&extract_config(&data, &out)).await.unwrap();
        assert!(extracted.feature_file_path.is_file());
        assert!(extracted.output_dir.starts_with(&out));
        let dataset = &extracted.feature_file.dataset;
        assert_eq!(dataset.len(), 24);
        assert_eq!(dataset.files.len(), 2);
        assert_eq!(dataset.classes(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(extracted.feature_file.labels_to_use, "a,b");

        let selected = pipeline
            .select(&select_config(Some(&extracted.feature_file_path), &out))
            .await
            .unwrap();
        assert!(selected.summary_path.is_file());
        assert_eq!(selected.summary.models.len(), 1);
        assert_eq!(selected.summary.report.runs.len(), 2);
        let saved = &selected.summary.models[0];
        assert_eq!(saved.kind, ModelKind::Knn);
        assert!(saved.path.is_file());
        assert!(saved.test_accuracy > 0.9);

        let predict: PredictConfig = serde_json::from_value(json!({
            "model_file": saved.path,
            "data_dirs": [data],
            "output_dir": out,
        }))
        .unwrap();
        let predicted = pipeline.predict(&predict).await.unwrap();
        assert!(predicted.csv_path.is_file());
        assert_eq!(predicted.annotations.len(), 2);
        assert_eq!(predicted.unclassified, 0);
        assert!(predicted.ground_truth_accuracy.unwrap() > 0.9);

        let written = read_annotation_csv(&predicted.csv_path).unwrap();
        assert_eq!(written, predicted.annotations);
    }

    #[tokio::test]
    async fn test_run_feeds_extracted_file_to_select_and_segments_for_predict() {
        let tmp = TempDir::new().unwrap();
        let data = bird_dir(tmp.path());
        let out = tmp.path().join("out");
        let pipeline = Pipeline::with_concurrency(2);

        let config = Config {
            extract: Some(extract_config(&data, &out)),
            select: Some(select_config(None, &out)),
            predict: None,
        };
        pipeline.run(&config).await.unwrap();

        let select_dir = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().path())
            .find(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("select_output_"))
            })
            .unwrap();
        let model = ArtifactStore::new(&select_dir).unwrap().list_models().unwrap()[0].clone();

        let predict: PredictConfig = serde_json::from_value(json!({
            "model_file": model,
            "data_dirs": [data],
            "segment": true,
            "segment_params": {"threshold": 1000.0},
            "output_dir": out,
        }))
        .unwrap();
        let predicted = pipeline.predict(&predict).await.unwrap();
        assert!(predicted.ground_truth_accuracy.is_none());
        assert!(predicted.annotations.iter().all(|a| !a.is_empty()));
        for label in predicted.annotations.iter().flat_map(|a| a.labels()) {
            assert!(["a", "b", "-"].contains(&label));
        }
    }

    #[tokio::test]
    async fn test_source_errors() {
        let tmp = TempDir::new().unwrap();
        let data = bird_dir(tmp.path());
        let out = tmp.path().join("out");
        let pipeline = Pipeline::new();

        let mut both = extract_config(&data, &out);
        both.annotation_file = Some(data.join("annotations.csv"));
        assert!(matches!(pipeline.extract(&both).await, Err(PipelineError::Config(_))));

        let missing = extract_config(&tmp.path().join("nope"), &out);
        assert!(matches!(
            pipeline.extract(&missing).await,
            Err(PipelineError::DataDirNotFound(_))
        ));

        std::fs::remove_file(data.join("annotations.csv")).unwrap();
        assert!(matches!(
            pipeline.extract(&extract_config(&data, &out)).await,
            Err(PipelineError::NoAnnotations(_))
        ));

        let mut segment = extract_config(&data, &out);
        segment.segment = true;
        assert!(matches!(pipeline.extract(&segment).await, Err(PipelineError::Config(_))));
    }

    #[tokio::test]
    async fn test_no_matching_labels() {
        let tmp = TempDir::new().unwrap();
        let data = bird_dir(tmp.path());
        let mut config = extract_config(&data, &tmp.path().join("out"));
        config.labels_to_use = LabelFilter::parse("xyz");
        config.annotation_file = Some(data.join("annotations.csv"));
        config.data_dirs.clear();

        assert!(matches!(
            Pipeline::new().extract(&config).await,
            Err(PipelineError::NoFeatures)
        ));
    }

    #[tokio::test]
    async fn test_extraction_keeps_annotation_order() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("bird2");
        std::fs::create_dir_all(&dir).unwrap();
        // longest file in the middle so workers finish out of order
        let listed = [("song_c.wav", 3), ("song_a.wav", 12), ("song_b.wav", 6)];
        let annotations: Vec<Annotation> = listed
            .iter()
            .map(|(name, n)| Annotation::new(*name, write_song(&dir.join(name), *n)))
            .collect();
        write_annotation_csv(&dir.join("annotations.csv"), &annotations).unwrap();

        let extracted = Pipeline::with_concurrency(4)
            .extract(&extract_config(&dir, &tmp.path().join("out")))
            .await
            .unwrap();
        let dataset = &extracted.feature_file.dataset;

        let expected_files: Vec<PathBuf> = listed.iter().map(|(name, _)| dir.join(name)).collect();
        assert_eq!(dataset.files, expected_files);
        assert_eq!(dataset.len(), 21);

        let expected_onsets: Vec<f64> = read_annotation_csv(&dir.join("annotations.csv"))
            .unwrap()
            .iter()
            .flat_map(|a| a.segments.iter().map(|s| s.onset_s))
            .collect();
        let onsets: Vec<f64> = dataset.segments.iter().map(|s| s.onset_s).collect();
        assert_eq!(onsets, expected_onsets);

        let expected_ids: Vec<usize> = listed
            .iter()
            .enumerate()
            .flat_map(|(id, (_, n))| std::iter::repeat(id).take(*n))
            .collect();
        assert_eq!(dataset.file_ids, expected_ids);
    }

    #[tokio::test]
    async fn test_failed_prediction_joins_the_batcher() {
        let tmp = TempDir::new().unwrap();
        let data = bird_dir(tmp.path());
        let extracted = Pipeline::new()
            .extract(&extract_config(&data, &tmp.path().join("out")))
            .await
            .unwrap();
        let model = ModelTrainer::fit(
            &ModelConfig::new(ClassifierParams::Knn(KnnParams { k: 1 })),
            &extracted.feature_file.dataset,
        )
        .unwrap();

        // no columns, so every request is rejected by the model
        let narrow = FileFeatures {
            audio_path: data.join("song1.wav"),
            sample_rate: SAMPLE_RATE,
            segments: vec![Segment::new(0.05, 0.11, "a"), Segment::new(0.15, 0.25, "b")],
            features: FeatureMatrix::with_rows(2),
        };
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(10),
            predict_files(Predictor::new(model), 4, 5, vec![narrow]),
        )
        .await
        .unwrap();
        assert!(matches!(
            result,
            Err(PipelineError::Inference(InferenceError::InferenceFailed(_)))
        ));
    }

    #[tokio::test]
    async fn test_select_rejects_single_class() {
        let tmp = TempDir::new().unwrap();
        let data = bird_dir(tmp.path());
        let out = tmp.path().join("out");
        let pipeline = Pipeline::new();

        let extracted = pipeline.extract(&extract_config(&data, &out)).await.unwrap();
        let mut config = select_config(Some(&extracted.feature_file_path), &out);
        config.labels_to_use = LabelFilter::parse("a");

        assert!(matches!(
            pipeline.select(&config).await,
            Err(PipelineError::Dataset(DatasetError::Invalid(_)))
        ));
    }
}
