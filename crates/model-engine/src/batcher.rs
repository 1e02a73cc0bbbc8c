//! Prediction Batcher

use feature_engine::FeatureVector;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};
use tracing::{debug, info};

use crate::engine::{Prediction, Predictor};
use crate::InferenceError;

/// Reply channel for one queued feature vector
pub type PredictionReply = oneshot::Sender<Result<Prediction, InferenceError>>;

/// A feature vector waiting to be classified
pub type PredictionRequest = (FeatureVector, PredictionReply);

/// Collects single feature vectors into batches for the predictor
pub struct PredictionBatcher {
    /// Channel receiver for incoming requests
    receiver: mpsc::Receiver<PredictionRequest>,
    /// Batch size threshold
    batch_size: usize,
    /// Timeout for batch collection (ms)
    timeout_ms: u64,
}

impl PredictionBatcher {
    pub fn new(receiver: mpsc::Receiver<PredictionRequest>, batch_size: usize, timeout_ms: u64) -> Self {
        info!("Creating prediction batcher: batch_size={}, timeout={}ms", batch_size, timeout_ms);
        Self {
            receiver,
            batch_size: batch_size.max(1),
            timeout_ms,
        }
    }

    /// Create a channel pair for the batcher
    pub fn channel(batch_size: usize, timeout_ms: u64) -> (mpsc::Sender<PredictionRequest>, Self) {
        let (tx, rx) = mpsc::channel(batch_size.max(1) * 2);
        (tx, Self::new(rx, batch_size, timeout_ms))
    }

    /// Serve requests until every sender is dropped
    pub async fn run(&mut self, predictor: &Predictor) -> Result<(), InferenceError> {
        info!("Starting prediction batcher");
        let mut served = 0usize;

        loop {
            let mut batch: Vec<PredictionRequest> = Vec::with_capacity(self.batch_size);
            let timeout_duration = Duration::from_millis(self.timeout_ms);

            match self.receiver.recv().await {
                Some(request) => batch.push(request),
                None => {
                    debug!("Batcher channel closed");
                    break;
                }
            }

            while batch.len() < self.batch_size {
                match timeout(timeout_duration, self.receiver.recv()).await {
                    Ok(Some(request)) => batch.push(request),
                    // closed or timed out
                    Ok(None) | Err(_) => break,
                }
            }

            debug!("Processing batch of {} feature vectors", batch.len());
            let (rows, replies): (Vec<FeatureVector>, Vec<PredictionReply>) = batch.into_iter().unzip();
            served += rows.len();

            match predictor.predict_rows(&rows) {
                Ok(predictions) => {
                    for (reply, prediction) in replies.into_iter().zip(predictions) {
                        // the caller may have given up waiting
                        let _ = reply.send(Ok(prediction));
                    }
                }
                Err(e) => {
                    debug!("Batch prediction error: {}", e);
                    let message = e.to_string();
                    for reply in replies {
                        let _ = reply.send(Err(InferenceError::InferenceFailed(message.clone())));
                    }
                }
            }
        }

        info!("Prediction batcher stopped after {} requests", served);
        Ok(())
    }
}

/// Queue one feature vector and wait for its prediction
pub async fn request_prediction(
    sender: &mpsc::Sender<PredictionRequest>,
    features: FeatureVector,
) -> Result<Prediction, InferenceError> {
    let (reply, response) = oneshot::channel();
    sender
        .send((features, reply))
        .await
        .map_err(|_| InferenceError::ServiceClosed)?;
    response.await.map_err(|_| InferenceError::ServiceClosed)?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierParams, KnnParams, ModelConfig};
    use crate::model::ModelTrainer;
    use crate::test_support::two_group_dataset;

    #[tokio::test]
    async fn test_batched_predictions_reach_callers() {
        let ds = two_group_dataset(8, 6);
        let config = ModelConfig::new(ClassifierParams::Knn(KnnParams { k: 1 }));
        let predictor = Predictor::new(ModelTrainer::fit(&config, &ds).unwrap());

        let (tx, mut batcher) = PredictionBatcher::channel(4, 20);
        let service = tokio::spawn(async move { batcher.run(&predictor).await });

        let mut pending = Vec::new();
        for i in 0..ds.len() {
            let tx = tx.clone();
            let row = ds.features.row(i);
            pending.push(tokio::spawn(async move { request_prediction(&tx, row).await }));
        }
        for (i, handle) in pending.into_iter().enumerate() {
            let prediction = handle.await.unwrap().unwrap();
            assert_eq!(prediction.label, ds.labels[i]);
        }

        drop(tx);
        service.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bad_width_reported_to_caller() {
        let ds = two_group_dataset(4, 7);
        let config = ModelConfig::new(ClassifierParams::Knn(KnnParams::default()));
        let predictor = Predictor::new(ModelTrainer::fit(&config, &ds).unwrap());

        let (tx, mut batcher) = PredictionBatcher::channel(2, 10);
        let service = tokio::spawn(async move { batcher.run(&predictor).await });

        let result = request_prediction(&tx, FeatureVector::new(vec![0.0])).await;
        assert!(matches!(result, Err(InferenceError::InferenceFailed(_))));

        drop(tx);
        service.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_closed_service() {
        let (tx, batcher) = PredictionBatcher::channel(2, 10);
        drop(batcher);
        let result = request_prediction(&tx, FeatureVector::default()).await;
        assert!(matches!(result, Err(InferenceError::ServiceClosed)));
    }
}
