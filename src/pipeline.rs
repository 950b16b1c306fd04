//! Pipeline orchestration
//!
//! This module provides the public API for training and prediction.
//!
//! Training: records → LabelDeriver → labels, records → FeatureEncoder →
//! features, labels → ClassBalancer → weights, then Classifier.fit →
//! ModelStore.save.
//!
//! Prediction: request → RequestValidator → FeatureEncoder →
//! Classifier.predict (which reloads the stored artifact) → labels.

use crate::balancer::ClassBalancer;
use crate::classifier::{DelayClassifier, ModelArtifact, SolverConfig};
use crate::config::DelayConfig;
use crate::encoder::FeatureEncoder;
use crate::error::DelayError;
use crate::labels::LabelDeriver;
use crate::metrics::ClassificationReport;
use crate::schema::{FlightRecord, RecordAdapter};
use crate::store::{FileModelStore, ModelStore};
use crate::types::{FeatureVector, Label, PredictionResponse, TrainingSet};
use tracing::info;

/// Train on a JSON array of flight records and persist the model.
///
/// # Arguments
/// * `records_json` - JSON array of records carrying `Fecha-I` / `Fecha-O`
/// * `model_path` - Artifact file to write
///
/// # Returns
/// The saved artifact as JSON
///
/// # Example
/// ```ignore
/// let artifact_json = train_delay_model(
///     dataset_json,
///     "flight_delay_logreg_model.json".to_string(),
/// )?;
/// ```
pub fn train_delay_model(records_json: String, model_path: String) -> Result<String, DelayError> {
    let records = RecordAdapter::parse_array(&records_json)?;
    let model = DelayModel::new(FileModelStore::new(model_path));
    let artifact = model.train(&records)?;
    Ok(serde_json::to_string(&artifact)?)
}

/// Validate a `{"flights": [...]}` request and predict with the stored model.
///
/// # Arguments
/// * `request_json` - Prediction request body
/// * `model_path` - Artifact file to read
///
/// # Returns
/// A `{"predict": [...]}` response body
///
/// # Example
/// ```ignore
/// let response = predict_delays(
///     r#"{"flights": [{"OPERA": "Grupo LATAM", "TIPOVUELO": "I", "MES": 7}]}"#.to_string(),
///     "flight_delay_logreg_model.json".to_string(),
/// )?;
/// ```
pub fn predict_delays(request_json: String, model_path: String) -> Result<String, DelayError> {
    let model = DelayModel::new(FileModelStore::new(model_path));
    let response = model.predict_request(&request_json)?;
    Ok(serde_json::to_string(&response)?)
}

/// Delay model bound to an artifact store.
///
/// Holds no fitted parameters itself; every prediction reads the latest
/// artifact from the store.
pub struct DelayModel<S: ModelStore> {
    encoder: FeatureEncoder,
    classifier: DelayClassifier<S>,
}

impl DelayModel<FileModelStore> {
    /// File-backed model configured from [`DelayConfig`]
    pub fn from_config(config: &DelayConfig) -> Self {
        Self::with_settings(
            FileModelStore::new(&config.model_path),
            LabelDeriver::new(config.delay_threshold_minutes),
            config.solver(),
        )
    }
}

impl<S: ModelStore> DelayModel<S> {
    /// Model with default labeling threshold and solver settings
    pub fn new(store: S) -> Self {
        Self::with_settings(store, LabelDeriver::default(), SolverConfig::default())
    }

    pub fn with_settings(store: S, label_deriver: LabelDeriver, solver: SolverConfig) -> Self {
        Self {
            encoder: FeatureEncoder::new(label_deriver),
            classifier: DelayClassifier::with_solver(store, solver),
        }
    }

    pub fn store(&self) -> &S {
        self.classifier.store()
    }

    /// Features and labels for training
    pub fn encode_for_training(&self, records: &[FlightRecord]) -> Result<TrainingSet, DelayError> {
        self.encoder.encode_for_training(records)
    }

    /// Features for prediction
    pub fn encode_for_inference(&self, records: &[FlightRecord]) -> Vec<FeatureVector> {
        self.encoder.encode_for_inference(records)
    }

    /// Derive labels, balance classes, fit and persist
    pub fn train(&self, records: &[FlightRecord]) -> Result<ModelArtifact, DelayError> {
        let set = self.encode_for_training(records)?;
        self.fit(&set)
    }

    /// Fit on an already-encoded training set
    pub fn fit(&self, set: &TrainingSet) -> Result<ModelArtifact, DelayError> {
        let weights = ClassBalancer::compute_weights(&set.labels)?;
        let delayed = set.labels.iter().filter(|l| **l == Label::Delayed).count();
        info!(
            samples = set.len(),
            delayed,
            weight_on_time = weights.on_time,
            weight_delayed = weights.delayed,
            "training delay classifier"
        );
        self.classifier.fit(&set.features, &set.labels, &weights)
    }

    /// Predict one label per record, in input order
    pub fn predict(&self, records: &[FlightRecord]) -> Result<Vec<Label>, DelayError> {
        let features = self.encode_for_inference(records);
        self.classifier.predict(&features)
    }

    /// Predict from already-encoded features
    pub fn predict_features(&self, features: &[FeatureVector]) -> Result<Vec<Label>, DelayError> {
        self.classifier.predict(features)
    }

    /// Delay probability per record
    pub fn predict_proba(&self, records: &[FlightRecord]) -> Result<Vec<f64>, DelayError> {
        let features = self.encode_for_inference(records);
        self.classifier.predict_proba(&features)
    }

    /// Validate a raw request body and predict
    pub fn predict_request(&self, request_json: &str) -> Result<PredictionResponse, DelayError> {
        let records = RecordAdapter::parse_request(request_json)?;
        let predict = self.predict(&records)?;
        Ok(PredictionResponse { predict })
    }

    /// Score the stored model against records with timestamps
    pub fn evaluate(&self, records: &[FlightRecord]) -> Result<ClassificationReport, DelayError> {
        let set = self.encode_for_training(records)?;
        let predicted = self.predict_features(&set.features)?;
        let report = ClassificationReport::from_predictions(&set.labels, &predicted)?;
        info!(
            samples = set.len(),
            accuracy = report.accuracy,
            delayed_recall = report.delayed.recall,
            "evaluated delay classifier"
        );
        Ok(report)
    }
}
