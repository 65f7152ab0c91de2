//! One-shot training service
//!
//! A run moves through `Validating -> Splitting -> Fitting -> Evaluating ->
//! Persisting -> Done`, or ends in `Rejected`. Runs on the same service are
//! serialized, and the bundle is persisted with a no-clobber rename so at most
//! one run can ever succeed for a given path.

use super::config::TrainingConfig;
use super::dataset::{TrainingDataset, TrainingRecord};
use super::metrics::EvaluationMetrics;
use super::split::{stratified_split, take_labels, take_rows};
use crate::error::{ExoError, Result};
use crate::model::{ClassificationPipeline, ModelBundle};
use crate::schema::LabelMapping;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Position of the service in the training state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStage {
    NoModel,
    Validating,
    Splitting,
    Fitting,
    Evaluating,
    Persisting,
    Done,
    Rejected,
}

impl std::fmt::Display for TrainingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TrainingStage::NoModel => "no_model",
            TrainingStage::Validating => "validating",
            TrainingStage::Splitting => "splitting",
            TrainingStage::Fitting => "fitting",
            TrainingStage::Evaluating => "evaluating",
            TrainingStage::Persisting => "persisting",
            TrainingStage::Done => "done",
            TrainingStage::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Cooperative cancellation flag, checked right before the fit
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where the training data comes from
#[derive(Debug, Clone)]
pub enum TrainingSource<'a> {
    CsvPath(&'a Path),
    CsvBytes(&'a [u8]),
    Records(&'a [TrainingRecord]),
    Dataset(TrainingDataset),
}

/// Summary of a successful training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub status: String,
    pub message: String,
    pub model_path: String,
    pub metrics: EvaluationMetrics,
    pub features: Vec<String>,
    pub num_features: usize,
    pub label_mapping: LabelMapping,
    pub training_samples: usize,
    pub test_samples: usize,
    pub training_duration_seconds: f64,
    pub timestamp: DateTime<Utc>,
}

/// Report plus the bundle that was written
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub report: TrainingReport,
    pub bundle: ModelBundle,
}

/// Whether a model exists and whether training is allowed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelStatus {
    pub model_exists: bool,
    pub model_path: String,
    pub can_train: bool,
    pub message: String,
}

/// Trains and persists the model bundle at a fixed path
pub struct TrainingService {
    model_path: PathBuf,
    config: TrainingConfig,
    run_lock: Mutex<()>,
    stage: RwLock<TrainingStage>,
}

impl TrainingService {
    pub fn new(model_path: impl Into<PathBuf>, config: TrainingConfig) -> Self {
        let model_path = model_path.into();
        let stage = if model_path.exists() {
            TrainingStage::Done
        } else {
            TrainingStage::NoModel
        };
        Self {
            model_path,
            config,
            run_lock: Mutex::new(()),
            stage: RwLock::new(stage),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    pub fn stage(&self) -> TrainingStage {
        *self.stage.read()
    }

    pub fn model_exists(&self) -> bool {
        self.model_path.exists()
    }

    pub fn status(&self) -> ModelStatus {
        let exists = self.model_exists();
        let message = if exists {
            "Model already exists. Delete it first to train a new one.".to_string()
        } else {
            "No model found. Training is available.".to_string()
        };
        ModelStatus {
            model_exists: exists,
            model_path: self.model_path.display().to_string(),
            can_train: !exists,
            message,
        }
    }

    pub fn train_from_csv(&self, path: impl AsRef<Path>, force: bool) -> Result<TrainingOutcome> {
        self.train(TrainingSource::CsvPath(path.as_ref()), force, &CancellationToken::new())
    }

    pub fn train_from_csv_bytes(&self, data: &[u8], force: bool) -> Result<TrainingOutcome> {
        self.train(TrainingSource::CsvBytes(data), force, &CancellationToken::new())
    }

    pub fn train_from_records(&self, records: &[TrainingRecord], force: bool) -> Result<TrainingOutcome> {
        self.train(TrainingSource::Records(records), force, &CancellationToken::new())
    }

    /// Run the full pipeline. Any error aborts the run and nothing is written.
    pub fn train(
        &self,
        source: TrainingSource<'_>,
        force: bool,
        cancel: &CancellationToken,
    ) -> Result<TrainingOutcome> {
        let _guard = self.run_lock.lock();

        // Guard failures leave the stage untouched: the run never started
        self.ensure_can_train(force)?;

        let result = self.run(source, cancel);
        if let Err(ref e) = result {
            self.transition(TrainingStage::Rejected);
            tracing::warn!(error = %e, kind = ?e.kind(), "Training run rejected");
        }
        result
    }

    /// Existence guard: `force` is rejected and an existing bundle blocks training.
    /// Checked again under the run lock and once more by the no-clobber persist.
    pub fn ensure_can_train(&self, force: bool) -> Result<()> {
        if force {
            return Err(ExoError::NotImplemented(
                "force retraining is disabled; delete the existing model manually to retrain".into(),
            ));
        }
        if self.model_exists() {
            return Err(ExoError::ModelExists(self.model_path.clone()));
        }
        Ok(())
    }

    fn run(&self, source: TrainingSource<'_>, cancel: &CancellationToken) -> Result<TrainingOutcome> {
        let start = Instant::now();
        let schema = &self.config.feature_schema;
        let mapping = &self.config.label_mapping;
        self.config.validate()?;

        self.transition(TrainingStage::Validating);
        let dataset = match source {
            TrainingSource::CsvPath(path) => TrainingDataset::from_csv_path(path, schema, mapping)?,
            TrainingSource::CsvBytes(data) => TrainingDataset::from_csv_bytes(data, schema, mapping)?,
            TrainingSource::Records(records) => TrainingDataset::from_records(records, schema, mapping)?,
            TrainingSource::Dataset(dataset) => {
                if dataset.feature_names() != schema.names() {
                    return Err(ExoError::ShapeError {
                        expected: format!("features {:?}", schema.names()),
                        actual: format!("{:?}", dataset.feature_names()),
                    });
                }
                dataset
            }
        };
        let counts = dataset.class_counts(mapping.len());
        tracing::info!(
            samples = dataset.n_samples(),
            class_distribution = ?class_distribution(mapping, &counts),
            "Training data validated"
        );

        self.transition(TrainingStage::Splitting);
        let split = stratified_split(dataset.labels(), mapping.len(), self.config.test_fraction, self.config.seed)?;
        let x_train = take_rows(dataset.features(), &split.train);
        let y_train = take_labels(dataset.labels(), &split.train);
        let x_test = take_rows(dataset.features(), &split.test);
        let y_test = take_labels(dataset.labels(), &split.test);
        tracing::info!(train = split.train_len(), test = split.test_len(), "Stratified split complete");

        if cancel.is_cancelled() {
            return Err(ExoError::Cancelled("fit".into()));
        }

        self.transition(TrainingStage::Fitting);
        let pipeline = ClassificationPipeline::fit(
            schema.names().to_vec(),
            &x_train,
            &y_train,
            mapping.len(),
            &self.config.lightgbm,
        )?;

        self.transition(TrainingStage::Evaluating);
        let y_pred = pipeline.predict(&x_test)?;
        let metrics = EvaluationMetrics::compute(&y_test, &y_pred, mapping);
        tracing::info!(accuracy = metrics.accuracy, test_samples = metrics.n_samples, "Model evaluated");
        if metrics.accuracy < self.config.accuracy_floor {
            return Err(ExoError::AccuracyTooLow {
                accuracy: metrics.accuracy,
                floor: self.config.accuracy_floor,
            });
        }

        self.transition(TrainingStage::Persisting);
        let bundle = ModelBundle::new(schema.clone(), mapping.clone(), pipeline, Some(metrics.clone()))?;
        bundle.save_new(&self.model_path)?;

        let duration = start.elapsed().as_secs_f64();
        self.transition(TrainingStage::Done);
        tracing::info!(
            path = %self.model_path.display(),
            duration_secs = duration,
            "Training complete"
        );

        let report = TrainingReport {
            status: "success".to_string(),
            message: format!(
                "Model trained successfully with accuracy {:.4}",
                metrics.accuracy
            ),
            model_path: self.model_path.display().to_string(),
            metrics,
            features: schema.names().to_vec(),
            num_features: schema.len(),
            label_mapping: mapping.clone(),
            training_samples: split.train_len(),
            test_samples: split.test_len(),
            training_duration_seconds: duration,
            timestamp: Utc::now(),
        };
        Ok(TrainingOutcome { report, bundle })
    }

    fn transition(&self, next: TrainingStage) {
        let mut stage = self.stage.write();
        let prev = *stage;
        tracing::info!(from = %prev, to = %next, "Training stage transition");
        *stage = next;
    }
}

fn class_distribution(mapping: &LabelMapping, counts: &[usize]) -> Vec<(String, usize)> {
    mapping
        .labels()
        .iter()
        .cloned()
        .zip(counts.iter().copied())
        .collect()
}
