//! Inference service
//!
//! Loads the model bundle once and serves predictions from it. The loaded bundle
//! is shared as an `Arc`; prediction calls clone it out of the lock and run
//! without holding it.

use crate::error::{ExoError, Result};
use crate::model::ModelBundle;
use crate::schema::{FeatureInput, LabelMapping};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Version string reported for served models
pub const MODEL_VERSION: &str = "1.0.0";

/// Minimum max-probability for a `high` confidence prediction
pub const HIGH_CONFIDENCE: f64 = 0.70;
/// Minimum max-probability for a `medium` confidence prediction
pub const MEDIUM_CONFIDENCE: f64 = 0.50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

impl ConfidenceTier {
    pub fn from_probability(p: f64) -> Self {
        if p >= HIGH_CONFIDENCE {
            ConfidenceTier::High
        } else if p >= MEDIUM_CONFIDENCE {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// Outcome of classifying one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: String,
    pub prediction_code: usize,
    /// Probability of every label, summing to 1
    pub probabilities: BTreeMap<String, f64>,
    pub max_probability: f64,
    pub confidence: ConfidenceTier,
    pub timestamp: DateTime<Utc>,
}

/// Metadata of the loaded model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub model_version: String,
    pub bundle_format_version: u32,
    pub trained_at: DateTime<Utc>,
    pub features: Vec<String>,
    pub num_features: usize,
    pub labels: Vec<String>,
    pub label_mapping: LabelMapping,
    pub model_path: String,
}

/// Externally visible load state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadState {
    Unloaded,
    Loaded,
    LoadFailed { reason: String },
}

enum ServiceState {
    Unloaded,
    Loaded(Arc<ModelBundle>),
    LoadFailed(String),
}

pub struct InferenceService {
    model_path: PathBuf,
    state: RwLock<ServiceState>,
}

impl InferenceService {
    /// Create an unloaded service for the bundle at `model_path`
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            state: RwLock::new(ServiceState::Unloaded),
        }
    }

    /// Create a service already holding `bundle`
    pub fn with_bundle(model_path: impl Into<PathBuf>, bundle: ModelBundle) -> Self {
        Self {
            model_path: model_path.into(),
            state: RwLock::new(ServiceState::Loaded(Arc::new(bundle))),
        }
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Load the bundle from disk once.
    ///
    /// A no-op when already loaded. After a failed load this returns the recorded
    /// failure without touching the disk again; use [`reload`](Self::reload) to retry.
    pub fn load(&self) -> Result<()> {
        let mut state = self.state.write();
        match &*state {
            ServiceState::Loaded(_) => {
                tracing::debug!("Model already loaded, skipping load");
                return Ok(());
            }
            ServiceState::LoadFailed(reason) => {
                return Err(ExoError::ModelNotLoaded(reason.clone()));
            }
            ServiceState::Unloaded => {}
        }
        self.load_locked(&mut state)
    }

    /// Retry loading from `Unloaded` or `LoadFailed`; a no-op when loaded
    pub fn reload(&self) -> Result<()> {
        let mut state = self.state.write();
        if let ServiceState::Loaded(_) = &*state {
            tracing::debug!("Model already loaded, skipping reload");
            return Ok(());
        }
        self.load_locked(&mut state)
    }

    fn load_locked(&self, state: &mut ServiceState) -> Result<()> {
        if !self.model_path.exists() {
            let reason = format!(
                "model file not found at {}; train a model first",
                self.model_path.display()
            );
            tracing::warn!(path = %self.model_path.display(), "Model file not found");
            *state = ServiceState::LoadFailed(reason.clone());
            return Err(ExoError::ModelNotLoaded(reason));
        }

        tracing::info!(path = %self.model_path.display(), "Loading model bundle");
        match ModelBundle::load(&self.model_path) {
            Ok(bundle) => {
                tracing::info!(
                    features = bundle.num_features(),
                    labels = ?bundle.label_mapping.labels(),
                    "Model loaded"
                );
                *state = ServiceState::Loaded(Arc::new(bundle));
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load model bundle");
                *state = ServiceState::LoadFailed(e.to_string());
                Err(e)
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(&*self.state.read(), ServiceState::Loaded(_))
    }

    pub fn state(&self) -> LoadState {
        match &*self.state.read() {
            ServiceState::Unloaded => LoadState::Unloaded,
            ServiceState::Loaded(_) => LoadState::Loaded,
            ServiceState::LoadFailed(reason) => LoadState::LoadFailed { reason: reason.clone() },
        }
    }

    /// The loaded bundle, or `ModelNotLoaded`
    pub fn bundle(&self) -> Result<Arc<ModelBundle>> {
        match &*self.state.read() {
            ServiceState::Loaded(bundle) => Ok(Arc::clone(bundle)),
            ServiceState::Unloaded => Err(ExoError::ModelNotLoaded(
                "model has not been loaded".into(),
            )),
            ServiceState::LoadFailed(reason) => Err(ExoError::ModelNotLoaded(reason.clone())),
        }
    }

    pub fn features(&self) -> Result<Vec<String>> {
        Ok(self.bundle()?.features().to_vec())
    }

    pub fn label_mapping(&self) -> Result<LabelMapping> {
        Ok(self.bundle()?.label_mapping.clone())
    }

    /// Classify one candidate given as a [`FeatureVector`](crate::schema::FeatureVector)
    /// or a raw JSON object
    pub fn predict_one<F: FeatureInput>(&self, features: &F) -> Result<PredictionResult> {
        let bundle = self.bundle()?;
        predict_with(&bundle, features)
    }

    /// Predict every element independently, preserving order.
    ///
    /// Fails as a whole only when no model is loaded; otherwise each element gets
    /// its own result.
    pub fn predict_batch<F: FeatureInput + Sync>(&self, batch: &[F]) -> Result<Vec<Result<PredictionResult>>> {
        let bundle = self.bundle()?;
        let results: Vec<Result<PredictionResult>> = batch
            .par_iter()
            .map(|features| predict_with(&bundle, features))
            .collect();
        let failed = results.iter().filter(|r| r.is_err()).count();
        tracing::debug!(total = batch.len(), failed, "Batch prediction complete");
        Ok(results)
    }

    pub fn model_info(&self) -> Result<ModelInfo> {
        let bundle = self.bundle()?;
        Ok(ModelInfo {
            model_type: bundle.model_name.clone(),
            model_version: MODEL_VERSION.to_string(),
            bundle_format_version: bundle.format_version,
            trained_at: bundle.created_at,
            features: bundle.features().to_vec(),
            num_features: bundle.num_features(),
            labels: bundle.label_mapping.labels().to_vec(),
            label_mapping: bundle.label_mapping.clone(),
            model_path: self.model_path.display().to_string(),
        })
    }
}

fn predict_with<F: FeatureInput>(bundle: &ModelBundle, features: &F) -> Result<PredictionResult> {
    let row = features.project_onto(&bundle.feature_schema)?;
    let (code, probs) = bundle.pipeline.predict_row(&row)?;

    let labels = bundle.label_mapping.labels();
    let prediction = labels
        .get(code)
        .cloned()
        .ok_or_else(|| ExoError::ShapeError {
            expected: format!("class code below {}", labels.len()),
            actual: code.to_string(),
        })?;
    let max_probability = probs[code];
    let probabilities = labels.iter().cloned().zip(probs.iter().copied()).collect();

    Ok(PredictionResult {
        prediction,
        prediction_code: code,
        probabilities,
        max_probability,
        confidence: ConfidenceTier::from_probability(max_probability),
        timestamp: Utc::now(),
    })
}
