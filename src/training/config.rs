//! Training configuration

use crate::error::{ExoError, Result};
use crate::schema::{FeatureSchema, LabelMapping};
use super::lightgbm::LightGBMConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Ordered feature columns consumed by the model
    pub feature_schema: FeatureSchema,

    /// Label name to class code mapping, fixed for the lifetime of the model
    pub label_mapping: LabelMapping,

    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,

    /// Seed for the stratified split
    pub seed: u64,

    /// Minimum held-out accuracy required to persist the model
    pub accuracy_floor: f64,

    /// Classifier hyperparameters
    pub lightgbm: LightGBMConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            feature_schema: FeatureSchema::canonical(),
            label_mapping: LabelMapping::default(),
            test_fraction: 0.2,
            seed: 42,
            accuracy_floor: 0.5,
            lightgbm: LightGBMConfig::default(),
        }
    }
}

impl TrainingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_feature_schema(mut self, schema: FeatureSchema) -> Self {
        self.feature_schema = schema;
        self
    }

    pub fn with_label_mapping(mut self, mapping: LabelMapping) -> Self {
        self.label_mapping = mapping;
        self
    }

    pub fn with_test_fraction(mut self, fraction: f64) -> Self {
        self.test_fraction = fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_accuracy_floor(mut self, floor: f64) -> Self {
        self.accuracy_floor = floor;
        self
    }

    pub fn with_lightgbm(mut self, config: LightGBMConfig) -> Self {
        self.lightgbm = config;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ExoError::InvalidParameter {
                name: "test_fraction".into(),
                value: self.test_fraction.to_string(),
                reason: "must be in (0, 1)".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.accuracy_floor) {
            return Err(ExoError::InvalidParameter {
                name: "accuracy_floor".into(),
                value: self.accuracy_floor.to_string(),
                reason: "must be in [0, 1]".into(),
            });
        }
        self.lightgbm.validate()
    }

    /// Save the configuration as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a configuration from JSON; absent fields take their defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}
