//! Data preprocessing module
//!
//! Numeric preprocessing applied identically at training and serving time:
//! - Missing value imputation (per-column median)
//! - Feature scaling (zero mean, unit variance)

mod imputer;
mod pipeline;
mod scaler;

pub use imputer::MedianImputer;
pub use pipeline::NumericPreprocessor;
pub use scaler::{ScalerParams, StandardScaler};

use serde::{Deserialize, Serialize};

/// Frozen statistics of one feature, computed during fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStatistics {
    pub name: String,
    pub median: f64,
    pub mean: f64,
    pub std: f64,
}
