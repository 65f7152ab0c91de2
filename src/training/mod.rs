//! Model training module
//!
//! Provides the training side of the model lifecycle:
//! - Dataset ingestion and validation (CSV or JSON records)
//! - Stratified train/test splitting
//! - Multiclass LightGBM-style gradient boosting
//! - Held-out evaluation
//! - The one-shot training service that persists the model bundle

mod config;
pub mod dataset;
pub mod lightgbm;
pub mod metrics;
pub mod service;
pub mod split;

pub use config::TrainingConfig;
pub use dataset::{check_min_records, TrainingDataset, TrainingRecord, MIN_TRAINING_RECORDS};
pub use lightgbm::{ClassWeight, LightGBMClassifier, LightGBMConfig};
pub use metrics::{AverageReport, ClassReport, EvaluationMetrics};
pub use service::{
    CancellationToken, ModelStatus, TrainingOutcome, TrainingReport, TrainingService, TrainingSource,
    TrainingStage,
};
pub use split::{stratified_split, SplitIndices};
