//! Exoplanet Classifier - disposition classification for exoplanet candidates
//!
//! This crate trains and serves a multiclass gradient-boosted model that
//! labels candidates as CONFIRMED, CANDIDATE, FALSE POSITIVE or REFUTED:
//! - Fixed feature schema and label mapping
//! - Median imputation and standardization
//! - Multiclass LightGBM-style boosting with a held-out evaluation
//! - Versioned, checksummed model bundles that are never overwritten
//! - REST server and CLI interfaces
//!
//! # Modules
//!
//! ## Core
//! - [`schema`] - Feature schema, dispositions and label mapping
//! - [`preprocessing`] - Median imputation and standard scaling
//! - [`training`] - Dataset ingestion, splitting, boosting and the training service
//! - [`model`] - Fitted pipeline and bundle persistence
//! - [`inference`] - Prediction service over a loaded bundle
//!
//! ## Services
//! - [`server`] - HTTP server with REST API
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod schema;
pub mod preprocessing;
pub mod training;
pub mod model;
pub mod inference;

// Services
pub mod server;
pub mod cli;

pub use error::{ErrorKind, ExoError, Result};
pub use inference::{ConfidenceTier, InferenceService, ModelInfo, PredictionResult};
pub use model::{ClassificationPipeline, ModelBundle};
pub use schema::{Disposition, FeatureInput, FeatureSchema, FeatureVector, LabelMapping, RawFeatures, FEATURE_NAMES};
pub use training::{EvaluationMetrics, TrainingConfig, TrainingReport, TrainingService};
