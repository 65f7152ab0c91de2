//! Inference module
//!
//! Serves predictions from a persisted model bundle:
//! - Load-once lifecycle with explicit reload after failures
//! - Single and batch prediction (batch elements run in parallel via rayon)
//! - Per-label probabilities and a confidence tier for every prediction

mod service;

pub use service::{
    ConfidenceTier, InferenceService, LoadState, ModelInfo, PredictionResult, HIGH_CONFIDENCE,
    MEDIUM_CONFIDENCE, MODEL_VERSION,
};
