//! HTTP request handlers

use std::sync::Arc;
use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::ErrorKind;
use crate::inference::{ModelInfo, PredictionResult};
use crate::schema::RawFeatures;
use crate::training::{
    check_min_records, CancellationToken, ModelStatus, TrainingDataset, TrainingRecord, TrainingReport,
    TrainingSource,
};

use super::error::{Result, ServerError};
use super::state::AppState;

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BatchPredictRequest {
    pub candidates: Vec<RawFeatures>,
}

/// One element of a batch response: a prediction or the reason it failed
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Prediction(PredictionResult),
    Failed {
        index: usize,
        error: bool,
        kind: ErrorKind,
        message: String,
    },
}

#[derive(Debug, Serialize)]
pub struct BatchPredictResponse {
    pub predictions: Vec<BatchEntry>,
    pub total_processed: usize,
    pub total_failed: usize,
}

#[derive(Debug, Deserialize)]
pub struct TrainRequest {
    pub data: Vec<TrainingRecord>,
    #[serde(default)]
    pub force: bool,
}

// ============================================================================
// Service Handlers
// ============================================================================

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Exoplanet Classification API",
        "version": env!("CARGO_PKG_VERSION"),
        "health": "/api/v1/health",
        "model_info": "/api/v1/model/info",
    }))
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "model_loaded": state.inference.is_loaded(),
        "model_state": state.inference.state(),
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": (chrono::Utc::now() - state.started_at).num_seconds(),
        "timestamp": chrono::Utc::now(),
    }))
}

// ============================================================================
// Prediction Handlers
// ============================================================================

pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(features): Json<RawFeatures>,
) -> Result<Json<PredictionResult>> {
    let result = state.inference.predict_one(&features)?;
    info!(
        prediction = %result.prediction,
        max_probability = result.max_probability,
        "Prediction served"
    );
    Ok(Json(result))
}

pub async fn predict_batch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BatchPredictRequest>,
) -> Result<Json<BatchPredictResponse>> {
    let inference = Arc::clone(&state.inference);
    let candidates = request.candidates;
    let results = tokio::task::spawn_blocking(move || inference.predict_batch(&candidates))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    let total_processed = results.len();
    let predictions: Vec<BatchEntry> = results
        .into_iter()
        .enumerate()
        .map(|(index, r)| match r {
            Ok(prediction) => BatchEntry::Prediction(prediction),
            Err(e) => BatchEntry::Failed {
                index,
                error: true,
                kind: e.kind(),
                message: e.to_string(),
            },
        })
        .collect();
    let total_failed = predictions
        .iter()
        .filter(|p| matches!(p, BatchEntry::Failed { .. }))
        .count();

    info!(total_processed, total_failed, "Batch prediction served");
    Ok(Json(BatchPredictResponse {
        predictions,
        total_processed,
        total_failed,
    }))
}

// ============================================================================
// Model Management Handlers
// ============================================================================

pub async fn model_info(State(state): State<Arc<AppState>>) -> Result<Json<ModelInfo>> {
    Ok(Json(state.inference.model_info()?))
}

pub async fn model_status(State(state): State<Arc<AppState>>) -> Json<ModelStatus> {
    Json(state.training.status())
}

pub async fn reload_model(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    let inference = Arc::clone(&state.inference);
    tokio::task::spawn_blocking(move || inference.reload())
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    Ok(Json(serde_json::json!({
        "success": true,
        "model_loaded": state.inference.is_loaded(),
        "model_path": state.config.model_path.display().to_string(),
    })))
}

// ============================================================================
// Training Handlers
// ============================================================================

/// Train from a JSON list of records
pub async fn train_json(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrainRequest>,
) -> Result<Json<TrainingReport>> {
    state.training.ensure_can_train(request.force)?;
    check_min_records(request.data.len())?;
    info!(records = request.data.len(), "Training request received");

    let training = Arc::clone(&state.training);
    let TrainRequest { data, force } = request;
    let outcome = tokio::task::spawn_blocking(move || training.train_from_records(&data, force))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))??;

    reload_after_training(&state).await;
    Ok(Json(outcome.report))
}

/// Train from an uploaded CSV file (multipart field `file`, optional field `force`)
pub async fn train_csv(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<TrainingReport>> {
    let mut data: Option<Vec<u8>> = None;
    let mut force = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("file").to_string();
        match name.as_str() {
            "force" => {
                let value = field.text().await.map_err(|e| ServerError::BadRequest(e.to_string()))?;
                force = matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes");
            }
            _ => {
                let file_name = field.file_name().unwrap_or("data.csv").to_string();
                if !file_name.to_ascii_lowercase().ends_with(".csv") {
                    return Err(ServerError::BadRequest(format!(
                        "File must be a CSV file, got '{}'",
                        file_name
                    )));
                }
                let bytes = field.bytes().await.map_err(|e| ServerError::BadRequest(e.to_string()))?;
                info!(file = %file_name, bytes = bytes.len(), "Received training CSV");
                data = Some(bytes.to_vec());
            }
        }
    }

    let data = data.ok_or_else(|| ServerError::BadRequest("No CSV file provided".into()))?;
    state.training.ensure_can_train(force)?;

    let training = Arc::clone(&state.training);
    let outcome = tokio::task::spawn_blocking(move || {
        let config = training.config();
        let dataset = TrainingDataset::from_csv_bytes(&data, &config.feature_schema, &config.label_mapping)?;
        check_min_records(dataset.n_samples())?;
        training.train(TrainingSource::Dataset(dataset), force, &CancellationToken::new())
    })
    .await
    .map_err(|e| ServerError::Internal(e.to_string()))??;

    reload_after_training(&state).await;
    Ok(Json(outcome.report))
}

async fn reload_after_training(state: &Arc<AppState>) {
    let inference = Arc::clone(&state.inference);
    match tokio::task::spawn_blocking(move || inference.reload()).await {
        Ok(Ok(())) => info!("Inference service reloaded with the new model"),
        Ok(Err(e)) => warn!(error = %e, "Model trained but inference reload failed"),
        Err(e) => warn!(error = %e, "Inference reload task failed"),
    }
}
