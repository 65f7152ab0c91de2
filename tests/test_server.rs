//! Integration test: Server API endpoints

use exoplanet_classifier::schema::FEATURE_NAMES;
use exoplanet_classifier::server::{create_router, AppState, ServerConfig};
use exoplanet_classifier::training::{LightGBMConfig, TrainingConfig};
use std::sync::Arc;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

fn test_app(dir: &tempfile::TempDir) -> axum::Router {
    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        model_path: dir.path().join("models").join("model.bin"),
        max_upload_size: 10 * 1024 * 1024,
        cors_origin: None,
    };
    let training = TrainingConfig::default()
        .with_lightgbm(LightGBMConfig::default().with_n_estimators(10));
    let state = Arc::new(AppState::new(config.clone(), training));
    state.load_model();
    create_router(state, &config)
}

fn candidate(confirmed: bool, i: usize) -> serde_json::Map<String, Value> {
    let base = if confirmed { 10.0 } else { 1.0 };
    FEATURE_NAMES
        .iter()
        .enumerate()
        .map(|(j, name)| (name.to_string(), json!(base + (i % 7) as f64 * 0.1 + j as f64)))
        .collect()
}

fn training_body(n: usize, force: bool) -> Value {
    let data: Vec<Value> = (0..n)
        .map(|i| {
            let confirmed = i % 10 < 7;
            let mut record = candidate(confirmed, i);
            record.insert(
                "disposition".to_string(),
                json!(if confirmed { "CONFIRMED" } else { "CANDIDATE" }),
            );
            Value::Object(record)
        })
        .collect();
    json!({ "data": data, "force": force })
}

async fn send(app: &axum::Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_health_endpoint() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let (status, body) = send(&app, "GET", "/api/v1/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], false);
}

#[tokio::test]
async fn test_predict_without_model_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let (status, body) = send(&app, "POST", "/api/v1/predict", Some(Value::Object(candidate(true, 0)))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], true);
    assert_eq!(body["kind"], "state_conflict");
}

#[tokio::test]
async fn test_model_status_before_training() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let (status, body) = send(&app, "GET", "/api/v1/model/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_exists"], false);
    assert_eq!(body["can_train"], true);
}

#[tokio::test]
async fn test_train_then_predict() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);

    let (status, report) = send(&app, "POST", "/api/v1/train", Some(training_body(100, false))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["status"], "success");
    assert_eq!(report["training_samples"], 80);
    assert_eq!(report["test_samples"], 20);
    assert_eq!(report["num_features"], 8);

    let (status, prediction) =
        send(&app, "POST", "/api/v1/predict", Some(Value::Object(candidate(true, 1)))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prediction["prediction"], "CONFIRMED");
    let probabilities = prediction["probabilities"].as_object().unwrap();
    assert_eq!(probabilities.len(), 4);
    let sum: f64 = probabilities.values().map(|p| p.as_f64().unwrap()).sum();
    assert!((sum - 1.0).abs() < 1e-6);

    let (status, info) = send(&app, "GET", "/api/v1/model/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["model_type"], "LightGBM");
    assert_eq!(info["num_features"], 8);

    // A second training request conflicts with the stored model
    let (status, body) = send(&app, "POST", "/api/v1/train", Some(training_body(100, false))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["kind"], "state_conflict");
}

#[tokio::test]
async fn test_batch_predict_counts_failures() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let (status, _) = send(&app, "POST", "/api/v1/train", Some(training_body(100, false))).await;
    assert_eq!(status, StatusCode::OK);

    let mut broken = candidate(false, 2);
    broken.remove("loc1_ra");
    let body = json!({
        "candidates": [candidate(true, 0), broken, candidate(false, 4)]
    });
    let (status, response) = send(&app, "POST", "/api/v1/predict/batch", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total_processed"], 3);
    assert_eq!(response["total_failed"], 1);

    let predictions = response["predictions"].as_array().unwrap();
    assert!(predictions[0]["prediction"].is_string());
    assert_eq!(predictions[1]["error"], true);
    assert_eq!(predictions[1]["index"], 1);
    assert_eq!(predictions[1]["kind"], "schema");
    assert!(predictions[2]["prediction"].is_string());
}

#[tokio::test]
async fn test_force_training_is_not_implemented() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let (status, body) = send(&app, "POST", "/api/v1/train", Some(training_body(100, true))).await;
    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert_eq!(body["kind"], "not_implemented");
}

#[tokio::test]
async fn test_too_few_records_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let (status, body) = send(&app, "POST", "/api/v1/train", Some(training_body(20, false))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "data_quality");
}

#[tokio::test]
async fn test_predict_missing_features_after_training() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let (status, _) = send(&app, "POST", "/api/v1/train", Some(training_body(100, false))).await;
    assert_eq!(status, StatusCode::OK);

    let mut features = candidate(true, 0);
    features.remove("temp_estrella");
    let (status, body) = send(&app, "POST", "/api/v1/predict", Some(Value::Object(features))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "schema");
    assert!(body["message"].as_str().unwrap().contains("temp_estrella"));
}

#[tokio::test]
async fn test_predict_ignores_non_numeric_extra_fields() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let (status, _) = send(&app, "POST", "/api/v1/train", Some(training_body(100, false))).await;
    assert_eq!(status, StatusCode::OK);

    let mut features = candidate(true, 0);
    features.insert("kepler_name".to_string(), json!("Kepler-22 b"));
    features.insert("id_obj".to_string(), json!("KOI-87.01"));
    let (status, prediction) = send(&app, "POST", "/api/v1/predict", Some(Value::Object(features.clone()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(prediction["prediction"], "CONFIRMED");

    let body = json!({ "candidates": [features] });
    let (status, response) = send(&app, "POST", "/api/v1/predict/batch", Some(body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["total_failed"], 0);

    // A non-numeric value under a schema key is still rejected
    let mut bad = candidate(true, 0);
    bad.insert("radio_planeta".to_string(), json!("large"));
    let (status, body) = send(&app, "POST", "/api/v1/predict", Some(Value::Object(bad))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "data_quality");
    assert!(body["message"].as_str().unwrap().contains("radio_planeta"));
}

#[tokio::test]
async fn test_unknown_route_returns_json_404() {
    let dir = tempfile::tempdir().unwrap();
    let app = test_app(&dir);
    let (status, body) = send(&app, "GET", "/api/v1/does-not-exist", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], true);
}
