//! API route definitions

use std::sync::Arc;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::{handlers, state::AppState, ServerConfig};

async fn handle_404() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": true,
            "kind": "not_found",
            "message": "Not found. Visit /api/v1/health to check API status.",
        })),
    )
}

async fn handle_405() -> impl IntoResponse {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({
            "error": true,
            "kind": "method_not_allowed",
            "message": "Method not allowed. Check the API documentation for supported methods.",
        })),
    )
}

/// Create the main application router
pub fn create_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // System
        .route("/health", get(handlers::health_check))
        // Prediction
        .route("/predict", post(handlers::predict))
        .route("/predict/batch", post(handlers::predict_batch))
        // Model management
        .route("/model/info", get(handlers::model_info))
        .route("/model/status", get(handlers::model_status))
        .route("/model/reload", post(handlers::reload_model))
        // Training
        .route("/train", post(handlers::train_json))
        .route("/train/csv", post(handlers::train_csv))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405);

    let app = Router::new()
        .nest("/api/v1", api_routes)
        .route("/", get(handlers::root))
        .fallback(handle_404)
        .method_not_allowed_fallback(handle_405)
        .with_state(state);

    // CORS configured via CORS_ORIGIN (default: allow all)
    let cors = match config.cors_origin.as_deref() {
        Some(origin) if !origin.is_empty() && origin != "*" => {
            match origin.parse::<axum::http::HeaderValue>() {
                Ok(value) => CorsLayer::new()
                    .allow_origin(value)
                    .allow_methods(Any)
                    .allow_headers(Any),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Invalid CORS_ORIGIN, allowing all origins");
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any)
                }
            }
        }
        _ => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    };

    app.layer(DefaultBodyLimit::max(config.max_upload_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
