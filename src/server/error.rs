//! Error types for the server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::error::{ErrorKind, ExoError};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Classifier(#[from] ExoError),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            ServerError::Classifier(e) => match (e.kind(), e) {
                (ErrorKind::StateConflict, ExoError::ModelNotLoaded(_)) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "state_conflict")
                }
                (ErrorKind::StateConflict, _) => (StatusCode::CONFLICT, "state_conflict"),
                (ErrorKind::Schema, _) => (StatusCode::UNPROCESSABLE_ENTITY, "schema"),
                (ErrorKind::DataQuality, _) => (StatusCode::UNPROCESSABLE_ENTITY, "data_quality"),
                (ErrorKind::NotImplemented, _) => (StatusCode::NOT_IMPLEMENTED, "not_implemented"),
                (ErrorKind::Io, _) => (StatusCode::INTERNAL_SERVER_ERROR, "io"),
                (ErrorKind::Internal, _) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
            ServerError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ServerError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match &self {
            ServerError::Classifier(ExoError::Io(e)) => {
                tracing::error!(detail = %e, "IO error");
                "A file system error occurred".to_string()
            }
            ServerError::Internal(msg) => {
                tracing::error!(detail = %msg, "Internal server error");
                "An internal error occurred".to_string()
            }
            other => {
                if status.is_server_error() {
                    tracing::error!(error = %other, "Request failed");
                } else {
                    tracing::warn!(error = %other, status = status.as_u16(), "Request rejected");
                }
                other.to_string()
            }
        };

        let body = Json(json!({
            "error": true,
            "kind": kind,
            "message": message,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;
