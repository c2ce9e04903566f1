// In crates/web-server/src/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not found")]
    NotFound(String),
    #[error("{0}")]
    InvalidRunId(#[from] core_types::Error),
    #[error("{0}")]
    BadRequest(String),
    #[error("Malformed run artifact {path}: {message}")]
    Artifact { path: String, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to bind server: {0}")]
    ServerBindError(#[source] std::io::Error),
    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidRunId(_) | Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        match &self {
            Error::NotFound(what) => tracing::debug!(%what, "Not found."),
            e if status.is_server_error() => tracing::error!(error = %e, "Request failed."),
            e => tracing::debug!(error = %e, "Rejected request."),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
