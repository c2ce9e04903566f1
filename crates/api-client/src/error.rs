// In crates/api-client/src/error.rs

use thiserror::Error;

/// Every way a call to the Control Tower backend can fail.
///
/// The synchronizer treats all variants the same way (keep the previous
/// value), but they are kept apart for logging.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to build the API client: {0}")]
    ClientBuildError(String),
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
